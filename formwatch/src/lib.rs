//! Reactive cross-field validation for forms.
//!
//! A [`ValidationContext`] listens to a form's value changes and, when the
//! user has touched a relevant field, re-derives and re-attaches field rules.
//! Value changes are debounced, empty snapshots are dropped, and snapshots
//! whose trigger fields did not change are skipped.

pub mod attach;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod distinct;
pub mod error;
pub mod form;
pub mod pipeline;
pub mod rule;
pub mod rule_set;
pub mod value;

pub use config::ContextConfig;
pub use context::{FormValidator, Subscription, ValidationContext, create_validation_context};
pub use error::{Error, Result};
pub use form::{FieldHandle, FieldStatus, Form, FormControl, FormGroup};
pub use rule::{Rule, Rules, Violation};
pub use rule_set::{RuleAssignment, RuleSet};
pub use value::{FormValue, Value};

pub mod prelude {
    pub use crate::attach::set_validators;
    pub use crate::config::ContextConfig;
    pub use crate::context::{FormValidator, Subscription, ValidationContext, create_validation_context};
    pub use crate::diagnostics::{DiagnosticsSink, Issue, LogSink, MemorySink};
    pub use crate::form::{FieldHandle, FieldStatus, Form, FormControl, FormGroup};
    pub use crate::rule::{Rule, Rules, Violation, email, require_if, required};
    pub use crate::rule_set::{RuleAssignment, RuleSet};
    pub use crate::value::{FormValue, Value};
}
