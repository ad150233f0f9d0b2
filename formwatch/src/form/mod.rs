//! The form a validation context is bound to.
//!
//! The context only needs a narrow view of a form: look up a field by name,
//! ask whether the user has touched it, swap its rules, and listen to
//! whole-form value changes. [`Form`] and [`FieldHandle`] describe that view;
//! [`FormGroup`] is an in-memory implementation.

mod memory;

pub use memory::*;

use futures::stream::BoxStream;

use crate::rule::Rule;
use crate::value::FormValue;

/// Stream of whole-form snapshots, one per value change.
pub type ValueChanges = BoxStream<'static, FormValue>;

/// A form made of named fields.
pub trait Form: Send + Sync + 'static {
    /// Handle to a single field.
    type Field: FieldHandle;

    /// Look up a field by name.
    fn field(&self, name: &str) -> Option<Self::Field>;

    /// Current value of every field.
    fn value(&self) -> FormValue;

    /// Subscribe to value changes.
    ///
    /// Each call returns an independent subscription; dropping the stream
    /// unsubscribes.
    fn value_changes(&self) -> ValueChanges;
}

/// A single field as seen by the validation context.
pub trait FieldHandle {
    /// Returns `true` once the user has changed this field.
    fn is_dirty(&self) -> bool;

    /// Replace every attached rule. `None` clears them.
    fn set_rules(&self, rules: Option<Vec<Rule>>);

    /// Recompute validity against the currently attached rules.
    fn update_validity(&self);
}
