//! Validation context: binds rule sets to one form's value changes.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::attach::set_validators;
use crate::config::ContextConfig;
use crate::diagnostics::{DiagnosticsSink, Issue, LogSink};
use crate::form::{FieldHandle, Form};
use crate::pipeline::Pipeline;
use crate::rule_set::{RuleSet, trigger_union};
use crate::value::FormValue;

/// Runs rule sets against one form.
///
/// Each call to [`validate`](Self::validate) starts an independent
/// subscription to the form's value changes. All of them stop when the
/// context's cancellation token fires.
///
/// # Example
///
/// ```
/// use formwatch::{FormGroup, RuleAssignment, RuleSet, ValidationContext, rule};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let form = FormGroup::builder()
///     .control("email", "", vec![rule::required()])
///     .control("confirmEmail", "", vec![])
///     .build();
///
/// let teardown = CancellationToken::new();
/// let cx = ValidationContext::new(form.clone(), teardown.clone());
///
/// cx.validate([RuleSet::new(["email", "confirmEmail"], |_| {
///     Some(RuleAssignment::new().assign("confirmEmail", rule::required()))
/// })
/// .unwrap()]);
///
/// // Component destroyed: every subscription stops.
/// teardown.cancel();
/// # }
/// ```
pub struct ValidationContext<F: Form> {
    dispatcher: Dispatcher<F>,
    config: ContextConfig,
    cancel: CancellationToken,
    /// Set when the context owns its token; dropping it tears down.
    _owner: Option<DropGuard>,
}

impl<F: Form> ValidationContext<F> {
    /// Bind a context to `form`. Subscriptions end when `cancel` fires.
    pub fn new(form: F, cancel: CancellationToken) -> Self {
        Self {
            dispatcher: Dispatcher {
                form: Arc::new(form),
                sink: Arc::new(LogSink),
            },
            config: ContextConfig::default(),
            cancel,
            _owner: None,
        }
    }

    /// Replace the configuration used by later `validate` calls.
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Send issues to `sink` instead of the log.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.dispatcher.sink = sink;
        self
    }

    /// The bound form.
    pub fn form(&self) -> &F {
        &self.dispatcher.form
    }

    /// The active configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Token whose cancellation tears down every subscription.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop every subscription started by this context.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once torn down.
    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Watch the form and apply `rule_sets` using the configured debounce.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn validate(&self, rule_sets: impl IntoIterator<Item = RuleSet>) -> Subscription {
        self.validate_with(self.config.debounce, rule_sets)
    }

    /// Watch the form and apply `rule_sets` with an explicit debounce window.
    ///
    /// Deduplication compares the union of every trigger in this call. For
    /// each accepted value, rule sets run in the given order, and only those
    /// with at least one dirty trigger field.
    pub fn validate_with(
        &self,
        debounce: Duration,
        rule_sets: impl IntoIterator<Item = RuleSet>,
    ) -> Subscription {
        let rule_sets: Vec<RuleSet> = rule_sets.into_iter().collect();
        let keys = trigger_union(&rule_sets);
        let cancel = self.cancel.child_token();

        debug!(
            "[context] subscribing {} rule set(s) on keys {:?} (debounce {:?})",
            rule_sets.len(),
            keys,
            debounce
        );

        // Subscribe now so changes made right after this call are seen.
        let mut pipeline = Pipeline::new(
            self.dispatcher.form.value_changes(),
            debounce,
            keys,
            cancel.clone(),
        );
        let dispatcher = self.dispatcher.clone();

        let handle = tokio::spawn(async move {
            while let Some(value) = pipeline.next().await {
                dispatcher.dispatch(&value, &rule_sets);
            }
            debug!("[context] subscription closed");
        });

        Subscription { cancel, handle }
    }

    /// Apply one rule set to `value` right away, bypassing the pipeline and
    /// the dirty gate.
    pub fn validate_single_set(&self, value: &FormValue, rule_set: &RuleSet) {
        self.dispatcher.validate_single_set(value, rule_set);
    }
}

impl<F: Form> std::fmt::Debug for ValidationContext<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationContext")
            .field("config", &self.config)
            .field("torn_down", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// The part of a context that runs inside a subscription task.
struct Dispatcher<F> {
    form: Arc<F>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl<F> Clone for Dispatcher<F> {
    fn clone(&self) -> Self {
        Self {
            form: Arc::clone(&self.form),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<F: Form> Dispatcher<F> {
    fn dispatch(&self, value: &FormValue, rule_sets: &[RuleSet]) {
        for rule_set in rule_sets {
            if !self.any_trigger_dirty(rule_set) {
                trace!("[context] {}: no trigger touched, skipping", rule_set.label());
                continue;
            }
            self.validate_single_set(value, rule_set);
        }
    }

    /// Every trigger is looked up so unknown names are always reported.
    fn any_trigger_dirty(&self, rule_set: &RuleSet) -> bool {
        let mut dirty = false;
        for name in rule_set.triggers() {
            match self.form.field(name) {
                Some(field) => dirty |= field.is_dirty(),
                None => self.sink.report(Issue::UnknownTrigger {
                    rule_set: rule_set.label().to_string(),
                    field: name.clone(),
                }),
            }
        }
        dirty
    }

    fn validate_single_set(&self, value: &FormValue, rule_set: &RuleSet) {
        let Some(assignment) = rule_set.derive(value) else {
            trace!("[context] {}: validated by its own function", rule_set.label());
            return;
        };
        if assignment.is_empty() {
            trace!("[context] {}: empty assignment", rule_set.label());
            return;
        }

        debug!(
            "[context] {}: attaching rules to {} field(s)",
            rule_set.label(),
            assignment.len()
        );
        for (name, rules) in assignment {
            let Some(field) = self.form.field(&name) else {
                self.sink.report(Issue::MissingField {
                    rule_set: rule_set.label().to_string(),
                    field: name,
                });
                continue;
            };
            set_validators([(&field, Some(rules.into_vec()))]);
        }
    }
}

/// Handle to the task started by one `validate` call.
///
/// Dropping the handle leaves the subscription running.
#[derive(Debug)]
pub struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop this subscription only.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the subscription task has finished.
    pub fn is_closed(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the subscription task to finish.
    pub async fn closed(self) {
        if let Err(e) = self.handle.await {
            warn!("[context] subscription task ended abnormally: {}", e);
        }
    }
}

/// Bind a context to `form` with its own teardown token and debounce window.
///
/// Tear it down with [`ValidationContext::teardown`] or by dropping it.
pub fn create_validation_context<F: Form>(form: F, debounce: Duration) -> ValidationContext<F> {
    let cancel = CancellationToken::new();
    let mut cx = ValidationContext::new(form, cancel.clone())
        .with_config(ContextConfig::default().debounce(debounce));
    cx._owner = Some(cancel.drop_guard());
    cx
}

/// Creates contexts tied to one owner's lifetime.
///
/// Destroying the validator (explicitly or by dropping it) tears down every
/// context it created.
///
/// # Example
///
/// ```
/// use formwatch::{FormGroup, FormValidator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let validator = FormValidator::new();
/// let form = FormGroup::builder().control("email", "", vec![]).build();
/// let cx = validator.create_context(form);
///
/// validator.destroy();
/// assert!(cx.is_torn_down());
/// # }
/// ```
pub struct FormValidator {
    destroy: CancellationToken,
    config: ContextConfig,
    sink: Arc<dyn DiagnosticsSink>,
}

impl FormValidator {
    /// Create a validator with default configuration and log diagnostics.
    pub fn new() -> Self {
        Self {
            destroy: CancellationToken::new(),
            config: ContextConfig::default(),
            sink: Arc::new(LogSink),
        }
    }

    /// Configuration handed to every created context.
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Diagnostics sink handed to every created context.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Create a context for `form` that ends when this validator is destroyed.
    pub fn create_context<F: Form>(&self, form: F) -> ValidationContext<F> {
        ValidationContext::new(form, self.destroy.child_token())
            .with_config(self.config.clone())
            .with_sink(Arc::clone(&self.sink))
    }

    /// Tear down every context created by this validator.
    pub fn destroy(&self) {
        debug!("[validator] destroyed");
        self.destroy.cancel();
    }

    /// Returns `true` once destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroy.is_cancelled()
    }
}

impl Default for FormValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FormValidator {
    fn drop(&mut self) {
        self.destroy.cancel();
    }
}

impl std::fmt::Debug for FormValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormValidator")
            .field("config", &self.config)
            .field("destroyed", &self.destroy.is_cancelled())
            .finish_non_exhaustive()
    }
}
