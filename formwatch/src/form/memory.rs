//! In-memory form model.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{trace, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{FieldHandle, Form, ValueChanges};
use crate::rule::{Rule, Violation};
use crate::value::{FormValue, Value};

/// Buffered value-change events per subscriber before old ones are dropped.
const CHANGE_BUFFER: usize = 64;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Validity of a single control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    /// Every attached rule passed.
    Valid,
    /// At least one attached rule failed.
    Invalid(Vec<Violation>),
}

impl FieldStatus {
    /// Check if the control passed validation.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The failed rules, in rule order.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Valid => &[],
            Self::Invalid(violations) => violations,
        }
    }
}

/// Internal state for a control.
#[derive(Debug, Default)]
struct ControlInner {
    value: Value,
    dirty: bool,
    rules: Vec<Rule>,
    violations: Vec<Violation>,
    /// Number of times validity has been recomputed.
    validation_runs: u64,
}

/// State shared by a group and all of its controls.
struct Shared {
    controls: BTreeMap<String, Arc<RwLock<ControlInner>>>,
    changes: broadcast::Sender<FormValue>,
}

impl Shared {
    fn snapshot(&self) -> FormValue {
        self.controls
            .iter()
            .map(|(name, inner)| (name.clone(), read(inner).value.clone()))
            .collect()
    }

    fn emit(&self) {
        let value = self.snapshot();
        trace!("[form] value change ({} fields)", value.len());
        // No receivers is fine: nobody is listening yet.
        let _ = self.changes.send(value);
    }
}

/// A single named field inside a [`FormGroup`].
///
/// Cheap to clone; clones refer to the same field.
#[derive(Clone)]
pub struct FormControl {
    name: String,
    inner: Arc<RwLock<ControlInner>>,
    shared: Arc<Shared>,
}

impl FormControl {
    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> Value {
        read(&self.inner).value.clone()
    }

    /// Set the value programmatically.
    ///
    /// Does not mark the control dirty. Recomputes validity and emits a
    /// value change on the group.
    pub fn set_value(&self, value: impl Into<Value>) {
        write(&self.inner).value = value.into();
        self.update_validity();
        self.shared.emit();
    }

    /// Set the value as if the user had typed it.
    ///
    /// Marks the control dirty before the value change is emitted.
    pub fn input(&self, value: impl Into<Value>) {
        write(&self.inner).dirty = true;
        self.set_value(value);
    }

    /// Mark the control as changed by the user.
    pub fn mark_dirty(&self) {
        write(&self.inner).dirty = true;
    }

    /// Mark the control as untouched.
    pub fn mark_pristine(&self) {
        write(&self.inner).dirty = false;
    }

    /// Current validity.
    pub fn status(&self) -> FieldStatus {
        let inner = read(&self.inner);
        if inner.violations.is_empty() {
            FieldStatus::Valid
        } else {
            FieldStatus::Invalid(inner.violations.clone())
        }
    }

    /// Check if every attached rule passed.
    pub fn is_valid(&self) -> bool {
        read(&self.inner).violations.is_empty()
    }

    /// Failed rules from the last recomputation.
    pub fn violations(&self) -> Vec<Violation> {
        read(&self.inner).violations.clone()
    }

    /// Check if a rule with the given code failed.
    pub fn has_violation(&self, code: &str) -> bool {
        read(&self.inner).violations.iter().any(|v| v.code == code)
    }

    /// Number of rules currently attached.
    pub fn rules_len(&self) -> usize {
        read(&self.inner).rules.len()
    }

    /// Number of times validity has been recomputed.
    pub fn validation_runs(&self) -> u64 {
        read(&self.inner).validation_runs
    }
}

impl FieldHandle for FormControl {
    fn is_dirty(&self) -> bool {
        read(&self.inner).dirty
    }

    fn set_rules(&self, rules: Option<Vec<Rule>>) {
        write(&self.inner).rules = rules.unwrap_or_default();
    }

    fn update_validity(&self) {
        // Evaluate outside the lock: rules may read other controls (or this one).
        let (value, rules) = {
            let inner = read(&self.inner);
            (inner.value.clone(), inner.rules.clone())
        };

        let violations: Vec<Violation> = rules
            .iter()
            .filter_map(|rule| rule.evaluate(&value).err())
            .collect();

        let mut inner = write(&self.inner);
        inner.violations = violations;
        inner.validation_runs += 1;
    }
}

impl std::fmt::Debug for FormControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = read(&self.inner);
        f.debug_struct("FormControl")
            .field("name", &self.name)
            .field("value", &inner.value)
            .field("dirty", &inner.dirty)
            .field("rules", &inner.rules.len())
            .field("violations", &inner.violations)
            .finish()
    }
}

/// A set of named controls that emits a snapshot whenever any control changes.
///
/// # Example
///
/// ```
/// use formwatch::{FormGroup, rule};
///
/// let form = FormGroup::builder()
///     .control("email", "", vec![rule::required(), rule::email()])
///     .control("confirmEmail", "", vec![rule::required()])
///     .build();
///
/// let email = form.control("email").unwrap();
/// assert!(!email.is_valid());
///
/// email.input("ada@example.com");
/// assert!(email.is_valid());
/// ```
#[derive(Clone)]
pub struct FormGroup {
    shared: Arc<Shared>,
}

impl FormGroup {
    /// Start building a form.
    pub fn builder() -> FormGroupBuilder {
        FormGroupBuilder::default()
    }

    /// Look up a control by name.
    pub fn control(&self, name: &str) -> Option<FormControl> {
        self.shared
            .controls
            .get_key_value(name)
            .map(|(name, inner)| FormControl {
                name: name.clone(),
                inner: Arc::clone(inner),
                shared: Arc::clone(&self.shared),
            })
    }

    /// Names of every control, sorted.
    pub fn control_names(&self) -> impl Iterator<Item = &str> {
        self.shared.controls.keys().map(String::as_str)
    }

    /// Set several values programmatically and emit a single value change.
    ///
    /// Names that do not match a control are ignored.
    pub fn patch_value(&self, patch: &FormValue) {
        for (name, value) in patch {
            if let Some(control) = self.control(name) {
                write(&control.inner).value = value.clone();
                control.update_validity();
            }
        }
        self.shared.emit();
    }

    /// Check if every control is valid.
    pub fn is_valid(&self) -> bool {
        self.shared
            .controls
            .values()
            .all(|inner| read(inner).violations.is_empty())
    }
}

impl Form for FormGroup {
    type Field = FormControl;

    fn field(&self, name: &str) -> Option<FormControl> {
        self.control(name)
    }

    fn value(&self) -> FormValue {
        self.shared.snapshot()
    }

    fn value_changes(&self) -> ValueChanges {
        let mut rx = self.shared.changes.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(value) => yield value,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[form] subscriber lagged, skipped {} value changes", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl std::fmt::Debug for FormGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormGroup")
            .field("value", &self.shared.snapshot())
            .finish_non_exhaustive()
    }
}

/// Builder for [`FormGroup`].
#[derive(Default)]
pub struct FormGroupBuilder {
    controls: BTreeMap<String, ControlInner>,
}

impl FormGroupBuilder {
    /// Add a control with an initial value and rules.
    ///
    /// Adding the same name twice replaces the earlier control.
    pub fn control(
        mut self,
        name: impl Into<String>,
        initial: impl Into<Value>,
        rules: Vec<Rule>,
    ) -> Self {
        self.controls.insert(
            name.into(),
            ControlInner {
                value: initial.into(),
                rules,
                ..Default::default()
            },
        );
        self
    }

    /// Build the form and compute the initial validity of every control.
    pub fn build(self) -> FormGroup {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        let controls = self
            .controls
            .into_iter()
            .map(|(name, inner)| (name, Arc::new(RwLock::new(inner))))
            .collect();
        let form = FormGroup {
            shared: Arc::new(Shared { controls, changes }),
        };

        let names: Vec<String> = form.control_names().map(str::to_string).collect();
        for name in names {
            if let Some(control) = form.control(&name) {
                control.update_validity();
            }
        }
        form
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::rule;

    fn form() -> FormGroup {
        FormGroup::builder()
            .control("email", "", vec![rule::required()])
            .control("name", "Ada", vec![])
            .build()
    }

    #[test]
    fn test_initial_validity() {
        let form = form();
        let email = form.control("email").unwrap();
        assert!(email.has_violation("required"));
        assert_eq!(email.validation_runs(), 1);
        assert!(form.control("name").unwrap().is_valid());
        assert!(!form.is_valid());
    }

    #[test]
    fn test_input_marks_dirty_set_value_does_not() {
        let form = form();
        let email = form.control("email").unwrap();

        email.set_value("a@b.c");
        assert!(!email.is_dirty());

        email.input("x@y.z");
        assert!(email.is_dirty());

        email.mark_pristine();
        assert!(!email.is_dirty());
    }

    #[test]
    fn test_set_rules_replaces_and_none_clears() {
        let form = form();
        let email = form.control("email").unwrap();

        email.set_rules(Some(vec![rule::required(), rule::email()]));
        assert_eq!(email.rules_len(), 2);

        email.set_rules(None);
        assert_eq!(email.rules_len(), 0);

        // Rules only take effect on recomputation.
        assert!(!email.is_valid());
        email.update_validity();
        assert!(email.is_valid());
    }

    #[test]
    fn test_rule_may_read_its_own_control() {
        let form = form();
        let name = form.control("name").unwrap();
        let same = name.clone();
        name.set_rules(Some(vec![Rule::from_fn(move |v| {
            assert_eq!(&same.value(), v);
            Ok(())
        })]));
        name.update_validity();
        assert!(name.is_valid());
    }

    #[test]
    fn test_unknown_control() {
        assert!(form().control("missing").is_none());
    }

    #[tokio::test]
    async fn test_value_changes_emit_snapshots() {
        let form = form();
        let mut changes = form.value_changes();

        form.control("email").unwrap().input("a@b.c");
        form.patch_value(&FormValue::new().with("name", "Grace").with("nope", 1i64));

        let first = changes.next().await.unwrap();
        assert_eq!(first.get("email"), Some(&Value::from("a@b.c")));
        assert_eq!(first.get("name"), Some(&Value::from("Ada")));

        let second = changes.next().await.unwrap();
        assert_eq!(second.get("name"), Some(&Value::from("Grace")));
        assert!(!second.contains("nope"));
    }

    #[tokio::test]
    async fn test_value_changes_skip_lag_and_end_on_close() {
        let form = form();
        let name = form.control("name").unwrap();
        let changes = form.value_changes();

        let total = CHANGE_BUFFER as i64 + 36;
        for i in 0..total {
            name.set_value(i);
        }
        drop(name);
        drop(form);

        // The oldest changes are dropped; the rest arrive and the stream ends.
        let seen: Vec<FormValue> = changes.collect().await;
        assert_eq!(seen.len(), CHANGE_BUFFER);
        assert_eq!(seen[0].get("name"), Some(&Value::from(36i64)));
        assert_eq!(seen.last().unwrap().get("name"), Some(&Value::from(total - 1)));
    }
}
