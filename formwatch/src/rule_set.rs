//! Rule sets: trigger fields plus a function deriving rules from the form value.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::rule::Rules;
use crate::value::FormValue;

/// Rules to attach, keyed by field name, in the order they were assigned.
///
/// # Example
///
/// ```
/// use formwatch::{RuleAssignment, rule};
///
/// let assignment = RuleAssignment::new()
///     .assign("confirmEmail", [rule::required(), rule::email()])
///     .assign("email", rule::required());
///
/// assert_eq!(assignment.len(), 2);
/// let names: Vec<_> = assignment.iter().map(|(name, _)| name).collect();
/// assert_eq!(names, ["confirmEmail", "email"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleAssignment {
    entries: Vec<(String, Rules)>,
}

impl RuleAssignment {
    /// Creates an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign rules to a field (builder pattern).
    ///
    /// Assigning the same field twice applies both in order, so the later
    /// one is what the field ends up with.
    pub fn assign(mut self, field: impl Into<String>, rules: impl Into<Rules>) -> Self {
        self.push(field, rules);
        self
    }

    /// Assign rules to a field.
    pub fn push(&mut self, field: impl Into<String>, rules: impl Into<Rules>) {
        self.entries.push((field.into(), rules.into()));
    }

    /// Returns `true` if no field is assigned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of assigned fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate `(field, rules)` pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rules)> {
        self.entries.iter().map(|(name, rules)| (name.as_str(), rules))
    }
}

impl IntoIterator for RuleAssignment {
    type Item = (String, Rules);
    type IntoIter = std::vec::IntoIter<(String, Rules)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, R: Into<Rules>> FromIterator<(K, R)> for RuleAssignment {
    fn from_iter<I: IntoIterator<Item = (K, R)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, r)| (k.into(), r.into()))
                .collect(),
        }
    }
}

/// Function mapping the current form value to rules to attach.
///
/// Returning `None` (or an empty assignment) means the function handled
/// validation itself and nothing should be attached.
pub type Derivation = Arc<dyn Fn(&FormValue) -> Option<RuleAssignment> + Send + Sync>;

/// Trigger fields plus the derivation run when one of them is touched.
///
/// # Example
///
/// ```
/// use formwatch::{RuleAssignment, RuleSet, rule};
///
/// let confirm = RuleSet::new(["email", "confirmEmail"], |_value| {
///     Some(RuleAssignment::new().assign("confirmEmail", rule::required()))
/// })
/// .unwrap()
/// .with_label("confirm-email");
///
/// assert_eq!(confirm.triggers(), ["email", "confirmEmail"]);
/// assert!(RuleSet::new(Vec::<String>::new(), |_| None).is_err());
/// ```
#[derive(Clone)]
pub struct RuleSet {
    label: String,
    triggers: Vec<String>,
    derive: Derivation,
}

impl RuleSet {
    /// Create a rule set.
    ///
    /// Repeated trigger names are collapsed, keeping first-seen order.
    /// Fails if there are no triggers or one of them is empty. Whether the
    /// names exist in the form is only checked while the pipeline runs.
    pub fn new<I, S, F>(triggers: I, derive: F) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&FormValue) -> Option<RuleAssignment> + Send + Sync + 'static,
    {
        let mut unique: Vec<String> = Vec::new();
        for (index, name) in triggers.into_iter().map(Into::into).enumerate() {
            if name.is_empty() {
                return Err(Error::EmptyTriggerName { index });
            }
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        if unique.is_empty() {
            return Err(Error::NoTriggers);
        }

        Ok(Self {
            label: unique.join(","),
            triggers: unique,
            derive: Arc::new(derive),
        })
    }

    /// Create a rule set whose function validates as a side effect and
    /// never asks for rules to be attached.
    pub fn custom<I, S, F>(triggers: I, f: F) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&FormValue) + Send + Sync + 'static,
    {
        Self::new(triggers, move |value| {
            f(value);
            None
        })
    }

    /// Set the label used in diagnostics. Defaults to the trigger names.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Label used in diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Trigger field names, in declaration order.
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// Run the derivation function.
    pub fn derive(&self, value: &FormValue) -> Option<RuleAssignment> {
        (self.derive)(value)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("label", &self.label)
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}

/// Ordered, de-duplicated union of every trigger across `rule_sets`.
pub fn trigger_union(rule_sets: &[RuleSet]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for name in rule_sets.iter().flat_map(|set| set.triggers()) {
        if !keys.contains(name) {
            keys.push(name.clone());
        }
    }
    keys
}
