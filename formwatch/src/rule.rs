//! Opaque validation rules.
//!
//! A [`Rule`] evaluates one field's value and yields either success or a
//! [`Violation`]. The validation context only moves rules around and hands
//! them to fields; evaluation happens inside the field when it recomputes
//! its validity.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::Value;

/// Structured description of a failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Violation {
    /// Stable key identifying the kind of failure (e.g. `"required"`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result of evaluating one rule against one value.
pub type Outcome = Result<(), Violation>;

/// Capability implemented by anything that can judge a field value.
pub trait Evaluate: Send + Sync {
    /// Evaluate the rule against the field's current value.
    fn evaluate(&self, value: &Value) -> Outcome;
}

impl<F> Evaluate for F
where
    F: Fn(&Value) -> Outcome + Send + Sync,
{
    fn evaluate(&self, value: &Value) -> Outcome {
        self(value)
    }
}

/// A cheap-to-clone handle to a validation rule.
///
/// # Example
///
/// ```
/// use formwatch::{Rule, Value, Violation};
///
/// let no_spaces = Rule::named("no_spaces", |v: &Value| match v.as_str() {
///     Some(s) if s.contains(' ') => Err(Violation::new("noSpaces", "Spaces are not allowed")),
///     _ => Ok(()),
/// });
///
/// assert!(no_spaces.evaluate(&Value::from("a b")).is_err());
/// assert!(no_spaces.evaluate(&Value::from("ab")).is_ok());
/// ```
#[derive(Clone)]
pub struct Rule {
    name: &'static str,
    inner: Arc<dyn Evaluate>,
}

impl Rule {
    /// Wrap any evaluator as a rule.
    pub fn new(evaluator: impl Evaluate + 'static) -> Self {
        Self::with_name("custom", evaluator)
    }

    /// Create a rule from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Outcome + Send + Sync + 'static,
    {
        Self::new(f)
    }

    /// Create a rule from a closure, with a name used in debug output.
    pub fn named<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(&Value) -> Outcome + Send + Sync + 'static,
    {
        Self::with_name(name, f)
    }

    fn with_name(name: &'static str, evaluator: impl Evaluate + 'static) -> Self {
        Self {
            name,
            inner: Arc::new(evaluator),
        }
    }

    /// The rule's display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Evaluate the rule against a value.
    pub fn evaluate(&self, value: &Value) -> Outcome {
        self.inner.evaluate(value)
    }

    /// Returns `true` if both handles point at the same rule.
    pub fn ptr_eq(&self, other: &Rule) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

/// One rule or a list of rules destined for a single field.
#[derive(Debug, Clone)]
pub enum Rules {
    /// A single rule.
    One(Rule),
    /// Several rules, evaluated in order.
    Many(Vec<Rule>),
}

impl Rules {
    /// Normalize into a list; a single rule becomes a one-element list.
    pub fn into_vec(self) -> Vec<Rule> {
        match self {
            Rules::One(rule) => vec![rule],
            Rules::Many(rules) => rules,
        }
    }

    /// Number of rules held.
    pub fn len(&self) -> usize {
        match self {
            Rules::One(_) => 1,
            Rules::Many(rules) => rules.len(),
        }
    }

    /// Returns `true` for an empty list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Rule> for Rules {
    fn from(rule: Rule) -> Self {
        Rules::One(rule)
    }
}

impl From<Vec<Rule>> for Rules {
    fn from(rules: Vec<Rule>) -> Self {
        Rules::Many(rules)
    }
}

impl<const N: usize> From<[Rule; N]> for Rules {
    fn from(rules: [Rule; N]) -> Self {
        Rules::Many(rules.into())
    }
}

// =============================================================================
// Built-in rules
// =============================================================================

/// Require a non-empty value (see [`Value::is_empty`]).
pub fn required() -> Rule {
    Rule::named("required", |v: &Value| {
        if v.is_empty() {
            Err(Violation::new("required", "This field is required"))
        } else {
            Ok(())
        }
    })
}

/// Require a syntactically valid email address.
///
/// Empty values pass; combine with [`required`] to reject them.
pub fn email() -> Rule {
    Rule::named("email", |v: &Value| match v {
        Value::Null => Ok(()),
        Value::String(s) if s.is_empty() => Ok(()),
        Value::String(s) if email_address::EmailAddress::is_valid(s) => Ok(()),
        _ => Err(Violation::new("email", "Please enter a valid email")),
    })
}

/// Require a value only while `predicate` returns `true`.
///
/// The predicate is called every time the rule is evaluated, so it can read
/// state that changes after the rule was built (another field, a flag).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use formwatch::{Value, rule::require_if};
///
/// let flag = Arc::new(AtomicBool::new(false));
/// let rule = {
///     let flag = Arc::clone(&flag);
///     require_if(move || flag.load(Ordering::SeqCst))
/// };
///
/// assert!(rule.evaluate(&Value::from("")).is_ok());
/// flag.store(true, Ordering::SeqCst);
/// assert!(rule.evaluate(&Value::from("")).is_err());
/// ```
pub fn require_if<P>(predicate: P) -> Rule
where
    P: Fn() -> bool + Send + Sync + 'static,
{
    let required = required();
    Rule::named("require_if", move |v: &Value| {
        if predicate() {
            required.evaluate(v)
        } else {
            Ok(())
        }
    })
}
