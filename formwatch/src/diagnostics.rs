//! Reporting of recoverable problems found while dispatching rules.

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

/// A recoverable problem. Reporting one never interrupts the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Issue {
    /// A derivation assigned rules to a field the form does not have.
    #[error("can not find control name: {field} (rule set {rule_set})")]
    MissingField {
        /// Label of the rule set that produced the assignment.
        rule_set: String,
        /// The unknown field name.
        field: String,
    },

    /// A trigger field does not exist; it is treated as untouched.
    #[error("unknown trigger field: {field} (rule set {rule_set})")]
    UnknownTrigger {
        /// Label of the rule set declaring the trigger.
        rule_set: String,
        /// The unknown field name.
        field: String,
    },
}

impl Issue {
    /// The field name the issue is about.
    pub fn field(&self) -> &str {
        match self {
            Issue::MissingField { field, .. } | Issue::UnknownTrigger { field, .. } => field,
        }
    }
}

/// Receives issues found by a validation context.
pub trait DiagnosticsSink: Send + Sync {
    /// Report one issue.
    fn report(&self, issue: Issue);
}

/// Sink that forwards every issue to the `log` facade at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn report(&self, issue: Issue) {
        log::error!("{}", issue);
    }
}

/// Sink that keeps every issue in memory.
///
/// # Example
///
/// ```
/// use formwatch::diagnostics::{DiagnosticsSink, Issue, MemorySink};
///
/// let sink = MemorySink::new();
/// sink.report(Issue::MissingField {
///     rule_set: "#0".to_string(),
///     field: "ghost".to_string(),
/// });
///
/// assert_eq!(sink.len(), 1);
/// assert_eq!(sink.issues()[0].field(), "ghost");
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    issues: Mutex<Vec<Issue>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Issue>> {
        self.issues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of every reported issue, oldest first.
    pub fn issues(&self) -> Vec<Issue> {
        self.lock().clone()
    }

    /// Number of reported issues.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every reported issue.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl DiagnosticsSink for MemorySink {
    fn report(&self, issue: Issue) {
        self.lock().push(issue);
    }
}
