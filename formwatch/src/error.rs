//! Error types

use thiserror::Error;

/// Errors raised while building rule sets.
///
/// Problems found while the pipeline runs (such as an unknown field name)
/// are never returned; they are reported to the context's
/// [`DiagnosticsSink`](crate::diagnostics::DiagnosticsSink) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A rule set was declared without trigger fields.
    #[error("rule set needs at least one trigger field")]
    NoTriggers,

    /// A trigger field name was empty.
    #[error("trigger field name at position {index} is empty")]
    EmptyTriggerName {
        /// Position in the trigger list.
        index: usize,
    },
}

/// Result alias for formwatch operations.
pub type Result<T> = std::result::Result<T, Error>;
