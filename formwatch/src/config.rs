//! Validation context configuration.

use std::time::Duration;

/// Default quiet window before a value change is processed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Configuration for a [`ValidationContext`](crate::ValidationContext).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use formwatch::ContextConfig;
///
/// // Default: 200ms debounce
/// let config = ContextConfig::default();
/// assert_eq!(config.debounce, Duration::from_millis(200));
///
/// // Custom window
/// let custom = ContextConfig::default().debounce_ms(50);
///
/// // Process every change as soon as the scheduler allows
/// let eager = ContextConfig::no_debounce();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Quiet window a burst of value changes must settle for.
    pub debounce: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl ContextConfig {
    /// Creates a config with a zero debounce window.
    pub fn no_debounce() -> Self {
        Self {
            debounce: Duration::ZERO,
        }
    }

    /// Sets the debounce window.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Sets the debounce window in milliseconds.
    pub fn debounce_ms(self, millis: u64) -> Self {
        self.debounce(Duration::from_millis(millis))
    }
}
