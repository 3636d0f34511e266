//! Error types for the coordination substrate.
//!
//! Three small enums instead of one grab-bag type, because the kinds of
//! failure in a Disruptor-shaped pipeline don't share a recovery story:
//! configuration errors are a programmer mistake caught at setup,
//! wait errors are cooperative signals observed on the hot path, and
//! capacity errors are a normal, recoverable backpressure signal.

use thiserror::Error;

/// Programmer-error class: invalid topology setup, caught at construction
/// time and never on the hot path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Ring size was not a power of two, or was zero.
    #[error("invalid ring size: {message}")]
    InvalidRingSize {
        /// Description of why the size was rejected.
        message: String,
    },

    /// A processor or builder was given an out-of-range value, such as a
    /// zero batch size.
    #[error("invalid configuration: {message}")]
    InvalidValue {
        /// Description of the rejected value.
        message: String,
    },

    /// A gating sequence was registered twice, or removed when absent.
    #[error("gating sequence error: {message}")]
    GatingSequence {
        /// Description of the registration conflict.
        message: String,
    },

    /// A processor was started while already running.
    #[error("processor is already running")]
    AlreadyRunning,
}

impl ConfigError {
    /// Create an invalid-ring-size error.
    pub fn invalid_ring_size(message: impl Into<String>) -> Self {
        Self::InvalidRingSize { message: message.into() }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue { message: message.into() }
    }

    /// Create a gating-sequence conflict error.
    pub fn gating_sequence(message: impl Into<String>) -> Self {
        Self::GatingSequence { message: message.into() }
    }
}

/// Hot-path cooperative signal returned by a wait strategy or barrier.
///
/// Neither variant is a bug: `Alert` is the cancellation handshake used to
/// unwind a parked consumer on halt, and `Timeout` is informational,
/// delivered to the handler via `on_timeout` and then retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The barrier was cancelled (halt requested) while a consumer waited.
    #[error("wait was cancelled")]
    Alert,

    /// The configured timeout elapsed before the requested sequence became
    /// available.
    #[error("wait timed out")]
    Timeout,
}

impl WaitError {
    /// True if this is the cooperative cancellation signal.
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alert)
    }

    /// True if this is the informational timeout signal.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Recoverable capacity failure from a non-blocking claim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerError {
    /// `try_next` could not claim the requested number of sequences without
    /// overwriting a slot the slowest gating sequence has not yet consumed.
    #[error("insufficient capacity to claim {requested} sequence(s)")]
    InsufficientCapacity {
        /// Number of sequences the caller asked to claim.
        requested: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_constructors_classify_correctly() {
        let err = ConfigError::invalid_ring_size("must be power of two");
        assert!(matches!(err, ConfigError::InvalidRingSize { .. }));

        let err = ConfigError::gating_sequence("already registered");
        assert!(matches!(err, ConfigError::GatingSequence { .. }));
    }

    #[test]
    fn wait_error_predicates() {
        assert!(WaitError::Alert.is_alert());
        assert!(!WaitError::Alert.is_timeout());
        assert!(WaitError::Timeout.is_timeout());
        assert!(!WaitError::Timeout.is_alert());
    }

    #[test]
    fn sequencer_error_reports_requested_count() {
        let err = SequencerError::InsufficientCapacity { requested: 4 };
        assert_eq!(err.to_string(), "insufficient capacity to claim 4 sequence(s)");
    }
}
