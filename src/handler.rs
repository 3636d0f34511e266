//! User-facing contracts the event processor calls into: the event handler,
//! the exception handler, and the batch size limiter (spec.md §4.6–§4.8).
//!
//! These are collaborator traits, not algorithms — the processor owns the
//! loop and error-routing policy; implementations of these traits are
//! business logic, explicitly out of scope per spec.md §1. What's in scope
//! here is the *contract* each hook must satisfy.

use crate::constants::DEFAULT_MAX_BATCH_SIZE;

/// Per-event delivery contract. `T` is the ring's fixed event type.
///
/// Hooks return `Result` rather than panicking — "the user may throw" in
/// spec.md §4.6 maps to a fallible `on_batch`, routed through the
/// `ExceptionHandler` rather than unwinding the processor's thread.
pub trait EventHandler<T>: Send {
    /// The error type this handler's hooks may fail with.
    type Error;

    /// Called once when the processor's run loop starts, before the first
    /// `on_batch`.
    fn on_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once as the processor's run loop exits, in a guaranteed-exit
    /// region (runs even after a fatal event exception).
    fn on_shutdown(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Deliver one contiguous batch `[starting_sequence, starting_sequence +
    /// batch.len())`. May be called with `batch.len() == 1` (no special
    /// casing of singleton batches — spec.md has no end-of-batch flag,
    /// unlike the teacher's per-slot `RingEventHandler::on_event`).
    fn on_batch(&mut self, batch: &[T], starting_sequence: i64) -> Result<(), Self::Error>;

    /// Called when the barrier reports a timeout instead of new data. Not
    /// an error — `on_batch` is never invoked for a timeout round.
    fn on_timeout(&mut self, _sequence: i64) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Error-routing contract. Default policy for event exceptions is fatal:
/// rethrow to abort the processor. Lifecycle hooks (start/shutdown/timeout)
/// are routed but never escalate — the processor always reaches a clean
/// idle state regardless of what they do.
pub trait ExceptionHandler<T, E>: Send {
    /// An event handler's `on_batch` failed. Return `Ok(())` to swallow and
    /// continue (the processor advances past the batch and publishes its
    /// sequence either way, per spec.md §4.6); return `Err` to make the
    /// failure fatal and halt the processor.
    fn handle_event_exception(&mut self, error: E, sequence: i64, batch: &[T]) -> Result<(), E>;

    /// `on_start` failed. Never escalates.
    fn handle_on_start_exception(&mut self, _error: E) {}

    /// `on_shutdown` failed. Never escalates.
    fn handle_on_shutdown_exception(&mut self, _error: E) {}

    /// `on_timeout` failed. Never escalates.
    fn handle_on_timeout_exception(&mut self, _error: E, _sequence: i64) {}
}

/// Default exception handler: every event exception is fatal.
#[derive(Debug, Default, Clone, Copy)]
pub struct FatalExceptionHandler;

impl<T, E> ExceptionHandler<T, E> for FatalExceptionHandler {
    fn handle_event_exception(&mut self, error: E, _sequence: i64, _batch: &[T]) -> Result<(), E> {
        Err(error)
    }
}

/// Swallows every event exception and lets the processor continue,
/// advancing past the failed batch. Useful where liveness matters more
/// than any single event (spec.md §8 scenario 5's "swallowing handler").
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoringExceptionHandler;

impl<T, E> ExceptionHandler<T, E> for IgnoringExceptionHandler {
    fn handle_event_exception(&mut self, _error: E, _sequence: i64, _batch: &[T]) -> Result<(), E> {
        Ok(())
    }
}

/// Caps a barrier-reported available sequence to a per-processor maximum
/// batch size (spec.md §4.7).
///
/// A plain `Copy` struct rather than a trait object, so it monomorphizes
/// into `BatchEventProcessor` with no virtual dispatch on the hot path
/// (spec.md §9 "Generic specialization").
#[derive(Debug, Clone, Copy)]
pub struct BatchSizeLimiter {
    max_batch_size: i64,
}

impl BatchSizeLimiter {
    /// `max_batch_size` must be at least 1.
    pub fn new(max_batch_size: usize) -> Self {
        assert!(max_batch_size >= 1, "max_batch_size must be at least 1");
        Self { max_batch_size: max_batch_size as i64 }
    }

    /// `min(available, next + max_batch_size - 1)`.
    #[inline(always)]
    pub fn cap(&self, available: i64, next: i64) -> i64 {
        available.min(next + self.max_batch_size - 1)
    }
}

impl Default for BatchSizeLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingHandler {
        seen: Vec<(i64, usize)>,
    }

    impl EventHandler<u64> for RecordingHandler {
        type Error = &'static str;

        fn on_batch(&mut self, batch: &[u64], starting_sequence: i64) -> Result<(), Self::Error> {
            self.seen.push((starting_sequence, batch.len()));
            Ok(())
        }
    }

    #[test]
    fn on_batch_receives_the_starting_sequence_and_length() {
        let mut handler = RecordingHandler { seen: Vec::new() };
        handler.on_batch(&[1, 2, 3], 10).unwrap();
        assert_eq!(handler.seen, vec![(10, 3)]);
    }

    #[test]
    fn fatal_handler_escalates() {
        let mut h = FatalExceptionHandler;
        let result: Result<(), &str> = h.handle_event_exception("boom", 5, &[] as &[u64]);
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn ignoring_handler_swallows() {
        let mut h = IgnoringExceptionHandler;
        let result: Result<(), &str> = h.handle_event_exception("boom", 5, &[] as &[u64]);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn limiter_caps_at_max_batch_size() {
        let limiter = BatchSizeLimiter::new(10);
        assert_eq!(limiter.cap(100, 0), 9);
        assert_eq!(limiter.cap(5, 0), 5);
    }

    #[test]
    fn limiter_of_one_never_batches() {
        let limiter = BatchSizeLimiter::new(1);
        assert_eq!(limiter.cap(100, 50), 50);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn limiter_rejects_zero() {
        BatchSizeLimiter::new(0);
    }
}
