//! The sequence barrier: the gate a consumer polls to discover the highest
//! sequence safe to consume (spec.md §4.5).
//!
//! A barrier combines a sequencer's cursor with zero or more upstream
//! consumer sequences (a dependency chain between processors) and a
//! cancellation flag it can trip synchronously from another thread to
//! interrupt a parked wait on halt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::WaitError;
use crate::sequence::Sequence;
use crate::sequencer::Sequencer;
use crate::wait_strategy::WaitStrategy;

/// Consumer-side wait point: a sequencer cursor, optional upstream
/// dependents, and a cancellation flag.
pub struct SequenceBarrier<S: Sequencer, W: WaitStrategy> {
    sequencer: Arc<S>,
    wait_strategy: Arc<W>,
    dependents: Vec<Arc<Sequence>>,
    alerted: Arc<AtomicBool>,
}

impl<S: Sequencer, W: WaitStrategy> SequenceBarrier<S, W> {
    /// Create a barrier gating on the sequencer's own cursor plus the given
    /// upstream dependents (empty for a processor reading straight off the
    /// producers).
    pub fn new(sequencer: Arc<S>, wait_strategy: Arc<W>, dependents: Vec<Arc<Sequence>>) -> Self {
        Self { sequencer, wait_strategy, dependents, alerted: Arc::new(AtomicBool::new(false)) }
    }

    /// A cheap, cloneable handle that can trip this barrier's cancellation
    /// flag from another thread while the barrier itself is owned by a
    /// processor's run loop (spec.md §5 "Cancellation / halt" — halt must
    /// be callable concurrently with `run`).
    pub fn cancel_handle(&self) -> BarrierCancelHandle<W> {
        BarrierCancelHandle { alerted: self.alerted.clone(), wait_strategy: self.wait_strategy.clone() }
    }

    /// Block until sequence `n` — or something past it — is safe to
    /// consume. Returns the highest contiguous published sequence `>= n`
    /// (which may be less than the raw wait-strategy result, see
    /// spec.md §4.5 step 3 for the MP "gap" case).
    pub fn wait_for(&self, n: i64) -> Result<i64, WaitError> {
        if self.alerted.load(Ordering::Acquire) {
            return Err(WaitError::Alert);
        }

        let cursor = self.cursor_sequence();
        let available = self.wait_strategy.wait_for(n, cursor, &self.dependents, &self.alerted)?;

        if available < n {
            // MP case: the producer cursor has advanced past n, but the
            // individual slot between n and available may not be marked in
            // the availability buffer yet. The processor must not use it.
            return Ok(available);
        }

        Ok(self.sequencer.get_highest_published_sequence(n, available))
    }

    /// Single non-blocking availability check, with no backoff of its own —
    /// the async processor drives its own suspension between polls rather
    /// than delegating to the wait strategy's thread-parking behavior
    /// (spec.md §4.6 "Async variant": the barrier wait is a suspension
    /// point, not a blocking call). Returns `Ok(None)` when nothing new is
    /// available yet.
    pub fn try_wait_for(&self, n: i64) -> Result<Option<i64>, WaitError> {
        if self.alerted.load(Ordering::Acquire) {
            return Err(WaitError::Alert);
        }
        let cursor = self.cursor_sequence();
        let avail = crate::wait_strategy::available(cursor, &self.dependents);
        if avail < n {
            return Ok(None);
        }
        Ok(Some(self.sequencer.get_highest_published_sequence(n, avail)))
    }

    /// The sequencer's published cursor, exposed so callers (and the
    /// producer-facing `remaining_capacity` bookkeeping) can read producer
    /// progress directly.
    pub fn cursor_sequence(&self) -> &Sequence {
        // Barriers don't own a `Sequence` for the sequencer's cursor
        // directly (the sequencer does); expose it through the sequencer.
        self.sequencer.cursor_handle()
    }

    /// Trip the cancellation flag and wake any parked wait strategy.
    pub fn cancel(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Clear the cancellation flag. Called by a processor on (re)start.
    pub fn reset_processing(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    /// True if `cancel()` has been called and not yet cleared.
    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }
}

/// Standalone handle that can trip a [`SequenceBarrier`]'s cancellation flag
/// without borrowing the barrier itself. See [`SequenceBarrier::cancel_handle`].
pub struct BarrierCancelHandle<W: WaitStrategy> {
    alerted: Arc<AtomicBool>,
    wait_strategy: Arc<W>,
}

impl<W: WaitStrategy> BarrierCancelHandle<W> {
    pub fn cancel(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }
}

impl<W: WaitStrategy> Clone for BarrierCancelHandle<W> {
    fn clone(&self) -> Self {
        Self { alerted: self.alerted.clone(), wait_strategy: self.wait_strategy.clone() }
    }
}
