//! Single-producer sequencer (spec.md §4.3).
//!
//! Not reentrant from multiple producer threads — `next`/`publish` assume a
//! single caller. Violating that is a programmer error the type does not
//! detect, matching the spec's explicit carve-out; the cached fields below
//! are still atomics (not a bare `Cell`) purely so this type can be shared
//! behind an `Arc` with consumers that read `cursor()`/`is_available()`
//! concurrently from other threads.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::{park_until_space, GatingSequences, Sequencer};
use crate::error::{ConfigError, SequencerError};
use crate::sequence::{Sequence, INITIAL_VALUE};
use crate::wait_strategy::WaitStrategy;

pub struct SingleProducerSequencer<W: WaitStrategy> {
    buffer_size: usize,
    cursor: Sequence,
    /// Last sequence claimed by `next`/`try_next`. Producer-owned.
    next_value: AtomicI64,
    /// Cached lower bound on gating sequences, refreshed only when the
    /// claim would otherwise wrap.
    cached_gating: AtomicI64,
    gating: GatingSequences,
    wait_strategy: Arc<W>,
}

impl<W: WaitStrategy> SingleProducerSequencer<W> {
    pub fn new(buffer_size: usize, wait_strategy: Arc<W>) -> Self {
        Self {
            buffer_size,
            cursor: Sequence::new_initial(),
            next_value: AtomicI64::new(INITIAL_VALUE),
            cached_gating: AtomicI64::new(INITIAL_VALUE),
            gating: GatingSequences::new(),
            wait_strategy,
        }
    }
}

impl<W: WaitStrategy> Sequencer for SingleProducerSequencer<W> {
    fn next(&self, n: u64) -> i64 {
        debug_assert!(n >= 1, "must claim at least one sequence");
        let current = self.next_value.load(Ordering::Relaxed);
        let next = current + n as i64;
        let wrap_point = next - self.buffer_size as i64;
        let mut cached = self.cached_gating.load(Ordering::Relaxed);

        if wrap_point > cached {
            cached = park_until_space(wrap_point, &self.gating, self.wait_strategy.as_ref());
            self.cached_gating.store(cached, Ordering::Relaxed);
        }

        self.next_value.store(next, Ordering::Relaxed);
        next
    }

    fn try_next(&self, n: u64) -> Result<i64, SequencerError> {
        debug_assert!(n >= 1, "must claim at least one sequence");
        let current = self.next_value.load(Ordering::Relaxed);
        let next = current + n as i64;
        let wrap_point = next - self.buffer_size as i64;
        let min_gating = self.gating.min();
        self.cached_gating.store(min_gating, Ordering::Relaxed);

        if wrap_point > min_gating {
            return Err(SequencerError::InsufficientCapacity { requested: n });
        }

        self.next_value.store(next, Ordering::Relaxed);
        Ok(next)
    }

    fn publish(&self, sequence: i64) {
        self.cursor.set_release(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, _lo: i64, hi: i64) {
        self.publish(hi);
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get_acquire()
    }

    fn get_highest_published_sequence(&self, _lo: i64, available: i64) -> i64 {
        // SP publishes the whole claimed range atomically: anything at or
        // below the cursor is, by construction, contiguous.
        available.min(self.cursor.get_acquire())
    }

    fn cursor(&self) -> i64 {
        self.cursor.get_acquire()
    }

    fn cursor_handle(&self) -> &Sequence {
        &self.cursor
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) -> Result<(), ConfigError> {
        self.gating.add(sequences)
    }

    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.gating.remove(sequence)
    }

    fn remaining_capacity(&self) -> i64 {
        let consumed = self.gating.min();
        let produced = self.next_value.load(Ordering::Relaxed);
        self.buffer_size as i64 - (produced - consumed.max(INITIAL_VALUE))
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait_strategy::BusySpinWaitStrategy;

    fn sequencer(size: usize) -> SingleProducerSequencer<BusySpinWaitStrategy> {
        SingleProducerSequencer::new(size, Arc::new(BusySpinWaitStrategy::new()))
    }

    #[test]
    fn claims_start_at_zero() {
        let seq = sequencer(8);
        assert_eq!(seq.next(1), 0);
        assert_eq!(seq.next(1), 1);
    }

    #[test]
    fn publish_advances_cursor_and_marks_available() {
        let seq = sequencer(8);
        let hi = seq.next(3);
        assert!(!seq.is_available(hi));
        seq.publish_range(0, hi);
        assert!(seq.is_available(hi));
        assert_eq!(seq.cursor(), hi);
    }

    #[test]
    fn try_next_rejects_when_ring_would_wrap_past_gating() {
        let seq = sequencer(4);
        let consumer = Arc::new(Sequence::new_initial());
        seq.add_gating_sequences(&[consumer.clone()]).unwrap();

        // Fill the ring exactly: claims 0..3.
        let hi = seq.try_next(4).unwrap();
        seq.publish_range(0, hi);
        assert_eq!(hi, 3);

        // No consumer progress yet: next claim must fail.
        assert!(seq.try_next(1).is_err());

        // Consumer catches up, room frees.
        consumer.set_release(0);
        assert_eq!(seq.try_next(1).unwrap(), 4);
    }

    #[test]
    fn get_highest_published_sequence_is_contiguous_for_sp() {
        let seq = sequencer(8);
        let hi = seq.next(5);
        seq.publish_range(0, hi);
        assert_eq!(seq.get_highest_published_sequence(0, hi), hi);
    }

    #[test]
    fn remaining_capacity_accounts_for_gating() {
        let seq = sequencer(4);
        let consumer = Arc::new(Sequence::new_initial());
        seq.add_gating_sequences(&[consumer.clone()]).unwrap();
        assert_eq!(seq.remaining_capacity(), 4);

        let hi = seq.next(2);
        seq.publish_range(0, hi);
        assert_eq!(seq.remaining_capacity(), 2);
    }
}
