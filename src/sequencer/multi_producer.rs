//! Multi-producer sequencer (spec.md §4.4).
//!
//! Producers arbitrate the shared cursor via CAS; the CAS alone only proves
//! *someone* reserved a range, not that every producer in that range has
//! finished writing its slot. The per-slot wrap-count availability buffer is
//! the ordering witness that lets a consumer tell a truly contiguous
//! published prefix from a range with a hole still being written by a
//! slower producer.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::{park_until_space, GatingSequences, Sequencer};
use crate::error::{ConfigError, SequencerError};
use crate::sequence::{Sequence, INITIAL_VALUE};
use crate::wait_strategy::WaitStrategy;

/// Sentinel recorded in the availability buffer for a slot that has never
/// been published (wrap count -1 never equals `sequence >> shift` for any
/// non-negative sequence).
const UNAVAILABLE: i64 = -1;

pub struct MultiProducerSequencer<W: WaitStrategy> {
    buffer_size: usize,
    index_mask: usize,
    index_shift: u32,
    cursor: Sequence,
    cached_gating: AtomicI64,
    gating: GatingSequences,
    /// `availability[i]` holds the wrap count of the most recently published
    /// sequence whose slot index is `i`.
    availability: Box<[AtomicI64]>,
    wait_strategy: Arc<W>,
}

impl<W: WaitStrategy> MultiProducerSequencer<W> {
    pub fn new(buffer_size: usize, wait_strategy: Arc<W>) -> Self {
        debug_assert!(buffer_size.is_power_of_two());
        let availability =
            (0..buffer_size).map(|_| AtomicI64::new(UNAVAILABLE)).collect::<Vec<_>>().into_boxed_slice();

        Self {
            buffer_size,
            index_mask: buffer_size - 1,
            index_shift: buffer_size.trailing_zeros(),
            cursor: Sequence::new_initial(),
            cached_gating: AtomicI64::new(INITIAL_VALUE),
            gating: GatingSequences::new(),
            availability,
            wait_strategy,
        }
    }

    #[inline(always)]
    fn wrap_count(&self, sequence: i64) -> i64 {
        sequence >> self.index_shift
    }

    #[inline(always)]
    fn index_of(&self, sequence: i64) -> usize {
        (sequence as u64 as usize) & self.index_mask
    }

    fn set_available(&self, sequence: i64) {
        self.availability[self.index_of(sequence)].store(self.wrap_count(sequence), Ordering::Release);
    }
}

impl<W: WaitStrategy> Sequencer for MultiProducerSequencer<W> {
    fn next(&self, n: u64) -> i64 {
        debug_assert!(n >= 1, "must claim at least one sequence");
        let n = n as i64;
        loop {
            let current = self.cursor.get_relaxed();
            let next = current + n;
            let wrap_point = next - self.buffer_size as i64;
            let mut cached = self.cached_gating.load(Ordering::Relaxed);

            if wrap_point > cached || cached > current {
                cached = park_until_space(wrap_point, &self.gating, self.wait_strategy.as_ref());
                self.cached_gating.store(cached, Ordering::Relaxed);
            }

            if self.cursor.compare_exchange(current, next).is_ok() {
                return next;
            }
        }
    }

    fn try_next(&self, n: u64) -> Result<i64, SequencerError> {
        debug_assert!(n >= 1, "must claim at least one sequence");
        let n_i = n as i64;
        loop {
            let current = self.cursor.get_relaxed();
            let next = current + n_i;
            let wrap_point = next - self.buffer_size as i64;
            let min_gating = self.gating.min();
            self.cached_gating.store(min_gating, Ordering::Relaxed);

            if wrap_point > min_gating {
                return Err(SequencerError::InsufficientCapacity { requested: n });
            }

            if self.cursor.compare_exchange(current, next).is_ok() {
                return Ok(next);
            }
        }
    }

    fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, lo: i64, hi: i64) {
        let mut seq = lo;
        while seq <= hi {
            self.set_available(seq);
            seq += 1;
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        let idx = self.index_of(sequence);
        self.availability[idx].load(Ordering::Acquire) == self.wrap_count(sequence)
    }

    fn get_highest_published_sequence(&self, lo: i64, available: i64) -> i64 {
        let mut seq = lo;
        while seq <= available {
            if !self.is_available(seq) {
                return seq - 1;
            }
            seq += 1;
        }
        available
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
        let produced = self.cursor.get_acquire();
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
    use std::sync::Arc;
    use std::thread;

    fn sequencer(size: usize) -> Arc<MultiProducerSequencer<BusySpinWaitStrategy>> {
        Arc::new(MultiProducerSequencer::new(size, Arc::new(BusySpinWaitStrategy::new())))
    }

    #[test]
    fn single_threaded_claim_publish_round_trips() {
        let seq = sequencer(8);
        let hi = seq.next(3);
        assert_eq!(hi, 2);
        assert!(!seq.is_available(0));
        seq.publish_range(0, hi);
        assert!(seq.is_available(0));
        assert!(seq.is_available(2));
    }

    #[test]
    fn highest_published_sequence_stops_at_a_hole() {
        let seq = sequencer(8);
        // Two producers each claim one sequence; claim order is 0 then 1.
        assert_eq!(seq.next(1), 0);
        assert_eq!(seq.next(1), 1);

        // Producer for sequence 1 publishes first (out of order).
        seq.publish(1);
        assert_eq!(seq.get_highest_published_sequence(0, 1), -1);

        // Now sequence 0 publishes too: the prefix is contiguous.
        seq.publish(0);
        assert_eq!(seq.get_highest_published_sequence(0, 1), 1);
    }

    #[test]
    fn availability_buffer_survives_a_wrap_without_reset() {
        let seq = sequencer(4);
        for round in 0..3 {
            let lo = round * 4;
            let hi = seq.next(4);
            seq.publish_range(lo, hi);
            for s in lo..=hi {
                assert!(seq.is_available(s));
            }
        }
    }

    #[test]
    fn concurrent_producers_claim_disjoint_ranges() {
        let seq = sequencer(1024);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let seq = seq.clone();
            handles.push(thread::spawn(move || {
                let mut claimed = Vec::new();
                for _ in 0..100 {
                    let hi = seq.next(1);
                    claimed.push(hi);
                    seq.publish(hi);
                }
                claimed
            }));
        }

        let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        let expected: Vec<i64> = (0..400).collect();
        assert_eq!(all, expected, "every producer thread must see a disjoint sequence");
    }

    #[test]
    fn try_next_fails_fast_without_parking() {
        let seq = sequencer(2);
        let consumer = Arc::new(Sequence::new_initial());
        seq.add_gating_sequences(&[consumer]).unwrap();

        let hi = seq.try_next(2).unwrap();
        seq.publish_range(0, hi);
        assert!(seq.try_next(1).is_err());
    }
}
