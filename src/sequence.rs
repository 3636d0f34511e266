//! The `Sequence` primitive: a padded, single-writer/multi-reader 64-bit
//! counter with published memory ordering.
//!
//! Every cursor in this crate — a sequencer's published cursor, a
//! processor's consumer cursor, an availability-buffer entry's generation —
//! is a `Sequence`. Padding it to a full cache line on both sides is not
//! cosmetic: an unpadded `AtomicI64` sitting next to another hot field can
//! cost an order of magnitude in throughput under contention, because every
//! write to the neighbor invalidates the cache line the sequence lives on.

use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel value for "nothing has been published yet".
pub const INITIAL_VALUE: i64 = -1;

/// A cache-line padded, monotonically increasing 64-bit counter.
///
/// `-1` means "nothing published". Valid published values are non-negative
/// and strictly increase over the life of the sequence. Padding is sized to
/// 128 bytes (the wider of the two common adjacent-sector prefetch sizes)
/// so that two sequences never share a fetched line, matching
/// `flux::disruptor::common::PaddedProducerSequence`.
#[repr(align(128))]
pub struct Sequence {
    value: AtomicI64,
    _pad: [u8; 120], // 128 - size_of::<AtomicI64>()
}

impl Sequence {
    /// Create a new sequence with the given initial value.
    pub fn new(initial: i64) -> Self {
        Self { value: AtomicI64::new(initial), _pad: [0; 120] }
    }

    /// Create a sequence at the "nothing published" sentinel.
    pub fn new_initial() -> Self {
        Self::new(INITIAL_VALUE)
    }

    /// Relaxed read. Only valid from the single owning thread (e.g. a
    /// producer reading its own `nextValue` cache, or a processor reading
    /// its own cursor between batches).
    #[inline(always)]
    pub fn get_relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Acquire-ordered read, used by observers on another thread reading
    /// this sequence's owner's progress (a consumer's gating read of a
    /// producer cursor, or a producer's gating read of a consumer cursor).
    #[inline(always)]
    pub fn get_acquire(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Release-ordered write. The single mutator uses this to publish a new
    /// value; all writes to data preceding this store (e.g. the ring slot
    /// contents) become visible to any thread that later `get_acquire`s a
    /// value at least this high.
    #[inline(always)]
    pub fn set_release(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Relaxed write, used when ordering is established independently (for
    /// instance the SP sequencer's `nextValue` cache, which only the
    /// producer thread ever reads).
    #[inline(always)]
    pub fn set_relaxed(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Compare-and-exchange with acquire-on-failure, release-on-success
    /// ordering, used by the multi-producer sequencer's cursor claim loop.
    #[inline(always)]
    pub fn compare_exchange(&self, current: i64, new: i64) -> Result<i64, i64> {
        self.value.compare_exchange(current, new, Ordering::Release, Ordering::Acquire)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").field("value", &self.get_acquire()).finish()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new_initial()
    }
}

/// The minimum of a producer cursor and a set of dependent sequences, the
/// quantity a barrier waits for and a producer gates on.
///
/// An empty `dependents` slice means nothing constrains the caller, so the
/// result is `i64::MAX` — matching the real Disruptor's convention that an
/// unconstrained set of gating sequences never blocks a producer.
#[inline]
pub fn min_sequence(dependents: &[std::sync::Arc<Sequence>]) -> i64 {
    dependents.iter().map(|s| s.get_acquire()).min().unwrap_or(i64::MAX)
}
