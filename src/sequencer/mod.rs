//! The sequencer: the claim/publish protocol that assigns producer slots and
//! tracks which slots have been made visible (spec.md §4.3, §4.4).
//!
//! Two variants share the `Sequencer` trait: [`single_producer::SingleProducerSequencer`]
//! for the single-writer case, and [`multi_producer::MultiProducerSequencer`]
//! for concurrent producers arbitrating via CAS. Per spec.md §9 "Generic
//! specialization", the event processor is generic over a concrete
//! sequencer type rather than a trait object, so this trait exists for
//! shared plumbing (the topology glue, tests) rather than hot-path dispatch.

pub mod multi_producer;
pub mod single_producer;

pub use multi_producer::MultiProducerSequencer;
pub use single_producer::SingleProducerSequencer;

use std::sync::Arc;

use crate::error::{ConfigError, SequencerError};
use crate::sequence::Sequence;
use crate::wait_strategy::WaitStrategy;

/// Claim/publish protocol shared by the SP and MP sequencers.
pub trait Sequencer: Send + Sync {
    /// Claim `n` sequences, blocking (via the wait strategy's producer-park
    /// hook) until there is room. Returns the highest sequence claimed.
    fn next(&self, n: u64) -> i64;

    /// Non-blocking claim. Fails with `InsufficientCapacity` instead of
    /// parking if there is no room right now.
    fn try_next(&self, n: u64) -> Result<i64, SequencerError>;

    /// Make a single claimed sequence visible to consumers.
    fn publish(&self, sequence: i64);

    /// Make a claimed range `[lo, hi]` visible to consumers.
    fn publish_range(&self, lo: i64, hi: i64);

    /// True if `sequence` has been published and is safe to read.
    fn is_available(&self, sequence: i64) -> bool;

    /// Collapse a range of claimed-but-not-individually-confirmed sequences
    /// into the contiguous prefix a consumer may safely read.
    fn get_highest_published_sequence(&self, lo: i64, available: i64) -> i64;

    /// The highest sequence declared available by this sequencer.
    fn cursor(&self) -> i64;

    /// Borrow the sequencer's published cursor directly, for a barrier's
    /// wait strategy call.
    fn cursor_handle(&self) -> &Sequence;

    /// Register sequences a producer must not claim past. Fails with
    /// `ConfigError::GatingSequence` if any of `sequences` is already
    /// registered — re-registering a sequence would make it count twice
    /// toward the gating minimum, which is always a setup mistake rather
    /// than a legitimate topology.
    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) -> Result<(), ConfigError>;

    /// Unregister a previously added gating sequence. Returns `true` if it
    /// was present.
    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool;

    /// Sequences available to claim before the slowest gating sequence would
    /// be overwritten.
    fn remaining_capacity(&self) -> i64;

    /// Number of slots in the backing ring.
    fn buffer_size(&self) -> usize;
}

/// Gating sequence bookkeeping shared by both sequencer variants: a
/// read-mostly list guarded by a lock, because registration only happens at
/// topology setup / consumer halt (spec.md §3 "Lifecycle"), never on the hot
/// claim path.
pub(crate) struct GatingSequences {
    sequences: parking_lot::RwLock<Vec<Arc<Sequence>>>,
}

impl GatingSequences {
    pub(crate) fn new() -> Self {
        Self { sequences: parking_lot::RwLock::new(Vec::new()) }
    }

    /// Register `sequences`, or fail without registering any of them if one
    /// is already present (checked via `Arc::ptr_eq`, including duplicates
    /// within `sequences` itself).
    pub(crate) fn add(&self, sequences: &[Arc<Sequence>]) -> Result<(), ConfigError> {
        let mut guard = self.sequences.write();
        for (i, new) in sequences.iter().enumerate() {
            let already_registered = guard.iter().any(|existing| Arc::ptr_eq(existing, new))
                || sequences[..i].iter().any(|prior| Arc::ptr_eq(prior, new));
            if already_registered {
                return Err(ConfigError::gating_sequence("gating sequence already registered"));
            }
        }
        guard.extend(sequences.iter().cloned());
        Ok(())
    }

    pub(crate) fn remove(&self, sequence: &Arc<Sequence>) -> bool {
        let mut guard = self.sequences.write();
        let before = guard.len();
        guard.retain(|s| !Arc::ptr_eq(s, sequence));
        guard.len() != before
    }

    /// Minimum of all gating sequences, or `i64::MAX` if none are
    /// registered (an unconstrained producer).
    pub(crate) fn min(&self) -> i64 {
        crate::sequence::min_sequence(&self.sequences.read())
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Sequence>> {
        self.sequences.read().clone()
    }
}

/// Park the calling producer thread via the wait strategy's backoff hook
/// until `wrap_point <= gating.min()`, refreshing the cached gating minimum
/// each iteration. Shared by both sequencer variants' `next()`.
pub(crate) fn park_until_space(
    wrap_point: i64,
    gating: &GatingSequences,
    wait_strategy: &dyn WaitStrategy,
) -> i64 {
    let mut min_gating = gating.min();
    while wrap_point > min_gating {
        wait_strategy.park_producer();
        min_gating = gating.min();
    }
    min_gating
}
