//! Cadence performance constants
//!
//! Core constants shared by the sequencer, handler and wait-strategy
//! modules.

/// Default per-processor maximum batch size.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Spin iterations a yielding/sleeping wait strategy attempts before
/// escalating to the next backoff phase.
pub const DEFAULT_SPIN_TRIES: u32 = 100;

/// Yield iterations a yielding wait strategy attempts before falling back to
/// a short sleep.
pub const DEFAULT_YIELD_TRIES: u32 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_batch_size_is_at_least_one() {
        assert!(DEFAULT_MAX_BATCH_SIZE >= 1);
    }
}
