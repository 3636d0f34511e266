//! Topology surface: wiring a ring, a sequencer, one or more processors and
//! their barriers into a runnable pipeline (spec.md §6 "Topology surface").
//!
//! This is intentionally thin — `DisruptorConfig` validates the handful of
//! environment knobs spec.md §6 names (ring size, producer mode, wait
//! strategy, max batch size), and `Disruptor` wires a ring, a sequencer and
//! a first-level barrier together. Multi-stage pipelines (a processor's
//! sequence feeding a downstream barrier as a dependent) are composed by
//! hand from `barrier()`/`sequence()` rather than through a fluent DSL —
//! spec.md's Non-goals explicitly exclude a topology builder beyond this.

use std::sync::Arc;

use crate::barrier::SequenceBarrier;
use crate::constants::DEFAULT_MAX_BATCH_SIZE;
use crate::error::ConfigError;
use crate::ring::Ring;
use crate::sequence::Sequence;
use crate::sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
use crate::wait_strategy::WaitStrategy;

/// Producer arbitration mode: single-writer (no CAS on the claim path) or
/// multi-writer (CAS-arbitrated cursor, per-slot availability buffer).
/// Mirrors spec.md §6 "producer mode (SP|MP)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerMode {
    Single,
    Multi,
}

/// Validated topology configuration: ring size, producer mode, and the
/// per-processor batch cap. The wait strategy itself is supplied
/// separately at sequencer construction time since it's generic (`W: WaitStrategy`)
/// rather than a runtime-selected enum — see spec.md §9 "Generic
/// specialization" for why this crate avoids `Box<dyn WaitStrategy>` here.
#[derive(Debug, Clone, Copy)]
pub struct DisruptorConfig {
    ring_size: usize,
    producer_mode: ProducerMode,
    max_batch_size: usize,
}

impl DisruptorConfig {
    /// `ring_size` must be a non-zero power of two.
    pub fn new(ring_size: usize) -> Result<Self, ConfigError> {
        if ring_size == 0 || !ring_size.is_power_of_two() {
            return Err(ConfigError::invalid_ring_size(format!(
                "ring size must be a non-zero power of two, got {ring_size}"
            )));
        }

        Ok(Self { ring_size, producer_mode: ProducerMode::Single, max_batch_size: DEFAULT_MAX_BATCH_SIZE })
    }

    pub fn with_producer_mode(mut self, mode: ProducerMode) -> Self {
        self.producer_mode = mode;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Result<Self, ConfigError> {
        if max_batch_size == 0 {
            return Err(ConfigError::invalid_value("max_batch_size must be at least 1"));
        }
        self.max_batch_size = max_batch_size;
        Ok(self)
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    pub fn producer_mode(&self) -> ProducerMode {
        self.producer_mode
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

/// Owns the ring and the single-producer sequencer for a topology, and hands
/// out barriers for consumers to attach to. Use [`MultiProducerTopology`]
/// for the MP variant — the two are separate types rather than an enum over
/// `Box<dyn Sequencer>`, keeping the hot path monomorphic (spec.md §9).
pub struct Disruptor<T, W: WaitStrategy> {
    ring: Arc<Ring<T>>,
    sequencer: Arc<SingleProducerSequencer<W>>,
}

impl<T: Default, W: WaitStrategy> Disruptor<T, W> {
    pub fn new(config: DisruptorConfig, wait_strategy: Arc<W>) -> Result<Self, ConfigError> {
        if config.producer_mode != ProducerMode::Single {
            return Err(ConfigError::invalid_value(
                "DisruptorConfig selects multi-producer mode; use MultiProducerTopology",
            ));
        }
        let ring = Arc::new(Ring::new(config.ring_size)?);
        let sequencer = Arc::new(SingleProducerSequencer::new(config.ring_size, wait_strategy));
        Ok(Self { ring, sequencer })
    }

    pub fn ring(&self) -> &Arc<Ring<T>> {
        &self.ring
    }

    pub fn sequencer(&self) -> &Arc<SingleProducerSequencer<W>> {
        &self.sequencer
    }

    /// Register one or more consumer sequences as gating on the producer, so
    /// `next()`/`try_next()` never overwrite a slot a registered consumer
    /// hasn't finished reading (spec.md §3 "Gating sequences"). Fails if any
    /// of `sequences` is already registered.
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) -> Result<(), ConfigError> {
        self.sequencer.add_gating_sequences(sequences)
    }

    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// A barrier for a consumer gating directly on the producer cursor plus
    /// the given upstream dependents (empty for a first-stage consumer).
    pub fn barrier(
        &self,
        wait_strategy: Arc<W>,
        dependents: Vec<Arc<Sequence>>,
    ) -> SequenceBarrier<SingleProducerSequencer<W>, W> {
        SequenceBarrier::new(self.sequencer.clone(), wait_strategy, dependents)
    }
}

/// Multi-producer counterpart to [`Disruptor`].
pub struct MultiProducerTopology<T, W: WaitStrategy> {
    ring: Arc<Ring<T>>,
    sequencer: Arc<MultiProducerSequencer<W>>,
}

impl<T: Default, W: WaitStrategy> MultiProducerTopology<T, W> {
    pub fn new(config: DisruptorConfig, wait_strategy: Arc<W>) -> Result<Self, ConfigError> {
        if config.producer_mode != ProducerMode::Multi {
            return Err(ConfigError::invalid_value(
                "DisruptorConfig selects single-producer mode; use Disruptor",
            ));
        }
        let ring = Arc::new(Ring::new(config.ring_size)?);
        let sequencer = Arc::new(MultiProducerSequencer::new(config.ring_size, wait_strategy));
        Ok(Self { ring, sequencer })
    }

    pub fn ring(&self) -> &Arc<Ring<T>> {
        &self.ring
    }

    pub fn sequencer(&self) -> &Arc<MultiProducerSequencer<W>> {
        &self.sequencer
    }

    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) -> Result<(), ConfigError> {
        self.sequencer.add_gating_sequences(sequences)
    }

    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    pub fn barrier(
        &self,
        wait_strategy: Arc<W>,
        dependents: Vec<Arc<Sequence>>,
    ) -> SequenceBarrier<MultiProducerSequencer<W>, W> {
        SequenceBarrier::new(self.sequencer.clone(), wait_strategy, dependents)
    }
}
