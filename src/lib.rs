//! Pre-allocated ring buffer coordination substrate implementing the LMAX
//! Disruptor pattern.
//!
//! ## Core pieces
//!
//! | Concept | Type |
//! |---------|------|
//! | Fixed-capacity slot storage | [`ring::Ring`] |
//! | Monotonic cross-thread counter | [`sequence::Sequence`] |
//! | Single-producer claim/publish | [`sequencer::SingleProducerSequencer`] |
//! | Multi-producer claim/publish | [`sequencer::MultiProducerSequencer`] |
//! | Consumer wait point | [`barrier::SequenceBarrier`] |
//! | Consumer backoff policy | [`wait_strategy::WaitStrategy`] |
//! | Sync run loop | [`processor::BatchEventProcessor`] |
//! | Async run loop (`async` feature) | `processor::AsyncBatchEventProcessor` |
//! | Minimal topology wiring | [`topology::Disruptor`] / [`topology::MultiProducerTopology`] |
//!
//! ## What this is not
//!
//! This crate has no wire protocol, no persistence, and no cross-process
//! transport — it is purely the in-process coordination substrate one or
//! more producer threads and one or more event-processor threads share. A
//! ring never resizes after construction, slots are fixed-size (`T` is
//! `Default`-constructed once, then mutated in place), and there is no
//! delivery guarantee across a process crash.
//!
//! ## Safety
//!
//! [`ring::Ring::get`]/[`ring::Ring::get_mut`]/[`ring::Ring::slice`] are
//! `unsafe`: the ring has no notion of who currently owns a slot. Safety is
//! entirely the claim/publish protocol's responsibility — a caller must
//! only dereference a slot it has claimed (not yet published) or a sequence
//! the sequencer reports as published. [`sequencer::Sequencer`] and
//! [`barrier::SequenceBarrier`] are the safe layer on top that should be
//! used directly in application code; reaching into [`ring::Ring`] bypasses
//! that protocol and is only meant for event processors and producers that
//! already hold the right sequence.

pub mod barrier;
pub mod constants;
pub mod cpu;
pub mod error;
pub mod handler;
pub mod processor;
pub mod ring;
pub mod sequence;
pub mod sequencer;
pub mod topology;
pub mod wait_strategy;

pub use barrier::SequenceBarrier;
pub use error::{ConfigError, SequencerError, WaitError};
pub use handler::{BatchSizeLimiter, EventHandler, ExceptionHandler};
pub use processor::BatchEventProcessor;
pub use ring::Ring;
pub use sequence::Sequence;
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use topology::{Disruptor, DisruptorConfig, MultiProducerTopology, ProducerMode};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, TimeoutBlockingWaitStrategy,
    WaitStrategy, YieldingWaitStrategy,
};

#[cfg(feature = "async")]
pub use processor::AsyncBatchEventProcessor;
