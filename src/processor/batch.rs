//! Synchronous batch event processor (spec.md §4.6): one OS thread, one
//! sequence barrier, one handler, run to completion via [`BatchEventProcessor::run`].

use std::sync::Arc;
use std::time::Duration;

use super::{RunStateCell, StartedLatch};
use crate::barrier::{BarrierCancelHandle, SequenceBarrier};
use crate::error::WaitError;
use crate::handler::{BatchSizeLimiter, EventHandler, ExceptionHandler};
use crate::ring::Ring;
use crate::sequence::Sequence;
use crate::sequencer::Sequencer;
use crate::wait_strategy::WaitStrategy;

/// Drains a [`SequenceBarrier`], slices contiguous batches off a [`Ring`],
/// and delivers them to an [`EventHandler`], routing failures through an
/// [`ExceptionHandler`].
///
/// Generic over concrete `S`/`W`/`H`/`EH` rather than trait objects, so the
/// whole run loop monomorphizes with no virtual dispatch (spec.md §9).
pub struct BatchEventProcessor<T, S, W, H, EH>
where
    S: Sequencer,
    W: WaitStrategy,
    H: EventHandler<T>,
    EH: ExceptionHandler<T, H::Error>,
{
    ring: Arc<Ring<T>>,
    sequencer: Arc<S>,
    barrier: SequenceBarrier<S, W>,
    handler: H,
    exception_handler: EH,
    limiter: BatchSizeLimiter,
    sequence: Arc<Sequence>,
    state: Arc<RunStateCell>,
    started: Arc<StartedLatch>,
}

/// A cloneable handle that can halt a running [`BatchEventProcessor`] from
/// another thread without borrowing the processor itself, and that exposes
/// its published sequence for gating/dependency wiring.
pub struct ProcessorHandle<W: WaitStrategy> {
    state: Arc<RunStateCell>,
    cancel: BarrierCancelHandle<W>,
    sequence: Arc<Sequence>,
    started: Arc<StartedLatch>,
}

impl<W: WaitStrategy> ProcessorHandle<W> {
    /// Request a halt. Idempotent, non-blocking; takes effect once the
    /// processor's current `on_batch` call (if any) returns.
    pub fn halt(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("event processor halt requested");
        self.state.halt();
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// This processor's published sequence, for registering as a gating
    /// sequence on the producer side or as an upstream dependent for a
    /// downstream barrier.
    pub fn sequence(&self) -> Arc<Sequence> {
        self.sequence.clone()
    }

    /// Block until the processor's `run()` has completed its `on_start`
    /// hook and entered its main loop, or until `timeout` elapses
    /// (spec.md §6 "Consumer surface" `waitUntilStarted(timeout)`).
    pub fn wait_until_started(&self, timeout: Duration) -> Result<(), WaitError> {
        self.started.wait(timeout)
    }
}

impl<W: WaitStrategy> Clone for ProcessorHandle<W> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            sequence: self.sequence.clone(),
            started: self.started.clone(),
        }
    }
}

impl<T, S, W, H, EH> BatchEventProcessor<T, S, W, H, EH>
where
    S: Sequencer,
    W: WaitStrategy,
    H: EventHandler<T>,
    EH: ExceptionHandler<T, H::Error>,
{
    pub fn new(
        ring: Arc<Ring<T>>,
        sequencer: Arc<S>,
        barrier: SequenceBarrier<S, W>,
        handler: H,
        exception_handler: EH,
        limiter: BatchSizeLimiter,
    ) -> Self {
        Self {
            ring,
            sequencer,
            barrier,
            handler,
            exception_handler,
            limiter,
            sequence: Arc::new(Sequence::new_initial()),
            state: Arc::new(RunStateCell::new()),
            started: Arc::new(StartedLatch::new()),
        }
    }

    /// This processor's published sequence, for registering as a gating
    /// sequence on the producer side or as an upstream dependent for a
    /// downstream barrier.
    pub fn sequence(&self) -> Arc<Sequence> {
        self.sequence.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Block until `run()` has completed its `on_start` hook and entered
    /// its main loop, or until `timeout` elapses.
    pub fn wait_until_started(&self, timeout: Duration) -> Result<(), WaitError> {
        self.started.wait(timeout)
    }

    /// A cloneable handle that can halt this processor and read its progress
    /// from another thread — take this before moving the processor into the
    /// thread that calls [`Self::run`].
    pub fn handle(&self) -> ProcessorHandle<W> {
        ProcessorHandle {
            state: self.state.clone(),
            cancel: self.barrier.cancel_handle(),
            sequence: self.sequence.clone(),
            started: self.started.clone(),
        }
    }

    /// Request a halt. Idempotent, non-blocking. Takes effect once the
    /// current `on_batch` call (if any) returns (spec.md §5 "Cancellation /
    /// halt").
    pub fn halt(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("event processor halt requested");
        self.state.halt();
        self.barrier.cancel();
    }

    /// Run to completion on the calling thread. Returns once halted or once
    /// an event exception escalates past the exception handler.
    ///
    /// Refuses to run if already running (returns immediately without
    /// touching the handler) — matching the idempotent-halt / no-double-run
    /// invariant from spec.md §8.
    pub fn run(&mut self) {
        if !self.state.try_start() {
            return;
        }
        self.barrier.reset_processing();

        #[cfg(feature = "tracing")]
        tracing::debug!("event processor starting");

        if let Err(error) = self.handler.on_start() {
            self.exception_handler.handle_on_start_exception(error);
        }
        self.started.signal();

        let mut next_sequence = self.sequence.get_relaxed() + 1;

        'run: loop {
            if !self.state.is_running() {
                break;
            }

            match self.barrier.wait_for(next_sequence) {
                Ok(available) => {
                    let capped = self.limiter.cap(available, next_sequence);
                    if capped < next_sequence {
                        // Wait strategy woke us early (MP gap); nothing new yet.
                        continue 'run;
                    }

                    match unsafe { self.ring.slice(next_sequence, capped) } {
                        Some(batch) => {
                            if let Err(error) = self.handler.on_batch(batch, next_sequence) {
                                if self
                                    .exception_handler
                                    .handle_event_exception(error, next_sequence, batch)
                                    .is_err()
                                {
                                    // Fatal: still publish progress through the
                                    // failing batch before exiting, matching
                                    // the advance-past-on-exception policy.
                                    #[cfg(feature = "tracing")]
                                    tracing::warn!(sequence = next_sequence, "event handler exception escalated, halting");
                                    self.sequence.set_release(capped);
                                    break 'run;
                                }
                            }
                        }
                        None => {
                            // The claimed range wraps the backing array;
                            // split and deliver in two contiguous halves.
                            let wrap_at = self.ring.capacity() as i64
                                - self.ring.index_of(next_sequence) as i64;
                            let mid = next_sequence + wrap_at - 1;
                            for (lo, hi) in [(next_sequence, mid), (mid + 1, capped)] {
                                if lo > hi {
                                    continue;
                                }
                                let batch = unsafe {
                                    self.ring.slice(lo, hi).expect("split range must not wrap")
                                };
                                if let Err(error) = self.handler.on_batch(batch, lo) {
                                    if self
                                        .exception_handler
                                        .handle_event_exception(error, lo, batch)
                                        .is_err()
                                    {
                                        #[cfg(feature = "tracing")]
                                        tracing::warn!(sequence = lo, "event handler exception escalated, halting");
                                        self.sequence.set_release(capped);
                                        break 'run;
                                    }
                                }
                            }
                        }
                    }

                    self.sequence.set_release(capped);
                    next_sequence = capped + 1;
                }
                Err(WaitError::Timeout) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(sequence = next_sequence - 1, "wait strategy timed out");
                    if let Err(error) = self.handler.on_timeout(next_sequence - 1) {
                        self.exception_handler.handle_on_timeout_exception(error, next_sequence - 1);
                    }
                }
                Err(WaitError::Alert) => {
                    // A tripped barrier doesn't necessarily mean "halted" —
                    // `cancel_handle()` is a general-purpose API a caller may
                    // invoke independently of this processor's run state
                    // (spec.md §5: "supports transient barrier resets in
                    // advanced topologies"). Only exit if the run state
                    // actually changed; otherwise re-arm and keep going.
                    if self.state.is_running() {
                        self.barrier.reset_processing();
                        continue 'run;
                    }
                    break;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(sequence = self.sequence.get_relaxed(), "event processor shutting down");

        if let Err(error) = self.handler.on_shutdown() {
            self.exception_handler.handle_on_shutdown_exception(error);
        }
        self.started.reset();

        self.state.reset_idle();
    }

    /// Pin the calling thread to `cpu_id` before running to completion, a
    /// common practice for dedicated consumer threads in the Disruptor
    /// ecosystem (`crate::cpu::pin_to_cpu`). Affinity failure is advisory —
    /// logged when the `tracing` feature is enabled, never fatal — and the
    /// processor runs regardless.
    pub fn run_pinned(&mut self, cpu_id: usize) {
        if let Err(_error) = crate::cpu::pin_to_cpu(cpu_id) {
            #[cfg(feature = "tracing")]
            tracing::warn!(cpu_id, "failed to pin event processor thread to cpu");
        }
        self.run();
    }
}
