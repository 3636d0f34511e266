//! Cooperative async batch event processor (spec.md §4.6 "Async variant").
//!
//! Same contract as [`super::batch::BatchEventProcessor`] — same handler
//! trait, same exception policy, same halt semantics — but the barrier wait
//! and the handler call are suspension points instead of blocking calls.
//! The scheduling model is single-threaded cooperative per instance: one
//! logical task owns this processor's cursor and must not be polled from
//! more than one place concurrently (spec.md §5 "Scheduling model").

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

/// How long an idle poll sleeps before re-checking the barrier. Keeps the
/// executor free for other tasks between suspension points rather than
/// busy-polling; real backoff (spin/yield/sleep) still happens underneath a
/// producer-side wait strategy, this is purely the consumer task's
/// courtesy yield.
const POLL_BACKOFF: Duration = Duration::from_micros(50);

/// Async counterpart to [`super::batch::BatchEventProcessor`]. Drive it with
/// [`Self::run`] from an async runtime task (e.g. `tokio::spawn`).
pub struct AsyncBatchEventProcessor<T, S, W, H, EH>
where
    S: Sequencer,
    W: WaitStrategy,
    H: EventHandler<T>,
    EH: ExceptionHandler<T, H::Error>,
{
    ring: Arc<Ring<T>>,
    barrier: SequenceBarrier<S, W>,
    handler: H,
    exception_handler: EH,
    limiter: BatchSizeLimiter,
    sequence: Arc<Sequence>,
    state: Arc<RunStateCell>,
    started: Arc<StartedLatch>,
}

/// Cross-task halt handle, mirroring [`super::batch::ProcessorHandle`].
/// Cooperative cancellation here means a halt flips the same flag the
/// async run loop checks at the next suspension point — there is no
/// forced preemption (spec.md §5 "a cooperative-cancel exception from
/// the scheduler is treated as `Alert`").
pub struct AsyncProcessorHandle<W: WaitStrategy> {
    state: Arc<RunStateCell>,
    cancel: BarrierCancelHandle<W>,
    sequence: Arc<Sequence>,
    started: Arc<StartedLatch>,
}

impl<W: WaitStrategy> AsyncProcessorHandle<W> {
    pub fn halt(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("async event processor halt requested");
        self.state.halt();
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

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

impl<W: WaitStrategy> Clone for AsyncProcessorHandle<W> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            sequence: self.sequence.clone(),
            started: self.started.clone(),
        }
    }
}

impl<T, S, W, H, EH> AsyncBatchEventProcessor<T, S, W, H, EH>
where
    S: Sequencer,
    W: WaitStrategy,
    H: EventHandler<T>,
    EH: ExceptionHandler<T, H::Error>,
{
    pub fn new(
        ring: Arc<Ring<T>>,
        barrier: SequenceBarrier<S, W>,
        handler: H,
        exception_handler: EH,
        limiter: BatchSizeLimiter,
    ) -> Self {
        Self {
            ring,
            barrier,
            handler,
            exception_handler,
            limiter,
            sequence: Arc::new(Sequence::new_initial()),
            state: Arc::new(RunStateCell::new()),
            started: Arc::new(StartedLatch::new()),
        }
    }

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

    pub fn handle(&self) -> AsyncProcessorHandle<W> {
        AsyncProcessorHandle {
            state: self.state.clone(),
            cancel: self.barrier.cancel_handle(),
            sequence: self.sequence.clone(),
            started: self.started.clone(),
        }
    }

    pub fn halt(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("async event processor halt requested");
        self.state.halt();
        self.barrier.cancel();
    }

    /// Drive the processor to completion. Every barrier check and handler
    /// call is awaited, so this task yields to the runtime between rounds
    /// instead of parking the OS thread (spec.md §4.6).
    pub async fn run(&mut self) {
        if !self.state.try_start() {
            return;
        }
        self.barrier.reset_processing();

        #[cfg(feature = "tracing")]
        tracing::debug!("async event processor starting");

        if let Err(error) = self.handler.on_start() {
            self.exception_handler.handle_on_start_exception(error);
        }
        self.started.signal();

        let mut next_sequence = self.sequence.get_relaxed() + 1;

        'run: loop {
            if !self.state.is_running() {
                break;
            }

            let available = match self.barrier.try_wait_for(next_sequence) {
                Ok(Some(available)) => available,
                Ok(None) => {
                    Self::yield_once().await;
                    continue 'run;
                }
                Err(WaitError::Timeout) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(sequence = next_sequence - 1, "wait strategy timed out");
                    if let Err(error) = self.handler.on_timeout(next_sequence - 1) {
                        self.exception_handler.handle_on_timeout_exception(error, next_sequence - 1);
                    }
                    continue 'run;
                }
                Err(WaitError::Alert) => {
                    // Same two-branch policy as the sync processor: a tripped
                    // barrier doesn't necessarily mean halted, since
                    // `cancel_handle()` can be invoked independently of this
                    // processor's run state (spec.md §5). Only exit if the
                    // run state actually changed; otherwise re-arm and keep
                    // going.
                    if self.state.is_running() {
                        self.barrier.reset_processing();
                        continue 'run;
                    }
                    break;
                }
            };

            let capped = self.limiter.cap(available, next_sequence);
            if capped < next_sequence {
                Self::yield_once().await;
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
                            #[cfg(feature = "tracing")]
                            tracing::warn!(sequence = next_sequence, "event handler exception escalated, halting");
                            self.sequence.set_release(capped);
                            break 'run;
                        }
                    }
                }
                None => {
                    let wrap_at = self.ring.capacity() as i64 - self.ring.index_of(next_sequence) as i64;
                    let mid = next_sequence + wrap_at - 1;
                    for (lo, hi) in [(next_sequence, mid), (mid + 1, capped)] {
                        if lo > hi {
                            continue;
                        }
                        let batch = unsafe { self.ring.slice(lo, hi).expect("split range must not wrap") };
                        if let Err(error) = self.handler.on_batch(batch, lo) {
                            if self.exception_handler.handle_event_exception(error, lo, batch).is_err() {
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

        #[cfg(feature = "tracing")]
        tracing::debug!(sequence = self.sequence.get_relaxed(), "async event processor shutting down");

        if let Err(error) = self.handler.on_shutdown() {
            self.exception_handler.handle_on_shutdown_exception(error);
        }
        self.started.reset();

        self.state.reset_idle();
    }

    async fn yield_once() {
        tokio::time::sleep(POLL_BACKOFF).await;
    }
}
