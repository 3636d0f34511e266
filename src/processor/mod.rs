//! The event processor: the consumer-side run loop that drains a sequence
//! barrier and delivers contiguous batches to an [`EventHandler`](crate::handler::EventHandler)
//! (spec.md §4.6).
//!
//! [`batch::BatchEventProcessor`] is the synchronous, thread-per-processor
//! implementation. [`r#async::AsyncBatchEventProcessor`] is the cooperative
//! single-task variant described in spec.md §4.6's "Async variant" — same
//! exception policy, same halt semantics, different suspension mechanism.

pub mod batch;
#[cfg(feature = "async")]
#[path = "async.rs"]
pub mod r#async;

pub use batch::BatchEventProcessor;
#[cfg(feature = "async")]
pub use r#async::AsyncBatchEventProcessor;

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::error::WaitError;

/// Processor lifecycle state (spec.md §3 "Lifecycle", §5 "Cancellation / halt").
///
/// `Idle -> Running -> Halted -> Idle` is the only legal cycle: a processor
/// may be restarted after halting, but `run`/`run_async` refuses to start
/// a second time concurrently (spec.md §8 scenario "idempotent halt").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Halted = 2,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Running,
            _ => RunState::Halted,
        }
    }
}

/// Atomic cell holding a [`RunState`], CAS'd at start/halt/shutdown
/// boundaries. Not on the hot per-batch path — read once per wait-loop
/// iteration to check for a halt request.
///
/// Wrapped in `Arc` by its owning processor so a [`BatchEventProcessor::handle`]
/// can request a halt from a different thread than the one running the loop.
pub(crate) struct RunStateCell(AtomicU8);

impl RunStateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(RunState::Idle as u8))
    }

    pub(crate) fn get(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Transition `Idle -> Running`. Returns `false` if the processor is
    /// already running or has not yet been reset to `Idle` after a halt.
    pub(crate) fn try_start(&self) -> bool {
        self.0.compare_exchange(
            RunState::Idle as u8,
            RunState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok()
    }

    pub(crate) fn halt(&self) {
        self.0.store(RunState::Halted as u8, Ordering::Release);
    }

    /// Reset to `Idle` once the run loop has fully exited, so a later
    /// `try_start` can succeed.
    pub(crate) fn reset_idle(&self) {
        self.0.store(RunState::Idle as u8, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.get() == RunState::Running
    }
}

/// Signals once a processor's `onStart` hook has returned and it is about
/// to enter its main loop, so a caller on another thread can block on
/// startup instead of polling `is_running()` (spec.md §6 "Consumer surface"
/// `waitUntilStarted(timeout)`). Condvar-backed, mirroring
/// `wait_strategy::BlockingWaitStrategy`'s mutex/condvar pairing.
pub(crate) struct StartedLatch {
    mutex: parking_lot::Mutex<bool>,
    condition: parking_lot::Condvar,
}

impl StartedLatch {
    pub(crate) fn new() -> Self {
        Self { mutex: parking_lot::Mutex::new(false), condition: parking_lot::Condvar::new() }
    }

    /// Mark the processor started and wake anyone waiting.
    pub(crate) fn signal(&self) {
        *self.mutex.lock() = true;
        self.condition.notify_all();
    }

    /// Clear the started flag, called on shutdown so a later restart's
    /// `wait_until_started` blocks until the new run actually starts.
    pub(crate) fn reset(&self) {
        *self.mutex.lock() = false;
    }

    /// Block until `signal()` has been called, or `timeout` elapses.
    pub(crate) fn wait(&self, timeout: Duration) -> Result<(), WaitError> {
        let mut guard = self.mutex.lock();
        if *guard {
            return Ok(());
        }
        self.condition.wait_for(&mut guard, timeout);
        if *guard {
            Ok(())
        } else {
            Err(WaitError::Timeout)
        }
    }
}
