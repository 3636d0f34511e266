//! Wait strategies: how a consumer parks when the ring is empty and how a
//! producer backs off when the ring is full (spec.md §4.2).
//!
//! Every strategy implements the same contract: given a requested sequence
//! `n`, the producer's cursor, and a set of dependent (upstream consumer)
//! sequences, block until `min(cursor, min(dependents)) >= n`, or until the
//! caller is alerted (cancellation), or until an optional deadline elapses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{DEFAULT_SPIN_TRIES, DEFAULT_YIELD_TRIES};
use crate::error::WaitError;
use crate::sequence::{min_sequence, Sequence};

/// Cooperative cancellation flag shared between a barrier and its wait
/// strategy. `true` means "keep waiting is fine"; flipped to `false` on
/// halt.
pub type AlertFlag = AtomicBool;

#[inline(always)]
fn check_alert(alert: &AlertFlag) -> Result<(), WaitError> {
    if alert.load(Ordering::Acquire) {
        Err(WaitError::Alert)
    } else {
        Ok(())
    }
}

#[inline(always)]
pub(crate) fn available(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    let producer = cursor.get_acquire();
    if dependents.is_empty() {
        producer
    } else {
        producer.min(min_sequence(dependents))
    }
}

/// Given a requested sequence, a producer cursor and zero or more dependent
/// sequences, park the caller until enough progress has been made, until
/// alerted, or until a timeout elapses.
pub trait WaitStrategy: Send + Sync {
    /// Block until `min(cursor, min(dependents)) >= sequence`, returning
    /// the observed available sequence (which may be `>= sequence`).
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64, WaitError>;

    /// Wake every consumer parked in this strategy. Called by a sequencer on
    /// every publish and by a barrier on halt.
    fn signal_all_when_blocking(&self);

    /// Producer-side backoff hook, invoked by a sequencer's `next()` when a
    /// claim would wrap past the slowest gating sequence. Default is a tight
    /// spin; blocking strategies override this to actually park.
    fn park_producer(&self) {
        std::hint::spin_loop();
    }
}

/// Tight poll with no backoff. Lowest latency, worst power — burns a full
/// core while waiting.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64, WaitError> {
        loop {
            let avail = available(cursor, dependents);
            if avail >= sequence {
                return Ok(avail);
            }
            check_alert(alert)?;
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {
        // No parked threads to wake.
    }
}

/// Spin, then yield, then park briefly — a middle ground between busy-spin
/// latency and sleeping's low CPU usage.
pub struct YieldingWaitStrategy {
    spin_tries: u32,
    yield_tries: u32,
}

impl YieldingWaitStrategy {
    pub fn new() -> Self {
        Self { spin_tries: DEFAULT_SPIN_TRIES, yield_tries: DEFAULT_YIELD_TRIES }
    }

    pub fn with_tries(spin_tries: u32, yield_tries: u32) -> Self {
        Self { spin_tries, yield_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64, WaitError> {
        let mut counter = 0u32;
        loop {
            let avail = available(cursor, dependents);
            if avail >= sequence {
                return Ok(avail);
            }
            check_alert(alert)?;

            if counter < self.spin_tries {
                std::hint::spin_loop();
            } else if counter < self.spin_tries + self.yield_tries {
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_nanos(1));
            }
            counter = counter.wrapping_add(1);
        }
    }

    fn signal_all_when_blocking(&self) {}

    fn park_producer(&self) {
        thread::yield_now();
    }
}

/// Spin, then sleep with exponential backoff bounded by a cap. Lowest CPU
/// usage of the non-blocking strategies.
pub struct SleepingWaitStrategy {
    spin_tries: u32,
    initial_sleep: Duration,
    max_sleep: Duration,
}

impl SleepingWaitStrategy {
    pub fn new() -> Self {
        Self {
            spin_tries: DEFAULT_SPIN_TRIES,
            initial_sleep: Duration::from_micros(1),
            max_sleep: Duration::from_millis(1),
        }
    }

    pub fn with_bounds(spin_tries: u32, initial_sleep: Duration, max_sleep: Duration) -> Self {
        Self { spin_tries, initial_sleep, max_sleep }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64, WaitError> {
        let mut counter = 0u32;
        let mut sleep_for = self.initial_sleep;
        loop {
            let avail = available(cursor, dependents);
            if avail >= sequence {
                return Ok(avail);
            }
            check_alert(alert)?;

            if counter < self.spin_tries {
                std::hint::spin_loop();
                counter = counter.wrapping_add(1);
                continue;
            }
            thread::sleep(sleep_for);
            sleep_for = (sleep_for * 2).min(self.max_sleep);
        }
    }

    fn signal_all_when_blocking(&self) {}

    fn park_producer(&self) {
        thread::sleep(self.initial_sleep);
    }
}

/// Condition-variable based strategy. The sequencer wakes the condition on
/// every publish when blocked consumers are known to exist; a parked
/// consumer re-checks availability on each wakeup rather than trusting the
/// wakeup alone, so spurious wakeups and missed notifications are both
/// harmless.
pub struct BlockingWaitStrategy {
    mutex: parking_lot::Mutex<()>,
    condition: parking_lot::Condvar,
    poll_interval: Duration,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: parking_lot::Mutex::new(()),
            condition: parking_lot::Condvar::new(),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64, WaitError> {
        loop {
            let avail = available(cursor, dependents);
            if avail >= sequence {
                return Ok(avail);
            }
            check_alert(alert)?;

            let mut guard = self.mutex.lock();
            // Re-check under the lock: the publish that would wake us may
            // have landed between the check above and taking the lock.
            let avail = available(cursor, dependents);
            if avail >= sequence {
                return Ok(avail);
            }
            check_alert(alert)?;
            self.condition.wait_for(&mut guard, self.poll_interval);
        }
    }

    fn signal_all_when_blocking(&self) {
        self.condition.notify_all();
    }

    fn park_producer(&self) {
        let mut guard = self.mutex.lock();
        self.condition.wait_for(&mut guard, self.poll_interval);
    }
}

/// Wraps another strategy and bounds the total wait by a deadline,
/// surfacing `WaitError::Timeout` instead of blocking forever. The
/// processor treats a timeout as a notification (`on_timeout`), not an
/// error, and retries.
pub struct TimeoutBlockingWaitStrategy<W: WaitStrategy> {
    inner: W,
    timeout: Duration,
}

impl<W: WaitStrategy> TimeoutBlockingWaitStrategy<W> {
    pub fn new(inner: W, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<W: WaitStrategy> WaitStrategy for TimeoutBlockingWaitStrategy<W> {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64, WaitError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let avail = available(cursor, dependents);
            if avail >= sequence {
                return Ok(avail);
            }
            check_alert(alert)?;
            if Instant::now() >= deadline {
                return Err(WaitError::Timeout);
            }
            self.inner.park_producer();
        }
    }

    fn signal_all_when_blocking(&self) {
        self.inner.signal_all_when_blocking();
    }

    fn park_producer(&self) {
        self.inner.park_producer();
    }
}
