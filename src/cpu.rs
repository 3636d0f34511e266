//! Optional CPU affinity for dedicated processor threads.
//!
//! Pinning a consumer thread to a single core is common practice in the
//! Disruptor ecosystem: it keeps the consumer's cache lines warm and avoids
//! scheduler migration jitter on the hot path. This is advisory only — the
//! coordination protocol itself does not depend on pinning succeeding.

use thiserror::Error;

/// Error returned when pinning the calling thread to a CPU core fails.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("failed to set CPU affinity to core {cpu_id}")]
pub struct AffinityError {
    /// The core the caller attempted to pin to.
    pub cpu_id: usize,
}

#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu_id: usize) -> Result<(), AffinityError> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_ZERO};
    use std::mem;

    unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);
        CPU_SET(cpu_id, &mut cpu_set);

        if sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &cpu_set) != 0 {
            return Err(AffinityError { cpu_id });
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
pub fn pin_to_cpu(cpu_id: usize) -> Result<(), AffinityError> {
    use libc::{mach_port_t, pthread_self, thread_affinity_policy_data_t, thread_policy_set};
    use libc::THREAD_AFFINITY_POLICY;

    unsafe {
        let mut policy = thread_affinity_policy_data_t {
            affinity_tag: cpu_id as i32,
        };

        let result = thread_policy_set(
            pthread_self() as mach_port_t,
            THREAD_AFFINITY_POLICY as u32,
            &mut policy as *mut _ as *mut i32,
            1,
        );

        if result != 0 {
            return Err(AffinityError { cpu_id });
        }
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn pin_to_cpu(_cpu_id: usize) -> Result<(), AffinityError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinning_to_current_cpu_succeeds_or_reports_the_core() {
        match pin_to_cpu(0) {
            Ok(()) => {}
            Err(e) => assert_eq!(e.cpu_id, 0),
        }
    }
}
