// simkin_core/src/state/stamp.rs

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Seconds;

/// When a state record was taken.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateStamp {
    /// Host wall-clock time at capture.
    pub wall_time: Seconds,
    /// Elapsed real time of the simulation run.
    pub real_time: Seconds,
    /// Simulated time.
    pub sim_time: Seconds,
    /// Number of completed solver iterations.
    pub iterations: u64,
}

impl StateStamp {
    /// A stamp with the wall clock read now.
    pub fn now(real_time: Seconds, sim_time: Seconds, iterations: u64) -> Self {
        Self {
            wall_time: wall_clock_seconds(),
            real_time,
            sim_time,
            iterations,
        }
    }
}

/// Seconds since the Unix epoch; zero if the host clock is before it.
pub fn wall_clock_seconds() -> Seconds {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
