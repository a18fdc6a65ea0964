//! Export timing utilities.

use std::time::{Duration, Instant};
use tracing::info;

/// A simple timer for measuring how long a map takes to produce.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    /// Start a new timer with the given map name.
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish the timer and log the elapsed time.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        let secs = elapsed.as_secs_f64();
        if secs >= 60.0 {
            info!(map = %self.name, "done in {:.1}m", secs / 60.0);
        } else {
            info!(map = %self.name, "done in {:.2}s", secs);
        }
        elapsed
    }
}
