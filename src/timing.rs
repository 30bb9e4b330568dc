use std::time::{Duration, Instant};

use tracing::info;

/// Logs how long a scope took when dropped, on success and error paths alike.
pub struct Stopwatch {
    label: &'static str,
    started: Instant,
}

impl Stopwatch {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        info!(
            label = self.label,
            elapsed_ms = elapsed.as_millis() as u64,
            "'{}' executed in {}",
            self.label,
            describe(elapsed)
        );
    }
}

/// `"1 minutes, 5 seconds, and 250 milliseconds"`.
pub fn describe(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{} minutes, {} seconds, and {} milliseconds",
        secs / 60,
        secs % 60,
        elapsed.subsec_millis()
    )
}
