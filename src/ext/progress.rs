//! Periodic progress notices for long-running stages.

use std::time::{Duration, Instant};
use crate::ext;

/// Minimal number of seconds between two progress messages.
pub const UPDATE_SECS: u64 = 10;

/// Counts processed items and logs the progress at most once every `UPDATE_SECS` seconds.
pub struct Progress {
    what: &'static str,
    total: Option<u64>,
    done: u64,
    timer: Instant,
    last_msg: Duration,
}

impl Progress {
    /// Creates a new progress counter. `what` describes processed items (for example, `reads`).
    pub fn new(what: &'static str, total: Option<u64>) -> Self {
        Self {
            what, total,
            done: 0,
            timer: Instant::now(),
            last_msg: Duration::default(),
        }
    }

    /// Number of processed items.
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Increases the number of processed items by `count`.
    pub fn inc(&mut self, count: u64) {
        self.done += count;
        let elapsed = self.timer.elapsed();
        if (elapsed - self.last_msg).as_secs() >= UPDATE_SECS {
            match self.total {
                Some(total) => log::debug!("        [{:>9}/{}] {}, {}",
                    self.done, total, self.what, ext::fmt::Duration(elapsed)),
                None => log::debug!("        {:>9} {}, {}", self.done, self.what, ext::fmt::Duration(elapsed)),
            }
            self.last_msg = elapsed;
        }
    }

    /// Logs the final number of processed items and the elapsed time.
    pub fn finish(&self) {
        log::info!("    Processed {} {} in {}", self.done, self.what, ext::fmt::Duration(self.timer.elapsed()));
    }
}
