use std::io::{self, Write};
use std::time::Instant;

/// Stderr staging lines with elapsed time. Disabled entirely under `--quiet`;
/// the final summary goes to stdout and does not pass through here.
pub struct ConsoleProgress {
    enabled: bool,
    started: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit("", msg.as_ref());
    }

    /// Non-fatal condition worth an operator's attention. Warnings also land
    /// in the run report, so suppressing them here loses nothing.
    pub fn warn(&self, msg: impl AsRef<str>) {
        self.emit("warning: ", msg.as_ref());
    }

    fn emit(&self, level: &str, msg: &str) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.started.elapsed().as_secs());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {level}{msg}");
    }
}

fn fmt_elapsed(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
