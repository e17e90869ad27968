//! Periodic progress log lines for long runs
//!
//! A line is logged whenever completion advances by another step (10% by
//! default), or, once the run has been going for a while, when the quiet
//! period since the last line exceeds the configured interval.

use std::time::{Duration, Instant};

const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(60);
const DEFAULT_PERCENT_STEP: f64 = 10.0;

/// Time-based lines are suppressed before the run is this old
const WARMUP: Duration = Duration::from_secs(30);

/// Log cadence for [`RunProgress`]
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    quiet_period: Duration,
    percent_step: f64,
}

impl ProgressTracker {
    /// Log at least every `quiet_period`, and on every `percent_step` of completion
    pub fn new(quiet_period: Duration, percent_step: f64) -> Self {
        Self {
            quiet_period,
            percent_step,
        }
    }

    /// Begin counting a run over `pending` words
    pub fn start(&self, pending: u64) -> RunProgress {
        let now = Instant::now();
        RunProgress {
            cadence: *self,
            pending,
            recorded: 0,
            succeeded: 0,
            started: now,
            last_line_at: now,
            last_line_percent: 0.0,
            batch: None,
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD, DEFAULT_PERCENT_STEP)
    }
}

/// Counters for the words dispatched in one run
#[derive(Debug, Clone)]
pub struct RunProgress {
    cadence: ProgressTracker,
    pending: u64,
    recorded: u64,
    succeeded: u64,
    started: Instant,
    last_line_at: Instant,
    last_line_percent: f64,
    batch: Option<String>,
}

impl RunProgress {
    /// Progress over `pending` words with the default cadence
    pub fn new(pending: u64) -> Self {
        ProgressTracker::default().start(pending)
    }

    /// Count newly recorded outcomes
    pub fn update(&mut self, recorded: u64, succeeded: u64) {
        self.recorded = self.recorded.saturating_add(recorded);
        self.succeeded = self.succeeded.saturating_add(succeeded);
    }

    /// Label of the batch in flight, shown in log lines
    pub fn set_phase<S: Into<String>>(&mut self, batch: Option<S>) {
        self.batch = batch.map(Into::into);
    }

    /// Outcomes recorded so far
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Successes recorded so far
    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    /// Words per second since the run started
    pub fn rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.recorded as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Completion percentage (0-100); an empty run is complete
    pub fn percentage(&self) -> f64 {
        match self.pending {
            0 => 100.0,
            pending => (self.recorded as f64 * 100.0 / pending as f64).min(100.0),
        }
    }

    /// Whether a line is due
    pub fn should_emit_update(&self) -> bool {
        if self.recorded == 0 {
            return false;
        }
        let advanced = self.percentage() - self.last_line_percent >= self.cadence.percent_step;
        let quiet_too_long = self.started.elapsed() >= WARMUP
            && self.last_line_at.elapsed() >= self.cadence.quiet_period;
        advanced || quiet_too_long
    }

    /// Remember that a line was just logged
    pub fn mark_emitted(&mut self) {
        self.last_line_at = Instant::now();
        self.last_line_percent = self.percentage();
    }

    /// Remaining time at the current rate
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let left = self.pending.saturating_sub(self.recorded);
        let rate = self.rate();
        (left > 0 && rate > 0.0).then(|| Duration::from_secs_f64(left as f64 / rate))
    }

    /// One log line: counts, batch, hit rate, speed and ETA
    pub fn format_progress(&self) -> String {
        let mut line = format!(
            "[PROGRESS] {}/{} words ({:.1}%)",
            self.recorded,
            self.pending,
            self.percentage()
        );
        if let Some(batch) = &self.batch {
            line.push_str(&format!(" in {batch}"));
        }
        if self.recorded > 0 {
            let hits = self.succeeded as f64 * 100.0 / self.recorded as f64;
            line.push_str(&format!(", {hits:.0}% translated"));
        }
        let rate = self.rate();
        if rate > 0.0 {
            line.push_str(&format!(", {rate:.1} words/sec"));
        }
        if let Some(eta) = self.estimate_remaining() {
            line.push_str(&format!(", ~{} left", format_duration(eta)));
        }
        line
    }
}

/// Compact duration ("45s", "12m", "1.5h")
pub fn format_duration(duration: Duration) -> String {
    match duration.as_secs() {
        secs @ 0..=59 => format!("{secs}s"),
        secs @ 60..=3599 => format!("{}m", secs / 60),
        secs => format!("{:.1}h", secs as f64 / 3600.0),
    }
}
