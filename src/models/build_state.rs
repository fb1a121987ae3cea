use std::fmt;
use std::time::{Duration, Instant};

/// Number of steps a build always goes through regardless of its contents.
///
/// This counts the distinct phases the engine reports (settings, size,
/// creation, background, files, symlinks, extensions, DS_Store, license,
/// shrink and the start/finish markers). Files and symlinks add one step each
/// on top of this. The value can be overridden through
/// [`AppSettings::baseline_steps`](crate::models::AppSettings).
pub const DEFAULT_BASELINE_STEPS: usize = 12;

/// Where a build is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPhase {
    #[default]
    Idle,
    Running,
    Failed,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BuildPhase::Idle => "Idle",
            BuildPhase::Running => "Building Image...",
            BuildPhase::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// One line of the build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLogEntry {
    /// Percentage complete when the line was produced.
    pub percent: u8,
    /// Category the line belongs to, e.g. `build`, `dmg`, `file`.
    pub tag: String,
    pub message: String,
}

impl fmt::Display for BuildLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>3}%] [{}] {}", self.percent, self.tag, self.message)
    }
}

/// Transient state of the current (or most recent) build.
///
/// Owned by [`crate::state::StateManager`]; never persisted.
#[derive(Clone, Debug, Default)]
pub struct BuildState {
    pub phase: BuildPhase,
    pub log: Vec<BuildLogEntry>,

    // Progress
    pub step: usize,
    pub total_steps: usize,

    /// Set when the engine reports `build::started`.
    pub started_at: Option<Instant>,
    pub duration: Option<Duration>,
    pub duration_text: Option<String>,

    pub output_path: Option<String>,
    /// True once the engine has reported `build::finished`.
    pub completed: bool,
    pub last_error: Option<String>,
}

impl BuildState {
    pub fn is_running(&self) -> bool {
        self.phase == BuildPhase::Running
    }

    /// Prepare for a new build of `total_steps` steps.
    pub fn begin(&mut self, total_steps: usize, output_path: String) {
        *self = BuildState {
            phase: BuildPhase::Running,
            total_steps,
            output_path: Some(output_path),
            ..BuildState::default()
        };
    }

    /// Completion percentage of the current build, in 0..=100.
    pub fn percent(&self) -> u8 {
        if self.total_steps == 0 {
            return 0;
        }

        let percent = self.step.saturating_mul(100) / self.total_steps;
        percent.min(100) as u8
    }

    /// Append a log line tagged with the current percentage.
    pub fn push_log(&mut self, tag: &str, message: impl Into<String>) {
        let entry = BuildLogEntry {
            percent: self.percent(),
            tag: tag.to_string(),
            message: message.into(),
        };
        self.log.push(entry);
    }

    /// Advance the step counter, never beyond the total.
    pub fn advance(&mut self) {
        if self.step < self.total_steps {
            self.step += 1;
        }
    }

    /// Move a failed build back to idle. Returns false if the build had not failed.
    pub fn acknowledge_failure(&mut self) -> bool {
        if self.phase == BuildPhase::Failed {
            self.phase = BuildPhase::Idle;
            true
        } else {
            false
        }
    }
}

/// Human readable duration, e.g. `1 minutes 4 seconds`.
///
/// Durations under a second are reported in milliseconds so that the result is
/// never empty.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::new();

    if hours != 0 {
        parts.push(format!("{} hours", hours));
    }
    if minutes != 0 || !parts.is_empty() {
        parts.push(format!("{} minutes", minutes));
    }
    if seconds != 0 || !parts.is_empty() {
        parts.push(format!("{} seconds", seconds));
    }

    if parts.is_empty() {
        format!("{} milliseconds", duration.as_millis())
    } else {
        parts.join(" ")
    }
}
