use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::engine::{BuildEngine, BuildError, EngineMessage, EngineRequest};
use super::license::load_license;
use super::progress::{ProgressEvent, UpdateKind, translate};
use crate::metrics::Metrics;
use crate::models::{AppSettings, BuildPhase, Configuration, DEFAULT_BASELINE_STEPS, UserSettings};
use crate::project::normalize_path;
use crate::state::StateManager;

/// Failure text when the engine stops without reporting `build::finished`.
pub const EXITED_EARLY_MESSAGE: &str = "Build engine exited before the build finished";

/// Number of steps a build of `config` goes through, using the default baseline.
pub fn build_count(config: &Configuration) -> usize {
    build_count_with_baseline(config, DEFAULT_BASELINE_STEPS)
}

pub fn build_count_with_baseline(config: &Configuration, baseline: usize) -> usize {
    baseline + config.total_files() + config.total_symlinks()
}

/// How a build ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed { duration_text: Option<String> },
    Failed { message: String },
}

/// Handle to a build in flight.
///
/// Dropping the handle does not stop the build.
#[derive(Debug)]
pub struct BuildHandle {
    output_path: Utf8PathBuf,
    relay: JoinHandle<BuildOutcome>,
}

impl BuildHandle {
    pub fn output_path(&self) -> &Utf8Path {
        &self.output_path
    }

    /// Wait until the engine's messages have all been applied.
    pub async fn wait(self) -> BuildOutcome {
        match self.relay.await {
            Ok(outcome) => outcome,
            Err(e) => BuildOutcome::Failed {
                message: format!("Build relay task failed: {}", e),
            },
        }
    }
}

/// Starts builds and feeds the engine's progress into the [`StateManager`].
///
/// One relay task per build receives the engine's messages from an unbounded
/// channel and applies them one at a time, in the order they were sent. The
/// orchestrator never holds the live configuration; the engine gets an
/// [`EngineRequest`] snapshot.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct BuildOrchestrator {
    state_manager: StateManager,
    engine: Arc<dyn BuildEngine>,
    metrics: Arc<Metrics>,
    baseline_steps: usize,
    user: UserSettings,
}

impl BuildOrchestrator {
    pub fn new(
        state_manager: StateManager,
        engine: Arc<dyn BuildEngine>,
        metrics: Arc<Metrics>,
        settings: &AppSettings,
    ) -> Self {
        Self {
            state_manager,
            engine,
            metrics,
            baseline_steps: settings.baseline_steps,
            user: settings.user.clone(),
        }
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Number of steps a build of `config` goes through.
    pub fn build_count(&self, config: &Configuration) -> usize {
        build_count_with_baseline(config, self.baseline_steps)
    }

    /// Start building `config`.
    ///
    /// `output` overrides the configured filename; relative paths resolve
    /// against `base_dir`. Returns as soon as the engine has been launched.
    ///
    /// # Errors
    /// - [`BuildError::AlreadyInProgress`] if a build is running, whatever the request; the running build is not touched
    /// - [`BuildError::MissingOutputPath`] if neither `output` nor the configuration names a file
    /// - [`BuildError::InvalidConfiguration`] if the configuration breaks an invariant
    /// - [`BuildError::License`] if the license template cannot be read
    /// - [`BuildError::EngineSpawn`] if the engine could not be started; the build is marked failed
    pub fn start_build(
        &self,
        config: &Configuration,
        base_dir: Option<&Utf8Path>,
        output: Option<&str>,
    ) -> Result<BuildHandle, BuildError> {
        if self.state_manager.read(|state| state.is_running()) {
            return Err(self.reject());
        }

        let raw_output = output
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .or_else(|| Some(config.filename.trim()).filter(|raw| !raw.is_empty()))
            .ok_or(BuildError::MissingOutputPath)?;
        let output_path = normalize_path(raw_output, base_dir);

        config
            .check_invariants()
            .map_err(|(key, reason)| BuildError::InvalidConfiguration(format!("{}: {}", key, reason)))?;

        let license = match config.license.trim() {
            "" => None,
            raw => Some(load_license(
                &normalize_path(raw, base_dir),
                &self.user,
                Local::now(),
            )?),
        };

        let total_steps = self.build_count(config);
        if self
            .state_manager
            .try_begin(total_steps, output_path.to_string())
            .is_none()
        {
            return Err(self.reject());
        }

        tracing::info!(
            "Starting build of {} ({} steps, {} files, {} symlinks)",
            output_path,
            total_steps,
            config.total_files(),
            config.total_symlinks()
        );
        self.metrics.record_build_started();

        let mut request = EngineRequest::from_configuration(config, &output_path, base_dir);
        request.settings.license = license;
        let (tx, rx) = mpsc::unbounded_channel();

        if let Err(e) = self.engine.launch(request, tx) {
            tracing::error!("Failed to launch build engine: {}", e);
            self.state_manager.fail(&e.to_string());
            self.metrics.record_build_failed();
            return Err(e);
        }

        let relay = BuildRelay {
            state_manager: self.state_manager.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        let relay = tokio::spawn(relay.run(rx));

        Ok(BuildHandle {
            output_path,
            relay,
        })
    }

    fn reject(&self) -> BuildError {
        tracing::warn!("Build requested while another build is running");
        self.metrics.record_build_rejected();
        BuildError::AlreadyInProgress
    }

    /// Return a failed build to idle.
    pub fn acknowledge_failure(&self) {
        self.state_manager.acknowledge_failure();
    }
}

/// Applies engine messages to the build state, one at a time.
struct BuildRelay {
    state_manager: StateManager,
    metrics: Arc<Metrics>,
}

impl BuildRelay {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<EngineMessage>) -> BuildOutcome {
        while let Some(message) = rx.recv().await {
            if let EngineMessage::Exited(code) = message {
                tracing::debug!("Build engine exited with {:?}", code);
                break;
            }
            self.apply(message);
        }

        if self.is_running() {
            self.state_manager.fail(EXITED_EARLY_MESSAGE);
            tracing::error!("{}", EXITED_EARLY_MESSAGE);
        }

        let state = self.state_manager.snapshot();
        match state.phase {
            BuildPhase::Failed => {
                self.metrics.record_build_failed();
                BuildOutcome::Failed {
                    message: state.last_error.unwrap_or_default(),
                }
            }
            _ => {
                self.metrics.record_build_finished(state.duration);
                BuildOutcome::Completed {
                    duration_text: state.duration_text,
                }
            }
        }
    }

    fn is_running(&self) -> bool {
        self.state_manager.read(|state| state.is_running())
    }

    fn apply(&self, message: EngineMessage) {
        if !self.is_running() {
            if let EngineMessage::Failure(text) = &message {
                tracing::warn!("Build engine reported a failure after the build ended: {}", text);
                self.state_manager.record_log("error", text);
            } else {
                tracing::debug!("Ignoring engine message after build ended: {:?}", message);
            }
            self.metrics.record_event_ignored();
            return;
        }

        match message {
            EngineMessage::Progress(line) => self.apply_progress(&line),
            EngineMessage::Output(line) => {
                tracing::debug!("Build engine: {}", line);
                self.state_manager.record_log("engine", &line);
            }
            EngineMessage::Failure(text) => {
                tracing::error!("Build failed: {}", text);
                self.state_manager.fail(&text);
            }
            EngineMessage::Exited(_) => {}
        }
    }

    fn apply_progress(&self, line: &str) {
        let event = match ProgressEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Malformed progress event '{}': {}", line, e);
                self.metrics.record_event_ignored();
                return;
            }
        };

        let Some(update) = translate(&event, Local::now()) else {
            self.metrics.record_event_ignored();
            return;
        };

        tracing::info!("[{}] {}", update.tag, update.message);
        self.metrics.record_event_processed();

        match update.kind {
            UpdateKind::Started => {
                self.state_manager.mark_started(&update.message);
            }
            UpdateKind::Step => {
                self.state_manager.record_progress(update.tag, &update.message);
            }
            UpdateKind::Finished => {
                self.state_manager.finish(&update.message);
            }
        }
    }
}
