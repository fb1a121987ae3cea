// State management module
//
// This module provides the StateManager which wraps BuildState with thread-safe access
// using Arc<RwLock<T>> and emits change events for front ends.

use crate::models::{BuildLogEntry, BuildPhase, BuildState, format_duration};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;

/// Change events emitted when the build state is modified
///
/// These events let a front end follow a build without polling the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A build has been accepted and the engine is about to run
    BuildStarted {
        total_steps: usize,
        output_path: Option<String>,
    },

    /// The step counter moved
    ProgressUpdated {
        step: usize,
        total: usize,
        percent: u8,
    },

    /// A line was appended to the build log
    LogAppended {
        entry: BuildLogEntry,
    },

    /// The engine reported `build::finished`
    BuildFinished {
        duration_text: Option<String>,
    },

    /// The build failed; `message` is the engine's own text
    BuildFailed {
        message: String,
    },

    /// A failed build was acknowledged and the state is idle again
    StateReset,
}

/// Thread-safe build state with event emission
///
/// This is the central state component that:
/// - Provides thread-safe access to [`BuildState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Enforces the build lifecycle (`Idle -> Running -> Idle | Failed`)
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// - [`read()`](Self::read) for reading a single field
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::models::BuildState`]: The underlying state structure
/// - [`crate::services::orchestrator::BuildOrchestrator`]: The only writer during a build
pub struct StateManager {
    state: Arc<RwLock<BuildState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with an idle state
    ///
    /// The broadcast buffer holds 256 events; a subscriber that falls further
    /// behind sees `RecvError::Lagged`.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(BuildState::default())),
            state_tx,
        }
    }

    /// Get a copy of the current state
    pub fn snapshot(&self) -> BuildState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&BuildState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// The update function runs under the write lock. Changes are detected by
    /// comparing against a copy taken before the update.
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut BuildState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        self.emit(&changes);
        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn emit(&self, changes: &[StateChange]) {
        for change in changes {
            // Nobody listening is fine
            let _ = self.state_tx.send(change.clone());
        }
    }

    fn detect_changes(old: &BuildState, new: &BuildState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        let restarted = new.is_running() && (!old.is_running() || new.log.len() < old.log.len());
        if restarted {
            changes.push(StateChange::BuildStarted {
                total_steps: new.total_steps,
                output_path: new.output_path.clone(),
            });
        }

        // New log lines, in order
        let already_logged = if restarted { 0 } else { old.log.len() };
        for entry in new.log.iter().skip(already_logged) {
            changes.push(StateChange::LogAppended {
                entry: entry.clone(),
            });
        }

        if old.step != new.step || old.total_steps != new.total_steps {
            changes.push(StateChange::ProgressUpdated {
                step: new.step,
                total: new.total_steps,
                percent: new.percent(),
            });
        }

        if old.phase != new.phase {
            match new.phase {
                BuildPhase::Idle if old.phase == BuildPhase::Running && new.completed => {
                    changes.push(StateChange::BuildFinished {
                        duration_text: new.duration_text.clone(),
                    });
                }
                BuildPhase::Idle if old.phase == BuildPhase::Failed => {
                    changes.push(StateChange::StateReset);
                }
                BuildPhase::Failed => {
                    changes.push(StateChange::BuildFailed {
                        message: new.last_error.clone().unwrap_or_default(),
                    });
                }
                _ => {}
            }
        }

        changes
    }

    // Lifecycle transitions

    /// Move to `Running` unless a build is already running.
    ///
    /// The check and the transition happen under one write lock, so two
    /// callers can never both succeed. On rejection the state is untouched and
    /// `None` is returned.
    pub fn try_begin(&self, total_steps: usize, output_path: String) -> Option<Vec<StateChange>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.is_running() {
            return None;
        }

        let old_state = state.clone();
        state.begin(total_steps, output_path);

        let changes = Self::detect_changes(&old_state, &state);
        self.emit(&changes);
        Some(changes)
    }

    /// Record that the engine reported `build::started`.
    pub fn mark_started(&self, message: &str) -> Vec<StateChange> {
        self.update(|state| {
            state.started_at = Some(Instant::now());
            state.push_log("build", message);
            state.advance();
        })
    }

    /// Log a progress message and advance one step.
    pub fn record_progress(&self, tag: &str, message: &str) -> Vec<StateChange> {
        self.update(|state| {
            state.push_log(tag, message);
            state.advance();
        })
    }

    /// Log a line without advancing (engine chatter, terminal messages).
    pub fn record_log(&self, tag: &str, message: &str) -> Vec<StateChange> {
        self.update(|state| state.push_log(tag, message))
    }

    /// Complete the running build and return to `Idle`.
    ///
    /// The duration is measured from `build::started`; if that was never seen
    /// no duration is reported.
    pub fn finish(&self, message: &str) -> Vec<StateChange> {
        self.update(|state| {
            if !state.is_running() {
                return;
            }

            state.push_log("build", message);
            if let Some(started_at) = state.started_at {
                let elapsed = started_at.elapsed();
                let text = format_duration(elapsed);
                state.push_log("build", format!("Build took {}.", text));
                state.duration = Some(elapsed);
                state.duration_text = Some(text);
            }
            state.completed = true;
            state.phase = BuildPhase::Idle;
        })
    }

    /// Fail the running build with `message`.
    pub fn fail(&self, message: &str) -> Vec<StateChange> {
        self.update(|state| {
            if !state.is_running() {
                return;
            }

            state.push_log("error", message);
            state.last_error = Some(message.to_string());
            state.phase = BuildPhase::Failed;
        })
    }

    /// Return a failed build to `Idle`. No-op in any other phase.
    pub fn acknowledge_failure(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.acknowledge_failure();
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
