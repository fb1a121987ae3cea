// Console rendering of build state changes
//
// Plays the part of the log pane: subscribes to the StateManager and prints
// each build log line as it arrives.

use crate::state::StateChange;
use std::io::Write;
use tokio::sync::broadcast;

/// Text to print for a state change, if any.
pub fn render_change(change: &StateChange) -> Option<String> {
    match change {
        StateChange::BuildStarted {
            total_steps,
            output_path,
        } => Some(format!(
            "Building {} ({} steps)",
            output_path.as_deref().unwrap_or("disk image"),
            total_steps
        )),
        StateChange::LogAppended { entry } => Some(entry.to_string()),
        StateChange::BuildFinished { .. } => Some("Idle".to_string()),
        StateChange::BuildFailed { .. } => Some("Failed".to_string()),
        StateChange::ProgressUpdated { .. } | StateChange::StateReset => None,
    }
}

/// Print state changes to `out` until the build finishes or fails.
///
/// Returns the number of lines written.
pub async fn print_until_done<W: Write>(
    mut rx: broadcast::Receiver<StateChange>,
    mut out: W,
) -> usize {
    let mut lines = 0;

    loop {
        match rx.recv().await {
            Ok(change) => {
                if let Some(text) = render_change(&change) {
                    let _ = writeln!(out, "{}", text);
                    lines += 1;
                }
                if matches!(
                    change,
                    StateChange::BuildFinished { .. } | StateChange::BuildFailed { .. }
                ) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Console fell behind, {} state changes skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    let _ = out.flush();
    lines
}
