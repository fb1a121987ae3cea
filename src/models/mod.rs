//! Data models for dmgee.
//!
//! - [`Configuration`]: the disk image layout that is saved to a project file
//! - [`BuildState`]: transient state of the current build, owned by
//!   [`StateManager`](crate::state::StateManager)
//! - [`AppSettings`]: per-machine settings from `dmgee Settings.yaml`
//!
//! The configuration types are plain values. Editing goes through
//! [`Project`](crate::project::Project) so that observers are notified and the
//! invariants are checked.

pub mod build_state;
pub mod project;
pub mod settings;

pub use build_state::{
    BuildLogEntry, BuildPhase, BuildState, DEFAULT_BASELINE_STEPS, format_duration,
};
pub use project::{
    Configuration, DiskImageFormat, FileEntry, GridSize, MAX_ICON_SIZE, MIN_ICON_SIZE,
    SymlinkEntry, TextPosition,
};
pub use settings::{AppSettings, EngineSettings, UserSettings};
