//! Services module - build orchestration and layout logic.
//!
//! Everything here is framework-agnostic: no terminal handling, no argument
//! parsing. Front ends hold a [`Project`](crate::project::Project) and call
//! into these services with snapshots of its configuration.
//!
//! # Components
//!
//! - [`BuildOrchestrator`]: validates a configuration, launches the engine and
//!   relays its progress into the [`StateManager`](crate::state::StateManager)
//! - [`BuildEngine`] / [`ProcessEngine`]: the seam to the external disk image
//!   builder, and the child process implementation of it
//! - [`progress`]: parsing of the engine's JSON progress events and their
//!   translation into log lines
//! - [`FeatureDetector`]: finds icon-sized regions in a background image
//! - [`layout`]: grid and feature snapping for icon placement
//! - [`license`]: renders the license template shown when the image opens
//!
//! # Engine protocol
//!
//! The engine receives an [`EngineRequest`] as JSON on stdin and writes one
//! JSON object per line to stdout:
//!
//! ```text
//! {"type": "build::started"}
//! {"type": "operation::start", "operation": "dmg::create"}
//! {"type": "operation::finished"}
//! {"type": "build::finished"}
//! ```
//!
//! Lines that are not JSON objects are kept in the build log as engine output.

pub mod engine;
pub mod features;
pub mod layout;
pub mod license;
pub mod orchestrator;
pub mod progress;

pub use engine::{BuildEngine, BuildError, EngineMessage, EngineRequest, ImageSettings, ProcessEngine};
pub use features::{Centroid, FeatureDetector, FeatureError, Region, filter_regions};
pub use layout::{Point, snap, snap_to_features, snap_to_grid};
pub use license::{LicenseError, LicenseSettings, load_license};
pub use orchestrator::{BuildHandle, BuildOrchestrator, BuildOutcome, build_count};
pub use progress::{Operation, ProgressEvent, ProgressUpdate, UpdateKind, translate};
