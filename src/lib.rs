// dmgee - Visual layout and build orchestration for macOS disk image installers
//
// This is the library crate containing the project model, the build services
// and the command line front end. The binary crate (main.rs) wires them up.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod project;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AppSettings, BuildState, Configuration};
pub use project::{Project, ProjectError};
pub use services::{BuildError, BuildOrchestrator, ProcessEngine};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
