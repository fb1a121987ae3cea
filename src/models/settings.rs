use serde::{Deserialize, Serialize};

use super::build_state::DEFAULT_BASELINE_STEPS;

/// Settings for dmgee itself, from `dmgee Settings.yaml`.
///
/// These are per-machine preferences and have nothing to do with any
/// particular disk image project. The snake case aliases are the names used
/// by environment overrides such as `DMGEE__BASELINE_STEPS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "Engine", alias = "engine", default)]
    pub engine: EngineSettings,

    /// Fixed number of steps every build reports, before files and symlinks.
    #[serde(
        rename = "Baseline Steps",
        alias = "baseline_steps",
        default = "default_baseline_steps"
    )]
    pub baseline_steps: usize,

    #[serde(rename = "Log Directory", alias = "log_dir", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Debug Mode", alias = "debug_mode", default)]
    pub debug_mode: bool,

    /// Output used when neither the command line nor the project names one.
    #[serde(rename = "Default Output", alias = "default_output", default)]
    pub default_output: String,

    /// Identity substituted into license templates.
    #[serde(rename = "User", alias = "user", default)]
    pub user: UserSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(rename = "Full Name", alias = "fullname", default = "default_fullname")]
    pub fullname: String,

    #[serde(rename = "Username", alias = "username", default = "default_username")]
    pub username: String,

    #[serde(rename = "Email", alias = "email", default = "default_email")]
    pub email: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            fullname: default_fullname(),
            username: default_username(),
            email: default_email(),
        }
    }
}

/// How to launch the external disk image builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(rename = "Program", alias = "program", default = "default_engine_program")]
    pub program: String,

    #[serde(rename = "Arguments", alias = "args", default = "default_engine_args")]
    pub args: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            args: default_engine_args(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            baseline_steps: default_baseline_steps(),
            log_dir: default_log_dir(),
            debug_mode: false,
            default_output: String::new(),
            user: UserSettings::default(),
        }
    }
}

fn default_engine_program() -> String {
    "python3".to_string()
}

fn default_engine_args() -> Vec<String> {
    vec!["-m".to_string(), "dmgbuild.dmgee".to_string()]
}

fn default_baseline_steps() -> usize {
    DEFAULT_BASELINE_STEPS
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_fullname() -> String {
    "John Doe".to_string()
}

fn default_username() -> String {
    "john.doe".to_string()
}

fn default_email() -> String {
    "john@example.com".to_string()
}
