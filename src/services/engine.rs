use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::license::{LicenseError, LicenseSettings};
use crate::models::{Configuration, DiskImageFormat, EngineSettings, TextPosition};
use crate::project::normalize_path;

/// Errors from starting or running a build
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("A build is already in progress")]
    AlreadyInProgress,

    #[error("No output path: set a filename in the project or pass one explicitly")]
    MissingOutputPath,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to start build engine '{program}': {source}")]
    EngineSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    License(#[from] LicenseError),

    /// The engine's own error text, unchanged.
    #[error("{0}")]
    EngineFailure(String),
}

/// Everything the engine needs to build one disk image.
///
/// This is a snapshot: once built, it has no link to the project it came from.
/// All paths are already normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineRequest {
    pub filename: String,
    pub volume_name: String,
    pub settings: ImageSettings,
}

/// dmgbuild style settings for the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSettings {
    pub format: DiskImageFormat,
    pub files: Vec<String>,
    /// Symlink name to link target.
    pub symlinks: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Keyed by file basename or symlink name, as the Finder sees them.
    pub icon_locations: IndexMap<String, (i32, i32)>,
    pub icon_size: u32,
    pub text_size: u32,
    pub label_pos: TextPosition,
    /// Rendered license text; filled in by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseSettings>,
}

impl EngineRequest {
    /// Build a request from a configuration.
    ///
    /// Relative paths are resolved against `base_dir`, the directory holding
    /// the project file.
    pub fn from_configuration(
        config: &Configuration,
        output: &Utf8Path,
        base_dir: Option<&Utf8Path>,
    ) -> Self {
        let optional_path = |raw: &str| {
            let raw = raw.trim();
            (!raw.is_empty()).then(|| normalize_path(raw, base_dir).into_string())
        };

        let mut files = Vec::with_capacity(config.files.len());
        let mut icon_locations = IndexMap::new();

        for entry in &config.files {
            let path: Utf8PathBuf = normalize_path(&entry.file, base_dir);
            let name = path.file_name().unwrap_or(path.as_str()).to_string();
            icon_locations.insert(name, (entry.x, entry.y));
            files.push(path.into_string());
        }

        let mut symlinks = IndexMap::new();
        for entry in &config.symlinks {
            symlinks.insert(entry.name.clone(), entry.shortcut.clone());
            icon_locations.insert(entry.name.clone(), (entry.x, entry.y));
        }

        let volume_name = if config.volumename.trim().is_empty() {
            output.file_stem().unwrap_or_default().to_string()
        } else {
            config.volumename.clone()
        };

        Self {
            filename: output.to_string(),
            volume_name,
            settings: ImageSettings {
                format: config.format,
                files,
                symlinks,
                icon: optional_path(&config.icon),
                background: optional_path(&config.background),
                icon_locations,
                icon_size: config.iconsize,
                text_size: config.textsize,
                label_pos: config.textposition,
                license: None,
            },
        }
    }
}

/// A message from a running engine, in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    /// A line that looked like a JSON progress event.
    Progress(String),
    /// Any other output line.
    Output(String),
    /// The engine failed; the text is passed on as-is.
    Failure(String),
    /// The engine has exited. Always the last message.
    Exited(Option<i32>),
}

/// Something that can build a disk image.
///
/// `launch` returns once the build has been started. Every message after that
/// goes through `sink`, ending with [`EngineMessage::Exited`].
#[cfg_attr(test, mockall::automock)]
pub trait BuildEngine: Send + Sync {
    fn launch(
        &self,
        request: EngineRequest,
        sink: mpsc::UnboundedSender<EngineMessage>,
    ) -> Result<(), BuildError>;
}

/// Runs the external builder as a child process.
///
/// The request is written to the child's stdin as JSON. Each stdout line is
/// forwarded in order; stderr is collected and becomes the failure message
/// when the process exits non-zero.
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl BuildEngine for ProcessEngine {
    fn launch(
        &self,
        request: EngineRequest,
        sink: mpsc::UnboundedSender<EngineMessage>,
    ) -> Result<(), BuildError> {
        let payload = serde_json::to_vec(&request)
            .map_err(|e| BuildError::InvalidConfiguration(e.to_string()))?;

        tracing::info!("Launching build engine: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::EngineSpawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::warn!("Failed to send request to build engine: {}", e);
                }
                // Dropping stdin closes it so the engine sees EOF
                drop(stdin);
            }

            let stderr_task = tokio::spawn(async move {
                let mut collected = String::new();
                if let Some(mut stderr) = stderr {
                    if let Err(e) = stderr.read_to_string(&mut collected).await {
                        tracing::warn!("Failed to read build engine stderr: {}", e);
                    }
                }
                collected
            });

            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            let _ = sink.send(classify_line(line));
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!("Failed to read build engine output: {}", e);
                            break;
                        }
                    }
                }
            }

            let stderr_text = stderr_task.await.unwrap_or_default();

            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    let _ = sink.send(EngineMessage::Failure(format!(
                        "Failed to wait for build engine: {}",
                        e
                    )));
                    let _ = sink.send(EngineMessage::Exited(None));
                    return;
                }
            };

            if code != Some(0) {
                let message = if stderr_text.trim().is_empty() {
                    match code {
                        Some(code) => format!("Build engine exited with code {}", code),
                        None => "Build engine was terminated by a signal".to_string(),
                    }
                } else {
                    stderr_text.trim_end().to_string()
                };
                let _ = sink.send(EngineMessage::Failure(message));
            } else if !stderr_text.trim().is_empty() {
                tracing::debug!("Build engine stderr: {}", stderr_text.trim_end());
            }

            let _ = sink.send(EngineMessage::Exited(code));
        });

        Ok(())
    }
}

/// JSON object lines are progress events; anything else is plain output.
pub fn classify_line(line: String) -> EngineMessage {
    if line.trim_start().starts_with('{') {
        EngineMessage::Progress(line)
    } else {
        EngineMessage::Output(line)
    }
}
