use camino::Utf8Path;
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt;

/// Format used for the wall clock time in build start/finish messages.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One progress event from the build engine, as written on a single stdout line.
///
/// Fields the engine adds beyond the ones used here are ignored, as are
/// event types this version does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename = "build::started")]
    BuildStarted,

    #[serde(rename = "build::finished")]
    BuildFinished,

    #[serde(rename = "operation::start")]
    OperationStart {
        #[serde(default)]
        operation: String,
        /// Set for `file::add`.
        #[serde(default)]
        file: Option<String>,
        /// Set for `symlink::add`.
        #[serde(default)]
        target: Option<String>,
    },

    #[serde(rename = "operation::finished")]
    OperationFinished,

    #[serde(other)]
    Unknown,
}

impl ProgressEvent {
    /// Parse a single line of engine output.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// The `<category>::<action>` operations the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SettingsLoad,
    SizeCalculate,
    DmgCreate,
    DmgShrink,
    BackgroundCreate,
    FilesAdd,
    FileAdd,
    SymlinksAdd,
    SymlinkAdd,
    ExtensionsHide,
    DsStoreCreate,
    DsStoreAddLicense,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::SettingsLoad,
        Operation::SizeCalculate,
        Operation::DmgCreate,
        Operation::DmgShrink,
        Operation::BackgroundCreate,
        Operation::FilesAdd,
        Operation::FileAdd,
        Operation::SymlinksAdd,
        Operation::SymlinkAdd,
        Operation::ExtensionsHide,
        Operation::DsStoreCreate,
        Operation::DsStoreAddLicense,
    ];

    /// Parse `category::action`. Returns None for operations we don't know.
    pub fn parse(raw: &str) -> Option<Self> {
        let (category, action) = raw.split_once("::")?;

        let operation = match (category, action) {
            ("settings", "load") => Operation::SettingsLoad,
            ("size", "calculate") => Operation::SizeCalculate,
            ("dmg", "create") => Operation::DmgCreate,
            ("dmg", "shrink") => Operation::DmgShrink,
            ("background", "create") => Operation::BackgroundCreate,
            ("files", "add") => Operation::FilesAdd,
            ("file", "add") => Operation::FileAdd,
            ("symlinks", "add") => Operation::SymlinksAdd,
            ("symlink", "add") => Operation::SymlinkAdd,
            ("extensions", "hide") => Operation::ExtensionsHide,
            ("dsstore", "create") => Operation::DsStoreCreate,
            ("dsstore", "addlicense") => Operation::DsStoreAddLicense,
            _ => return None,
        };

        Some(operation)
    }

    /// The category half of the operation name, used as the log tag.
    pub fn category(&self) -> &'static str {
        match self {
            Operation::SettingsLoad => "settings",
            Operation::SizeCalculate => "size",
            Operation::DmgCreate | Operation::DmgShrink => "dmg",
            Operation::BackgroundCreate => "background",
            Operation::FilesAdd => "files",
            Operation::FileAdd => "file",
            Operation::SymlinksAdd => "symlinks",
            Operation::SymlinkAdd => "symlink",
            Operation::ExtensionsHide => "extensions",
            Operation::DsStoreCreate | Operation::DsStoreAddLicense => "dsstore",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Operation::SettingsLoad => "load",
            Operation::SizeCalculate => "calculate",
            Operation::DmgCreate | Operation::BackgroundCreate | Operation::DsStoreCreate => {
                "create"
            }
            Operation::DmgShrink => "shrink",
            Operation::FilesAdd | Operation::FileAdd | Operation::SymlinksAdd | Operation::SymlinkAdd => {
                "add"
            }
            Operation::ExtensionsHide => "hide",
            Operation::DsStoreAddLicense => "addlicense",
        }
    }

    /// Log message for this operation. `subject` is the file or symlink
    /// target for the per-item operations.
    pub fn message(&self, subject: Option<&str>) -> String {
        match self {
            Operation::SettingsLoad => "Loading settings...".to_string(),
            Operation::SizeCalculate => "Calculating DMG size...".to_string(),
            Operation::DmgCreate => "Creating DMG...".to_string(),
            Operation::DmgShrink => "Shrinking DMG...".to_string(),
            Operation::BackgroundCreate => "Creating Background Image...".to_string(),
            Operation::FilesAdd => "Adding files to DMG...".to_string(),
            Operation::FileAdd => {
                let file = subject.unwrap_or_default();
                let name = Utf8Path::new(file).file_name().unwrap_or(file);
                format!("Adding file \"{}\"...", name)
            }
            Operation::SymlinksAdd => "Creating symlinks in DMG...".to_string(),
            Operation::SymlinkAdd => format!("Adding symlink \"{}\"...", subject.unwrap_or_default()),
            Operation::ExtensionsHide => "Hiding files...".to_string(),
            Operation::DsStoreCreate => "Creating DS_Store...".to_string(),
            Operation::DsStoreAddLicense => "Adding license...".to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.category(), self.action())
    }
}

/// What a progress event means for the build state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// `build::started`: start the clock and advance.
    Started,
    /// An operation began: advance.
    Step,
    /// `build::finished`: log without advancing and complete the build.
    Finished,
}

/// A progress event translated into a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub kind: UpdateKind,
    pub tag: &'static str,
    pub message: String,
}

/// Translate an event into a log line.
///
/// Returns None for events that produce no message: `operation::finished`,
/// unknown event types and unknown operations.
pub fn translate(event: &ProgressEvent, now: DateTime<Local>) -> Option<ProgressUpdate> {
    match event {
        ProgressEvent::BuildStarted => Some(ProgressUpdate {
            kind: UpdateKind::Started,
            tag: "build",
            message: format!("Build Started at {}.", now.format(TIMESTAMP_FORMAT)),
        }),
        ProgressEvent::BuildFinished => Some(ProgressUpdate {
            kind: UpdateKind::Finished,
            tag: "build",
            message: format!("Build Finished at {}.", now.format(TIMESTAMP_FORMAT)),
        }),
        ProgressEvent::OperationStart {
            operation,
            file,
            target,
        } => {
            let Some(parsed) = Operation::parse(operation) else {
                tracing::debug!("Ignoring unknown operation: {}", operation);
                return None;
            };

            let subject = match parsed {
                Operation::FileAdd => file.as_deref(),
                Operation::SymlinkAdd => target.as_deref(),
                _ => None,
            };

            Some(ProgressUpdate {
                kind: UpdateKind::Step,
                tag: parsed.category(),
                message: parsed.message(subject),
            })
        }
        ProgressEvent::OperationFinished | ProgressEvent::Unknown => None,
    }
}
