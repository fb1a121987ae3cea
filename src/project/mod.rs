//! The open disk image project.
//!
//! A [`Project`] owns the [`Configuration`] being edited along with the file it
//! came from, a modified flag and a list of observers. Front ends never touch
//! the configuration fields directly; they go through the typed setters (or
//! the string keyed [`PropertyRegistry`]) so that invariants are enforced and
//! observers hear about every change.
//!
//! A project is single threaded. The build orchestrator works from a
//! [`Project::snapshot`] and never sees the live configuration.

pub mod paths;
pub mod persistence;
pub mod properties;

pub use paths::{normalize_path, normalize_path_with_home};
pub use properties::{PropertyKind, PropertyRegistry, PropertyValue, RegistrationError};

use crate::models::{
    Configuration, DiskImageFormat, FileEntry, GridSize, SymlinkEntry, TextPosition,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use thiserror::Error;

/// Errors from loading, saving or editing a project.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Failed to parse project file {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize project: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown property '{0}'")]
    InvalidPropertyKey(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("No {list} entry at index {index}")]
    EntryOutOfRange { list: &'static str, index: usize },

    #[error("Project has never been saved; a path is required")]
    NoPath,
}

/// Notification sent to project observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectChange {
    PropertyChanged {
        key: &'static str,
        value: PropertyValue,
    },
    FilesChanged {
        count: usize,
    },
    SymlinksChanged {
        count: usize,
    },
    /// The whole configuration was replaced (load or clear).
    Reset,
    Saved {
        path: Utf8PathBuf,
    },
}

/// Handle returned by [`Project::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

type Observer = Box<dyn FnMut(&ProjectChange)>;

pub struct Project {
    config: Configuration,
    path: Option<Utf8PathBuf>,
    modified: bool,
    registry: PropertyRegistry,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: usize,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// A new, unsaved project with default settings.
    pub fn new() -> Self {
        Self::with_configuration(Configuration::default(), None)
    }

    /// Open a project file.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let config = persistence::load(path)?;
        Ok(Self::with_configuration(config, Some(path.to_path_buf())))
    }

    fn with_configuration(config: Configuration, path: Option<Utf8PathBuf>) -> Self {
        Self {
            config,
            path,
            modified: false,
            registry: PropertyRegistry::standard(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Replace the current configuration with the contents of `path`.
    ///
    /// On error the current configuration is left untouched.
    pub fn load(&mut self, path: impl AsRef<Utf8Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        self.config = persistence::load(path)?;
        self.path = Some(path.to_path_buf());
        self.modified = false;
        self.notify(ProjectChange::Reset);
        Ok(())
    }

    /// Save to the file the project was opened from or last saved to.
    pub fn save(&mut self) -> Result<(), ProjectError> {
        let path = self.path.clone().ok_or(ProjectError::NoPath)?;
        self.save_as(path)
    }

    pub fn save_as(&mut self, path: impl AsRef<Utf8Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        persistence::save(&self.config, path)?;
        self.path = Some(path.to_path_buf());
        self.modified = false;
        self.notify(ProjectChange::Saved {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Reset to the default configuration, keeping the file path.
    pub fn clear(&mut self) {
        self.config = Configuration::default();
        self.modified = true;
        self.notify(ProjectChange::Reset);
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// A copy of the configuration for handing to another thread.
    pub fn snapshot(&self) -> Configuration {
        self.config.clone()
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Directory used to resolve relative paths in the configuration.
    pub fn base_dir(&self) -> Option<&Utf8Path> {
        self.path
            .as_deref()
            .and_then(|path| path.parent())
            .filter(|parent| !parent.as_str().is_empty())
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Resolve a path from the configuration against this project's location.
    pub fn normalize(&self, raw: &str) -> Utf8PathBuf {
        normalize_path(raw, self.base_dir())
    }

    /// The disk image to write: `requested` if non-empty, otherwise the
    /// configured filename. None if neither is set.
    pub fn output_path(&self, requested: Option<&str>) -> Option<Utf8PathBuf> {
        let raw = requested
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .or_else(|| Some(self.config.filename.trim()).filter(|raw| !raw.is_empty()))?;
        Some(self.normalize(raw))
    }

    pub fn total_files(&self) -> usize {
        self.config.total_files()
    }

    pub fn total_symlinks(&self) -> usize {
        self.config.total_symlinks()
    }

    // Observers

    /// Register an observer that is called after every change.
    pub fn subscribe(&mut self, observer: impl FnMut(&ProjectChange) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn notify(&mut self, change: ProjectChange) {
        tracing::debug!("Project change: {:?}", change);
        for (_, observer) in self.observers.iter_mut() {
            observer(&change);
        }
    }

    // Properties

    pub fn property(&self, key: &str) -> Result<PropertyValue, ProjectError> {
        self.registry.get(&self.config, key)
    }

    /// Every property and its current value, in registration order.
    pub fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        self.registry.values(&self.config)
    }

    /// Set a property by key. Observers are only notified when the value changes.
    pub fn set_property(&mut self, key: &str, value: PropertyValue) -> Result<(), ProjectError> {
        let key = self
            .registry
            .canonical_key(key)
            .ok_or_else(|| ProjectError::InvalidPropertyKey(key.to_string()))?;

        if self.registry.get(&self.config, key)? == value {
            return Ok(());
        }

        self.registry.set(&mut self.config, key, value.clone())?;
        self.modified = true;
        self.notify(ProjectChange::PropertyChanged { key, value });
        Ok(())
    }

    /// Parse `raw` according to the property's kind and set it.
    pub fn set_property_str(&mut self, key: &str, raw: &str) -> Result<(), ProjectError> {
        let kind = self
            .registry
            .kind(key)
            .ok_or_else(|| ProjectError::InvalidPropertyKey(key.to_string()))?;
        let value = PropertyValue::parse(kind, raw).map_err(|reason| ProjectError::InvalidValue {
            key: key.to_string(),
            reason,
        })?;
        self.set_property(key, value)
    }

    pub fn set_background(&mut self, path: impl Into<String>) -> Result<(), ProjectError> {
        self.set_property("background", PropertyValue::Text(path.into()))
    }

    pub fn set_icon(&mut self, path: impl Into<String>) -> Result<(), ProjectError> {
        self.set_property("icon", PropertyValue::Text(path.into()))
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) -> Result<(), ProjectError> {
        self.set_property("filename", PropertyValue::Text(filename.into()))
    }

    pub fn set_volume_name(&mut self, name: impl Into<String>) -> Result<(), ProjectError> {
        self.set_property("volumename", PropertyValue::Text(name.into()))
    }

    pub fn set_format(&mut self, format: DiskImageFormat) -> Result<(), ProjectError> {
        self.set_property("format", PropertyValue::Format(format))
    }

    pub fn set_icon_size(&mut self, size: u32) -> Result<(), ProjectError> {
        self.set_property("iconsize", PropertyValue::Integer(size))
    }

    pub fn set_grid_size(&mut self, size: GridSize) -> Result<(), ProjectError> {
        self.set_property("gridsize", PropertyValue::Size(size))
    }

    pub fn set_snap_to_grid(&mut self, snap: bool) -> Result<(), ProjectError> {
        self.set_property("snaptogrid", PropertyValue::Boolean(snap))
    }

    pub fn set_snap_to_features(&mut self, snap: bool) -> Result<(), ProjectError> {
        self.set_property("snaptofeatures", PropertyValue::Boolean(snap))
    }

    pub fn set_grid_visible(&mut self, visible: bool) -> Result<(), ProjectError> {
        self.set_property("gridvisible", PropertyValue::Boolean(visible))
    }

    pub fn set_icons_visible(&mut self, visible: bool) -> Result<(), ProjectError> {
        self.set_property("iconsvisible", PropertyValue::Boolean(visible))
    }

    pub fn set_feature_size(&mut self, area: u32) -> Result<(), ProjectError> {
        self.set_property("featuresize", PropertyValue::Integer(area))
    }

    pub fn set_detect_features(&mut self, detect: bool) -> Result<(), ProjectError> {
        self.set_property("detectfeatures", PropertyValue::Boolean(detect))
    }

    pub fn set_text_size(&mut self, size: u32) -> Result<(), ProjectError> {
        self.set_property("textsize", PropertyValue::Integer(size))
    }

    pub fn set_text_position(&mut self, position: TextPosition) -> Result<(), ProjectError> {
        self.set_property("textposition", PropertyValue::TextPosition(position))
    }

    /// Set the license template; an empty path removes the license.
    pub fn set_license(&mut self, path: impl Into<String>) -> Result<(), ProjectError> {
        self.set_property("license", PropertyValue::Text(path.into()))
    }

    // Files and symlinks

    pub fn files(&self) -> &[FileEntry] {
        &self.config.files
    }

    pub fn symlinks(&self) -> &[SymlinkEntry] {
        &self.config.symlinks
    }

    /// Append a file and return its index.
    pub fn add_file(&mut self, file: impl Into<String>, x: i32, y: i32) -> usize {
        self.config.files.push(FileEntry {
            x,
            y,
            file: file.into(),
        });
        self.files_changed();
        self.config.files.len() - 1
    }

    pub fn move_file(&mut self, index: usize, x: i32, y: i32) -> Result<(), ProjectError> {
        let entry = self
            .config
            .files
            .get_mut(index)
            .ok_or(ProjectError::EntryOutOfRange { list: "files", index })?;

        if (entry.x, entry.y) != (x, y) {
            entry.x = x;
            entry.y = y;
            self.files_changed();
        }
        Ok(())
    }

    pub fn remove_file(&mut self, index: usize) -> Result<FileEntry, ProjectError> {
        if index >= self.config.files.len() {
            return Err(ProjectError::EntryOutOfRange { list: "files", index });
        }
        let removed = self.config.files.remove(index);
        self.files_changed();
        Ok(removed)
    }

    /// Append a symlink and return its index.
    pub fn add_symlink(
        &mut self,
        name: impl Into<String>,
        shortcut: impl Into<String>,
        x: i32,
        y: i32,
    ) -> usize {
        self.config.symlinks.push(SymlinkEntry {
            x,
            y,
            name: name.into(),
            shortcut: shortcut.into(),
        });
        self.symlinks_changed();
        self.config.symlinks.len() - 1
    }

    pub fn move_symlink(&mut self, index: usize, x: i32, y: i32) -> Result<(), ProjectError> {
        let entry = self
            .config
            .symlinks
            .get_mut(index)
            .ok_or(ProjectError::EntryOutOfRange {
                list: "symlinks",
                index,
            })?;

        if (entry.x, entry.y) != (x, y) {
            entry.x = x;
            entry.y = y;
            self.symlinks_changed();
        }
        Ok(())
    }

    pub fn remove_symlink(&mut self, index: usize) -> Result<SymlinkEntry, ProjectError> {
        if index >= self.config.symlinks.len() {
            return Err(ProjectError::EntryOutOfRange {
                list: "symlinks",
                index,
            });
        }
        let removed = self.config.symlinks.remove(index);
        self.symlinks_changed();
        Ok(removed)
    }

    fn files_changed(&mut self) {
        self.modified = true;
        let count = self.config.files.len();
        self.notify(ProjectChange::FilesChanged { count });
    }

    fn symlinks_changed(&mut self) {
        self.modified = true;
        let count = self.config.symlinks.len();
        self.notify(ProjectChange::SymlinksChanged { count });
    }
}
