use camino::Utf8Path;
use std::fs;
use std::io;

use super::ProjectError;
use crate::models::Configuration;

/// Load a project file.
///
/// Unknown keys are ignored and missing keys take their defaults. A file
/// that parses but breaks an invariant (icon size out of range, empty grid
/// while snapping) is rejected rather than clamped.
pub fn load(path: &Utf8Path) -> Result<Configuration, ProjectError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ProjectError::NotFound(path.to_path_buf())
        } else {
            ProjectError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let config = from_toml_str(&contents).map_err(|source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    config
        .check_invariants()
        .map_err(|(key, reason)| ProjectError::InvalidValue {
            key: key.to_string(),
            reason,
        })?;

    tracing::info!(
        "Loaded project from {} ({} files, {} symlinks)",
        path,
        config.files.len(),
        config.symlinks.len()
    );

    Ok(config)
}

/// Write a project file, replacing any existing file.
pub fn save(config: &Configuration, path: &Utf8Path) -> Result<(), ProjectError> {
    let contents = to_toml_string(config)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ProjectError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, contents).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Saved project to {}", path);
    Ok(())
}

pub fn from_toml_str(contents: &str) -> Result<Configuration, toml::de::Error> {
    toml::from_str(contents)
}

pub fn to_toml_string(config: &Configuration) -> Result<String, ProjectError> {
    Ok(toml::to_string(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiskImageFormat, FileEntry, GridSize, SymlinkEntry, TextPosition};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn temp_project() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("layout.toml")).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_load_missing_file() {
        let (_temp_dir, path) = temp_project();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound(_)));
    }

    #[test]
    fn test_load_reads_persisted_keys() {
        let (_temp_dir, path) = temp_project();
        fs::write(
            &path,
            r#"
background = "assets/background.png"
volumename = "Regular Expressions 101"
format = "UDZO"
iconsize = 160
gridsize = [32, 16]
snaptogrid = true
textposition = "right"

[[files]]
x = 199
y = 276
file = "Regular Expressions 101.app"

[[symlinks]]
x = 569
y = 276
name = "Applications"
shortcut = "/Applications"
"#,
        )
        .unwrap();

        let config = load(&path).unwrap();

        assert_eq!(config.background, "assets/background.png");
        assert_eq!(config.volumename, "Regular Expressions 101");
        assert_eq!(config.format, DiskImageFormat::Udzo);
        assert_eq!(config.iconsize, 160);
        assert_eq!(config.gridsize, GridSize::new(32, 16));
        assert!(config.snaptogrid);
        assert_eq!(config.textposition, TextPosition::Right);
        assert_eq!(
            config.files,
            vec![FileEntry {
                x: 199,
                y: 276,
                file: "Regular Expressions 101.app".to_string()
            }]
        );
        assert_eq!(
            config.symlinks,
            vec![SymlinkEntry {
                x: 569,
                y: 276,
                name: "Applications".to_string(),
                shortcut: "/Applications".to_string()
            }]
        );
        // Not in the file, so defaulted
        assert_eq!(config.featuresize, 10000);
        assert_eq!(config.textsize, 12);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = from_toml_str("iconsize = 64\nwindowtitle = \"ignored\"\n").unwrap();
        assert_eq!(config.iconsize, 64);
    }

    #[test]
    fn test_invalid_format_is_a_parse_error() {
        let (_temp_dir, path) = temp_project();
        fs::write(&path, "format = \"ZIP\"\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ProjectError::Parse { .. }));
    }

    #[test]
    fn test_invariant_violation_is_rejected() {
        let (_temp_dir, path) = temp_project();
        fs::write(&path, "iconsize = 4\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidValue { ref key, .. } if key == "iconsize"));
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let (_temp_dir, path) = temp_project();
        let mut config = Configuration::default();
        for (index, name) in ["b.app", "a.app", "c.app"].iter().enumerate() {
            config.files.push(FileEntry {
                x: index as i32 * 10,
                y: 5,
                file: name.to_string(),
            });
        }

        save(&config, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_into_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("nested/dir/layout.toml")).unwrap();

        save(&Configuration::default(), &path).unwrap();
        assert!(path.exists());
    }
}
