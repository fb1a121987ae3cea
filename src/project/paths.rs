use camino::{Utf8Path, Utf8PathBuf};

/// Resolve a path from a project file.
///
/// - `~` or `~/...` expands to the user's home directory, and is returned
///   unchanged when there is no home directory
/// - a relative path is resolved against `base_dir`, the directory that holds
///   the project file
/// - anything else is returned unchanged
///
/// No filesystem access is performed; the only outside input is the home
/// directory.
pub fn normalize_path(raw: &str, base_dir: Option<&Utf8Path>) -> Utf8PathBuf {
    normalize_path_with_home(raw, base_dir, home_dir().as_deref())
}

/// [`normalize_path`] with an explicit home directory.
pub fn normalize_path_with_home(
    raw: &str,
    base_dir: Option<&Utf8Path>,
    home: Option<&Utf8Path>,
) -> Utf8PathBuf {
    let expanded = match (expand_tilde(raw), home) {
        (Some(rest), Some(home)) if rest.is_empty() => home.to_path_buf(),
        (Some(rest), Some(home)) => home.join(rest),
        (Some(_), None) => return Utf8PathBuf::from(raw),
        (None, _) => Utf8PathBuf::from(raw),
    };

    match base_dir {
        Some(base) if expanded.is_relative() => base.join(expanded),
        _ => expanded,
    }
}

/// Returns the remainder after a leading `~` or `~/`, or None if there is no tilde.
fn expand_tilde(raw: &str) -> Option<&str> {
    if raw == "~" {
        return Some("");
    }

    raw.strip_prefix("~/")
}

fn home_dir() -> Option<Utf8PathBuf> {
    dirs::home_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}
