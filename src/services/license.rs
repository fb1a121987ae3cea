use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Datelike, Local};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::models::UserSettings;

/// Language the engine shows when the system language has no license text.
pub const DEFAULT_LICENSE_LANGUAGE: &str = "en_US";

/// Errors from loading a license template
#[derive(Error, Debug)]
pub enum LicenseError {
    #[error("Failed to read license template {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The `license` block of the engine settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseSettings {
    #[serde(rename = "default-language")]
    pub default_language: String,
    /// Language code to license text.
    pub licenses: IndexMap<String, String>,
}

impl LicenseSettings {
    pub fn new(text: String) -> Self {
        let mut licenses = IndexMap::new();
        licenses.insert(DEFAULT_LICENSE_LANGUAGE.to_string(), text);
        Self {
            default_language: DEFAULT_LICENSE_LANGUAGE.to_string(),
            licenses,
        }
    }
}

/// Placeholder values for a license template, keyed by placeholder name.
pub fn replacements(user: &UserSettings, now: DateTime<Local>) -> IndexMap<&'static str, String> {
    let mut values = IndexMap::new();
    values.insert("fullname", user.fullname.clone());
    values.insert("username", user.username.clone());
    values.insert("email", user.email.clone());
    values.insert("year", now.year().to_string());
    values
}

/// Replace every `{{name}}` in `template` with its value.
///
/// Unknown placeholders are left as they are.
pub fn render(template: &str, values: &IndexMap<&'static str, String>) -> String {
    let mut text = template.to_string();
    for (name, value) in values {
        text = text.replace(&format!("{{{{{}}}}}", name), value);
    }
    text
}

/// Read the template at `path` and render it for `user`.
pub fn load_license(
    path: &Utf8Path,
    user: &UserSettings,
    now: DateTime<Local>,
) -> Result<LicenseSettings, LicenseError> {
    let template = std::fs::read_to_string(path).map_err(|source| LicenseError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Loaded license template {} ({} bytes)", path, template.len());
    Ok(LicenseSettings::new(render(&template, &replacements(user, now))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn jane() -> UserSettings {
        UserSettings {
            fullname: "Jane Roe".to_string(),
            username: "jroe".to_string(),
            email: "jane@example.org".to_string(),
        }
    }

    fn new_year_2031() -> DateTime<Local> {
        Local.with_ymd_and_hms(2031, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_render_substitutes_user_and_year() {
        let values = replacements(&jane(), new_year_2031());
        let text = render(
            "Copyright (c) {{year}} {{fullname}} <{{email}}> ({{username}}), {{other}}",
            &values,
        );
        assert_eq!(
            text,
            "Copyright (c) 2031 Jane Roe <jane@example.org> (jroe), {{other}}"
        );
    }

    #[test]
    fn test_load_license_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("LICENSE.txt")).unwrap();
        std::fs::write(&path, "MIT License\n\nCopyright {{year}} {{fullname}}\n").unwrap();

        let license = load_license(&path, &jane(), new_year_2031()).unwrap();
        assert_eq!(license.default_language, "en_US");
        assert_eq!(
            license.licenses.get("en_US").map(String::as_str),
            Some("MIT License\n\nCopyright 2031 Jane Roe\n")
        );
    }

    #[test]
    fn test_missing_template_names_the_path() {
        let err = load_license(
            Utf8Path::new("/nonexistent/LICENSE.txt"),
            &jane(),
            new_year_2031(),
        )
        .unwrap_err();
        assert!(matches!(err, LicenseError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/LICENSE.txt"));
    }

    #[test]
    fn test_license_json_shape() {
        let value = serde_json::to_value(LicenseSettings::new("text".to_string())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "default-language": "en_US",
                "licenses": {"en_US": "text"}
            })
        );
    }
}
