use crate::config::schema::{Settings, ValidationError};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "NORM_PATCHER_CONFIG";

/// Settings file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "norm-patcher.toml";

/// Failure to turn a settings file into [`Settings`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read settings file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not valid TOML{}: {source}", origin(.path), at_line(.line))]
    Syntax {
        path: Option<PathBuf>,
        /// 1-based line of the offending input, when known.
        line: Option<usize>,
        source: toml_edit::de::Error,
    },

    #[error("{} has invalid {} settings:\n{source}", origin(.path), section_list(.sections))]
    Invalid {
        path: Option<PathBuf>,
        sections: Vec<&'static str>,
        source: ValidationError,
    },
}

impl ConfigError {
    /// Attach the file the settings came from.
    fn in_file(self, file: &Path) -> Self {
        match self {
            ConfigError::Syntax {
                path: None,
                line,
                source,
            } => ConfigError::Syntax {
                path: Some(file.to_path_buf()),
                line,
                source,
            },
            ConfigError::Invalid {
                path: None,
                sections,
                source,
            } => ConfigError::Invalid {
                path: Some(file.to_path_buf()),
                sections,
                source,
            },
            other => other,
        }
    }
}

fn origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "settings input".to_string(),
    }
}

fn at_line(line: &Option<usize>) -> String {
    line.map(|line| format!(" (line {line})")).unwrap_or_default()
}

fn section_list(sections: &[&'static str]) -> String {
    sections
        .iter()
        .map(|section| format!("[{section}]"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate settings from TOML text.
pub fn load_from_str(input: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml_edit::de::from_str(input).map_err(|source| {
        let line = source
            .span()
            .map(|span| {
                let before = &input.as_bytes()[..span.start.min(input.len())];
                before.iter().filter(|&&b| b == b'\n').count() + 1
            });
        ConfigError::Syntax {
            path: None,
            line,
            source,
        }
    })?;
    settings.validate().map_err(|source| ConfigError::Invalid {
        path: None,
        sections: source.sections(),
        source,
    })?;
    Ok(settings)
}

/// Read, parse and validate a settings file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.in_file(path))
}

/// Find the settings file to use, if any.
///
/// An explicit path wins, then `$NORM_PATCHER_CONFIG`, then
/// `norm-patcher.toml` in `cwd`. The explicit and environment paths are
/// returned even when they do not exist so loading reports the error.
pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = cwd.join(DEFAULT_CONFIG_FILE);
    local.is_file().then_some(local)
}

/// Load settings following [`locate`], falling back to defaults.
pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<Settings, ConfigError> {
    match locate(explicit, cwd) {
        Some(path) => {
            debug!("loading settings from {}", path.display());
            load_from_path(&path)
        }
        None => {
            debug!("no settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;
    use tempfile::TempDir;

    #[test]
    fn test_empty_input_gives_defaults() {
        let settings = load_from_str("").unwrap();
        assert_eq!(settings.document.member, "word/document.xml");
        assert_eq!(settings.document.output_suffix, "_FFNORMA");
        assert_eq!(settings.patterns.marker, "PN");
        assert_eq!(settings.dates.format, "%d-%m-%Y");
        assert_eq!(settings.load_options().delimiter, b',');
        assert!(settings.reference.path.is_none());
    }

    #[test]
    fn test_full_settings() {
        let input = r#"
[reference]
path = "db/baza.csv"
delimiter = ";"
has_header = true

[document]
output_suffix = "_new"

[dates]
format = "%Y/%m/%d"
"#;
        let settings = load_from_str(input).unwrap();
        assert_eq!(
            settings.reference.path.as_deref(),
            Some(Path::new("db/baza.csv"))
        );
        let options = settings.load_options();
        assert_eq!(options.delimiter, b';');
        assert!(options.has_header);
        assert_eq!(settings.document.output_suffix, "_new");
        assert_eq!(settings.document.member, "word/document.xml");
        assert_eq!(settings.dates.format, "%Y/%m/%d");
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let input = r#"
[reference]
delimiter = ";;"

[document]
member = " "

[dates]
format = "%Q"
"#;
        let err = load_from_str(input).unwrap_err();
        match err {
            ConfigError::Invalid {
                path: None,
                sections,
                source,
            } => {
                assert_eq!(sections, vec!["reference", "document", "dates"]);
                assert_eq!(source.issues.len(), 3);
                assert!(matches!(
                    source.issues[1],
                    ValidationIssue::MissingField {
                        section: "document",
                        field: "member"
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("norm-patcher.toml");
        fs::write(&path, "[reference\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Syntax {
                path: Some(_),
                line: Some(_),
                ..
            }
        ));
        let message = err.to_string();
        assert!(message.contains("norm-patcher.toml"));
        assert!(message.contains("(line "));
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "").unwrap();
        let explicit = dir.path().join("other.toml");

        assert_eq!(
            locate(Some(&explicit), dir.path()),
            Some(explicit.clone())
        );
        assert!(matches!(
            resolve(Some(&explicit), dir.path()),
            Err(ConfigError::Unreadable { .. })
        ));
    }
}
