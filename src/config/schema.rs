use crate::dates;
use crate::patterns::{self, PatternLibrary};
use crate::reference::LoadOptions;
use crate::workflow::{DEFAULT_OUTPUT_SUFFIX, DOCUMENT_MEMBER};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Settings {
    #[serde(default)]
    pub reference: ReferenceSettings,
    #[serde(default)]
    pub document: DocumentSettings,
    #[serde(default)]
    pub patterns: PatternSettings,
    #[serde(default)]
    pub dates: DateSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if let Some(path) = &self.reference.path {
            if path.as_os_str().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    section: "reference",
                    field: "path",
                });
            }
        }
        if self.reference.delimiter_byte().is_none() {
            issues.push(ValidationIssue::InvalidValue {
                section: "reference",
                field: "delimiter",
                message: format!(
                    "expected a single ASCII character, found {:?}",
                    self.reference.delimiter
                ),
            });
        }

        if self.document.member.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                section: "document",
                field: "member",
            });
        }
        if self.document.output_suffix.is_empty() {
            issues.push(ValidationIssue::MissingField {
                section: "document",
                field: "output_suffix",
            });
        }

        if self.patterns.marker.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                section: "patterns",
                field: "marker",
            });
        } else if let Err(err) = PatternLibrary::with_marker(&self.patterns.marker) {
            issues.push(ValidationIssue::InvalidValue {
                section: "patterns",
                field: "marker",
                message: err.to_string(),
            });
        }

        if let Err(err) = dates::validate_pattern(&self.dates.format) {
            issues.push(ValidationIssue::InvalidValue {
                section: "dates",
                field: "format",
                message: err.to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.reference.delimiter_byte().unwrap_or(b','),
            has_header: self.reference.has_header,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceSettings {
    /// Reference table file; the CLI requires one from here or `--table`
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub has_header: bool,
}

impl ReferenceSettings {
    pub fn delimiter_byte(&self) -> Option<u8> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Some(*byte),
            _ => None,
        }
    }
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: default_delimiter(),
            has_header: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentSettings {
    #[serde(default = "default_member")]
    pub member: String,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            member: default_member(),
            output_suffix: default_output_suffix(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatternSettings {
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DateSettings {
    #[serde(default = "default_date_format")]
    pub format: String,
}

impl Default for DateSettings {
    fn default() -> Self {
        Self {
            format: default_date_format(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_member() -> String {
    DOCUMENT_MEMBER.to_string()
}

fn default_output_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}

fn default_marker() -> String {
    patterns::DEFAULT_MARKER.to_string()
}

fn default_date_format() -> String {
    dates::DEFAULT_FORMAT.to_string()
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Sections with at least one issue, in the order first reported.
    pub fn sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        for issue in &self.issues {
            if !sections.contains(&issue.section()) {
                sections.push(issue.section());
            }
        }
        sections
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        section: &'static str,
        field: &'static str,
    },
    InvalidValue {
        section: &'static str,
        field: &'static str,
        message: String,
    },
}

impl ValidationIssue {
    pub fn section(&self) -> &'static str {
        match self {
            ValidationIssue::MissingField { section, .. }
            | ValidationIssue::InvalidValue { section, .. } => section,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { section, field } => {
                write!(f, "[{section}] {field} must not be empty")
            }
            ValidationIssue::InvalidValue {
                section,
                field,
                message,
            } => write!(f, "[{section}] invalid {field}: {message}"),
        }
    }
}
