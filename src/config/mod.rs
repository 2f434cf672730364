pub mod loader;
pub mod schema;

pub use loader::{
    load_from_path, load_from_str, locate, resolve, ConfigError, CONFIG_ENV, DEFAULT_CONFIG_FILE,
};
pub use schema::{
    DateSettings, DocumentSettings, PatternSettings, ReferenceSettings, Settings, ValidationError,
    ValidationIssue,
};
