//! Error types for deck field extraction.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading rules or running an extraction.
///
/// Unmatched fields are not errors; they are simply absent from the result.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read an input or configuration file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON shape feed or configuration.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Malformed YAML configuration.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A rule entry is malformed or incomplete.
    #[error("Invalid rule configuration: {0}")]
    ConfigError(String),

    /// A rule's regular expression does not compile.
    #[error("Invalid pattern for field '{field}': {source}")]
    PatternError {
        field: String,
        #[source]
        source: fancy_regex::Error,
    },

    /// The requested report profile is not defined in the fields file.
    #[error("Unknown report profile '{profile}', available: {available}")]
    UnknownProfile { profile: String, available: String },

    /// The requested document version has no title layout.
    #[error("Unsupported document version '{version}', available: {available}")]
    UnknownVersion { version: String, available: String },

    /// A slide record from the shape feed is invalid.
    #[error("Invalid slide: {0}")]
    SlideError(String),
}
