//! Error types for synthesis and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors crossing the synthesis boundary.
///
/// Every variant is recoverable: the engine keeps running and the call that
/// failed leaves no partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// An argument was out of range or inconsistent.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A request exceeded preallocated capacity.
    #[error("capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        /// Amount requested (samples, voices or lanes).
        requested: usize,
        /// Amount available.
        capacity: usize,
    },

    /// A named preset or method does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up, e.g. "preset".
        kind: &'static str,
        /// Name that failed to resolve.
        name: String,
    },
}

impl SynthesisError {
    /// Unknown synthesis method name.
    pub fn unknown_method(name: impl Into<String>) -> Self {
        SynthesisError::NotFound {
            kind: "synthesis method",
            name: name.into(),
        }
    }

    /// Unknown preset name.
    pub fn unknown_preset(name: impl Into<String>) -> Self {
        SynthesisError::NotFound {
            kind: "preset",
            name: name.into(),
        }
    }
}

/// Errors loading or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A field holds an unusable value
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn synthesis_error_display() {
        let err = SynthesisError::CapacityExceeded {
            requested: 1024,
            capacity: 512,
        };
        assert_eq!(err.to_string(), "capacity exceeded: requested 1024, capacity 512");

        let err = SynthesisError::unknown_preset("tuvan_throat");
        assert_eq!(err.to_string(), "preset not found: tuvan_throat");

        let err = SynthesisError::InvalidInput("velocity out of range");
        assert_eq!(err.to_string(), "invalid input: velocity out of range");
    }

    #[test]
    fn unknown_method_names_kind() {
        let err = SynthesisError::unknown_method("granular");
        assert!(matches!(err, SynthesisError::NotFound { kind: "synthesis method", ref name } if name == "granular"));
    }

    #[test]
    fn read_file_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "mock");
        let err = ConfigError::read_file("/etc/vocalis.toml", io);
        assert!(err.to_string().contains("/etc/vocalis.toml"));
        assert!(err.source().is_some(), "ReadFile should expose the io error");
    }

    #[test]
    fn invalid_display() {
        let err = ConfigError::invalid("max_voices", "must be at least 1");
        assert_eq!(err.to_string(), "invalid value for 'max_voices': must be at least 1");
        assert!(err.source().is_none());
    }
}
