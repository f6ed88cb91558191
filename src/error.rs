use std::path::PathBuf;

use thiserror::Error;

use crate::libxml2::NativeDiagnostic;

/// Main crate error type that encompasses all possible failure modes
///
/// Per-operation failures on a [`Writer`](crate::Writer) are reported as `false`
/// instead; this type covers construction, flushing and configuration.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error(transparent)]
    LibXml2(#[from] LibXml2Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    #[error("Writer session already closed")]
    Closed,
}

impl BindingError {
    /// True when the native library failed to produce an object.
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            BindingError::LibXml2(
                LibXml2Error::DtdParseFailed { .. } | LibXml2Error::CreationFailed { .. }
            )
        )
    }

    /// The native diagnostic attached to this error, if any.
    pub fn diagnostic(&self) -> Option<&NativeDiagnostic> {
        match self {
            BindingError::LibXml2(err) => err.diagnostic(),
            _ => None,
        }
    }

    pub(crate) fn interior_nul(argument: &'static str) -> Self {
        BindingError::InvalidArgument {
            argument,
            reason: "contains an interior NUL byte".to_string(),
        }
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("DTD parsing failed: {diagnostic}")]
    DtdParseFailed { diagnostic: NativeDiagnostic },

    #[error("Document parsing failed: {diagnostic}")]
    DocumentParseFailed { diagnostic: NativeDiagnostic },

    #[error("Creating {what} failed: {diagnostic}")]
    CreationFailed {
        what: &'static str,
        diagnostic: NativeDiagnostic,
    },

    #[error("Flushing writer output failed: {diagnostic}")]
    FlushFailed { diagnostic: NativeDiagnostic },

    #[error("Serializing document failed: {diagnostic}")]
    SerializationFailed { diagnostic: NativeDiagnostic },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,
}

impl LibXml2Error {
    pub fn diagnostic(&self) -> Option<&NativeDiagnostic> {
        match self {
            LibXml2Error::DtdParseFailed { diagnostic }
            | LibXml2Error::DocumentParseFailed { diagnostic }
            | LibXml2Error::CreationFailed { diagnostic, .. }
            | LibXml2Error::FlushFailed { diagnostic }
            | LibXml2Error::SerializationFailed { diagnostic } => Some(diagnostic),
            LibXml2Error::ValidationContextCreationFailed => None,
        }
    }
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration value: {field} = {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BindingError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
