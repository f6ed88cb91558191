use serde::{Deserialize, Serialize};

use crate::config::DiagnosticsConfig;
use crate::error::{BindingError, ConfigError, LibXml2Error};
use crate::libxml2::NativeDiagnostic;

/// Verbosity levels for diagnostic reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbosityLevel {
    /// Only show critical errors
    #[default]
    Quiet,
    /// One line per failed writer operation
    Normal,
    /// Add native error domain, code and location
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl std::str::FromStr for VerbosityLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(VerbosityLevel::Quiet),
            "normal" => Ok(VerbosityLevel::Normal),
            "verbose" => Ok(VerbosityLevel::Verbose),
            "debug" => Ok(VerbosityLevel::Debug),
            _ => Err(ConfigError::InvalidValue {
                field: "diagnostics.verbosity".to_string(),
                value: value.to_string(),
                reason: "expected quiet, normal, verbose or debug".to_string(),
            }),
        }
    }
}

/// Reports binding failures on stderr with configurable verbosity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
    show_error_codes: bool,
}

impl DiagnosticReporter {
    /// Create a new reporter with specified verbosity
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
            show_error_codes: false,
        }
    }

    /// Create a new reporter with additional options
    pub fn with_options(
        verbosity: VerbosityLevel,
        show_timestamps: bool,
        show_error_codes: bool,
    ) -> Self {
        Self {
            verbosity,
            show_timestamps,
            show_error_codes,
        }
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self::with_options(
            config.verbosity,
            config.show_timestamps,
            config.show_error_codes,
        )
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    /// Report a writer operation that returned `false`
    pub fn report_operation_failure(
        &self,
        operation: &str,
        diagnostic: Option<&NativeDiagnostic>,
    ) {
        if let Some(line) = self.format_operation_failure(operation, diagnostic) {
            eprintln!("{}", line);
        }
    }

    /// Report a crate error with appropriate verbosity
    pub fn report_error(&self, error: &BindingError) {
        if let Some(formatted) = self.format_error(error) {
            eprintln!("{}", formatted);
        }
    }

    /// Text for a failed writer operation, `None` when nothing is shown.
    pub fn format_operation_failure(
        &self,
        operation: &str,
        diagnostic: Option<&NativeDiagnostic>,
    ) -> Option<String> {
        let mut output = format!("{}{} failed", self.timestamp(), operation);
        match self.verbosity {
            VerbosityLevel::Quiet => return None,
            VerbosityLevel::Normal => {
                if let Some(diagnostic) = diagnostic {
                    output.push_str(&format!(": {}", diagnostic.message));
                }
            }
            VerbosityLevel::Verbose | VerbosityLevel::Debug => match diagnostic {
                Some(diagnostic) => {
                    output.push_str(&format!(": {}", diagnostic));
                    output.push_str(&self.format_native_details(diagnostic));
                    if self.verbosity == VerbosityLevel::Debug {
                        output.push_str(&format!("\nDebug Info: {:?}", diagnostic));
                    }
                }
                None => output.push_str(": no native diagnostic recorded"),
            },
        }
        Some(output)
    }

    /// Text for a crate error, `None` when nothing is shown.
    pub fn format_error(&self, error: &BindingError) -> Option<String> {
        match self.verbosity {
            VerbosityLevel::Quiet => self
                .is_critical_error(error)
                .then(|| format!("ERROR: {}", error)),
            VerbosityLevel::Normal => Some(format!("{}{}", self.timestamp(), error)),
            VerbosityLevel::Verbose => Some(self.format_error_verbose(error)),
            VerbosityLevel::Debug => Some(self.format_error_debug(error)),
        }
    }

    /// Check if an error is considered critical
    fn is_critical_error(&self, error: &BindingError) -> bool {
        matches!(
            error,
            BindingError::Config(_)
                | BindingError::Io(_)
                | BindingError::LibXml2(LibXml2Error::ValidationContextCreationFailed)
        )
    }

    fn format_error_verbose(&self, error: &BindingError) -> String {
        let mut output = format!("{}{}", self.timestamp(), error);
        if let Some(diagnostic) = error.diagnostic() {
            output.push_str(&self.format_native_details(diagnostic));
        }
        match error {
            BindingError::Closed => {
                output.push_str("\nSuggestion: Create a new writer; closed sessions cannot be reopened");
            }
            BindingError::InvalidArgument { .. } => {
                output.push_str("\nSuggestion: Text passed to libxml2 must not contain NUL bytes");
            }
            BindingError::Config(ConfigError::FileNotFound { path }) => {
                output.push_str(&format!(
                    "\nSuggestion: Create a configuration file at: {}",
                    path.display()
                ));
            }
            _ => {}
        }
        output
    }

    fn format_error_debug(&self, error: &BindingError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    fn format_native_details(&self, diagnostic: &NativeDiagnostic) -> String {
        let mut details = format!("\nSeverity: {:?}", diagnostic.level);
        if self.show_error_codes {
            details.push_str(&format!(
                "\nNative Error: domain {} code {}",
                diagnostic.domain, diagnostic.code
            ));
        }
        details
    }

    fn timestamp(&self) -> String {
        if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new(VerbosityLevel::default())
    }
}
