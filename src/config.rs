use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::diagnostics::VerbosityLevel;
use crate::encoding::CharEncoding;
use crate::error::{ConfigError, ConfigResult};
use crate::writer::DocumentOptions;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Writer session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WriterConfig {
    pub format: FormatConfig,
    /// Options passed to `start_document` by `start_configured_document`
    pub document: DocumentOptions,
    pub diagnostics: DiagnosticsConfig,
}

/// Output formatting applied to new writer sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FormatConfig {
    /// Indent nested elements
    pub indent: bool,
    /// String used for one level of indentation (libxml2 default: one space)
    pub indent_string: Option<String>,
    /// Attribute quote character, `"` or `'`
    pub quote_char: Option<char>,
}

/// Diagnostic reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub verbosity: VerbosityLevel,
    /// Prefix reports with the time of day
    pub show_timestamps: bool,
    /// Include native error domains and codes
    pub show_error_codes: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            verbosity: VerbosityLevel::Normal,
            show_timestamps: false,
            show_error_codes: false,
        }
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "libxml-bridge.toml",
    "libxml-bridge.json",
    ".libxml-bridge.toml",
    ".libxml-bridge.json",
];

/// Configuration manager for loading and validating writer configuration
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment
    ///
    /// Without an explicit path, the standard locations are searched and the
    /// defaults are used when nothing is found.
    pub fn load_config(path: Option<&Path>) -> ConfigResult<WriterConfig> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::find_config_file()?.unwrap_or_default(),
        };

        let config = Self::apply_environment_overrides(config)?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> ConfigResult<WriterConfig> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<WriterConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> ConfigResult<Option<WriterConfig>> {
        let mut search_dirs = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            search_dirs.push(config_dir.join("libxml-bridge"));
        }
        Self::find_config_file_in(&search_dirs)
    }

    /// Load the first known configuration file found in `search_dirs`
    pub fn find_config_file_in(search_dirs: &[PathBuf]) -> ConfigResult<Option<WriterConfig>> {
        for dir in search_dirs {
            for name in &CONFIG_NAMES {
                let path = dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: WriterConfig) -> ConfigResult<WriterConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: WriterConfig,
    ) -> ConfigResult<WriterConfig> {
        // Formatting
        if let Some(indent) = env.get("LIBXML_BRIDGE_INDENT") {
            config.format.indent = parse_env("LIBXML_BRIDGE_INDENT", &indent)?;
        }

        if let Some(indent_string) = env.get("LIBXML_BRIDGE_INDENT_STRING") {
            config.format.indent_string = Some(indent_string);
        }

        if let Some(quote_char) = env.get("LIBXML_BRIDGE_QUOTE_CHAR") {
            config.format.quote_char = Some(parse_env("LIBXML_BRIDGE_QUOTE_CHAR", &quote_char)?);
        }

        // Document header
        if let Some(encoding) = env.get("LIBXML_BRIDGE_ENCODING") {
            config.document.encoding = Some(encoding.parse::<CharEncoding>().map_err(|_| {
                ConfigError::Environment(format!("Invalid LIBXML_BRIDGE_ENCODING value: {}", encoding))
            })?);
        }

        if let Some(standalone) = env.get("LIBXML_BRIDGE_STANDALONE") {
            config.document.standalone = Some(parse_env("LIBXML_BRIDGE_STANDALONE", &standalone)?);
        }

        // Diagnostics
        if let Some(verbosity) = env.get("LIBXML_BRIDGE_VERBOSITY") {
            config.diagnostics.verbosity = verbosity.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid LIBXML_BRIDGE_VERBOSITY value: {}",
                    verbosity
                ))
            })?;
        }

        if let Some(timestamps) = env.get("LIBXML_BRIDGE_SHOW_TIMESTAMPS") {
            config.diagnostics.show_timestamps =
                parse_env("LIBXML_BRIDGE_SHOW_TIMESTAMPS", &timestamps)?;
        }

        if let Some(codes) = env.get("LIBXML_BRIDGE_SHOW_ERROR_CODES") {
            config.diagnostics.show_error_codes = parse_env("LIBXML_BRIDGE_SHOW_ERROR_CODES", &codes)?;
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate_config(config: &WriterConfig) -> ConfigResult<()> {
        if let Some(quote_char) = config.format.quote_char {
            if quote_char != '"' && quote_char != '\'' {
                return Err(ConfigError::InvalidValue {
                    field: "format.quote_char".to_string(),
                    value: quote_char.to_string(),
                    reason: "must be '\"' or '''".to_string(),
                });
            }
        }

        if let Some(indent_string) = &config.format.indent_string {
            if indent_string.contains('\0') {
                return Err(ConfigError::InvalidValue {
                    field: "format.indent_string".to_string(),
                    value: indent_string.escape_default().to_string(),
                    reason: "must not contain NUL bytes".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_default_config() {
        let config = WriterConfig::default();

        assert!(!config.format.indent);
        assert_eq!(config.format.indent_string, None);
        assert_eq!(config.format.quote_char, None);

        assert_eq!(config.document.encoding, None);
        assert_eq!(config.document.standalone, None);

        assert_eq!(config.diagnostics.verbosity, VerbosityLevel::Normal);
        assert!(!config.diagnostics.show_timestamps);
        assert!(!config.diagnostics.show_error_codes);
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
[format]
indent = true
indent_string = "\t"
quote_char = "'"

[document]
encoding = "ISO-8859-1"
standalone = true

[diagnostics]
verbosity = "verbose"
show_timestamps = true
show_error_codes = true
"#;

        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert!(config.format.indent);
        assert_eq!(config.format.indent_string.as_deref(), Some("\t"));
        assert_eq!(config.format.quote_char, Some('\''));

        assert_eq!(config.document.encoding, Some(CharEncoding::Iso8859_1));
        assert_eq!(config.document.standalone, Some(true));

        assert_eq!(config.diagnostics.verbosity, VerbosityLevel::Verbose);
        assert!(config.diagnostics.show_timestamps);
        assert!(config.diagnostics.show_error_codes);
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json_content = r#"{
  "format": { "indent": true },
  "document": { "encoding": "utf-8" },
  "diagnostics": { "verbosity": "quiet" }
}"#;

        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert!(config.format.indent);
        assert_eq!(config.format.quote_char, None);
        assert_eq!(config.document.encoding, Some(CharEncoding::Utf8));
        assert_eq!(config.document.standalone, None);
        assert_eq!(config.diagnostics.verbosity, VerbosityLevel::Quiet);
    }

    #[test]
    fn test_extensionless_file_falls_back_to_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("writerrc");

        fs::write(&config_path, r#"{ "format": { "quote_char": "\"" } }"#).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();
        assert_eq!(config.format.quote_char, Some('"'));
    }

    #[test]
    fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(&config_path, "invalid: yaml").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        match result.unwrap_err() {
            ConfigError::UnsupportedFormat(ext) => assert_eq!(ext, "yaml"),
            _ => panic!("Expected UnsupportedFormat error"),
        }
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("absent.toml");

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "invalid toml [[[").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::TomlParsing(_)));
    }

    #[test]
    fn test_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, "{ invalid json }").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::JsonParsing(_)));
    }

    #[test]
    fn test_unknown_encoding_in_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "[document]\nencoding = \"EBCDIC\"\n").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::TomlParsing(_)));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::new();
        mock_env.set("LIBXML_BRIDGE_INDENT", "true");
        mock_env.set("LIBXML_BRIDGE_INDENT_STRING", "    ");
        mock_env.set("LIBXML_BRIDGE_QUOTE_CHAR", "'");
        mock_env.set("LIBXML_BRIDGE_ENCODING", "iso-8859-1");
        mock_env.set("LIBXML_BRIDGE_STANDALONE", "false");
        mock_env.set("LIBXML_BRIDGE_VERBOSITY", "debug");
        mock_env.set("LIBXML_BRIDGE_SHOW_ERROR_CODES", "true");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, WriterConfig::default())
                .unwrap();

        assert!(config.format.indent);
        assert_eq!(config.format.indent_string.as_deref(), Some("    "));
        assert_eq!(config.format.quote_char, Some('\''));
        assert_eq!(config.document.encoding, Some(CharEncoding::Iso8859_1));
        assert_eq!(config.document.standalone, Some(false));
        assert_eq!(config.diagnostics.verbosity, VerbosityLevel::Debug);
        assert!(config.diagnostics.show_error_codes);
        assert!(!config.diagnostics.show_timestamps);
    }

    #[test]
    fn test_invalid_environment_values() {
        for (key, value) in [
            ("LIBXML_BRIDGE_INDENT", "sometimes"),
            ("LIBXML_BRIDGE_ENCODING", "klingon"),
            ("LIBXML_BRIDGE_VERBOSITY", "loud"),
            ("LIBXML_BRIDGE_QUOTE_CHAR", "``"),
        ] {
            let mut mock_env = MockEnvProvider::new();
            mock_env.set(key, value);

            let result =
                ConfigManager::apply_environment_overrides_with(&mock_env, WriterConfig::default());
            assert!(
                matches!(result, Err(ConfigError::Environment(_))),
                "{} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = WriterConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.format.quote_char = Some('\'');
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.format.quote_char = Some('`');
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.format.quote_char = None;
        config.format.indent_string = Some("a\0b".to_string());
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_find_config_file_in() {
        let empty = TempDir::new().unwrap();
        let populated = TempDir::new().unwrap();
        fs::write(
            populated.path().join("libxml-bridge.toml"),
            "[format]\nindent = true\n",
        )
        .unwrap();

        assert!(
            ConfigManager::find_config_file_in(&[empty.path().to_path_buf()])
                .unwrap()
                .is_none()
        );

        let found = ConfigManager::find_config_file_in(&[
            empty.path().to_path_buf(),
            populated.path().to_path_buf(),
        ])
        .unwrap()
        .unwrap();
        assert!(found.format.indent);
    }

    #[test]
    fn test_load_config_with_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("explicit.toml");
        fs::write(&config_path, "[format]\nquote_char = \"'\"\n").unwrap();

        let config = ConfigManager::load_config(Some(&config_path)).unwrap();
        assert_eq!(config.format.quote_char, Some('\''));
    }
}
