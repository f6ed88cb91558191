//! Configuration files driving real writer sessions

mod common;

use common::{string_result, write_temp_file};
use libxml_bridge::{
    CharEncoding, ConfigError, ConfigManager, VerbosityLevel, Writer, WriterConfig,
};
use tempfile::TempDir;

const TOML_CONFIG: &str = r#"
[format]
indent = true
indent_string = "    "
quote_char = "'"

[document]
encoding = "UTF-8"
standalone = true

[diagnostics]
verbosity = "quiet"
"#;

#[test]
fn test_toml_config_drives_writer() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_temp_file(&temp_dir, "libxml-bridge.toml", TOML_CONFIG);

    let config = ConfigManager::load_from_file(&path).unwrap();
    assert!(config.format.indent);
    assert_eq!(config.document.encoding, Some(CharEncoding::Utf8));
    assert_eq!(config.diagnostics.verbosity, VerbosityLevel::Quiet);

    let mut writer = Writer::string().unwrap();
    assert!(writer.apply_config(&config));
    assert!(writer.start_configured_document());
    assert!(writer.start_element("root"));
    assert!(writer.write_attribute("id", "r1"));
    assert!(writer.write_element("child", None));
    assert!(writer.end_element());
    assert!(writer.end_document());

    let xml = string_result(&mut writer);
    assert!(xml.starts_with("<?xml version='1.0' encoding='UTF-8' standalone='yes'?>"));
    assert!(xml.contains("<root id='r1'>"));
    assert!(xml.contains("\n    <child/>\n"));
}

#[test]
fn test_json_config_is_discovered() {
    let temp_dir = TempDir::new().unwrap();
    write_temp_file(
        &temp_dir,
        ".libxml-bridge.json",
        r#"{"format": {"indent": true}, "diagnostics": {"verbosity": "debug"}}"#,
    );

    let config = ConfigManager::find_config_file_in(&[temp_dir.path().to_path_buf()])
        .unwrap()
        .unwrap();
    assert!(config.format.indent);
    assert_eq!(config.format.indent_string, None);
    assert_eq!(config.diagnostics.verbosity, VerbosityLevel::Debug);
    assert_eq!(config.document, WriterConfig::default().document);
}

#[test]
fn test_invalid_quote_char_is_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_temp_file(
        &temp_dir,
        "libxml-bridge.toml",
        "[format]\nquote_char = \"`\"\n",
    );

    let err = ConfigManager::load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let err = ConfigManager::load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}
