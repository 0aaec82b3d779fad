//! Server config file parsing (spec §6): an XML document describing compression policy, whether
//! children may enable time regulation, the parent server URL, and zero-or-more listen addresses.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename = "rtiConfig")]
pub struct ServerConfigFile {
    #[serde(default)]
    pub enable_zlib_compression: bool,
    #[serde(default = "default_true")]
    pub permit_time_regulation: bool,
    #[serde(default)]
    pub parent_server: Option<String>,
    #[serde(default, rename = "listen")]
    pub listen: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse server config XML: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("failed to read server config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Loads a config either from a literal XML string (spec §6: `-c literal`) or from a file path,
/// matching the CLI's "file-or-literal" convention: a string starting with `<` is taken as
/// literal XML, otherwise it names a file.
pub fn load(file_or_literal: &str) -> Result<ServerConfigFile, ConfigError> {
    let xml = if file_or_literal.trim_start().starts_with('<') {
        file_or_literal.to_string()
    } else {
        std::fs::read_to_string(file_or_literal).map_err(|source| ConfigError::Io {
            path: file_or_literal.to_string(),
            source,
        })?
    };
    parse(&xml)
}

pub fn parse(xml: &str) -> Result<ServerConfigFile, ConfigError> {
    Ok(quick_xml::de::from_str(xml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config_document() {
        let xml = r#"
            <rtiConfig>
                <enableZLibCompression>true</enableZLibCompression>
                <permitTimeRegulation>false</permitTimeRegulation>
                <parentServer>rti://upstream:14000</parentServer>
                <listen>rti://0.0.0.0:14000</listen>
                <listen>thread://local</listen>
            </rtiConfig>
        "#;
        let config = parse(xml).unwrap();
        assert!(config.enable_zlib_compression);
        assert!(!config.permit_time_regulation);
        assert_eq!(config.parent_server.as_deref(), Some("rti://upstream:14000"));
        assert_eq!(config.listen, vec!["rti://0.0.0.0:14000".to_string(), "thread://local".to_string()]);
    }

    #[test]
    fn missing_optional_elements_fall_back_to_defaults() {
        let config = parse("<rtiConfig></rtiConfig>").unwrap();
        assert!(!config.enable_zlib_compression);
        assert!(config.permit_time_regulation);
        assert_eq!(config.parent_server, None);
        assert!(config.listen.is_empty());
    }

    #[test]
    fn malformed_xml_bubbles_up_as_a_config_error() {
        assert!(parse("<rtiConfig><unterminated>").is_err());
    }
}
