//! Connector configuration document.
//!
//! A JSON object keyed by exchange name. The host extracts the sub-document
//! for the active exchange and otherwise treats the contents as opaque —
//! interpretation belongs to the loaded module.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    doc: Value,
}

impl ConnectorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&content)?;
        if !doc.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(Self { doc })
    }

    /// Build directly from a parsed document (tests, embedding).
    pub fn from_value(doc: Value) -> Result<Self, ConfigError> {
        if !doc.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(Self { doc })
    }

    /// The configuration sub-document for one exchange.
    pub fn exchange_section(&self, exchange: &str) -> Result<&Value, ConfigError> {
        self.doc
            .get(exchange)
            .ok_or_else(|| ConfigError::MissingExchange(exchange.to_string()))
    }

    /// Exchange names present in the document.
    pub fn exchanges(&self) -> Vec<&str> {
        match self.doc.as_object() {
            Some(map) => map.keys().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_extract_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "paperfeed": {{"instruments": ["BTCUSDT"], "tickIntervalMs": 100}},
                "binanceusdm": {{"apiKey": "k", "secret": "s"}}
            }}"#
        )
        .unwrap();

        let config = ConnectorConfig::load(file.path()).unwrap();
        let section = config.exchange_section("paperfeed").unwrap();
        assert_eq!(section["tickIntervalMs"], 100);

        let mut exchanges = config.exchanges();
        exchanges.sort_unstable();
        assert_eq!(exchanges, vec!["binanceusdm", "paperfeed"]);
    }

    #[test]
    fn test_missing_exchange_section() {
        let config = ConnectorConfig::from_value(serde_json::json!({"paperfeed": {}})).unwrap();
        match config.exchange_section("binanceusdm") {
            Err(ConfigError::MissingExchange(name)) => assert_eq!(name, "binanceusdm"),
            other => panic!("expected MissingExchange, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ConnectorConfig::load(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_non_object_document_rejected() {
        assert!(matches!(
            ConnectorConfig::from_value(serde_json::json!([1, 2, 3])),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ConnectorConfig::load(&dir.path().join("connector.config")),
            Err(ConfigError::Io(_))
        ));
    }
}
