//! Configuration parsing
//!
//! TOML (primary) and JSON.

use contracts::{ContractError, StreamerConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<StreamerConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<StreamerConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<StreamerConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkKind, SourceKind};
    use std::path::PathBuf;

    #[test]
    fn test_parse_toml_file_source() {
        let content = r#"
[globals.source]
kind = "file"
path = "clips/dance.mjpeg"

[[sinks]]
kind = "raw_video"
port = 11115
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(
            config.globals.source,
            SourceKind::File {
                path: PathBuf::from("clips/dance.mjpeg")
            }
        );
        assert_eq!(config.sinks[0].kind, SinkKind::RawVideo);
        assert_eq!(config.sinks[0].port, Some(11115));
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "globals": { "source": { "kind": "none" }, "scale": 2.0 },
            "sinks": [{ "kind": "face_landmarks", "settings": { "min_entities": 0 } }]
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.globals.scale, 2.0);
        assert_eq!(config.sinks[0].settings.min_entities, 0);
    }

    #[test]
    fn test_parse_unknown_sink_kind() {
        let content = r#"
[[sinks]]
kind = "lidar"
"#;
        assert!(matches!(
            parse_toml(content),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
