// Configuration file loaders

use crate::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    /// YAML, a superset of JSON.
    Yaml,
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
            path: path.display().to_string(),
            source,
        })?;

        self.parse(&content)
    }

    /// Load a file straight into a typed configuration
    pub fn load_as<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let value = self.load_file(path)?;
        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Parse a string straight into a typed configuration
    pub fn parse_as<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        let value = self.parse(content)?;
        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => self.parse_json(content),
            FileFormat::Yaml => self.parse_yaml(content),
        }
    }

    fn parse_json(&self, content: &str) -> Result<Value> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))
    }

    fn parse_yaml(&self, content: &str) -> Result<Value> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("YAML parse error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        tenant_id: String,
        #[serde(default)]
        use_instance_metadata: bool,
    }

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let result = loader.parse(r#"{"tenantId": "t", "number": 42}"#).unwrap();
        assert_eq!(result["tenantId"], "t");
    }

    #[test]
    fn test_parse_yaml_accepts_json_documents() {
        let loader = ConfigLoader::new(FileFormat::Yaml);
        let sample: Sample = loader
            .parse_as(r#"{"tenantId": "t", "useInstanceMetadata": true}"#)
            .unwrap();
        assert_eq!(
            sample,
            Sample {
                tenant_id: "t".to_string(),
                use_instance_metadata: true
            }
        );
    }

    #[test]
    fn test_parse_yaml() {
        let loader = ConfigLoader::new(FileFormat::Yaml);
        let sample: Sample = loader.parse_as("tenantId: t\n").unwrap();
        assert_eq!(sample.tenant_id, "t");
        assert!(!sample.use_instance_metadata);
    }

    #[test]
    fn test_parse_error() {
        let loader = ConfigLoader::new(FileFormat::Json);
        assert!(matches!(
            loader.parse("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let err = loader.load_file("/nonexistent/azfile/azure.json").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LoadError { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound
        ));
    }
}
