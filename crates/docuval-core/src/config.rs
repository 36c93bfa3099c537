//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DocuvalError, Result};

/// Configuration for the document processing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to a schema file replacing the bundled schemas.
    pub schema_path: Option<PathBuf>,
    pub ocr: OcrConfig,
    pub signatures: SignatureConfig,
}

/// OCR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    /// Primary recognition language hint, e.g. "spa".
    pub language: String,
    /// Retried when recognition under the primary hint fails.
    pub fallback_language: Option<String>,
}

/// Signature detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub enabled: bool,
    /// Accepted bounding-box pixel area.
    pub min_area: u32,
    pub max_area: u32,
    /// Accepted width/height ratio.
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            ocr: OcrConfig::default(),
            signatures: SignatureConfig::default(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "spa".to_string(),
            fallback_language: Some("eng".to_string()),
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_area: 5_000,
            max_area: 50_000,
            min_aspect: 1.5,
            max_aspect: 4.0,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| DocuvalError::Config(format!("invalid configuration: {}", e)))
    }

    /// Saves configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DocuvalError::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.ocr.enabled);
        assert_eq!(config.ocr.language, "spa");
        assert_eq!(config.ocr.fallback_language.as_deref(), Some("eng"));
        assert_eq!(config.signatures.min_area, 5_000);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"ocr": {"language": "eng"}}"#).unwrap();
        assert_eq!(config.ocr.language, "eng");
        assert!(config.ocr.enabled);
        assert_eq!(config.signatures.max_area, 50_000);
    }
}
