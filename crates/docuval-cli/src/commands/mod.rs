//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod schema;

use std::path::PathBuf;

use docuval_core::schema::registry::SchemaRegistry;
use docuval_core::signature::SignatureDetector;
use docuval_core::{DocumentProcessor, EngineConfig};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docuval")
        .join("config.json")
}

/// Loads the config from `--config`, the default path, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = config_path {
        return Ok(EngineConfig::from_file(path)?);
    }
    let default = default_config_path();
    if default.exists() {
        return Ok(EngineConfig::from_file(&default)?);
    }
    Ok(EngineConfig::default())
}

/// Builds a processor from the configuration.
pub fn build_processor(config: &EngineConfig) -> anyhow::Result<DocumentProcessor> {
    let mut processor = DocumentProcessor::new()?;

    if let Some(path) = &config.schema_path {
        processor = processor.with_registry(SchemaRegistry::from_file(path)?);
    }

    let detector = config.signatures.enabled.then(|| {
        SignatureDetector::new()
            .with_area(config.signatures.min_area, config.signatures.max_area)
            .with_aspect(config.signatures.min_aspect, config.signatures.max_aspect)
    });
    processor = processor.with_signature_detector(detector);

    Ok(processor)
}

/// Parses `field=value` reference pairs from the command line.
pub fn parse_reference_pairs(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow::anyhow!("invalid reference pair (expected FIELD=VALUE): {}", pair))
        })
        .collect()
}
