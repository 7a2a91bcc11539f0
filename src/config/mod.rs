//! Pipeline description files
//!
//! A pipeline description lists module instances with their properties and
//! the pipes that connect them. It can be written in TOML (`.toml`) or JSON
//! (any other extension).
//!
//! # Example
//!
//! ```toml
//! [settings]
//! pipe_capacity = 32
//!
//! [[modules]]
//! id = "reader"
//! kind = "FileReader"
//! properties = { inputfile = "corpus.json" }
//!
//! [[modules]]
//! id = "clustering"
//! kind = "SuffixTreeClustering"
//! properties = { clusteringType = "HAC", corpusName = "letters" }
//!
//! [[modules]]
//! id = "dot"
//! kind = "FileWriter"
//! properties = { outputfile = "clusters.dot" }
//!
//! [[pipes]]
//! from = "reader.output"
//! to = "clustering.byteInput"
//! kind = "bytes"
//!
//! [[pipes]]
//! from = "clustering.output"
//! to = "dot.input"
//! kind = "chars"
//! ```

pub mod settings;

pub use settings::RuntimeSettings;

use crate::error::{Result, TextPipeError};
use crate::pipeline::module::Properties;
use crate::pipeline::module_kind::ModuleKind;
use crate::pipeline::pipe::PipeKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete description of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub settings: RuntimeSettings,

    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    #[serde(default)]
    pub pipes: Vec<PipeConfig>,
}

/// One module instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Identifier used by pipe endpoints; also the default instance name
    pub id: String,

    pub kind: ModuleKind,

    #[serde(default)]
    pub properties: Properties,
}

/// One pipe between an output port and an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeConfig {
    /// `module.port` of the producing output
    pub from: String,

    /// `module.port` of the consuming input
    pub to: String,

    #[serde(default = "default_pipe_kind")]
    pub kind: PipeKind,
}

fn default_pipe_kind() -> PipeKind {
    PipeKind::Bytes
}

/// A parsed `module.port` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub module: &'a str,
    pub port: &'a str,
}

impl PipeConfig {
    pub fn source(&self) -> Result<Endpoint<'_>> {
        parse_endpoint(&self.from)
    }

    pub fn target(&self) -> Result<Endpoint<'_>> {
        parse_endpoint(&self.to)
    }
}

fn parse_endpoint(s: &str) -> Result<Endpoint<'_>> {
    match s.split_once('.') {
        Some((module, port)) if !module.is_empty() && !port.is_empty() => {
            Ok(Endpoint { module, port })
        }
        _ => Err(TextPipeError::Config(format!(
            "Invalid pipe endpoint '{}', expected 'module.port'",
            s
        ))),
    }
}

impl PipelineConfig {
    /// Load a pipeline description, choosing the format by file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TextPipeError::Config(format!(
                "Failed to read pipeline description '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                TextPipeError::Config(format!("Failed to parse '{}': {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                TextPipeError::Config(format!("Failed to parse '{}': {}", path.display(), e))
            })?
        };

        config.validate()?;
        tracing::info!(
            "Loaded pipeline description from {:?}: {} modules, {} pipes",
            path,
            config.modules.len(),
            config.pipes.len()
        );
        Ok(config)
    }

    /// Save the description, choosing the format by file extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| TextPipeError::Serialization(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| TextPipeError::Serialization(e.to_string()))?
        };
        std::fs::write(path, content)?;
        tracing::info!("Saved pipeline description to {:?}", path);
        Ok(())
    }

    /// Check ids are unique and every pipe endpoint names a declared module.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for module in &self.modules {
            if module.id.is_empty() || module.id.contains('.') {
                return Err(TextPipeError::Config(format!(
                    "Invalid module id '{}': must be non-empty and contain no '.'",
                    module.id
                )));
            }
            if !seen.insert(module.id.as_str()) {
                return Err(TextPipeError::Config(format!(
                    "Duplicate module id '{}'",
                    module.id
                )));
            }
        }
        for pipe in &self.pipes {
            for endpoint in [pipe.source()?, pipe.target()?] {
                if !seen.contains(endpoint.module) {
                    return Err(TextPipeError::Config(format!(
                        "Pipe endpoint refers to unknown module '{}'",
                        endpoint.module
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn module(&self, id: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.id == id)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PipelineConfig {
        PipelineConfig {
            settings: RuntimeSettings::default(),
            modules: vec![
                ModuleConfig {
                    id: "reader".to_string(),
                    kind: ModuleKind::FileReader,
                    properties: Properties::new().with("inputfile", "in.json"),
                },
                ModuleConfig {
                    id: "clustering".to_string(),
                    kind: ModuleKind::SuffixTreeClustering,
                    properties: Properties::new().with("clusteringType", "NJ"),
                },
            ],
            pipes: vec![PipeConfig {
                from: "reader.output".to_string(),
                to: "clustering.byteInput".to_string(),
                kind: PipeKind::Bytes,
            }],
        }
    }

    #[test]
    fn test_endpoint_parsing() {
        let pipe = &sample().pipes[0];
        assert_eq!(
            pipe.target().unwrap(),
            Endpoint {
                module: "clustering",
                port: "byteInput"
            }
        );
        assert!(parse_endpoint("noport").is_err());
        assert!(parse_endpoint(".port").is_err());
        assert!(parse_endpoint("module.").is_err());
    }

    #[test]
    fn test_toml_and_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample();
        for file in ["pipeline.toml", "pipeline.json"] {
            let path = dir.path().join(file);
            config.save(&path).unwrap();
            assert_eq!(PipelineConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_toml_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.toml");
        std::fs::write(
            &path,
            r#"
[[modules]]
id = "stc"
kind = "SuffixTreeClustering"
"#,
        )
        .unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.settings, RuntimeSettings::default());
        assert!(config.module("stc").unwrap().properties.get("clusteringType").is_none());
    }

    #[test]
    fn test_validation_rejects_unknown_module() {
        let mut config = sample();
        config.pipes[0].to = "missing.byteInput".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));

        let mut config = sample();
        config.modules[1].id = "reader".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparseable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(TextPipeError::Config(_))
        ));
    }
}
