//! NAO Topology Configuration
//!
//! Typed configuration for topology files: which contexts exist and which
//! module units each one loads.
//!
//! # Example topology.yaml
//!
//! ```yaml
//! name: walking
//!
//! # Extra directories searched for bare module file names
//! search_paths:
//!   - ~/.nao/modules
//!   - ./target/release
//!
//! # Contexts are created, and their modules loaded, top to bottom
//! contexts:
//!   - name: sensors
//!     modules:
//!       - libnao_writer.so
//!   - name: logic
//!     modules:
//!       - libnao_reader.so
//! ```

use crate::error::{NaoError, NaoResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A topology from a YAML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Topology name, informational only
    pub name: Option<String>,

    /// Search paths for module units
    pub search_paths: Vec<PathBuf>,

    /// Contexts in creation order
    pub contexts: Vec<ContextConfig>,
}

/// One context and the units it loads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,

    /// Module units, loaded in order
    #[serde(default)]
    pub modules: Vec<PathBuf>,
}

impl TopologyConfig {
    /// Parse and validate a topology from YAML
    pub fn from_yaml(content: &str) -> NaoResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a topology from a file
    pub fn from_file(path: &Path) -> NaoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| NaoError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn to_yaml(&self) -> NaoResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Context names must be non-empty and unique.
    pub fn validate(&self) -> NaoResult<()> {
        let mut seen = HashSet::new();
        for context in &self.contexts {
            let name = context.name.trim();
            if name.is_empty() {
                return Err(NaoError::config("context name must not be empty"));
            }
            if !seen.insert(name) {
                return Err(NaoError::config(format!(
                    "context '{}' is declared more than once",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Number of module units across all contexts
    pub fn module_count(&self) -> usize {
        self.contexts.iter().map(|c| c.modules.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topology() {
        let yaml = r#"
name: walking
search_paths:
  - ~/.nao/modules
contexts:
  - name: sensors
    modules:
      - libnao_writer.so
  - name: logic
    modules:
      - libnao_reader.so
      - ./extra/libnao_filter.so
"#;
        let config = TopologyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("walking"));
        assert_eq!(config.search_paths, vec![PathBuf::from("~/.nao/modules")]);
        assert_eq!(config.contexts.len(), 2);
        assert_eq!(config.contexts[0].name, "sensors");
        assert_eq!(
            config.contexts[1].modules[1],
            PathBuf::from("./extra/libnao_filter.so")
        );
        assert_eq!(config.module_count(), 3);
    }

    #[test]
    fn test_defaults() {
        let config = TopologyConfig::from_yaml("contexts:\n  - name: idle\n").unwrap();
        assert!(config.name.is_none());
        assert!(config.search_paths.is_empty());
        assert!(config.contexts[0].modules.is_empty());
    }

    #[test]
    fn test_duplicate_context_rejected() {
        let yaml = r#"
contexts:
  - name: W1
  - name: W1
"#;
        let err = TopologyConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, NaoError::Config(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = TopologyConfig::from_yaml("contexts: [name: ").unwrap_err();
        assert!(matches!(err, NaoError::Serialization(_)));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = TopologyConfig {
            name: Some("t".into()),
            search_paths: vec![],
            contexts: vec![ContextConfig {
                name: "W1".into(),
                modules: vec![PathBuf::from("a.so")],
            }],
        };
        let parsed = TopologyConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
