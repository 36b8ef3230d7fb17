//! Application configuration for docgraph.
//!
//! User config lives at `~/.docgraph/docgraph.toml`.
//! CLI flags override config file values. The `[selection]` section has no
//! defaults: a missing threshold or cap is a caller error, never a silent default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docgraph";

// ---------------------------------------------------------------------------
// Config structs (matching docgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Graph store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Synchronization gate and timeout.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Selection thresholds and caps. Required.
    pub selection: SelectionConfig,
}

impl AppConfig {
    /// Validate every section that has constraints beyond its types.
    pub fn validate(&self) -> Result<()> {
        self.selection.validate()?;
        self.sync.validate()
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the libSQL database file. A leading `~/` expands to the home directory.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// The store path with `~/` expanded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match self.path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir()
                    .ok_or_else(|| DocGraphError::config("could not determine home directory"))?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.path)),
        }
    }
}

fn default_store_path() -> String {
    "~/.docgraph/graph.db".into()
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Feature gate. When false, synchronization is a no-op that never touches the store.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on one reconciliation transaction.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(DocGraphError::config("sync.timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    10_000
}

/// `[selection]` section.
///
/// camelCase aliases are accepted so JSON callers can pass the same object
/// they use elsewhere (`topKPerDoc`, `maxNodesPerRun`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Opaque version tag stamped onto persisted nodes.
    #[serde(alias = "selectionV")]
    pub selection_v: String,

    /// Minimum section score to be selectable.
    pub threshold: i64,

    /// Maximum components kept per document.
    #[serde(alias = "topKPerDoc")]
    pub top_k_per_doc: usize,

    /// Global cap on document plus component nodes per run.
    #[serde(alias = "maxNodesPerRun")]
    pub max_nodes_per_run: usize,

    /// Heading-prefix keywords that make a section salient.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Content length above which reference-poor sections are penalized.
    #[serde(alias = "largeSectionCharLimit")]
    pub large_section_char_limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            selection_v: "v1".into(),
            threshold: 2,
            top_k_per_doc: 5,
            max_nodes_per_run: 200,
            keywords: vec!["Decision".into(), "Risk".into(), "Requirement".into()],
            large_section_char_limit: 2000,
        }
    }
}

impl SelectionConfig {
    /// Reject values that type-check but cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.selection_v.trim().is_empty() {
            return Err(DocGraphError::config("selection.selection_v must not be empty"));
        }
        if self.top_k_per_doc == 0 {
            return Err(DocGraphError::config(
                "selection.top_k_per_doc must be greater than 0",
            ));
        }
        if self.max_nodes_per_run == 0 {
            return Err(DocGraphError::config(
                "selection.max_nodes_per_run must be greater than 0",
            ));
        }
        if self.large_section_char_limit == 0 {
            return Err(DocGraphError::config(
                "selection.large_section_char_limit must be greater than 0",
            ));
        }
        Ok(())
    }

    /// The subset of settings the salience scorer reads.
    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig {
            keywords: self.keywords.clone(),
            large_section_char_limit: self.large_section_char_limit,
        }
    }
}

/// Scorer coefficients that must stay tunable without code changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    pub keywords: Vec<String>,
    pub large_section_char_limit: usize,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docgraph/docgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from the default location.
///
/// Unlike most tools there is no fallback to defaults: selection thresholds
/// must come from the operator.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        return Err(DocGraphError::config(format!(
            "config file not found at {}. Run `docgraph config init` to create one.",
            path.display()
        )));
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocGraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(?path, "loaded config");
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Refuses to overwrite an existing file. Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(DocGraphError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[selection]"));
        assert!(toml_str.contains("top_k_per_doc"));
        assert!(toml_str.contains("timeout_ms"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.selection, SelectionConfig::default());
        assert!(parsed.sync.enabled);
        parsed.validate().expect("default config is valid");
    }

    #[test]
    fn store_and_sync_sections_default() {
        let toml_str = r#"
[selection]
selection_v = "v2"
threshold = 3
top_k_per_doc = 4
max_nodes_per_run = 50
large_section_char_limit = 1000
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.store.path, "~/.docgraph/graph.db");
        assert_eq!(config.sync.timeout(), Duration::from_secs(10));
        assert!(config.selection.keywords.is_empty());
    }

    #[test]
    fn missing_threshold_is_an_error() {
        let toml_str = r#"
[selection]
selection_v = "v1"
top_k_per_doc = 4
max_nodes_per_run = 50
large_section_char_limit = 1000
"#;
        let err = toml::from_str::<AppConfig>(toml_str).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn non_numeric_cap_is_an_error() {
        let json = r#"{
            "selection_v": "v1", "threshold": 1, "topKPerDoc": "five",
            "maxNodesPerRun": 10, "largeSectionCharLimit": 100
        }"#;
        let err = serde_json::from_str::<SelectionConfig>(json).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let json = r#"{
            "selection_v": "v1", "threshold": -1, "topKPerDoc": 3,
            "maxNodesPerRun": 10, "keywords": ["Risk"], "largeSectionCharLimit": 100
        }"#;
        let config: SelectionConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.top_k_per_doc, 3);
        assert_eq!(config.threshold, -1);
        assert_eq!(config.scoring().keywords, vec!["Risk".to_string()]);
    }

    #[test]
    fn validation_rejects_zero_caps() {
        let mut config = SelectionConfig::default();
        config.top_k_per_doc = 0;
        assert!(config.validate().unwrap_err().to_string().contains("top_k_per_doc"));

        let mut config = SelectionConfig::default();
        config.selection_v = "  ".into();
        assert!(config.validate().is_err());

        let sync = SyncConfig {
            enabled: true,
            timeout_ms: 0,
        };
        assert!(sync.validate().is_err());
    }

    #[test]
    fn store_path_expands_home() {
        let store = StoreConfig {
            path: "/tmp/graph.db".into(),
        };
        assert_eq!(store.resolved_path().unwrap(), PathBuf::from("/tmp/graph.db"));

        let store = StoreConfig::default();
        let resolved = store.resolved_path().unwrap();
        assert!(resolved.ends_with(".docgraph/graph.db"));
    }
}
