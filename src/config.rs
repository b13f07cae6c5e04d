//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treeclimb/treeclimb.toml`
//! 3. Local config: `<project_dir>/.treeclimb.toml`
//! 4. Environment variables: `TREECLIMB_*` prefix

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;

/// Search knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Consecutive non-improving cycles before converging
    pub patience: usize,
    /// Maximum accepted moves per run
    pub iteration_cap: usize,
    pub timeout_secs: u64,
    /// Candidates scored per cycle
    pub top_k: usize,
    /// Hops a travel move may look past the frontier
    pub lookahead: usize,
    pub respec: bool,
    /// Currency per respec move
    pub respec_cost: u32,
    /// Node ids never allocated
    pub excluded_nodes: Vec<u32>,
    /// Node ids never respecced out
    pub protected_nodes: Vec<u32>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            patience: 3,
            iteration_cap: 500,
            timeout_secs: 300,
            top_k: 100,
            lookahead: 2,
            respec: false,
            respec_cost: 1,
            excluded_nodes: vec![],
            protected_nodes: vec![],
        }
    }
}

/// Scoring engine selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// External scorer; the built-in stat-sum engine is used when unset
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Engine instances, and so maximum concurrent evaluations
    pub instances: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec![],
            instances: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObjectiveConfig {
    pub metric: String,
    /// Stat tag -> heuristic weight; empty means `{metric: 1.0}`
    pub weights: BTreeMap<String, f64>,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            metric: "damage".into(),
            weights: BTreeMap::new(),
        }
    }
}

/// Entry of a node-id list in a config file: `12` adds, `"!12"` removes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NodeEntry {
    Id(u32),
    Text(String),
}

impl NodeEntry {
    /// `(negated, id)`
    fn parse(&self) -> Result<(bool, u32), ApplicationError> {
        match self {
            NodeEntry::Id(id) => Ok((false, *id)),
            NodeEntry::Text(text) => {
                let (negated, rest) = match text.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, text.as_str()),
                };
                rest.trim()
                    .parse()
                    .map(|id| (negated, id))
                    .map_err(|_| ApplicationError::Config {
                        message: format!("invalid node id in list: {text:?}"),
                    })
            }
        }
    }
}

/// Raw optimizer config for intermediate parsing (Option to detect "not specified").
///
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty list
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawOptimizerConfig {
    pub patience: Option<usize>,
    pub iteration_cap: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub top_k: Option<usize>,
    pub lookahead: Option<usize>,
    pub respec: Option<bool>,
    pub respec_cost: Option<u32>,
    pub excluded_nodes: Option<Vec<NodeEntry>>,
    pub protected_nodes: Option<Vec<NodeEntry>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawEngineConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub instances: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawObjectiveConfig {
    pub metric: Option<String>,
    pub weights: Option<BTreeMap<String, f64>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub optimizer: RawOptimizerConfig,
    pub engine: RawEngineConfig,
    pub objective: RawObjectiveConfig,
}

/// Merge node ids with union semantics and `!id` negation.
///
/// ```ignore
/// merge_array(&[1, 2], &[Id(3)])             // → [1, 2, 3]
/// merge_array(&[1, 2], &[Text("!1"), Id(3)]) // → [2, 3]
/// ```
pub fn merge_array(base: &[u32], overlay: &[NodeEntry]) -> Result<Vec<u32>, ApplicationError> {
    let mut result: BTreeSet<u32> = base.iter().copied().collect();
    for entry in overlay {
        match entry.parse()? {
            (true, id) => result.remove(&id),
            (false, id) => result.insert(id),
        };
    }
    Ok(result.into_iter().collect())
}

/// List as given, with negations rejected (nothing to remove from).
fn replace_array(entries: &[NodeEntry]) -> Result<Vec<u32>, ApplicationError> {
    let mut result = BTreeSet::new();
    for entry in entries {
        match entry.parse()? {
            (true, id) => {
                return Err(ApplicationError::Config {
                    message: format!("negation !{id} is only valid in a local config"),
                })
            }
            (false, id) => result.insert(id),
        };
    }
    Ok(result.into_iter().collect())
}

impl OptimizerConfig {
    /// Merge overlay config onto self (base); node lists union with negation.
    pub fn merge(&self, overlay: &RawOptimizerConfig) -> Result<Self, ApplicationError> {
        Ok(Self {
            excluded_nodes: match &overlay.excluded_nodes {
                Some(o) => merge_array(&self.excluded_nodes, o)?,
                None => self.excluded_nodes.clone(),
            },
            protected_nodes: match &overlay.protected_nodes {
                Some(o) => merge_array(&self.protected_nodes, o)?,
                None => self.protected_nodes.clone(),
            },
            ..self.apply_scalars(overlay)
        })
    }

    /// Apply global config onto defaults; node lists are REPLACED.
    pub fn apply_global(&self, global: &RawOptimizerConfig) -> Result<Self, ApplicationError> {
        Ok(Self {
            excluded_nodes: match &global.excluded_nodes {
                Some(g) => replace_array(g)?,
                None => self.excluded_nodes.clone(),
            },
            protected_nodes: match &global.protected_nodes {
                Some(g) => replace_array(g)?,
                None => self.protected_nodes.clone(),
            },
            ..self.apply_scalars(global)
        })
    }

    fn apply_scalars(&self, raw: &RawOptimizerConfig) -> Self {
        Self {
            patience: raw.patience.unwrap_or(self.patience),
            iteration_cap: raw.iteration_cap.unwrap_or(self.iteration_cap),
            timeout_secs: raw.timeout_secs.unwrap_or(self.timeout_secs),
            top_k: raw.top_k.unwrap_or(self.top_k),
            lookahead: raw.lookahead.unwrap_or(self.lookahead),
            respec: raw.respec.unwrap_or(self.respec),
            respec_cost: raw.respec_cost.unwrap_or(self.respec_cost),
            excluded_nodes: self.excluded_nodes.clone(),
            protected_nodes: self.protected_nodes.clone(),
        }
    }
}

impl EngineConfig {
    /// Engine args are a command line, so any layer that sets them replaces them.
    pub fn merge(&self, overlay: &RawEngineConfig) -> Self {
        Self {
            command: overlay.command.clone().or_else(|| self.command.clone()),
            args: overlay.args.clone().unwrap_or_else(|| self.args.clone()),
            instances: overlay.instances.unwrap_or(self.instances),
        }
    }
}

impl ObjectiveConfig {
    /// Overlay weights override per tag.
    pub fn merge(&self, overlay: &RawObjectiveConfig) -> Self {
        let mut weights = self.weights.clone();
        if let Some(o) = &overlay.weights {
            weights.extend(o.iter().map(|(k, v)| (k.clone(), *v)));
        }
        Self {
            metric: overlay.metric.clone().unwrap_or_else(|| self.metric.clone()),
            weights,
        }
    }

    /// Global weights replace the defaults wholesale.
    pub fn apply_global(&self, global: &RawObjectiveConfig) -> Self {
        Self {
            metric: global.metric.clone().unwrap_or_else(|| self.metric.clone()),
            weights: global.weights.clone().unwrap_or_else(|| self.weights.clone()),
        }
    }
}

/// Unified configuration for treeclimb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub optimizer: OptimizerConfig,
    pub engine: EngineConfig,
    pub objective: ObjectiveConfig,
}

/// Get the XDG config directory for treeclimb.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treeclimb").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treeclimb.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".treeclimb.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand `~`, `$VAR` and `${VAR}` in the engine command.
    fn expand_paths(&mut self) {
        if let Some(command) = self.engine.command.take() {
            let expanded = shellexpand::full(&command)
                .map(|s| s.into_owned())
                .unwrap_or(command);
            self.engine.command = Some(expanded);
        }
    }

    fn merge_with(&self, overlay: &RawSettings) -> Result<Self, ApplicationError> {
        Ok(Self {
            optimizer: self.optimizer.merge(&overlay.optimizer)?,
            engine: self.engine.merge(&overlay.engine),
            objective: self.objective.merge(&overlay.objective),
        })
    }

    fn apply_global(&self, global: &RawSettings) -> Result<Self, ApplicationError> {
        Ok(Self {
            optimizer: self.optimizer.apply_global(&global.optimizer)?,
            engine: self.engine.merge(&global.engine),
            objective: self.objective.apply_global(&global.objective),
        })
    }

    /// Load settings with layered precedence.
    ///
    /// # List Merge Semantics
    /// - Defaults → Global: REPLACE
    /// - Global → Local: UNION with `"!id"` negation
    /// - Any → Env vars: REPLACE
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), project_dir)
    }

    /// [`Settings::load`] with an explicit global config file.
    pub fn load_from(
        global_path: Option<&Path>,
        project_dir: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(path) = global_path.filter(|p| p.exists()) {
            debug!("global config: {}", path.display());
            current = current.apply_global(&load_raw_settings(path)?)?;
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("local config: {}", local_path.display());
                current = current.merge_with(&load_raw_settings(&local_path)?)?;
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;
        Ok(current)
    }

    /// Apply TREECLIMB_* environment variables as explicit overrides,
    /// e.g. `TREECLIMB_OPTIMIZER__PATIENCE=5`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TREECLIMB")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("optimizer.excluded_nodes")
                    .with_list_parse_key("optimizer.protected_nodes")
                    .with_list_parse_key("engine.args"),
            )
            .build()
            .map_err(config_err)?;

        let o = &mut settings.optimizer;
        if let Ok(val) = config.get::<usize>("optimizer.patience") {
            o.patience = val;
        }
        if let Ok(val) = config.get::<usize>("optimizer.iteration_cap") {
            o.iteration_cap = val;
        }
        if let Ok(val) = config.get::<u64>("optimizer.timeout_secs") {
            o.timeout_secs = val;
        }
        if let Ok(val) = config.get::<usize>("optimizer.top_k") {
            o.top_k = val;
        }
        if let Ok(val) = config.get::<usize>("optimizer.lookahead") {
            o.lookahead = val;
        }
        if let Ok(val) = config.get_bool("optimizer.respec") {
            o.respec = val;
        }
        if let Ok(val) = config.get::<u32>("optimizer.respec_cost") {
            o.respec_cost = val;
        }
        if let Ok(val) = config.get::<Vec<u32>>("optimizer.excluded_nodes") {
            o.excluded_nodes = val;
        }
        if let Ok(val) = config.get::<Vec<u32>>("optimizer.protected_nodes") {
            o.protected_nodes = val;
        }
        if let Ok(val) = config.get_string("engine.command") {
            settings.engine.command = Some(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("engine.args") {
            settings.engine.args = val;
        }
        if let Ok(val) = config.get::<usize>("engine.instances") {
            settings.engine.instances = val;
        }
        if let Ok(val) = config.get_string("objective.metric") {
            settings.objective.metric = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        for (key, value) in [
            ("optimizer.patience", self.optimizer.patience),
            ("optimizer.top_k", self.optimizer.top_k),
            ("engine.instances", self.engine.instances),
        ] {
            if value == 0 {
                return Err(ApplicationError::Config {
                    message: format!("{key} must be at least 1"),
                });
            }
        }
        if self.objective.metric.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "objective.metric must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# treeclimb configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treeclimb/treeclimb.toml  (defines your baseline)
#   Local:  <project>/.treeclimb.toml            (per-build additions)
#   Env:    TREECLIMB_* environment variables    (explicit overrides)
#           e.g. TREECLIMB_OPTIMIZER__PATIENCE=5
#
# Node lists in a local config UNION with the global ones.
# Use "!id" to REMOVE an inherited node:
#   excluded_nodes = [4012, "!977"]

[optimizer]
# patience = 3          # non-improving cycles before converging
# iteration_cap = 500   # accepted moves per run
# timeout_secs = 300
# top_k = 100           # candidates scored per cycle
# lookahead = 2         # hops a travel move may look ahead
# respec = false        # also try swapping allocated nodes
# respec_cost = 1       # currency per respec
# excluded_nodes = []
# protected_nodes = []

[engine]
# External scorer: reads {"class", "nodes"} JSON on stdin and prints a flat
# JSON object of metrics. Without it the built-in stat-sum engine is used.
# command = "~/bin/score-build"
# args = []
# instances = 4

[objective]
# metric = "damage"

[objective.weights]
# damage = 1.0
# crit = 0.5
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(entries: &[&str]) -> Vec<NodeEntry> {
        entries.iter().map(|s| NodeEntry::Text(s.to_string())).collect()
    }

    #[test]
    fn given_default_settings_when_created_then_matches_documented_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.optimizer.patience, 3);
        assert_eq!(settings.optimizer.iteration_cap, 500);
        assert_eq!(settings.optimizer.timeout_secs, 300);
        assert!(!settings.optimizer.respec);
        assert_eq!(settings.engine.instances, 4);
        assert_eq!(settings.objective.metric, "damage");
    }

    #[test]
    fn given_tilde_in_engine_command_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings::default();
        settings.engine.command = Some("~/bin/scorer".to_string());

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let command = settings.engine.command.expect("command kept");
        assert!(command.starts_with(&home), "command: {}", command);
        assert!(!command.contains('~'));
    }

    #[test]
    fn test_merge_array_union() {
        let result = merge_array(&[1, 2], &[NodeEntry::Id(3)]).unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_array_negation() {
        let result = merge_array(&[1, 2], &ids(&["!1", "3"])).unwrap();
        assert_eq!(result, vec![2, 3]);
    }

    #[test]
    fn test_merge_array_negation_nonexistent() {
        let result = merge_array(&[1, 2], &ids(&["!9"])).unwrap();
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn test_merge_array_duplicates() {
        let result = merge_array(&[1, 2], &[NodeEntry::Id(1), NodeEntry::Id(3)]).unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_array_rejects_garbage() {
        assert!(merge_array(&[], &ids(&["!abc"])).is_err());
    }

    #[test]
    fn test_apply_global_replaces_node_lists() {
        let base = OptimizerConfig {
            excluded_nodes: vec![1, 2],
            ..OptimizerConfig::default()
        };
        let global = RawOptimizerConfig {
            patience: Some(7),
            excluded_nodes: Some(vec![NodeEntry::Id(5)]),
            ..RawOptimizerConfig::default()
        };

        let result = base.apply_global(&global).unwrap();

        assert_eq!(result.excluded_nodes, vec![5]);
        assert_eq!(result.patience, 7);
        assert_eq!(result.iteration_cap, 500);
    }

    #[test]
    fn test_apply_global_rejects_negation() {
        let global = RawOptimizerConfig {
            protected_nodes: Some(ids(&["!5"])),
            ..RawOptimizerConfig::default()
        };
        assert!(OptimizerConfig::default().apply_global(&global).is_err());
    }

    #[test]
    fn test_objective_merge_overrides_per_tag() {
        let base = ObjectiveConfig {
            metric: "damage".into(),
            weights: BTreeMap::from([("damage".into(), 1.0), ("crit".into(), 0.5)]),
        };
        let overlay = RawObjectiveConfig {
            metric: None,
            weights: Some(BTreeMap::from([("crit".into(), 2.0)])),
        };

        let result = base.merge(&overlay);

        assert_eq!(result.metric, "damage");
        assert_eq!(result.weights.get("damage"), Some(&1.0));
        assert_eq!(result.weights.get("crit"), Some(&2.0));
    }
}
