//! TOML configuration file for the `compsweep` binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use compsweep_core::{
    AgentCommandConfig, BaselineCommandConfig, CommandAgentBackend, CommandBaseline,
    GraphEvaluatorPlugin, HttpJudgeBackend, HttpJudgeConfig, InMemoryReferences, LlmJudgePlugin,
    PluginRegistry, SweepConfig, SweepRunner, Tier1Settings, Tier2Settings, Tier3Settings,
    TraditionalMetricsPlugin,
};

/// Whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub sweep: SweepConfig,
    pub agent: AgentCommandConfig,
    #[serde(default)]
    pub judge: Option<JudgeSection>,
    #[serde(default)]
    pub baseline: Option<BaselineCommandConfig>,
    #[serde(default)]
    pub references: ReferencesSection,
    #[serde(default)]
    pub report: ReportSection,
    #[serde(default)]
    pub tier1: Tier1Settings,
    #[serde(default)]
    pub tier3: Tier3Settings,
}

/// `[judge]`: connection settings plus tier-2 weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgeSection {
    #[serde(flatten)]
    pub http: HttpJudgeConfig,
    #[serde(default)]
    pub weights: Tier2Settings,
}

impl JudgeSection {
    /// `COMPSWEEP_JUDGE_URL` and `COMPSWEEP_JUDGE_MODEL` override the file;
    /// `COMPSWEEP_JUDGE_API_KEY` is used only when the file sets no key.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("COMPSWEEP_JUDGE_URL") {
            self.http.base_url = url;
        }
        if let Some(model) = lookup("COMPSWEEP_JUDGE_MODEL") {
            self.http.model = model;
        }
        if self.http.api_key.is_none() {
            self.http.api_key = lookup("COMPSWEEP_JUDGE_API_KEY");
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencesSection {
    /// JSON object mapping task id to a list of reference texts.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub output_dir: PathBuf,
    pub unreliable_threshold: f64,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("compsweep-results"),
            unreliable_threshold: 0.8,
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config: FileConfig =
            toml::from_str(&raw).with_context(|| format!("Invalid TOML in {:?}", path))?;

        if let Some(judge) = config.judge.as_mut() {
            judge.apply_env(|key| std::env::var(key).ok());
        }

        // Relative reference paths resolve against the config file.
        if let Some(refs) = config.references.path.as_mut() {
            if refs.is_relative() {
                if let Some(dir) = path.parent() {
                    *refs = dir.join(&*refs);
                }
            }
        }
        Ok(config)
    }

    /// Tier 1 and tier 3 are always registered; tier 2 only with `[judge]`.
    pub fn build_registry(&self) -> Result<PluginRegistry> {
        let mut registry = PluginRegistry::new();
        registry.register(
            TraditionalMetricsPlugin::new(self.tier1.clone())
                .context("Invalid [tier1] settings")?,
        );
        if let Some(judge) = &self.judge {
            let backend = HttpJudgeBackend::new(judge.http.clone())
                .context("Failed to build judge client")?;
            registry.register(
                LlmJudgePlugin::new(Arc::new(backend), judge.weights.clone())
                    .context("Invalid [judge.weights] settings")?,
            );
        }
        registry.register(GraphEvaluatorPlugin::new(self.tier3.clone()));
        Ok(registry)
    }

    pub fn load_references(&self) -> Result<InMemoryReferences> {
        let Some(path) = &self.references.path else {
            return Ok(InMemoryReferences::new());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read references file: {:?}", path))?;
        let texts: HashMap<String, Vec<String>> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {:?}", path))?;
        Ok(InMemoryReferences::from(texts))
    }

    pub fn build_runner(&self) -> Result<SweepRunner> {
        let registry = Arc::new(self.build_registry()?);
        let agent = Arc::new(CommandAgentBackend::new(self.agent.clone()));
        let mut runner = SweepRunner::new(registry, agent)
            .with_references(Arc::new(self.load_references()?));
        if let Some(baseline) = &self.baseline {
            runner = runner.with_baseline(Arc::new(CommandBaseline::new(baseline.clone())));
        }
        Ok(runner)
    }
}
