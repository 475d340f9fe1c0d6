//! Aggregation run configuration.
//!
//! Loaded from YAML or JSON; every field has a default so an empty document
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::TaxonId;
use crate::error::{CoexLinkError, Result};

/// Complete configuration for one link-aggregation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Taxon to aggregate over when query genes are given by id only
    #[serde(default)]
    pub taxon: Option<TaxonId>,

    /// Threshold and reporting options
    #[serde(default)]
    pub query: QueryConfig,

    /// Worker options for the population phase
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// How strictly evidence records are vetted
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

// ── Query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Minimum number of supporting datasets for a link to be reported
    #[serde(default = "default_min_support")]
    pub min_support: u32,
}

fn default_min_support() -> u32 { 2 }

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
        }
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of population workers (0 = rayon global pool)
    #[serde(default)]
    pub parallel_workers: usize,

    /// Query-gene count below which population runs sequentially
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_parallel_threshold() -> usize { 8 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 0,
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

// ── Evidence ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Treat a record naming an undeclared dataset as a failure of the
    /// query gene instead of skipping the record
    #[serde(default)]
    pub fail_on_unknown_dataset: bool,
}

// ── Helper Methods ─────────────────────────────────────────────────────────────

impl AggregationConfig {
    /// Load from YAML file
    pub fn from_yaml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(path, "Loaded aggregation config");
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        debug!(path, "Loaded aggregation config");
        Ok(config)
    }

    /// Save to YAML file
    pub fn to_yaml(&self, path: &str) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.min_support == 0 {
            return Err(CoexLinkError::Config(
                "query.min_support must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_min_support(mut self, min_support: u32) -> Self {
        self.query.min_support = min_support;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.execution.parallel_workers = workers;
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
