//! coexlink-common — Shared types, errors, and configuration used across all coexlink crates.

pub mod error;
pub mod entities;
pub mod run_config;

// Re-export commonly used types
pub use error::{CoexLinkError, Result};
pub use entities::{DatasetRef, EvidenceRecord, GeneRef, ProbeRef, TaxonId};
pub use run_config::{AggregationConfig, EvidenceConfig, ExecutionConfig, QueryConfig};
