//! coexlink-aggregate — Cross-dataset coexpression link aggregation.
//!
//! Counts, for every (query gene, candidate gene) pair, the datasets in which
//! the pair was reported coexpressed, using the packed-bit matrix from
//! `coexlink-matrix`.

pub mod provider;
pub mod run;
pub mod aggregator;

pub use aggregator::LinkAggregator;
pub use provider::{DatasetCatalog, EvidenceSource, GeneCatalog, InMemoryCoexpressionStore, ProbeGeneResolver};
pub use run::{AggregationRun, FailureKind, GeneFailure, GeneLink, LinkSummary, PopulationReport, PreparedRun};
