//! Aggregation run values: the prepared (setup) state and the populated,
//! read-only result.

use coexlink_common::{CoexLinkError, DatasetRef, GeneRef, Result};
use coexlink_matrix::{links_at_or_above, support_histogram, CompressedLinkMatrix, IndexedAxis};
use serde::Serialize;
use uuid::Uuid;

// ── Prepared run ──────────────────────────────────────────────────────────────

/// A run whose axes are declared and frozen and whose matrix is allocated,
/// but which has not been populated yet.
#[derive(Debug)]
pub struct PreparedRun {
    pub(crate) run_id: Uuid,
    pub(crate) rows: IndexedAxis<GeneRef>,
    pub(crate) cols: IndexedAxis<GeneRef>,
    pub(crate) datasets: IndexedAxis<DatasetRef>,
    pub(crate) matrix: CompressedLinkMatrix,
}

impl PreparedRun {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn query_genes(&self) -> &IndexedAxis<GeneRef> {
        &self.rows
    }

    pub fn candidate_genes(&self) -> &IndexedAxis<GeneRef> {
        &self.cols
    }

    pub fn datasets(&self) -> &IndexedAxis<DatasetRef> {
        &self.datasets
    }
}

// ── Population outcome ────────────────────────────────────────────────────────

/// Why a query gene's row was left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The evidence source returned an error for this gene.
    EvidenceSource,
    /// Evidence named a dataset outside the run (strict mode only).
    UnknownDataset,
}

/// A query gene whose row could not be populated.
#[derive(Debug, Clone, Serialize)]
pub struct GeneFailure {
    pub gene: GeneRef,
    pub kind: FailureKind,
    pub error: String,
}

/// Counters gathered while populating a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulationReport {
    pub genes_processed: usize,
    pub genes_failed: usize,
    pub genes_cancelled: usize,
    pub records_seen: usize,
    pub links_recorded: usize,
    pub skipped_self: usize,
    pub skipped_unknown_gene: usize,
    pub skipped_unknown_dataset: usize,
    pub skipped_unresolved: usize,
    pub duration_ms: u64,
}

impl PopulationReport {
    pub(crate) fn merge(&mut self, other: &PopulationReport) {
        self.genes_processed += other.genes_processed;
        self.genes_failed += other.genes_failed;
        self.genes_cancelled += other.genes_cancelled;
        self.records_seen += other.records_seen;
        self.links_recorded += other.links_recorded;
        self.skipped_self += other.skipped_self;
        self.skipped_unknown_gene += other.skipped_unknown_gene;
        self.skipped_unknown_dataset += other.skipped_unknown_dataset;
        self.skipped_unresolved += other.skipped_unresolved;
    }
}

// ── Populated run ─────────────────────────────────────────────────────────────

/// A gene pair supported by at least the requested number of datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GeneLink {
    pub query_gene: GeneRef,
    pub partner_gene: GeneRef,
    pub support: u32,
}

/// Serializable overview of a populated run at one support threshold.
#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub run_id: Uuid,
    pub query_genes: usize,
    pub candidate_genes: usize,
    pub datasets: usize,
    pub min_support: u32,
    pub links: usize,
    pub failed_genes: Vec<u64>,
    pub support_histogram: Vec<u64>,
}

impl LinkSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Populated, read-only aggregation result.
#[derive(Debug)]
pub struct AggregationRun {
    run_id: Uuid,
    rows: IndexedAxis<GeneRef>,
    cols: IndexedAxis<GeneRef>,
    datasets: IndexedAxis<DatasetRef>,
    matrix: CompressedLinkMatrix,
    failures: Vec<GeneFailure>,
    report: PopulationReport,
    min_support: u32,
}

impl AggregationRun {
    pub(crate) fn from_prepared(
        prepared: PreparedRun,
        failures: Vec<GeneFailure>,
        report: PopulationReport,
        min_support: u32,
    ) -> Self {
        let PreparedRun { run_id, rows, cols, datasets, matrix } = prepared;
        Self { run_id, rows, cols, datasets, matrix, failures, report, min_support }
    }

    /// Support threshold taken from `query.min_support` of the run's config.
    pub fn min_support(&self) -> u32 {
        self.min_support
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn matrix(&self) -> &CompressedLinkMatrix {
        &self.matrix
    }

    pub fn query_genes(&self) -> &IndexedAxis<GeneRef> {
        &self.rows
    }

    pub fn candidate_genes(&self) -> &IndexedAxis<GeneRef> {
        &self.cols
    }

    pub fn datasets(&self) -> &IndexedAxis<DatasetRef> {
        &self.datasets
    }

    pub fn row_gene_at(&self, row: usize) -> Result<&GeneRef> {
        self.rows.id_at(row)
    }

    pub fn col_gene_at(&self, col: usize) -> Result<&GeneRef> {
        self.cols.id_at(col)
    }

    pub fn dataset_at(&self, bit: usize) -> Result<&DatasetRef> {
        self.datasets.id_at(bit)
    }

    /// Query genes whose evidence could not be aggregated; their rows are empty.
    pub fn failures(&self) -> &[GeneFailure] {
        &self.failures
    }

    pub fn report(&self) -> &PopulationReport {
        &self.report
    }

    /// Number of datasets supporting `query_gene` – `partner`.
    pub fn support_count(&self, query_gene: &GeneRef, partner: &GeneRef) -> Result<u32> {
        let row = self
            .rows
            .index_of(query_gene)
            .ok_or_else(|| CoexLinkError::UnknownIdentifier(format!("query {query_gene}")))?;
        let col = self
            .cols
            .index_of(partner)
            .ok_or_else(|| CoexLinkError::UnknownIdentifier(format!("candidate {partner}")))?;
        self.matrix.support_count(row, col)
    }

    /// Datasets in which `query_gene` – `partner` was observed, in bit order.
    pub fn supporting_datasets(&self, query_gene: &GeneRef, partner: &GeneRef) -> Result<Vec<DatasetRef>> {
        let row = self
            .rows
            .index_of(query_gene)
            .ok_or_else(|| CoexLinkError::UnknownIdentifier(format!("query {query_gene}")))?;
        let col = self
            .cols
            .index_of(partner)
            .ok_or_else(|| CoexLinkError::UnknownIdentifier(format!("candidate {partner}")))?;
        let mut out = Vec::new();
        for (bit, dataset) in self.datasets.iter().enumerate() {
            if self.matrix.get(row, col, bit)? {
                out.push(*dataset);
            }
        }
        Ok(out)
    }

    /// Gene pairs with `support >= min_support`, query gene order then
    /// candidate order. Identities are resolved per hit, not per scanned cell.
    pub fn query(&self, min_support: u32) -> impl Iterator<Item = GeneLink> + '_ {
        let rows = self.rows.as_slice();
        let cols = self.cols.as_slice();
        links_at_or_above(&self.matrix, min_support).map(move |link| GeneLink {
            query_gene: rows[link.row],
            partner_gene: cols[link.col],
            support: link.support,
        })
    }

    /// [`query`](Self::query) at the configured threshold.
    pub fn links(&self) -> impl Iterator<Item = GeneLink> + '_ {
        self.query(self.min_support)
    }

    pub fn support_histogram(&self) -> Vec<u64> {
        support_histogram(&self.matrix)
    }

    /// [`summary_at`](Self::summary_at) the configured threshold.
    pub fn summary(&self) -> LinkSummary {
        self.summary_at(self.min_support)
    }

    pub fn summary_at(&self, min_support: u32) -> LinkSummary {
        LinkSummary {
            run_id: self.run_id,
            query_genes: self.rows.len(),
            candidate_genes: self.cols.len(),
            datasets: self.datasets.len(),
            min_support,
            links: self.query(min_support).count(),
            failed_genes: self.failures.iter().map(|f| f.gene.id).collect(),
            support_histogram: self.support_histogram(),
        }
    }
}
