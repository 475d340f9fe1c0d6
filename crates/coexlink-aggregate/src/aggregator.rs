//! Link aggregation: setup, population, done.
//!
//! [`LinkAggregator::setup`] declares and freezes the three axes and sizes the
//! matrix once. [`LinkAggregator::populate`] consumes the prepared run, fills
//! one matrix row per query gene and returns the read-only
//! [`AggregationRun`]. Rows are independent, so population fans out over
//! rayon workers, each owning exactly one row at a time.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use coexlink_common::{AggregationConfig, CoexLinkError, DatasetRef, GeneRef, Result, TaxonId};
use coexlink_matrix::{CompressedLinkMatrix, IndexedAxis, LinkRowMut};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::provider::{DatasetCatalog, EvidenceSource, GeneCatalog, ProbeGeneResolver};
use crate::run::{AggregationRun, FailureKind, GeneFailure, PopulationReport, PreparedRun};

/// Builds and populates aggregation runs according to an [`AggregationConfig`].
#[derive(Debug, Clone, Default)]
pub struct LinkAggregator {
    config: AggregationConfig,
}

/// Everything a row worker reads; shared by all workers.
struct RowContext<'a> {
    datasets: &'a [DatasetRef],
    cols: &'a IndexedAxis<GeneRef>,
    bits: &'a IndexedAxis<DatasetRef>,
    evidence: &'a dyn EvidenceSource,
    resolver: &'a dyn ProbeGeneResolver,
    fail_on_unknown_dataset: bool,
    cancel: &'a AtomicBool,
}

enum RowOutcome {
    Done(PopulationReport),
    Failed(GeneFailure, PopulationReport),
    Cancelled,
}

impl LinkAggregator {
    pub fn new(config: AggregationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    /// Declare the query genes (rows), candidate universe (columns) and
    /// datasets (bit positions, in the given order), freeze them and allocate
    /// the matrix. Repeated genes or datasets keep their first index.
    #[instrument(skip_all, fields(query = query_genes.len(), candidates = candidates.len(), datasets = datasets.len()))]
    pub fn setup(
        &self,
        query_genes: &[GeneRef],
        candidates: &[GeneRef],
        datasets: &[DatasetRef],
    ) -> Result<PreparedRun> {
        let rows = IndexedAxis::frozen_from(query_genes.iter().copied());
        let cols = IndexedAxis::frozen_from(candidates.iter().copied());
        let bits = IndexedAxis::frozen_from(datasets.iter().copied());

        if bits.len() < datasets.len() {
            debug!(
                declared = datasets.len(),
                distinct = bits.len(),
                "Repeated datasets share their first bit position"
            );
        }

        let matrix = CompressedLinkMatrix::new(rows.len(), cols.len(), bits.len())?;
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            rows = rows.len(),
            cols = cols.len(),
            datasets = bits.len(),
            "Aggregation run prepared"
        );

        Ok(PreparedRun { run_id, rows, cols, datasets: bits, matrix })
    }

    /// Setup from gene ids: resolve every query gene through `genes`, require
    /// a single taxon, and take the candidate universe and the datasets from
    /// the catalogs for that taxon.
    pub fn setup_for_taxon(
        &self,
        query_ids: &[u64],
        genes: &dyn GeneCatalog,
        datasets: &dyn DatasetCatalog,
    ) -> Result<PreparedRun> {
        let query_genes = query_ids
            .iter()
            .map(|&id| {
                genes
                    .gene(id)
                    .ok_or_else(|| CoexLinkError::UnknownIdentifier(format!("query gene {id}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut taxa: BTreeSet<TaxonId> = query_genes.iter().map(|g| g.taxon).collect();
        taxa.extend(self.config.taxon);
        if taxa.len() > 1 {
            return Err(CoexLinkError::MixedTaxa(taxa.iter().map(|t| t.0).collect()));
        }
        let Some(&taxon) = taxa.first() else {
            return Err(CoexLinkError::Config(
                "no query genes given and no taxon configured".to_string(),
            ));
        };

        self.setup_with_catalogs(&query_genes, taxon, genes, datasets)
    }

    /// Setup where every gene of `taxon` is both a query gene and a candidate.
    pub fn setup_whole_taxon(
        &self,
        taxon: TaxonId,
        genes: &dyn GeneCatalog,
        datasets: &dyn DatasetCatalog,
    ) -> Result<PreparedRun> {
        let query_genes = genes.genes_in_taxon(taxon);
        self.setup_with_catalogs(&query_genes, taxon, genes, datasets)
    }

    fn setup_with_catalogs(
        &self,
        query_genes: &[GeneRef],
        taxon: TaxonId,
        genes: &dyn GeneCatalog,
        datasets: &dyn DatasetCatalog,
    ) -> Result<PreparedRun> {
        let universe = genes.genes_in_taxon(taxon);
        let taxon_datasets = datasets.datasets_for_taxon(taxon);
        if universe.is_empty() {
            warn!(%taxon, "No candidate genes in taxon");
        }
        if taxon_datasets.is_empty() {
            warn!(%taxon, "No datasets for taxon");
        }
        self.setup(query_genes, &universe, &taxon_datasets)
    }

    // ── Population ────────────────────────────────────────────────────────────

    pub fn populate(
        &self,
        prepared: PreparedRun,
        evidence: &dyn EvidenceSource,
        resolver: &dyn ProbeGeneResolver,
    ) -> Result<AggregationRun> {
        let cancel = AtomicBool::new(false);
        self.populate_with_cancel(prepared, evidence, resolver, &cancel)
    }

    /// Populate the run, checking `cancel` before each query gene.
    ///
    /// Rows not started when `cancel` becomes true stay empty; the returned
    /// run is consistent either way. Evidence failures are isolated to their
    /// query gene and listed in [`AggregationRun::failures`]. Only contract
    /// violations (`IndexOutOfRange`) abort the whole call.
    #[instrument(skip_all, fields(run_id = %prepared.run_id))]
    pub fn populate_with_cancel(
        &self,
        mut prepared: PreparedRun,
        evidence: &dyn EvidenceSource,
        resolver: &dyn ProbeGeneResolver,
        cancel: &AtomicBool,
    ) -> Result<AggregationRun> {
        let t0 = Instant::now();
        debug_assert!(prepared.rows.is_frozen() && prepared.cols.is_frozen() && prepared.datasets.is_frozen());

        let ctx = RowContext {
            datasets: prepared.datasets.as_slice(),
            cols: &prepared.cols,
            bits: &prepared.datasets,
            evidence,
            resolver,
            fail_on_unknown_dataset: self.config.evidence.fail_on_unknown_dataset,
            cancel,
        };
        let genes = prepared.rows.as_slice();
        let rows = prepared.matrix.rows_mut();

        let outcomes = self.run_rows(rows, genes, &ctx)?;

        let mut report = PopulationReport::default();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Done(stats) => report.merge(&stats),
                RowOutcome::Failed(failure, stats) => {
                    report.merge(&stats);
                    failures.push(failure);
                }
                RowOutcome::Cancelled => report.genes_cancelled += 1,
            }
        }
        report.duration_ms = u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX);

        if report.genes_cancelled > 0 {
            warn!(cancelled = report.genes_cancelled, "Population cancelled before all query genes ran");
        }
        info!(
            genes = report.genes_processed,
            failed = report.genes_failed,
            records = report.records_seen,
            links = report.links_recorded,
            duration_ms = report.duration_ms,
            "Population finished"
        );

        Ok(AggregationRun::from_prepared(prepared, failures, report, self.config.query.min_support))
    }

    /// Setup and populate in one call.
    pub fn run(
        &self,
        query_genes: &[GeneRef],
        candidates: &[GeneRef],
        datasets: &[DatasetRef],
        evidence: &dyn EvidenceSource,
        resolver: &dyn ProbeGeneResolver,
    ) -> Result<AggregationRun> {
        let prepared = self.setup(query_genes, candidates, datasets)?;
        self.populate(prepared, evidence, resolver)
    }

    fn run_rows(
        &self,
        rows: Vec<LinkRowMut<'_>>,
        genes: &[GeneRef],
        ctx: &RowContext<'_>,
    ) -> Result<Vec<RowOutcome>> {
        let work = |mut row: LinkRowMut<'_>| {
            let gene = genes[row.index()];
            populate_row(&mut row, gene, ctx)
        };

        #[cfg(feature = "parallel")]
        {
            let exec = &self.config.execution;
            if rows.len() >= exec.parallel_threshold && rows.len() > 1 {
                use rayon::prelude::*;
                if exec.parallel_workers > 0 {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(exec.parallel_workers)
                        .build()
                        .map_err(|e| CoexLinkError::Config(format!("worker pool: {e}")))?;
                    return pool.install(|| rows.into_par_iter().map(work).collect());
                }
                return rows.into_par_iter().map(work).collect();
            }
        }

        rows.into_iter().map(work).collect()
    }
}

// ── Row worker ────────────────────────────────────────────────────────────────

fn populate_row(row: &mut LinkRowMut<'_>, gene: GeneRef, ctx: &RowContext<'_>) -> Result<RowOutcome> {
    if ctx.cancel.load(Ordering::Relaxed) {
        return Ok(RowOutcome::Cancelled);
    }

    let mut stats = PopulationReport { genes_processed: 1, ..Default::default() };

    let records = match ctx.evidence.fetch_pairwise_evidence(&gene, ctx.datasets) {
        Ok(records) => records,
        Err(e) => {
            let err = CoexLinkError::EvidenceSource { gene: gene.id, message: format!("{e:#}") };
            warn!(%gene, error = %err, "Evidence retrieval failed");
            stats.genes_failed = 1;
            let failure = GeneFailure { gene, kind: FailureKind::EvidenceSource, error: err.to_string() };
            return Ok(RowOutcome::Failed(failure, stats));
        }
    };

    if records.is_empty() {
        debug!(%gene, "No evidence");
        return Ok(RowOutcome::Done(stats));
    }
    stats.records_seen = records.len();

    if ctx.fail_on_unknown_dataset {
        if let Some(record) = records.iter().find(|r| !ctx.bits.contains(&r.dataset)) {
            let err = CoexLinkError::UnknownIdentifier(format!("{} in evidence for {gene}", record.dataset));
            warn!(%gene, error = %err, "Evidence names an undeclared dataset");
            stats.genes_failed = 1;
            let failure = GeneFailure { gene, kind: FailureKind::UnknownDataset, error: err.to_string() };
            return Ok(RowOutcome::Failed(failure, stats));
        }
    }

    for record in &records {
        let Some(bit) = ctx.bits.index_of(&record.dataset) else {
            warn!(%gene, dataset = %record.dataset, "Couldn't find the bit position for dataset");
            stats.skipped_unknown_dataset += 1;
            continue;
        };

        let partners = match ctx.resolver.resolve_to_genes(record) {
            Ok(partners) => partners,
            Err(e) => {
                warn!(%gene, probe = record.probe.0, error = %e, "Probe could not be resolved to genes");
                stats.skipped_unresolved += 1;
                continue;
            }
        };
        if partners.is_empty() {
            stats.skipped_unresolved += 1;
            continue;
        }

        for partner in partners {
            if partner == gene {
                stats.skipped_self += 1;
                continue;
            }
            let Some(col) = ctx.cols.index_of(&partner) else {
                debug!(%gene, %partner, "Partner outside the candidate universe");
                stats.skipped_unknown_gene += 1;
                continue;
            };
            row.set(col, bit)?;
            stats.links_recorded += 1;
        }
    }

    debug!(%gene, records = stats.records_seen, links = stats.links_recorded, "Row populated");
    Ok(RowOutcome::Done(stats))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryCoexpressionStore;

    const HUMAN: TaxonId = TaxonId(9606);

    fn gene(id: u64) -> GeneRef {
        GeneRef::new(id, HUMAN)
    }

    fn dataset(id: u64) -> DatasetRef {
        DatasetRef::new(id, HUMAN)
    }

    #[test]
    fn test_setup_sizes_matrix_from_distinct_axes() {
        let agg = LinkAggregator::default();
        let prepared = agg
            .setup(
                &[gene(1), gene(2), gene(1)],
                &[gene(1), gene(2), gene(3)],
                &[dataset(10), dataset(11), dataset(10)],
            )
            .unwrap();
        assert_eq!(prepared.query_genes().len(), 2);
        assert_eq!(prepared.candidate_genes().len(), 3);
        assert_eq!(prepared.datasets().len(), 2);
        assert_eq!(prepared.datasets().index_of(&dataset(11)), Some(1));
        assert!(prepared.candidate_genes().is_frozen());
    }

    #[test]
    fn test_self_links_never_recorded() {
        let store = InMemoryCoexpressionStore::new(HUMAN)
            .with_gene(1)
            .with_gene(2)
            .with_dataset(10)
            .with_coexpression(1, 1, 10)
            .with_coexpression(1, 2, 10);
        let agg = LinkAggregator::default();
        let run = agg
            .run(&[gene(1)], &[gene(1), gene(2)], &[dataset(10)], &store, &store)
            .unwrap();
        assert_eq!(run.support_count(&gene(1), &gene(1)).unwrap(), 0);
        assert_eq!(run.support_count(&gene(1), &gene(2)).unwrap(), 1);
        assert_eq!(run.report().skipped_self, 1);
    }

    #[test]
    fn test_multi_gene_probe_sets_every_candidate() {
        let store = InMemoryCoexpressionStore::new(HUMAN)
            .with_dataset(10)
            .with_probe(900, &[2, 3, 1])
            .with_link(1, 10, 900);
        let agg = LinkAggregator::default();
        let run = agg
            .run(&[gene(1)], &[gene(1), gene(2), gene(3)], &[dataset(10)], &store, &store)
            .unwrap();
        assert_eq!(run.support_count(&gene(1), &gene(2)).unwrap(), 1);
        assert_eq!(run.support_count(&gene(1), &gene(3)).unwrap(), 1);
        assert_eq!(run.support_count(&gene(1), &gene(1)).unwrap(), 0);
        assert_eq!(run.report().links_recorded, 2);
    }

    #[test]
    fn test_repeated_evidence_is_idempotent() {
        let store = InMemoryCoexpressionStore::new(HUMAN)
            .with_dataset(10)
            .with_coexpression(1, 2, 10)
            .with_coexpression(1, 2, 10);
        let agg = LinkAggregator::default();
        let run = agg.run(&[gene(1)], &[gene(2)], &[dataset(10)], &store, &store).unwrap();
        assert_eq!(run.report().links_recorded, 2);
        assert_eq!(run.support_count(&gene(1), &gene(2)).unwrap(), 1);
    }

    #[test]
    fn test_unresolved_records_are_skipped() {
        let store = InMemoryCoexpressionStore::new(HUMAN)
            .with_dataset(10)
            .with_broken_probe(77)
            .with_link(1, 10, 77)
            .with_link(1, 10, 78)
            .with_coexpression(1, 2, 10);
        let agg = LinkAggregator::default();
        let run = agg.run(&[gene(1)], &[gene(2)], &[dataset(10)], &store, &store).unwrap();
        assert!(run.failures().is_empty());
        assert_eq!(run.report().skipped_unresolved, 2);
        assert_eq!(run.support_count(&gene(1), &gene(2)).unwrap(), 1);
    }

    #[test]
    fn test_setup_for_taxon_rejects_unknown_query_gene() {
        let store = InMemoryCoexpressionStore::new(HUMAN).with_gene(1).with_dataset(10);
        let agg = LinkAggregator::default();
        let err = agg.setup_for_taxon(&[1, 42], &store, &store).unwrap_err();
        assert!(matches!(err, CoexLinkError::UnknownIdentifier(_)));
    }

    #[test]
    fn test_setup_for_taxon_rejects_mixed_taxa() {
        let mouse = TaxonId(10090);
        let store = InMemoryCoexpressionStore::new(HUMAN).with_gene(1).with_gene_in(2, mouse);
        let agg = LinkAggregator::default();
        match agg.setup_for_taxon(&[1, 2], &store, &store) {
            Err(CoexLinkError::MixedTaxa(taxa)) => assert_eq!(taxa, vec![9606, 10090]),
            other => panic!("expected MixedTaxa, got {other:?}"),
        }
    }

    #[test]
    fn test_setup_for_taxon_without_genes_needs_configured_taxon() {
        let store = InMemoryCoexpressionStore::new(HUMAN).with_gene(1).with_dataset(10);
        let agg = LinkAggregator::default();
        assert!(matches!(agg.setup_for_taxon(&[], &store, &store), Err(CoexLinkError::Config(_))));

        let config = AggregationConfig { taxon: Some(HUMAN), ..Default::default() };
        let agg = LinkAggregator::new(config).unwrap();
        let prepared = agg.setup_for_taxon(&[], &store, &store).unwrap();
        assert_eq!(prepared.query_genes().len(), 0);
        assert_eq!(prepared.candidate_genes().len(), 1);
    }

    #[test]
    fn test_setup_whole_taxon() {
        let store = InMemoryCoexpressionStore::new(HUMAN)
            .with_gene(1)
            .with_gene(2)
            .with_gene_in(3, TaxonId(10090))
            .with_dataset(10)
            .with_dataset_in(11, TaxonId(10090));
        let agg = LinkAggregator::default();
        let prepared = agg.setup_whole_taxon(HUMAN, &store, &store).unwrap();
        assert_eq!(prepared.query_genes().as_slice(), &[gene(1), gene(2)]);
        assert_eq!(prepared.candidate_genes().as_slice(), &[gene(1), gene(2)]);
        assert_eq!(prepared.datasets().as_slice(), &[dataset(10)]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AggregationConfig::default().with_min_support(0);
        assert!(LinkAggregator::new(config).is_err());
    }

    #[test]
    fn test_cancelled_before_start_leaves_rows_empty() {
        let store = InMemoryCoexpressionStore::new(HUMAN)
            .with_dataset(10)
            .with_coexpression(1, 2, 10);
        let agg = LinkAggregator::default();
        let prepared = agg.setup(&[gene(1)], &[gene(2)], &[dataset(10)]).unwrap();
        let cancel = AtomicBool::new(true);
        let run = agg.populate_with_cancel(prepared, &store, &store, &cancel).unwrap();
        assert_eq!(run.report().genes_cancelled, 1);
        assert_eq!(run.report().genes_processed, 0);
        assert_eq!(run.support_count(&gene(1), &gene(2)).unwrap(), 0);
    }
}
