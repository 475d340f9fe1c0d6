//! Traits for the collaborators the aggregator consumes.
//!
//! Provides an abstraction over the coexpression store, the probe → gene
//! mapping and the gene/dataset metadata, so that the aggregator can be
//! driven by a database-backed implementation or by in-memory data without
//! being coupled to either.

use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use coexlink_common::{DatasetRef, EvidenceRecord, GeneRef, ProbeRef, TaxonId};

/// Source of per-dataset pairwise coexpression facts.
///
/// Called once per query gene, possibly from several workers at once.
pub trait EvidenceSource: Send + Sync {
    /// All evidence records involving `gene`, restricted to `datasets`.
    ///
    /// An empty result is not an error.
    fn fetch_pairwise_evidence(
        &self,
        gene: &GeneRef,
        datasets: &[DatasetRef],
    ) -> anyhow::Result<Vec<EvidenceRecord>>;
}

/// Maps the measured entity of an evidence record to genes.
pub trait ProbeGeneResolver: Send + Sync {
    /// Zero, one or many genes. An error marks only this record as unusable.
    fn resolve_to_genes(&self, record: &EvidenceRecord) -> anyhow::Result<Vec<GeneRef>>;
}

/// Gene metadata, used once during setup.
pub trait GeneCatalog: Send + Sync {
    fn gene(&self, id: u64) -> Option<GeneRef>;

    /// Every gene of `taxon`; the default candidate universe.
    fn genes_in_taxon(&self, taxon: TaxonId) -> Vec<GeneRef>;
}

/// Dataset metadata, used once during setup.
pub trait DatasetCatalog: Send + Sync {
    fn datasets_for_taxon(&self, taxon: TaxonId) -> Vec<DatasetRef>;
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// In-memory store implementing every collaborator trait.
///
/// Genes and datasets registered without an explicit taxon belong to the
/// store's default taxon. Probes that were never mapped resolve to no genes.
#[derive(Debug, Clone)]
pub struct InMemoryCoexpressionStore {
    taxon: TaxonId,
    genes: Vec<GeneRef>,
    datasets: Vec<DatasetRef>,
    probes: HashMap<ProbeRef, Vec<u64>>,
    evidence: HashMap<u64, Vec<EvidenceRecord>>,
    failing_genes: HashMap<u64, String>,
    broken_probes: HashSet<ProbeRef>,
}

impl InMemoryCoexpressionStore {
    pub fn new(taxon: TaxonId) -> Self {
        Self {
            taxon,
            genes: Vec::new(),
            datasets: Vec::new(),
            probes: HashMap::new(),
            evidence: HashMap::new(),
            failing_genes: HashMap::new(),
            broken_probes: HashSet::new(),
        }
    }

    pub fn taxon(&self) -> TaxonId {
        self.taxon
    }

    /// Register a gene of the default taxon.
    pub fn with_gene(self, id: u64) -> Self {
        let taxon = self.taxon;
        self.with_gene_in(id, taxon)
    }

    pub fn with_gene_in(mut self, id: u64, taxon: TaxonId) -> Self {
        if !self.genes.iter().any(|g| g.id == id) {
            self.genes.push(GeneRef::new(id, taxon));
        }
        self
    }

    pub fn with_dataset(self, id: u64) -> Self {
        let taxon = self.taxon;
        self.with_dataset_in(id, taxon)
    }

    pub fn with_dataset_in(mut self, id: u64, taxon: TaxonId) -> Self {
        self.datasets.push(DatasetRef::new(id, taxon));
        self
    }

    /// Map `probe` to the genes with ids `genes`.
    pub fn with_probe(mut self, probe: u64, genes: &[u64]) -> Self {
        self.probes.entry(ProbeRef(probe)).or_default().extend_from_slice(genes);
        self
    }

    /// Record that `probe` was coexpressed with `query_gene` in `dataset`.
    pub fn with_link(mut self, query_gene: u64, dataset: u64, probe: u64) -> Self {
        let record = EvidenceRecord::new(self.dataset_ref(dataset), ProbeRef(probe));
        self.evidence.entry(query_gene).or_default().push(record);
        self
    }

    /// Shorthand for a dedicated probe on `partner` coexpressed with
    /// `query_gene` in `dataset`. The probe id equals the partner gene id.
    pub fn with_coexpression(self, query_gene: u64, partner: u64, dataset: u64) -> Self {
        let mapped = self
            .probes
            .get(&ProbeRef(partner))
            .is_some_and(|genes| genes.contains(&partner));
        let store = if mapped { self } else { self.with_probe(partner, &[partner]) };
        store.with_link(query_gene, dataset, partner)
    }

    /// Make evidence retrieval fail for `gene`.
    pub fn with_failure(mut self, gene: u64, message: &str) -> Self {
        self.failing_genes.insert(gene, message.to_string());
        self
    }

    /// Make resolution of `probe` fail.
    pub fn with_broken_probe(mut self, probe: u64) -> Self {
        self.broken_probes.insert(ProbeRef(probe));
        self
    }

    fn dataset_ref(&self, id: u64) -> DatasetRef {
        self.datasets
            .iter()
            .find(|d| d.id == id)
            .copied()
            .unwrap_or_else(|| DatasetRef::new(id, self.taxon))
    }

    fn gene_ref(&self, id: u64) -> GeneRef {
        self.gene(id).unwrap_or_else(|| GeneRef::new(id, self.taxon))
    }
}

impl EvidenceSource for InMemoryCoexpressionStore {
    fn fetch_pairwise_evidence(
        &self,
        gene: &GeneRef,
        datasets: &[DatasetRef],
    ) -> anyhow::Result<Vec<EvidenceRecord>> {
        if let Some(message) = self.failing_genes.get(&gene.id) {
            return Err(anyhow!("{message}"));
        }
        let wanted: HashSet<&DatasetRef> = datasets.iter().collect();
        Ok(self
            .evidence
            .get(&gene.id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| wanted.contains(&r.dataset))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl ProbeGeneResolver for InMemoryCoexpressionStore {
    fn resolve_to_genes(&self, record: &EvidenceRecord) -> anyhow::Result<Vec<GeneRef>> {
        if self.broken_probes.contains(&record.probe) {
            return Err(anyhow!("no sequence mapping for probe {}", record.probe.0));
        }
        Ok(self
            .probes
            .get(&record.probe)
            .map(|ids| ids.iter().map(|&id| self.gene_ref(id)).collect())
            .unwrap_or_default())
    }
}

impl GeneCatalog for InMemoryCoexpressionStore {
    fn gene(&self, id: u64) -> Option<GeneRef> {
        self.genes.iter().find(|g| g.id == id).copied()
    }

    fn genes_in_taxon(&self, taxon: TaxonId) -> Vec<GeneRef> {
        self.genes.iter().filter(|g| g.taxon == taxon).copied().collect()
    }
}

impl DatasetCatalog for InMemoryCoexpressionStore {
    fn datasets_for_taxon(&self, taxon: TaxonId) -> Vec<DatasetRef> {
        self.datasets.iter().filter(|d| d.taxon == taxon).copied().collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
