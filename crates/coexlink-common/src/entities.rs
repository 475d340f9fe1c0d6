/// Core identifier types shared by the matrix and the aggregator.
/// All of them are small `Copy` values; metadata lives with the catalogs.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Taxon
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxonId(pub u32);

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "taxon:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Gene
// ---------------------------------------------------------------------------

/// A gene, identified by its stable database id within a taxon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneRef {
    pub id: u64,
    pub taxon: TaxonId,
}

impl GeneRef {
    pub fn new(id: u64, taxon: TaxonId) -> Self {
        Self { id, taxon }
    }
}

impl fmt::Display for GeneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gene:{}", self.id)
    }
}

// ---------------------------------------------------------------------------
// Dataset (expression experiment)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetRef {
    pub id: u64,
    pub taxon: TaxonId,
}

impl DatasetRef {
    pub fn new(id: u64, taxon: TaxonId) -> Self {
        Self { id, taxon }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dataset:{}", self.id)
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Opaque handle on the measured entity (probe or design element) that the
/// evidence source reported as coexpressed with the query gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeRef(pub u64);

/// One dataset-level fact: in `dataset`, `probe` was found coexpressed with
/// the query gene the record was fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub dataset: DatasetRef,
    pub probe: ProbeRef,
}

impl EvidenceRecord {
    pub fn new(dataset: DatasetRef, probe: ProbeRef) -> Self {
        Self { dataset, probe }
    }
}
