use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoexLinkError {
    #[error("Index out of range: {what} index {index} (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Evidence source failed for gene {gene}: {message}")]
    EvidenceSource { gene: u64, message: String },

    #[error("Axis is frozen, cannot assign index to {0}")]
    FrozenAxis(String),

    #[error("Query genes span more than one taxon: {0:?}")]
    MixedTaxa(Vec<u32>),

    #[error("Matrix too large: {0}")]
    Capacity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoexLinkError {
    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        CoexLinkError::IndexOutOfRange { what, index, len }
    }
}

pub type Result<T> = std::result::Result<T, CoexLinkError>;
