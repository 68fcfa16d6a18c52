use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GofmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input file (ontology, mapping, graph, matrix) does not exist
    #[error("required input not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("invalid aspect '{0}', expected biological_process, molecular_function or cellular_component")]
    InvalidAspect(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("parse error in {} at line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Annotation data too sparse to connect any pair of terms
    #[error("term graph for {aspect} has no edges; annotation data too sparse")]
    EmptyGraph { aspect: String },

    #[error("partition [{first}, {last}) missing: {}", path.display())]
    MissingPartition {
        path: PathBuf,
        first: usize,
        last: usize,
    },

    #[error("malformed partition {} at line {line}: {message}", path.display())]
    MalformedPartition {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("k-means produced no valid clustering for k={k} in {repeats} restarts")]
    ClusteringFailed { k: usize, repeats: usize },

    #[error("{failed} work items failed, first: {first}")]
    WorkFailed { failed: usize, first: String },

    #[error("eigen decomposition failed: {0}")]
    Eigen(String),

    #[error("cache error: {0}")]
    Cache(String),
}

pub type Result<T> = std::result::Result<T, GofmError>;
