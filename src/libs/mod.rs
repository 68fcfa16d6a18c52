pub mod annotation;
pub mod cache;
pub mod config;
pub mod distance;
pub mod error;
pub mod gene_dist;
pub mod geneset;
pub mod io;
pub mod jobs;
pub mod matrix;
pub mod ontology;
pub mod pairs;
pub mod pool;
pub mod search;
pub mod silhouette;
pub mod spectral;
pub mod term_dist;
pub mod term_graph;
