pub mod annot;
pub mod assemble;
pub mod cluster;
pub mod gene_dist;
pub mod geneset;
pub mod graph;
pub mod jobs;
pub mod search;
pub mod select;
pub mod term_dist;
