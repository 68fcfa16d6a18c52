//! Run-wide settings, read once from an optional TOML file.
//!
//! ```toml
//! threads = 8
//! cache_dir = "/tmp/gofm"
//!
//! [cluster]
//! repeats = 20
//! normalization = "row"
//!
//! [search]
//! ks = [10, 20, 40]
//! size_min = 5
//! ```

use crate::libs::error::{GofmError, Result};
use crate::libs::ontology::Aspect;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Worker threads; 0 means all CPUs but one
    pub threads: usize,
    pub cache_dir: String,
    pub annotation: AnnotationConfig,
    pub distance: DistanceConfig,
    pub cluster: ClusterConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotationConfig {
    pub evidence: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistanceConfig {
    /// Pairs per work item
    pub chunk: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Scale each selected eigenvector to unit length
    Column,
    /// Scale each embedded entity to unit length (Ng, Jordan & Weiss)
    Row,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub repeats: usize,
    pub max_iter: usize,
    pub min_members: usize,
    pub sample_size: Option<usize>,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub ks: Option<Vec<usize>>,
    pub sigmas_bp: Option<Vec<f64>>,
    pub sigmas_mf: Option<Vec<f64>>,
    pub sigmas_cc: Option<Vec<f64>>,
    pub size_min: usize,
    pub size_max: usize,
    pub top: usize,
    /// Grid points per chunk; unset means `ceil(ln n)`
    pub chunk: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0,
            cache_dir: ".gofm-cache".to_string(),
            annotation: AnnotationConfig::default(),
            distance: DistanceConfig::default(),
            cluster: ClusterConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            evidence: "all".to_string(),
        }
    }
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self { chunk: 20000 }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            repeats: 10,
            max_iter: 300,
            min_members: 2,
            sample_size: None,
            normalization: Normalization::Column,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ks: None,
            sigmas_bp: None,
            sigmas_mf: None,
            sigmas_cc: None,
            size_min: 10,
            size_max: 300,
            top: 5,
            chunk: None,
        }
    }
}

impl Config {
    /// Load from `path`, or return the defaults when `path` is `None`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        crate::libs::io::require_file(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            GofmError::InvalidParameter(message) => GofmError::Parse {
                path: path.into(),
                line: 0,
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| GofmError::InvalidParameter(e.to_string()))?;
        if config.cluster.repeats == 0 {
            return Err(GofmError::InvalidParameter(
                "cluster.repeats must be positive".to_string(),
            ));
        }
        if config.search.size_min > config.search.size_max {
            return Err(GofmError::InvalidParameter(
                "search.size_min exceeds search.size_max".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().saturating_sub(1).max(1)
        } else {
            self.threads
        }
    }

    /// Sigma values configured for `aspect`, if overridden
    pub fn sigmas_for(&self, aspect: Aspect) -> Option<&Vec<f64>> {
        match aspect {
            Aspect::BiologicalProcess => self.search.sigmas_bp.as_ref(),
            Aspect::MolecularFunction => self.search.sigmas_mf.as_ref(),
            Aspect::CellularComponent => self.search.sigmas_cc.as_ref(),
        }
    }
}
