//! Spectral clustering of a dense distance matrix.
//!
//! The pipeline follows Ng, Jordan & Weiss with the optional self-tuning
//! bandwidth of Zelnik-Manor & Perona:
//!
//! 1. distances become affinities through a Gaussian kernel ([`similarity_to_affinity`])
//! 2. `L = D^-1/2 A D^-1/2` ([`normalized_laplacian`])
//! 3. `k` eigenvectors of `L` form the embedding ([`spectral_embedding`])
//! 4. k-means runs `repeats` times on the embedding and the run with the best
//!    mean silhouette wins ([`fit`])

pub mod kmeans;

use crate::libs::config::{ClusterConfig, Normalization};
use crate::libs::error::{GofmError, Result};
use crate::libs::matrix::DistanceMatrix;
use crate::libs::silhouette::{silhouette, SilhouetteParams};
use nalgebra::{DMatrix, SymmetricEigen};
use rand::Rng;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

pub use kmeans::{kmeans, KMeans};

/// Kernel bandwidth of the affinity transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bandwidth {
    /// `A[i,j] = exp(-d^2 / (2 sigma^2))`
    Fixed(f64),
    /// Local scale `sigma_i` is the distance to the `sk`-th nearest neighbour;
    /// `A[i,j] = exp(-d^2 / (sigma_i sigma_j))`
    SelfTuning(usize),
}

impl Bandwidth {
    /// The sigma written to a labels file; 0 for self-tuning runs
    pub fn sigma(&self) -> f64 {
        match self {
            Bandwidth::Fixed(s) => *s,
            Bandwidth::SelfTuning(_) => 0.0,
        }
    }

    pub fn sk(&self) -> Option<usize> {
        match self {
            Bandwidth::Fixed(_) => None,
            Bandwidth::SelfTuning(sk) => Some(*sk),
        }
    }
}

/// Gaussian affinity of a distance matrix. The diagonal is exactly 0.
pub fn similarity_to_affinity(d: &DMatrix<f64>, bandwidth: Bandwidth) -> Result<DMatrix<f64>> {
    let n = d.nrows();
    let mut a = DMatrix::<f64>::zeros(n, n);

    match bandwidth {
        Bandwidth::Fixed(sigma) => {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(GofmError::InvalidParameter(format!(
                    "sigma must be positive, got {}",
                    sigma
                )));
            }
            let denom = 2.0 * sigma * sigma;
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        a[(i, j)] = (-d[(i, j)].powi(2) / denom).exp();
                    }
                }
            }
        }
        Bandwidth::SelfTuning(sk) => {
            if sk == 0 || sk >= n {
                return Err(GofmError::InvalidParameter(format!(
                    "sk must be in 1..{}, got {}",
                    n, sk
                )));
            }
            // the sorted row starts with the zero self-distance
            let scale: Vec<f64> = (0..n)
                .map(|i| {
                    let mut row: Vec<f64> = d.row(i).iter().cloned().collect();
                    row.sort_by(|x, y| x.total_cmp(y));
                    row[sk]
                })
                .collect();
            for i in 0..n {
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let s = scale[i] * scale[j];
                    a[(i, j)] = if s > 0.0 {
                        (-d[(i, j)].powi(2) / s).exp()
                    } else if d[(i, j)] == 0.0 {
                        1.0
                    } else {
                        0.0
                    };
                }
            }
        }
    }

    Ok(a)
}

/// `D^-1/2 A D^-1/2` with `D` the row sums of `A`.
///
/// Rows summing to zero yield non-finite entries; they are reported with a
/// warning and left in place.
pub fn normalized_laplacian(a: &DMatrix<f64>) -> DMatrix<f64> {
    let n = a.nrows();
    let scale: Vec<f64> = (0..n).map(|i| a.row(i).sum().powf(-0.5)).collect();

    let mut l = a.clone();
    for i in 0..n {
        for j in 0..n {
            l[(i, j)] *= scale[i] * scale[j];
        }
    }

    let bad = l.iter().filter(|v| !v.is_finite()).count();
    if bad > 0 {
        warn!(
            "normalized Laplacian has {} NaN/Inf entries; isolated entities or a too small sigma",
            bad
        );
    }
    l
}

/// `n x k` embedding from the eigenvectors of `l`.
///
/// All eigenvectors are sign-flipped, then the `k` with the largest sums of
/// absolute values are kept in that order. Columns or rows are scaled to unit
/// length according to `normalization`.
pub fn spectral_embedding(
    l: &DMatrix<f64>,
    k: usize,
    normalization: Normalization,
) -> Result<DMatrix<f64>> {
    let n = l.nrows();
    if k == 0 || k > n {
        return Err(GofmError::InvalidParameter(format!(
            "embedding dimension must be in 1..={}, got {}",
            n, k
        )));
    }

    let eigen = SymmetricEigen::try_new(l.clone(), f64::EPSILON, 10_000).ok_or_else(|| {
        GofmError::Eigen(format!("no convergence on a {}x{} Laplacian", n, n))
    })?;
    let vectors = -eigen.eigenvectors;

    let mut order: Vec<(usize, f64)> = (0..vectors.ncols())
        .map(|c| (c, vectors.column(c).iter().map(|v| v.abs()).sum()))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut embedding = DMatrix::<f64>::zeros(n, k);
    for (dst, &(src, _)) in order.iter().take(k).enumerate() {
        embedding.set_column(dst, &vectors.column(src));
    }

    match normalization {
        Normalization::Column => {
            for mut col in embedding.column_iter_mut() {
                let norm = col.norm();
                if norm > 0.0 {
                    col /= norm;
                }
            }
        }
        Normalization::Row => {
            for mut row in embedding.row_iter_mut() {
                let norm = row.norm();
                if norm > 0.0 {
                    row /= norm;
                }
            }
        }
    }

    Ok(embedding)
}

#[derive(Debug, Clone)]
pub struct SpectralParams {
    pub k: usize,
    pub bandwidth: Bandwidth,
    pub repeats: usize,
    pub max_iter: usize,
    pub normalization: Normalization,
    pub silhouette: SilhouetteParams,
}

impl SpectralParams {
    pub fn new(k: usize, bandwidth: Bandwidth, config: &ClusterConfig) -> Self {
        Self {
            k,
            bandwidth,
            repeats: config.repeats,
            max_iter: config.max_iter,
            normalization: config.normalization,
            silhouette: SilhouetteParams {
                min_members: config.min_members,
                sample_size: config.sample_size,
            },
        }
    }
}

/// Cluster labels of one (k, sigma) run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub names: Vec<String>,
    pub labels: Vec<usize>,
    pub k: usize,
    pub sigma: f64,
    pub sk: Option<usize>,
    /// Mean silhouette of the chosen restart; unknown for loaded files
    pub silhouette: Option<f64>,
}

/// Cluster the entities of `matrix` into `params.k` groups.
///
/// Fails with `ClusteringFailed` when no restart yields a defined silhouette.
pub fn fit<R: Rng>(
    matrix: &DistanceMatrix,
    params: &SpectralParams,
    rng: &mut R,
) -> Result<Clustering> {
    let n = matrix.size();
    let k = params.k;
    if k < 2 || k > n {
        return Err(GofmError::InvalidParameter(format!(
            "k must be in 2..={} for {} entities, got {}",
            n, n, k
        )));
    }

    let affinity = similarity_to_affinity(matrix.data(), params.bandwidth)?;
    let laplacian = normalized_laplacian(&affinity);
    let embedding = spectral_embedding(&laplacian, k, params.normalization)?;

    let mut best: Option<(usize, f64, Vec<usize>)> = None;
    for attempt in 0..params.repeats {
        let run = kmeans(&embedding, k, params.max_iter, rng)?;
        let Some(score) = silhouette(&embedding, &run.labels, &params.silhouette, rng) else {
            debug!("k={} restart {}: silhouette undefined", k, attempt);
            continue;
        };
        if !score.mean.is_finite() {
            continue;
        }
        if best.as_ref().map_or(true, |b| score.mean > b.1) {
            best = Some((attempt, score.mean, run.labels));
        }
    }

    let Some((attempt, mean, labels)) = best else {
        return Err(GofmError::ClusteringFailed {
            k,
            repeats: params.repeats,
        });
    };
    debug!(
        "k={} sigma={}: restart {} chosen, silhouette {:.4}",
        k,
        params.bandwidth.sigma(),
        attempt,
        mean
    );

    Ok(Clustering {
        names: matrix.names().to_vec(),
        labels,
        k,
        sigma: params.bandwidth.sigma(),
        sk: params.bandwidth.sk(),
        silhouette: Some(mean),
    })
}

impl Clustering {
    /// Member count of each label in `0..k`
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &l in &self.labels {
            if l < self.k {
                sizes[l] += 1;
            }
        }
        sizes
    }

    /// Labels file: `k=<k>,sigma=<sigma>`, then `gene,label`, then one row per entity
    pub fn save(&self, writer: &mut dyn Write) -> Result<()> {
        writeln!(writer, "k={},sigma={}", self.k, self.sigma)?;
        writeln!(writer, "gene,label")?;
        for (name, label) in self.names.iter().zip(&self.labels) {
            writeln!(writer, "{},{}", name, label)?;
        }
        Ok(())
    }

    pub fn load(infile: &str) -> Result<Self> {
        let reader = crate::reader(infile)?;
        let parse_err = |line: usize, message: String| GofmError::Parse {
            path: PathBuf::from(infile),
            line,
            message,
        };

        let mut lines = reader.lines();

        let header = lines
            .next()
            .transpose()?
            .ok_or_else(|| parse_err(1, "empty labels file".to_string()))?;
        let mut k = None;
        let mut sigma = None;
        for field in header.trim().split(',') {
            match field.split_once('=') {
                Some(("k", v)) => k = v.parse::<usize>().ok(),
                Some(("sigma", v)) => sigma = v.parse::<f64>().ok(),
                _ => {}
            }
        }
        let (Some(k), Some(sigma)) = (k, sigma) else {
            return Err(parse_err(1, format!("expected 'k=<k>,sigma=<sigma>', found '{}'", header)));
        };

        match lines.next().transpose()? {
            Some(l) if l.trim() == "gene,label" => {}
            _ => return Err(parse_err(2, "expected 'gene,label'".to_string())),
        }

        let mut names = vec![];
        let mut labels = vec![];
        for (idx, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let Some((name, label)) = line.trim().rsplit_once(',') else {
                return Err(parse_err(idx + 3, format!("expected 'gene,label', found '{}'", line)));
            };
            let label: usize = label
                .parse()
                .map_err(|_| parse_err(idx + 3, format!("bad label '{}'", label)))?;
            names.push(name.to_string());
            labels.push(label);
        }

        Ok(Self {
            names,
            labels,
            k,
            sigma,
            sk: None,
            silhouette: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // two groups on a line, far apart, with different internal spacing
    fn two_groups() -> DistanceMatrix {
        let xs: [f64; 6] = [0.0, 0.2, 0.5, 10.0, 10.1, 10.9];
        let n = xs.len();
        let data = DMatrix::from_fn(n, n, |i, j| (xs[i] - xs[j]).abs());
        let names = (1..=n).map(|i| format!("g{}", i)).collect();
        DistanceMatrix::from_dense(names, data).unwrap()
    }

    #[test]
    fn affinity_properties() {
        let m = two_groups();
        for bandwidth in [Bandwidth::Fixed(0.5), Bandwidth::Fixed(3.0), Bandwidth::SelfTuning(2)] {
            let a = similarity_to_affinity(m.data(), bandwidth).unwrap();
            for i in 0..m.size() {
                assert_eq!(a[(i, i)], 0.0);
                for j in 0..m.size() {
                    assert!(a[(i, j)] >= 0.0);
                    assert_relative_eq!(a[(i, j)], a[(j, i)], epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn fixed_kernel_value() {
        let d = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let a = similarity_to_affinity(&d, Bandwidth::Fixed(1.0)).unwrap();
        assert_relative_eq!(a[(0, 1)], (-0.5f64).exp(), epsilon = 1e-12);

        assert!(similarity_to_affinity(&d, Bandwidth::Fixed(0.0)).is_err());
        assert!(similarity_to_affinity(&d, Bandwidth::SelfTuning(2)).is_err());
    }

    #[test]
    fn self_tuning_scale() {
        // row scales with sk = 1: nearest neighbour distance
        let d = DMatrix::from_row_slice(3, 3, &[0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 2.0, 3.0, 0.0]);
        let a = similarity_to_affinity(&d, Bandwidth::SelfTuning(1)).unwrap();
        // sigma = [1, 1, 2]
        assert_relative_eq!(a[(0, 1)], (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(a[(1, 2)], (-9.0f64 / 2.0).exp(), epsilon = 1e-12);
    }

    #[test]
    fn isolated_entity_gives_non_finite_laplacian() {
        let a = DMatrix::from_row_slice(3, 3, &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let l = normalized_laplacian(&a);
        assert_relative_eq!(l[(0, 1)], 1.0, epsilon = 1e-12);
        assert!(l.iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn embedding_shape_and_norms() {
        let m = two_groups();
        let a = similarity_to_affinity(m.data(), Bandwidth::Fixed(1.0)).unwrap();
        let l = normalized_laplacian(&a);

        let e = spectral_embedding(&l, 2, Normalization::Column).unwrap();
        assert_eq!(e.shape(), (6, 2));
        for c in 0..2 {
            assert_relative_eq!(e.column(c).norm(), 1.0, epsilon = 1e-9);
        }

        let e = spectral_embedding(&l, 2, Normalization::Row).unwrap();
        for r in 0..6 {
            assert_relative_eq!(e.row(r).norm(), 1.0, epsilon = 1e-9);
        }

        assert!(spectral_embedding(&l, 7, Normalization::Column).is_err());
    }

    #[test]
    fn recovers_two_groups() {
        let m = two_groups();
        let params = SpectralParams::new(2, Bandwidth::Fixed(1.0), &ClusterConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        let c = fit(&m, &params, &mut rng).unwrap();

        assert_eq!(c.labels[0], c.labels[1]);
        assert_eq!(c.labels[0], c.labels[2]);
        assert_eq!(c.labels[3], c.labels[4]);
        assert_eq!(c.labels[3], c.labels[5]);
        assert_ne!(c.labels[0], c.labels[3]);
        assert!(c.silhouette.unwrap() > 0.5);
        assert_eq!(c.sizes(), vec![3, 3]);
    }

    #[test]
    fn row_normalization_also_recovers() {
        let m = two_groups();
        let mut config = ClusterConfig::default();
        config.normalization = Normalization::Row;
        let params = SpectralParams::new(2, Bandwidth::Fixed(1.0), &config);
        let mut rng = StdRng::seed_from_u64(7);
        let c = fit(&m, &params, &mut rng).unwrap();
        assert_ne!(c.labels[0], c.labels[5]);
        assert!(c.silhouette.unwrap() > 0.5);
    }

    #[test]
    fn no_defined_restart_fails() {
        let m = two_groups();
        let mut rng = StdRng::seed_from_u64(3);

        let mut config = ClusterConfig::default();
        config.repeats = 0;
        let params = SpectralParams::new(2, Bandwidth::Fixed(1.0), &config);
        let err = fit(&m, &params, &mut rng).unwrap_err();
        assert!(matches!(err, GofmError::ClusteringFailed { k: 2, repeats: 0 }));

        // no cluster of 6 entities can reach 7 members
        let mut config = ClusterConfig::default();
        config.repeats = 4;
        config.min_members = 7;
        let params = SpectralParams::new(2, Bandwidth::Fixed(1.0), &config);
        let err = fit(&m, &params, &mut rng).unwrap_err();
        assert!(matches!(err, GofmError::ClusteringFailed { k: 2, repeats: 4 }));
    }

    #[test]
    fn invalid_k() {
        let m = two_groups();
        let mut rng = StdRng::seed_from_u64(1);
        for k in [1, 7] {
            let params = SpectralParams::new(k, Bandwidth::Fixed(1.0), &ClusterConfig::default());
            assert!(fit(&m, &params, &mut rng).is_err());
        }
    }

    #[test]
    fn labels_file_round_trip() {
        let c = Clustering {
            names: vec!["g1".to_string(), "g2".to_string(), "g3".to_string()],
            labels: vec![1, 0, 1],
            k: 2,
            sigma: 0.25,
            sk: None,
            silhouette: Some(0.9),
        };
        let mut buf = vec![];
        c.save(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "k=2,sigma=0.25\ngene,label\ng1,1\ng2,0\ng3,1\n");

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &text).unwrap();
        let loaded = Clustering::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.names, c.names);
        assert_eq!(loaded.labels, c.labels);
        assert_eq!(loaded.k, 2);
        assert_relative_eq!(loaded.sigma, 0.25);
        assert_eq!(loaded.sizes(), vec![1, 2]);
    }

    #[test]
    fn labels_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in [
            ("nohead.csv", "gene,label\ng1,0\n"),
            ("nocols.csv", "k=2,sigma=1\ng1,0\n"),
            ("label.csv", "k=2,sigma=1\ngene,label\ng1,x\n"),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            let err = Clustering::load(path.to_str().unwrap()).unwrap_err();
            assert!(matches!(err, GofmError::Parse { .. }), "{}", name);
        }
    }
}
