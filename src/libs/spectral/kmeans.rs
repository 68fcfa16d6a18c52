use crate::libs::error::{GofmError, Result};
use nalgebra::DMatrix;
use rand::Rng;

/// Outcome of one Lloyd's k-means run.
#[derive(Debug, Clone)]
pub struct KMeans {
    /// Cluster of each row, in `0..k`
    pub labels: Vec<usize>,
    /// One row per cluster
    pub centroids: DMatrix<f64>,
    pub iterations: usize,
}

fn squared(data: &DMatrix<f64>, row: usize, centroids: &DMatrix<f64>, c: usize) -> f64 {
    (0..data.ncols())
        .map(|d| (data[(row, d)] - centroids[(c, d)]).powi(2))
        .sum()
}

/// Lloyd's algorithm on the rows of `data`.
///
/// Starts from `k` distinct random rows and stops when no label changes or
/// after `max_iter` rounds. A cluster that loses all members keeps its
/// previous centroid.
pub fn kmeans<R: Rng>(data: &DMatrix<f64>, k: usize, max_iter: usize, rng: &mut R) -> Result<KMeans> {
    let (n, dim) = data.shape();
    if k == 0 || k > n {
        return Err(GofmError::InvalidParameter(format!(
            "k-means needs 1 <= k <= {}, got {}",
            n, k
        )));
    }

    let mut centroids = DMatrix::<f64>::zeros(k, dim);
    for (c, row) in rand::seq::index::sample(rng, n, k).into_iter().enumerate() {
        for d in 0..dim {
            centroids[(c, d)] = data[(row, d)];
        }
    }

    let mut labels = vec![usize::MAX; n];
    let mut iterations = 0;

    while iterations < max_iter.max(1) {
        iterations += 1;

        let mut changed = false;
        for (i, label) in labels.iter_mut().enumerate() {
            let best = (0..k)
                .map(|c| (c, squared(data, i, &centroids, c)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(c, _)| c)
                .unwrap_or(0);
            if *label != best {
                *label = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = DMatrix::<f64>::zeros(k, dim);
        let mut counts = vec![0usize; k];
        for (i, &c) in labels.iter().enumerate() {
            counts[c] += 1;
            for d in 0..dim {
                sums[(c, d)] += data[(i, d)];
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for d in 0..dim {
                centroids[(c, d)] = sums[(c, d)] / counts[c] as f64;
            }
        }
    }

    Ok(KMeans {
        labels,
        centroids,
        iterations,
    })
}
