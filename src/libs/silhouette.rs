//! Silhouette scores for a labelling of points in Euclidean space.
//!
//! [`silhouette`] compares each point only with the cluster whose centroid is
//! nearest to its own cluster's centroid, and can subsample large clusters.
//! [`silhouette_exhaustive`] is the textbook all-clusters version, kept as a
//! reference for the approximation.

use nalgebra::DMatrix;
use rand::Rng;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SilhouetteParams {
    /// Clusters smaller than this get no per-point values
    pub min_members: usize,
    /// Evaluate at most this many points per cluster
    pub sample_size: Option<usize>,
}

impl Default for SilhouetteParams {
    fn default() -> Self {
        Self {
            min_members: 2,
            sample_size: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Silhouette {
    /// Per point; `None` when undefined or not sampled
    pub values: Vec<Option<f64>>,
    /// Mean over the defined values of each qualifying cluster
    pub per_cluster: BTreeMap<usize, f64>,
    /// Mean over all defined per-point values
    pub mean: f64,
}

fn euclidean(points: &DMatrix<f64>, a: usize, b: usize) -> f64 {
    (0..points.ncols())
        .map(|c| (points[(a, c)] - points[(b, c)]).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn mean_distance(points: &DMatrix<f64>, x: usize, others: &[usize]) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0;
    for &y in others {
        if y != x {
            sum += euclidean(points, x, y);
            n += 1;
        }
    }
    (n > 0).then(|| sum / n as f64)
}

fn score(intra: f64, inter: f64) -> f64 {
    let denom = intra.max(inter);
    if denom > 0.0 {
        (inter - intra) / denom
    } else {
        0.0
    }
}

fn group(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate() {
        members.entry(l).or_default().push(i);
    }
    members
}

fn summarize(values: Vec<Option<f64>>, members: &BTreeMap<usize, Vec<usize>>) -> Option<Silhouette> {
    let mut per_cluster = BTreeMap::new();
    for (&label, idx) in members {
        let defined: Vec<f64> = idx.iter().filter_map(|&i| values[i]).collect();
        if !defined.is_empty() {
            per_cluster.insert(label, defined.iter().sum::<f64>() / defined.len() as f64);
        }
    }

    let defined: Vec<f64> = values.iter().flatten().cloned().collect();
    if defined.is_empty() {
        return None;
    }
    let mean = defined.iter().sum::<f64>() / defined.len() as f64;

    Some(Silhouette {
        values,
        per_cluster,
        mean,
    })
}

/// Nearest-centroid silhouette of `labels` over the rows of `points`.
///
/// Returns `None` when `labels` does not hold one label per point, fewer
/// than two clusters are non-empty, or no point has a defined value.
pub fn silhouette<R: Rng>(
    points: &DMatrix<f64>,
    labels: &[usize],
    params: &SilhouetteParams,
    rng: &mut R,
) -> Option<Silhouette> {
    let n = points.nrows();
    if labels.len() != n {
        return None;
    }

    let members = group(labels);
    if members.len() < 2 {
        return None;
    }

    let dim = points.ncols();
    let centroids: BTreeMap<usize, Vec<f64>> = members
        .iter()
        .map(|(&label, idx)| {
            let mut c = vec![0.0; dim];
            for &i in idx {
                for (d, v) in c.iter_mut().enumerate() {
                    *v += points[(i, d)];
                }
            }
            c.iter_mut().for_each(|v| *v /= idx.len() as f64);
            (label, c)
        })
        .collect();

    let mut nearest: BTreeMap<usize, usize> = BTreeMap::new();
    for (&a, ca) in &centroids {
        let closest = centroids
            .iter()
            .filter(|(b, _)| **b != a)
            .map(|(&b, cb)| {
                let d: f64 = ca.iter().zip(cb).map(|(x, y)| (x - y).powi(2)).sum();
                (b, d)
            })
            .min_by(|x, y| x.1.total_cmp(&y.1));
        if let Some((b, _)) = closest {
            nearest.insert(a, b);
        }
    }

    let sampled: BTreeMap<usize, Vec<usize>> = members
        .iter()
        .map(|(&label, idx)| {
            let picked = match params.sample_size {
                Some(s) if idx.len() > s => rand::seq::index::sample(rng, idx.len(), s)
                    .into_iter()
                    .map(|k| idx[k])
                    .collect(),
                _ => idx.clone(),
            };
            (label, picked)
        })
        .collect();

    let min_members = params.min_members.max(2);
    let mut values = vec![None; n];
    for (label, idx) in &members {
        if idx.len() < min_members {
            continue;
        }
        let Some(neighbour) = nearest.get(label) else {
            continue;
        };
        let own = &sampled[label];
        let other = &sampled[neighbour];
        for &x in own {
            let (Some(intra), Some(inter)) =
                (mean_distance(points, x, own), mean_distance(points, x, other))
            else {
                continue;
            };
            values[x] = Some(score(intra, inter));
        }
    }

    summarize(values, &members)
}

/// Textbook silhouette: the neighbour cluster is the one with the smallest
/// mean distance, searched over all other clusters.
pub fn silhouette_exhaustive(
    points: &DMatrix<f64>,
    labels: &[usize],
    min_members: usize,
) -> Option<Silhouette> {
    let n = points.nrows();
    if labels.len() != n {
        return None;
    }
    let members = group(labels);
    if members.len() < 2 {
        return None;
    }

    let min_members = min_members.max(2);
    let mut values = vec![None; n];
    for (label, idx) in &members {
        if idx.len() < min_members {
            continue;
        }
        for &x in idx {
            let Some(intra) = mean_distance(points, x, idx) else {
                continue;
            };
            let inter = members
                .iter()
                .filter(|(l, _)| *l != label)
                .filter_map(|(_, other)| mean_distance(points, x, other))
                .fold(f64::INFINITY, f64::min);
            values[x] = Some(score(intra, inter));
        }
    }

    summarize(values, &members)
}
