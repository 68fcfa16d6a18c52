use crate::libs::config::{ClusterConfig, SearchConfig};
use crate::libs::error::{GofmError, Result};
use crate::libs::matrix::DistanceMatrix;
use crate::libs::ontology::Aspect;
use crate::libs::pool::Pool;
use crate::libs::spectral::{fit, Bandwidth, SpectralParams};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

pub const SILHOUETTE_HEADER: &str = "k,sigma,silhouette";

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start];
    }
    (0..n)
        .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
        .map(|v| (v * 1e6).round() / 1e6)
        .collect()
}

/// The (k, sigma) combinations of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub ks: Vec<usize>,
    pub sigmas: Vec<f64>,
}

impl Grid {
    /// 15 evenly spaced values from 20 to 500
    pub fn default_ks() -> Vec<usize> {
        linspace(20.0, 500.0, 15)
            .into_iter()
            .map(|v| v.round() as usize)
            .collect()
    }

    /// Ten evenly spaced sigmas; the scale differs per aspect
    pub fn default_sigmas(aspect: Aspect) -> Vec<f64> {
        match aspect {
            Aspect::BiologicalProcess => linspace(0.1, 1.0, 10),
            Aspect::CellularComponent => linspace(0.05, 0.5, 10),
            Aspect::MolecularFunction => linspace(0.5, 5.0, 10),
        }
    }

    /// Defaults for `aspect`, overridden by whatever `config` sets
    pub fn for_aspect(aspect: Aspect, config: &SearchConfig) -> Self {
        let ks = config.ks.clone().unwrap_or_else(Self::default_ks);
        let sigmas = match aspect {
            Aspect::BiologicalProcess => config.sigmas_bp.clone(),
            Aspect::MolecularFunction => config.sigmas_mf.clone(),
            Aspect::CellularComponent => config.sigmas_cc.clone(),
        }
        .unwrap_or_else(|| Self::default_sigmas(aspect));
        Self { ks, sigmas }
    }

    /// k-major order
    pub fn points(&self) -> Vec<(usize, f64)> {
        let mut points = vec![];
        for &k in &self.ks {
            for &sigma in &self.sigmas {
                points.push((k, sigma));
            }
        }
        points
    }
}

/// Grid points per pool chunk: `ceil(ln n)`, at least 1
pub fn default_chunk(n: usize) -> usize {
    ((n.max(1) as f64).ln().ceil() as usize).max(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub k: usize,
    pub sigma: f64,
    pub silhouette: f64,
    pub sizes: Vec<usize>,
}

/// Cluster `matrix` at every grid point on `pool`.
///
/// Each combination gets its own generator seeded from `seed`, `k` and
/// `sigma`, so results do not depend on scheduling. Failed combinations are
/// logged and left out.
pub fn run_grid(
    matrix: &DistanceMatrix,
    grid: &Grid,
    config: &ClusterConfig,
    pool: &Pool,
    seed: u64,
) -> Result<Vec<SearchResult>> {
    let points = grid.points();
    info!(
        "searching {} combinations over {} entities on {} threads",
        points.len(),
        matrix.size(),
        pool.threads()
    );

    let (results, errors) = pool.map(&points, |&(k, sigma)| {
        let params = SpectralParams::new(k, Bandwidth::Fixed(sigma), config);
        let mut rng = StdRng::seed_from_u64(
            seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ sigma.to_bits(),
        );
        let clustering = fit(matrix, &params, &mut rng)?;
        Ok(SearchResult {
            k,
            sigma,
            silhouette: clustering.silhouette.unwrap_or(f64::NAN),
            sizes: clustering.sizes(),
        })
    })?;

    if !errors.is_empty() {
        warn!("{} of {} combinations failed", errors.len(), points.len());
    }
    Ok(results)
}

pub fn write_silhouettes(results: &[SearchResult], writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "{}", SILHOUETTE_HEADER)?;
    for r in results {
        writeln!(writer, "{},{},{}", r.k, r.sigma, r.silhouette)?;
    }
    Ok(())
}

/// Ragged rows `k,sigma,size_0,...`; no header
pub fn write_sizes(results: &[SearchResult], writer: &mut dyn Write) -> Result<()> {
    for r in results {
        write!(writer, "{},{}", r.k, r.sigma)?;
        for s in &r.sizes {
            write!(writer, ",{}", s)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn parse_err(infile: &str, line: usize, message: String) -> GofmError {
    GofmError::Parse {
        path: PathBuf::from(infile),
        line,
        message,
    }
}

fn parse_key(infile: &str, line: usize, k: &str, sigma: &str) -> Result<(usize, f64)> {
    let k = k
        .trim()
        .parse()
        .map_err(|_| parse_err(infile, line, format!("bad k '{}'", k)))?;
    let sigma = sigma
        .trim()
        .parse()
        .map_err(|_| parse_err(infile, line, format!("bad sigma '{}'", sigma)))?;
    Ok((k, sigma))
}

pub fn read_silhouettes(infile: &str) -> Result<Vec<(usize, f64, f64)>> {
    let reader = crate::reader(infile)?;
    let mut rows = vec![];
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if idx == 0 {
            if line.trim() != SILHOUETTE_HEADER {
                return Err(parse_err(
                    infile,
                    1,
                    format!("expected header '{}'", SILHOUETTE_HEADER),
                ));
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 3 {
            return Err(parse_err(infile, idx + 1, "expected 'k,sigma,silhouette'".to_string()));
        }
        let (k, sigma) = parse_key(infile, idx + 1, fields[0], fields[1])?;
        let silhouette = fields[2]
            .trim()
            .parse()
            .map_err(|_| parse_err(infile, idx + 1, format!("bad silhouette '{}'", fields[2])))?;
        rows.push((k, sigma, silhouette));
    }
    Ok(rows)
}

pub fn read_sizes(infile: &str) -> Result<Vec<(usize, f64, Vec<usize>)>> {
    let reader = crate::reader(infile)?;
    let mut rows = vec![];
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 2 {
            return Err(parse_err(infile, idx + 1, "expected 'k,sigma,sizes...'".to_string()));
        }
        let (k, sigma) = parse_key(infile, idx + 1, fields[0], fields[1])?;
        let sizes = fields[2..]
            .iter()
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|_| parse_err(infile, idx + 1, format!("bad size '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((k, sigma, sizes));
    }
    Ok(rows)
}

/// Join the two result files on (k, sigma), in silhouette-file order
pub fn read_results(silhouette_file: &str, sizes_file: &str) -> Result<Vec<SearchResult>> {
    let mut sizes: HashMap<(usize, u64), Vec<usize>> = read_sizes(sizes_file)?
        .into_iter()
        .map(|(k, sigma, s)| ((k, sigma.to_bits()), s))
        .collect();

    let mut results = vec![];
    for (k, sigma, silhouette) in read_silhouettes(silhouette_file)? {
        match sizes.remove(&(k, sigma.to_bits())) {
            Some(sizes) => results.push(SearchResult {
                k,
                sigma,
                silhouette,
                sizes,
            }),
            None => warn!("k={} sigma={}: no cluster sizes, skipped", k, sigma),
        }
    }
    Ok(results)
}

/// Fraction of entities in clusters with `size_min <= size <= size_max`
pub fn acceptable_fraction(sizes: &[usize], size_min: usize, size_max: usize) -> f64 {
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let ok: usize = sizes
        .iter()
        .filter(|&&s| s >= size_min && s <= size_max)
        .sum();
    ok as f64 / total as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub k: usize,
    pub sigma: f64,
    pub silhouette: f64,
    pub fraction: f64,
    /// `fraction + silhouette`
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub combined: Vec<Ranked>,
    pub by_silhouette: Vec<Ranked>,
    pub by_fraction: Vec<Ranked>,
}

impl Selection {
    pub fn best(&self) -> Option<&Ranked> {
        self.combined.first()
    }

    /// TSV with one block per ranking
    pub fn write(&self, writer: &mut dyn Write) -> Result<()> {
        writeln!(writer, "metric\trank\tk\tsigma\tsilhouette\tfraction\tscore")?;
        for (metric, list) in [
            ("combined", &self.combined),
            ("silhouette", &self.by_silhouette),
            ("fraction", &self.by_fraction),
        ] {
            for (i, r) in list.iter().enumerate() {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{:.4}\t{:.4}\t{:.4}",
                    metric,
                    i + 1,
                    r.k,
                    r.sigma,
                    r.silhouette,
                    r.fraction,
                    r.score
                )?;
            }
        }
        Ok(())
    }
}

fn rank_by<F>(ranked: &[Ranked], n: usize, metric: F) -> Vec<Ranked>
where
    F: Fn(&Ranked) -> f64,
{
    let mut sorted = ranked.to_vec();
    sorted.sort_by(|a, b| {
        metric(b)
            .total_cmp(&metric(a))
            .then(a.k.cmp(&b.k))
            .then(a.sigma.total_cmp(&b.sigma))
    });
    sorted.truncate(n);
    sorted
}

/// Rank combinations by `fraction + silhouette`, keeping `top`, plus the
/// best three by each metric alone. Non-finite silhouettes are ignored.
pub fn select(results: &[SearchResult], size_min: usize, size_max: usize, top: usize) -> Selection {
    let ranked: Vec<Ranked> = results
        .iter()
        .filter(|r| r.silhouette.is_finite())
        .map(|r| {
            let fraction = acceptable_fraction(&r.sizes, size_min, size_max);
            Ranked {
                k: r.k,
                sigma: r.sigma,
                silhouette: r.silhouette,
                fraction,
                score: fraction + r.silhouette,
            }
        })
        .collect();

    Selection {
        combined: rank_by(&ranked, top, |r| r.score),
        by_silhouette: rank_by(&ranked, 3, |r| r.silhouette),
        by_fraction: rank_by(&ranked, 3, |r| r.fraction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    // three groups on a line: 4, 3 and 3 members
    fn ten() -> DistanceMatrix {
        let xs: [f64; 10] = [0.0, 0.05, 0.1, 0.15, 0.6, 0.7, 0.75, 1.5, 1.6, 1.65];
        let n = xs.len();
        let data = DMatrix::from_fn(n, n, |i, j| (xs[i] - xs[j]).abs());
        let names = (1..=n).map(|i| format!("g{:02}", i)).collect();
        DistanceMatrix::from_dense(names, data).unwrap()
    }

    #[test]
    fn default_grid() {
        let ks = Grid::default_ks();
        assert_eq!(ks.len(), 15);
        assert_eq!(ks[0], 20);
        assert_eq!(ks[14], 500);
        assert!(ks.windows(2).all(|w| w[0] < w[1]));

        let bp = Grid::default_sigmas(Aspect::BiologicalProcess);
        let mf = Grid::default_sigmas(Aspect::MolecularFunction);
        let cc = Grid::default_sigmas(Aspect::CellularComponent);
        assert_eq!(bp.len(), 10);
        assert_relative_eq!(bp[2], 0.3);
        assert_relative_eq!(mf[9], 5.0);
        assert_relative_eq!(cc[0], 0.05);

        let mut config = SearchConfig::default();
        config.sigmas_mf = Some(vec![1.0]);
        let grid = Grid::for_aspect(Aspect::MolecularFunction, &config);
        assert_eq!(grid.sigmas, vec![1.0]);
        assert_eq!(grid.points().len(), 15);
    }

    #[test]
    fn chunk_from_entity_count() {
        assert_eq!(default_chunk(0), 1);
        assert_eq!(default_chunk(1), 1);
        assert_eq!(default_chunk(10), 3);
        assert_eq!(default_chunk(20000), 10);
    }

    #[test]
    fn small_grid() {
        let matrix = ten();
        let grid = Grid {
            ks: vec![2, 3],
            sigmas: vec![0.1, 0.5],
        };
        let pool = Pool::new(2, default_chunk(matrix.size())).unwrap();
        let results = run_grid(&matrix, &grid, &ClusterConfig::default(), &pool, 11).unwrap();

        assert_eq!(results.len(), 4);
        for r in &results {
            assert_eq!(r.sizes.len(), r.k);
            assert_eq!(r.sizes.iter().sum::<usize>(), 10);
            assert!((-1.0..=1.0).contains(&r.silhouette));
        }

        // same seed, same answer
        let again = run_grid(&matrix, &grid, &ClusterConfig::default(), &pool, 11).unwrap();
        assert_eq!(results, again);
    }

    #[test]
    fn failed_combinations_are_skipped() {
        let matrix = ten();
        let grid = Grid {
            ks: vec![2, 20],
            sigmas: vec![0.5],
        };
        let pool = Pool::new(1, 1).unwrap();
        let results = run_grid(&matrix, &grid, &ClusterConfig::default(), &pool, 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].k, 2);
    }

    #[test]
    fn files_join_on_k_and_sigma() {
        let results = vec![
            SearchResult {
                k: 2,
                sigma: 0.1,
                silhouette: 0.8,
                sizes: vec![6, 4],
            },
            SearchResult {
                k: 3,
                sigma: 0.1,
                silhouette: 0.5,
                sizes: vec![4, 3, 3],
            },
        ];
        let dir = tempfile::tempdir().unwrap();
        let sil = dir.path().join("sil.csv");
        let sizes = dir.path().join("sizes.csv");

        let mut buf = vec![];
        write_silhouettes(&results, &mut buf).unwrap();
        std::fs::write(&sil, &buf).unwrap();
        let mut buf = vec![];
        write_sizes(&results, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "2,0.1,6,4\n3,0.1,4,3,3\n");
        std::fs::write(&sizes, &buf).unwrap();

        let back = read_results(sil.to_str().unwrap(), sizes.to_str().unwrap()).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn selection() {
        let results = vec![
            SearchResult {
                k: 2,
                sigma: 0.1,
                silhouette: 0.7,
                sizes: vec![2, 8],
            },
            SearchResult {
                k: 3,
                sigma: 0.1,
                silhouette: 0.6,
                sizes: vec![4, 3, 3],
            },
            SearchResult {
                k: 3,
                sigma: 0.5,
                silhouette: f64::NAN,
                sizes: vec![4, 3, 3],
            },
        ];
        assert_relative_eq!(acceptable_fraction(&[2, 8], 3, 300), 0.8);

        let sel = select(&results, 3, 300, 5);
        assert_eq!(sel.combined.len(), 2);
        // 1.0 + 0.6 beats 0.8 + 0.7
        assert_eq!((sel.best().unwrap().k, sel.best().unwrap().sigma), (3, 0.1));
        assert_eq!(sel.by_silhouette[0].k, 2);
        assert_eq!(sel.by_fraction[0].k, 3);

        let mut buf = vec![];
        sel.write(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("metric\trank\tk\tsigma"));
        assert_eq!(text.lines().count(), 1 + 2 + 2 + 2);
    }
}
