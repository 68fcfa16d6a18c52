use crate::libs::annotation::GeneAnnotations;
use crate::libs::distance::{for_each_record, PairDistance};
use crate::libs::error::Result;
use crate::libs::pairs::{total_pairs, PairRange};
use fxhash::FxHashMap;

/// Sparse term-term distances keyed by interned term indices.
#[derive(Debug, Default, Clone)]
pub struct TermDistanceTable {
    index: FxHashMap<String, u32>,
    dist: FxHashMap<(u32, u32), f64>,
}

impl TermDistanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an assembled `i,j,distance` file
    pub fn from_file(infile: &str) -> Result<Self> {
        let mut table = Self::new();
        for_each_record(infile, |r| {
            table.insert(&r.i, &r.j, r.distance);
            Ok(())
        })?;
        Ok(table)
    }

    fn intern(&mut self, term: &str) -> u32 {
        let next = self.index.len() as u32;
        *self.index.entry(term.to_string()).or_insert(next)
    }

    /// Keep the smaller value when a pair is seen twice
    pub fn insert(&mut self, a: &str, b: &str, distance: f64) {
        if a == b {
            return;
        }
        let (x, y) = (self.intern(a), self.intern(b));
        let key = (x.min(y), x.max(y));
        self.dist
            .entry(key)
            .and_modify(|d| *d = d.min(distance))
            .or_insert(distance);
    }

    pub fn id(&self, term: &str) -> Option<u32> {
        self.index.get(term).copied()
    }

    pub fn get(&self, a: u32, b: u32) -> Option<f64> {
        self.dist.get(&(a.min(b), a.max(b))).copied()
    }

    pub fn len(&self) -> usize {
        self.dist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dist.is_empty()
    }
}

/// Minimum-linkage gene distances over annotation term sets.
///
/// `d(A, B) = min d(ta, tb)` over `ta` in `T(A)`, `tb` in `T(B)`, `ta != tb`.
/// Genes with no finite cross-term distance get no record.
pub struct GeneDistances<'a> {
    genes: Vec<String>,
    terms: Vec<Vec<u32>>,
    table: &'a TermDistanceTable,
}

impl<'a> GeneDistances<'a> {
    pub fn new(mapping: &GeneAnnotations, table: &'a TermDistanceTable) -> Self {
        let genes = mapping.genes();
        let terms = genes
            .iter()
            .map(|g| {
                mapping
                    .terms_of(g)
                    .map(|ts| ts.iter().filter_map(|t| table.id(t)).collect())
                    .unwrap_or_default()
            })
            .collect();
        Self {
            genes,
            terms,
            table,
        }
    }

    /// Sorted gene identifiers; the entity order of the pair linearization
    pub fn entities(&self) -> &[String] {
        &self.genes
    }

    pub fn total_pairs(&self) -> usize {
        total_pairs(self.genes.len())
    }

    pub fn distance(&self, i: usize, j: usize) -> Option<f64> {
        let mut best: Option<f64> = None;
        for &ta in &self.terms[i] {
            for &tb in &self.terms[j] {
                if ta == tb {
                    continue;
                }
                if let Some(d) = self.table.get(ta, tb) {
                    best = Some(best.map_or(d, |b| b.min(d)));
                }
            }
        }
        best
    }

    pub fn compute(&self, range: PairRange) -> Vec<PairDistance> {
        range
            .iter(self.genes.len())
            .filter_map(|(i, j)| {
                self.distance(i, j)
                    .map(|distance| PairDistance { i, j, distance })
            })
            .collect()
    }
}
