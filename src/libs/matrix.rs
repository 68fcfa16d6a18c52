use crate::libs::distance::{for_each_record, DistanceRecord};
use crate::libs::error::{GofmError, Result};
use indexmap::IndexSet;
use nalgebra::DMatrix;

/// Value used for pairs that have no distance record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    /// The largest observed distance
    Max,
    Value(f64),
}

/// Dense symmetric distance matrix over a sorted entity list.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    names: Vec<String>,
    data: DMatrix<f64>,
}

impl DistanceMatrix {
    /// Build from sparse records; entities are the sorted set of names seen.
    pub fn from_records(records: &[DistanceRecord], fill: Fill) -> Result<Self> {
        let mut set: IndexSet<&str> = IndexSet::new();
        for r in records {
            set.insert(&r.i);
            set.insert(&r.j);
        }
        set.sort();
        let n = set.len();

        let max = records.iter().map(|r| r.distance).fold(0.0, f64::max);
        let fill_value = match fill {
            Fill::Max => max,
            Fill::Value(v) if v.is_finite() && v >= 0.0 => v,
            Fill::Value(v) => {
                return Err(GofmError::InvalidParameter(format!(
                    "fill value must be finite and non-negative, got {}",
                    v
                )))
            }
        };

        let mut data = DMatrix::from_element(n, n, fill_value);
        for k in 0..n {
            data[(k, k)] = 0.0;
        }
        for r in records {
            let (Some(a), Some(b)) = (set.get_index_of(r.i.as_str()), set.get_index_of(r.j.as_str())) else {
                continue;
            };
            if a == b {
                continue;
            }
            data[(a, b)] = r.distance;
            data[(b, a)] = r.distance;
        }

        Ok(Self {
            names: set.into_iter().map(|s| s.to_string()).collect(),
            data,
        })
    }

    /// Load an `i,j,distance` file
    pub fn from_file(infile: &str, fill: Fill) -> Result<Self> {
        let mut records = vec![];
        for_each_record(infile, |r| {
            records.push(r);
            Ok(())
        })?;
        Self::from_records(&records, fill)
    }

    /// Build from a full square matrix; the input must be symmetric with a zero diagonal.
    pub fn from_dense(names: Vec<String>, data: DMatrix<f64>) -> Result<Self> {
        if !data.is_square() || data.nrows() != names.len() {
            return Err(GofmError::InvalidParameter(format!(
                "{} names for a {}x{} matrix",
                names.len(),
                data.nrows(),
                data.ncols()
            )));
        }
        let n = names.len();
        for i in 0..n {
            if data[(i, i)] != 0.0 {
                return Err(GofmError::InvalidParameter(format!(
                    "non-zero self-distance for {}",
                    names[i]
                )));
            }
            for j in (i + 1)..n {
                if (data[(i, j)] - data[(j, i)]).abs() > 1e-9 {
                    return Err(GofmError::InvalidParameter(format!(
                        "asymmetric distance between {} and {}",
                        names[i], names[j]
                    )));
                }
            }
        }
        Ok(Self { names, data })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }
}
