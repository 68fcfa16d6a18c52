use crate::libs::error::{GofmError, Result};
use crate::libs::pairs::PairRange;
use crate::libs::pool::Pool;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub const HEADER: &str = "i,j,distance";

/// One finite distance between two entities, `i` before `j` in entity order.
///
/// A pair without a record has no finite path; it is never written as 0 or inf.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRecord {
    pub i: String,
    pub j: String,
    pub distance: f64,
}

impl DistanceRecord {
    pub fn new(i: &str, j: &str, distance: f64) -> Self {
        Self {
            i: i.to_string(),
            j: j.to_string(),
            distance,
        }
    }
}

/// Distance between entities at positions `i < j` of an entity list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDistance {
    pub i: usize,
    pub j: usize,
    pub distance: f64,
}

/// Writes `i,j,distance` rows, emitting the header once
pub struct DistanceWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> DistanceWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{}", HEADER)?;
        Ok(Self { writer, written: 0 })
    }

    pub fn write(&mut self, i: &str, j: &str, distance: f64) -> Result<()> {
        writeln!(self.writer, "{},{},{}", i, j, distance)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_record(&mut self, record: &DistanceRecord) -> Result<()> {
        self.write(&record.i, &record.j, record.distance)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Compute the pairs of `range` on `pool`, `chunk` pairs per work item, and
/// write them in pair order. Any failed work item is fatal.
///
/// Returns the number of records written.
pub fn compute_range<W, F>(
    pool: &Pool,
    names: &[String],
    range: PairRange,
    chunk: usize,
    compute: F,
    writer: W,
) -> Result<usize>
where
    W: Write,
    F: Fn(PairRange) -> Result<Vec<PairDistance>> + Sync,
{
    let items = range.chunks(chunk);
    let mut out = DistanceWriter::new(writer)?;

    let errors = pool.run(
        &items,
        |r| compute(*r),
        |batches| {
            for batch in batches {
                for d in batch {
                    out.write(&names[d.i], &names[d.j], d.distance)?;
                }
            }
            Ok(())
        },
    )?;

    if let Some(first) = errors.first() {
        return Err(GofmError::WorkFailed {
            failed: errors.len(),
            first: format!("pairs {}: {}", first.item, first.message),
        });
    }

    let written = out.written();
    out.finish()?;
    Ok(written)
}

/// Parse a distance file and call `f` for each record.
///
/// Any deviation from the format is a `MalformedPartition` error naming the
/// file and line. Returns the number of records.
pub fn for_each_record<F>(infile: &str, mut f: F) -> Result<usize>
where
    F: FnMut(DistanceRecord) -> Result<()>,
{
    let reader = crate::reader(infile)?;
    let malformed = |line: usize, message: String| GofmError::MalformedPartition {
        path: PathBuf::from(infile),
        line,
        message,
    };

    let mut count = 0;
    let mut lines = reader.lines().enumerate();

    match lines.next() {
        Some((_, header)) => {
            let header = header?;
            if header.trim() != HEADER {
                return Err(malformed(1, format!("expected header '{}'", HEADER)));
            }
        }
        None => return Err(malformed(0, "empty file".to_string())),
    }

    for (idx, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 3 {
            return Err(malformed(
                idx + 1,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        }
        let distance: f64 = fields[2]
            .trim()
            .parse()
            .map_err(|_| malformed(idx + 1, format!("bad distance '{}'", fields[2])))?;
        if !distance.is_finite() || distance < 0.0 {
            return Err(malformed(
                idx + 1,
                format!("distance must be finite and non-negative, got {}", distance),
            ));
        }
        f(DistanceRecord::new(fields[0], fields[1], distance))?;
        count += 1;
    }

    Ok(count)
}

pub fn read_records(infile: &str) -> Result<Vec<DistanceRecord>> {
    let mut records = vec![];
    for_each_record(infile, |r| {
        records.push(r);
        Ok(())
    })?;
    Ok(records)
}
