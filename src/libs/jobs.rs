//! Partitioned distance runs scheduled outside this process.
//!
//! A [`Manifest`] splits the pair space of `n` entities into contiguous
//! [`PairRange`]s, each owned by one output file. [`write_scripts`] emits a
//! shell script per partition for an external queue, [`wait_for`] polls until
//! every partition is complete, and [`assemble`] concatenates them in range
//! order. A partition is complete once its `<path>.done` marker exists; the
//! scripts touch it only after the distance command has exited successfully.
//!
//! Manifest format, tab separated:
//!
//! ```text
//! #entities=120	total=7140
//! 0	1785	dist/part.0-1785.csv
//! 1785	3570	dist/part.1785-3570.csv
//! ...
//! ```

use crate::libs::distance::{for_each_record, DistanceWriter};
use crate::libs::error::{GofmError, Result};
use crate::libs::pairs::{total_pairs, PairRange};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub range: PairRange,
    pub path: PathBuf,
}

impl Part {
    /// Marker written next to the partition when its job finished
    pub fn done_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".done");
        PathBuf::from(name)
    }

    pub fn is_complete(&self) -> bool {
        self.path.is_file() && self.done_path().is_file()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub entities: usize,
    pub total: usize,
    pub parts: Vec<Part>,
}

impl Manifest {
    /// Split the pairs of `entities` into `parts` ranges writing to `dir/<prefix>.<first>-<last>.csv`
    pub fn plan(entities: usize, parts: usize, dir: &Path, prefix: &str) -> Self {
        let total = total_pairs(entities);
        let parts = PairRange::split(total, parts)
            .into_iter()
            .map(|range| Part {
                path: dir.join(format!("{}.{}.csv", prefix, range)),
                range,
            })
            .collect();
        Self {
            entities,
            total,
            parts,
        }
    }

    pub fn write(&self, writer: &mut dyn Write) -> Result<()> {
        writeln!(writer, "#entities={}\ttotal={}", self.entities, self.total)?;
        for p in &self.parts {
            writeln!(
                writer,
                "{}\t{}\t{}",
                p.range.first,
                p.range.last,
                p.path.display()
            )?;
        }
        Ok(())
    }

    pub fn save(&self, outfile: &str) -> Result<()> {
        let mut writer = crate::writer(outfile)?;
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse a manifest; the ranges must tile `[0, total)` in order
    pub fn read(infile: &str) -> Result<Self> {
        let reader = crate::reader(infile)?;
        let parse_err = |line: usize, message: String| GofmError::Parse {
            path: PathBuf::from(infile),
            line,
            message,
        };

        let mut entities = None;
        let mut total = None;
        let mut parts = vec![];

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('#') {
                for field in header.split('\t') {
                    match field.split_once('=') {
                        Some(("entities", v)) => entities = v.parse::<usize>().ok(),
                        Some(("total", v)) => total = v.parse::<usize>().ok(),
                        _ => {}
                    }
                }
                continue;
            }

            let fields: Vec<&str> = line.splitn(3, '\t').collect();
            if fields.len() != 3 {
                return Err(parse_err(idx + 1, "expected 'first<TAB>last<TAB>path'".to_string()));
            }
            let first: usize = fields[0]
                .parse()
                .map_err(|_| parse_err(idx + 1, format!("bad first '{}'", fields[0])))?;
            let last: usize = fields[1]
                .parse()
                .map_err(|_| parse_err(idx + 1, format!("bad last '{}'", fields[1])))?;
            parts.push(Part {
                range: PairRange::new(first, last),
                path: PathBuf::from(fields[2]),
            });
        }

        let (Some(entities), Some(total)) = (entities, total) else {
            return Err(parse_err(1, "missing '#entities=<n>\\ttotal=<pairs>' header".to_string()));
        };
        if total != total_pairs(entities) {
            return Err(parse_err(
                1,
                format!("{} entities have {} pairs, not {}", entities, total_pairs(entities), total),
            ));
        }
        let mut next = 0;
        for p in &parts {
            if p.range.first != next {
                return Err(parse_err(0, format!("range {} does not start at {}", p.range, next)));
            }
            next = p.range.last;
        }
        if next != total {
            return Err(parse_err(0, format!("ranges end at {}, expected {}", next, total)));
        }

        Ok(Self {
            entities,
            total,
            parts,
        })
    }

    /// Partitions without output or without a completion marker
    pub fn missing(&self) -> Vec<&Part> {
        self.parts.iter().filter(|p| !p.is_complete()).collect()
    }
}

/// Write one executable script per partition plus `submit.list`.
///
/// Each script runs `<command> --first <first> --last <last> -o <path>`
/// after the optional `prelude` lines, then touches `<path>.done`.
pub fn write_scripts(
    manifest: &Manifest,
    dir: &Path,
    command: &str,
    prelude: Option<&str>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut scripts = vec![];
    for part in &manifest.parts {
        let script = dir.join(format!("job.{}.sh", part.range));
        let mut body = String::from("#!/usr/bin/env bash\nset -euo pipefail\n\n");
        if let Some(prelude) = prelude {
            body.push_str(prelude.trim_end());
            body.push('\n');
        }
        body.push_str(&format!(
            "rm -f {}\n{} --first {} --last {} -o {}\ntouch {}\n",
            part.done_path().display(),
            command,
            part.range.first,
            part.range.last,
            part.path.display(),
            part.done_path().display()
        ));
        std::fs::write(&script, body)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
        }
        scripts.push(script);
    }

    let mut list = std::fs::File::create(dir.join("submit.list"))?;
    for s in &scripts {
        writeln!(list, "{}", s.display())?;
    }

    info!("{} job scripts in {}", scripts.len(), dir.display());
    Ok(scripts)
}

/// Poll every `interval` until all partitions are complete.
///
/// After `max_polls` unsuccessful polls the first missing partition is
/// reported as `MissingPartition`.
pub fn wait_for(manifest: &Manifest, interval: Duration, max_polls: usize) -> Result<()> {
    for poll in 0..=max_polls {
        let missing = manifest.missing();
        let Some(first) = missing.first() else {
            return Ok(());
        };
        if poll == max_polls {
            return Err(GofmError::MissingPartition {
                path: first.path.clone(),
                first: first.range.first,
                last: first.range.last,
            });
        }
        info!(
            "waiting for {} of {} partitions",
            missing.len(),
            manifest.parts.len()
        );
        std::thread::sleep(interval);
    }
    Ok(())
}

/// Counts from [`assemble`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyReport {
    pub parts: usize,
    pub recovered: usize,
    pub expected: usize,
}

impl AssemblyReport {
    /// Pairs without a finite distance
    pub fn missing(&self) -> usize {
        self.expected.saturating_sub(self.recovered)
    }
}

/// Concatenate every partition of `manifest` under a single header.
///
/// A missing, unfinished or malformed partition is fatal. Fewer records than
/// pairs is only reported.
pub fn assemble<W: Write>(manifest: &Manifest, writer: W) -> Result<AssemblyReport> {
    for part in &manifest.parts {
        if !part.is_complete() {
            return Err(GofmError::MissingPartition {
                path: part.path.clone(),
                first: part.range.first,
                last: part.range.last,
            });
        }
    }

    let mut out = DistanceWriter::new(writer)?;
    for part in &manifest.parts {
        let path = part.path.to_string_lossy();
        for_each_record(&path, |r| out.write_record(&r))?;
    }
    let recovered = out.written();
    out.finish()?;

    let report = AssemblyReport {
        parts: manifest.parts.len(),
        recovered,
        expected: manifest.total,
    };
    info!(
        "recovered {} of {} distances from {} partitions",
        report.recovered, report.expected, report.parts
    );
    if report.missing() > 0 {
        warn!("{} pairs have no finite distance", report.missing());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    // output of a job still running
    fn write_partial(part: &Part, rows: &[&str]) {
        let mut text = String::from("i,j,distance\n");
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        std::fs::write(&part.path, text).unwrap();
    }

    fn write_part(part: &Part, rows: &[&str]) {
        write_partial(part, rows);
        std::fs::write(part.done_path(), "").unwrap();
    }

    #[test]
    fn plan_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::plan(5, 3, dir.path(), "term");
        assert_eq!(manifest.total, 10);
        assert_eq!(manifest.parts.len(), 3);
        assert_eq!(manifest.parts[0].range.first, 0);
        assert_eq!(manifest.parts[2].range.last, 10);

        let file = dir.path().join("manifest.tsv");
        manifest.save(file.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(&file).unwrap();
        assert!(text.starts_with("#entities=5\ttotal=10\n0\t"));

        let back = Manifest::read(file.to_str().unwrap()).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn read_rejects_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("manifest.tsv");
        std::fs::write(&file, "#entities=5\ttotal=10\n0\t4\ta.csv\n5\t10\tb.csv\n").unwrap();
        assert!(Manifest::read(file.to_str().unwrap()).is_err());

        std::fs::write(&file, "0\t10\ta.csv\n").unwrap();
        assert!(Manifest::read(file.to_str().unwrap()).is_err());
    }

    #[test]
    fn scripts() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::plan(4, 2, &dir.path().join("out"), "gene");
        let scripts = write_scripts(
            &manifest,
            &dir.path().join("jobs"),
            "gofm term-dist graph.bin",
            Some("module load gofm"),
        )
        .unwrap();
        assert_eq!(scripts.len(), 2);

        let body = std::fs::read_to_string(&scripts[1]).unwrap();
        assert!(body.starts_with("#!/usr/bin/env bash"));
        assert!(body.contains("module load gofm\n"));
        assert!(body.contains("gofm term-dist graph.bin --first 3 --last 6 -o "));
        assert!(body.trim_end().ends_with(".csv.done"));
        assert!(body.contains("\ntouch "));

        let list = std::fs::read_to_string(dir.path().join("jobs/submit.list")).unwrap();
        assert_eq!(list.lines().count(), 2);
    }

    #[test]
    fn assemble_in_range_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::plan(4, 2, dir.path(), "term");
        write_part(&manifest.parts[1], &["b,c,1.5", "c,d,0.5"]);
        write_part(&manifest.parts[0], &["a,b,1"]);

        wait_for(&manifest, Duration::from_millis(1), 0).unwrap();

        let mut buf = vec![];
        let report = assemble(&manifest, &mut buf).unwrap();
        assert_eq!(report.recovered, 3);
        assert_eq!(report.expected, 6);
        assert_eq!(report.missing(), 3);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "i,j,distance\na,b,1\nb,c,1.5\nc,d,0.5\n"
        );
    }

    #[test]
    fn missing_and_malformed_partitions_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::plan(4, 2, dir.path(), "term");
        write_part(&manifest.parts[0], &["a,b,1"]);

        let err = assemble(&manifest, vec![]).unwrap_err();
        assert!(matches!(err, GofmError::MissingPartition { first: 3, last: 6, .. }));

        let err = wait_for(&manifest, Duration::from_millis(1), 2).unwrap_err();
        assert!(matches!(err, GofmError::MissingPartition { .. }));

        std::fs::write(&manifest.parts[1].path, "a,b,1\n").unwrap();
        std::fs::write(manifest.parts[1].done_path(), "").unwrap();
        let err = assemble(&manifest, vec![]).unwrap_err();
        assert!(matches!(err, GofmError::MalformedPartition { .. }));
    }

    #[test]
    fn unfinished_partition_is_not_assembled() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::plan(4, 2, dir.path(), "term");
        write_part(&manifest.parts[0], &["a,b,1"]);
        // row cut inside the number
        write_partial(&manifest.parts[1], &["b,c,1"]);

        assert_eq!(manifest.missing().len(), 1);
        let err = wait_for(&manifest, Duration::from_millis(1), 0).unwrap_err();
        assert!(matches!(err, GofmError::MissingPartition { first: 3, last: 6, .. }));

        let mut buf = vec![];
        let err = assemble(&manifest, &mut buf).unwrap_err();
        assert!(matches!(err, GofmError::MissingPartition { first: 3, last: 6, .. }));
        assert!(buf.is_empty());

        std::fs::write(manifest.parts[1].done_path(), "").unwrap();
        assert!(manifest.missing().is_empty());
        let report = assemble(&manifest, vec![]).unwrap();
        assert_eq!(report.recovered, 2);
    }
}
