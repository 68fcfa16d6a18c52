use crate::libs::error::{GofmError, Result};
use crate::libs::spectral::Clustering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `transcript<TAB>gene` lines; `#` comments and blank lines are skipped
pub fn read_transcript_map(infile: &str) -> Result<HashMap<String, String>> {
    let reader = crate::reader(infile)?;
    let mut map = HashMap::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        match (fields.next(), fields.next()) {
            (Some(t), Some(g)) if !t.is_empty() && !g.trim().is_empty() => {
                map.insert(t.to_string(), g.trim().to_string());
            }
            _ => {
                return Err(GofmError::Parse {
                    path: PathBuf::from(infile),
                    line: idx + 1,
                    message: "expected 'transcript<TAB>gene'".to_string(),
                })
            }
        }
    }
    Ok(map)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneSet {
    pub label: usize,
    pub genes: BTreeSet<String>,
}

impl GeneSet {
    pub fn name(&self) -> String {
        format!("cluster_{}", self.label)
    }
}

/// Gene sets of one clustering, ordered by label.
#[derive(Debug, Clone)]
pub struct GeneSets {
    pub k: usize,
    pub sigma: f64,
    pub sets: Vec<GeneSet>,
    /// Entities without an entry in the transcript map
    pub unmapped: usize,
    /// Sets below the minimum size
    pub dropped: usize,
}

impl GeneSets {
    pub fn from_clustering(
        clustering: &Clustering,
        transcripts: Option<&HashMap<String, String>>,
        min_size: usize,
    ) -> Self {
        let mut groups: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        let mut unmapped = 0;

        for (name, &label) in clustering.names.iter().zip(&clustering.labels) {
            let gene = match transcripts {
                Some(map) => match map.get(name) {
                    Some(g) => g.clone(),
                    None => {
                        unmapped += 1;
                        continue;
                    }
                },
                None => name.clone(),
            };
            groups.entry(label).or_default().insert(gene);
        }

        let total = groups.len();
        let sets: Vec<GeneSet> = groups
            .into_iter()
            .filter(|(_, genes)| genes.len() >= min_size)
            .map(|(label, genes)| GeneSet { label, genes })
            .collect();
        let dropped = total - sets.len();

        if unmapped > 0 {
            warn!("{} entities have no gene in the transcript map", unmapped);
        }
        info!(
            "{} gene sets kept, {} below {} genes dropped",
            sets.len(),
            dropped,
            min_size
        );

        Self {
            k: clustering.k,
            sigma: clustering.sigma,
            sets,
            unmapped,
            dropped,
        }
    }

    /// `cluster_<label>\tk=<k>,sigma=<sigma>\t<gene>...`
    pub fn write_gmt(&self, writer: &mut dyn Write) -> Result<()> {
        for set in &self.sets {
            write!(writer, "{}\tk={},sigma={}", set.name(), self.k, self.sigma)?;
            for g in &set.genes {
                write!(writer, "\t{}", g)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// One `cluster_<label>.txt` per set, a gene per line. Returns the files written.
    pub fn write_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut files = vec![];
        for set in &self.sets {
            let path = dir.join(format!("{}.txt", set.name()));
            let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
            for g in &set.genes {
                writeln!(file, "{}", g)?;
            }
            file.flush()?;
            files.push(path);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustering() -> Clustering {
        Clustering {
            names: ["t1", "t2", "t3", "t4", "t5"].iter().map(|s| s.to_string()).collect(),
            labels: vec![0, 1, 0, 1, 2],
            k: 3,
            sigma: 0.5,
            sk: None,
            silhouette: None,
        }
    }

    #[test]
    fn groups_by_label() {
        let sets = GeneSets::from_clustering(&clustering(), None, 2);
        assert_eq!(sets.sets.len(), 2);
        assert_eq!(sets.dropped, 1);
        assert_eq!(sets.unmapped, 0);

        let mut buf = vec![];
        sets.write_gmt(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "cluster_0\tk=3,sigma=0.5\tt1\tt3\ncluster_1\tk=3,sigma=0.5\tt2\tt4\n"
        );
    }

    #[test]
    fn transcript_mapping() {
        let map: HashMap<String, String> = [("t1", "G1"), ("t3", "G1"), ("t2", "G2"), ("t5", "G5")]
            .iter()
            .map(|(t, g)| (t.to_string(), g.to_string()))
            .collect();
        let sets = GeneSets::from_clustering(&clustering(), Some(&map), 1);

        // t4 is unmapped; t1 and t3 collapse onto G1
        assert_eq!(sets.unmapped, 1);
        assert_eq!(sets.sets.len(), 3);
        assert_eq!(sets.sets[0].genes.len(), 1);
        assert!(sets.sets[0].genes.contains("G1"));
    }

    #[test]
    fn files_per_set() {
        let dir = tempfile::tempdir().unwrap();
        let sets = GeneSets::from_clustering(&clustering(), None, 1);
        let files = sets.write_dir(&dir.path().join("sets")).unwrap();
        assert_eq!(files.len(), 3);
        let text = std::fs::read_to_string(dir.path().join("sets/cluster_1.txt")).unwrap();
        assert_eq!(text, "t2\nt4\n");
    }

    #[test]
    fn transcript_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "# tx\tgene\nt1\tG1\n\nt2\tG2\n").unwrap();
        let map = read_transcript_map(file.path().to_str().unwrap()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["t2"], "G2");

        std::fs::write(file.path(), "t1 G1\n").unwrap();
        assert!(read_transcript_map(file.path().to_str().unwrap()).is_err());
    }
}
