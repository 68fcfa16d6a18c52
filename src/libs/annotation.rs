use crate::libs::error::{GofmError, Result};
use crate::libs::ontology::{Aspect, Ontology};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;

/// Evidence codes backed by an experiment, including high-throughput ones
pub const EXPERIMENTAL_CODES: [&str; 11] = [
    "EXP", "IDA", "IPI", "IMP", "IGI", "IEP", "HTP", "HDA", "HMP", "HGI", "HEP",
];

/// One gene-term association as read from an annotation file.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub gene: String,
    pub term: String,
    pub evidence: String,
    pub aspect: Option<Aspect>,
    /// `NOT` qualifier present
    pub negated: bool,
}

/// Which evidence codes are acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidencePolicy {
    All,
    /// Everything except IEA
    Curated,
    Experimental,
    Codes(BTreeSet<String>),
}

impl EvidencePolicy {
    pub fn accepts(&self, code: &str) -> bool {
        match self {
            EvidencePolicy::All => true,
            EvidencePolicy::Curated => code != "IEA",
            EvidencePolicy::Experimental => EXPERIMENTAL_CODES.contains(&code),
            EvidencePolicy::Codes(codes) => codes.contains(code),
        }
    }

    /// Stable fragment for cache keys
    pub fn key(&self) -> String {
        match self {
            EvidencePolicy::All => "all".to_string(),
            EvidencePolicy::Curated => "curated".to_string(),
            EvidencePolicy::Experimental => "experimental".to_string(),
            EvidencePolicy::Codes(codes) => codes.iter().cloned().collect::<Vec<_>>().join("+"),
        }
    }
}

impl FromStr for EvidencePolicy {
    type Err = GofmError;

    /// ```
    /// use gofm::libs::annotation::EvidencePolicy;
    /// let policy: EvidencePolicy = "IDA,IMP".parse().unwrap();
    /// assert!(policy.accepts("IMP"));
    /// assert!(!policy.accepts("IEA"));
    /// assert_eq!(policy.key(), "IDA+IMP");
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(EvidencePolicy::All),
            "curated" => Ok(EvidencePolicy::Curated),
            "experimental" => Ok(EvidencePolicy::Experimental),
            _ => {
                let codes: BTreeSet<String> = s
                    .split(',')
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty())
                    .collect();
                if codes.is_empty() || codes.iter().any(|c| !c.chars().all(|ch| ch.is_ascii_alphabetic())) {
                    return Err(GofmError::InvalidParameter(format!(
                        "evidence policy '{}'",
                        s
                    )));
                }
                Ok(EvidencePolicy::Codes(codes))
            }
        }
    }
}

/// Read a GAF 2.x file, or a plain `gene<TAB>term` file.
///
/// The format is chosen by extension: `.gaf` and `.gaf.gz` are GAF.
pub fn read_annotations(infile: &str) -> Result<Vec<Annotation>> {
    if infile.ends_with(".gaf") || infile.ends_with(".gaf.gz") {
        read_gaf(infile)
    } else {
        read_pairs(infile)
    }
}

pub fn read_gaf(infile: &str) -> Result<Vec<Annotation>> {
    let reader = crate::reader(infile)?;
    let mut annotations = vec![];

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.starts_with('!') || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(GofmError::Parse {
                path: PathBuf::from(infile),
                line: lineno + 1,
                message: format!("GAF needs at least 9 columns, found {}", fields.len()),
            });
        }

        annotations.push(Annotation {
            gene: fields[1].to_string(),
            term: fields[4].to_string(),
            evidence: fields[6].to_string(),
            aspect: fields[8].parse().ok(),
            negated: fields[3].split('|').any(|q| q == "NOT"),
        });
    }

    Ok(annotations)
}

pub fn read_pairs(infile: &str) -> Result<Vec<Annotation>> {
    let reader = crate::reader(infile)?;
    let mut annotations = vec![];

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            return Err(GofmError::Parse {
                path: PathBuf::from(infile),
                line: lineno + 1,
                message: "expected gene<TAB>term".to_string(),
            });
        }

        annotations.push(Annotation {
            gene: fields[0].to_string(),
            term: fields[1].to_string(),
            evidence: fields.get(2).unwrap_or(&"ND").to_string(),
            aspect: None,
            negated: false,
        });
    }

    Ok(annotations)
}

/// Gene-to-term mapping and its exact inverse.
///
/// Both directions are only ever mutated together through [`insert`](Self::insert).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneAnnotations {
    gene2go: BTreeMap<String, BTreeSet<String>>,
    go2gene: BTreeMap<String, BTreeSet<String>>,
}

impl GeneAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gene: &str, term: &str) {
        self.gene2go
            .entry(gene.to_string())
            .or_default()
            .insert(term.to_string());
        self.go2gene
            .entry(term.to_string())
            .or_default()
            .insert(gene.to_string());
    }

    /// Keep the annotations in `aspect` that pass `policy`.
    ///
    /// The aspect comes from the ontology; a GAF aspect column that disagrees
    /// with it is ignored. Negated annotations and unknown terms are dropped.
    pub fn from_annotations<'a>(
        annotations: impl IntoIterator<Item = &'a Annotation>,
        ontology: &Ontology,
        aspect: Aspect,
        policy: &EvidencePolicy,
    ) -> Self {
        let mut mapping = Self::new();
        for ann in annotations {
            if ann.negated || !policy.accepts(&ann.evidence) {
                continue;
            }
            if ontology.aspect_of(&ann.term) != Some(aspect) {
                continue;
            }
            mapping.insert(&ann.gene, &ann.term);
        }
        mapping
    }

    pub fn gene2go(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.gene2go
    }

    pub fn go2gene(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.go2gene
    }

    pub fn terms_of(&self, gene: &str) -> Option<&BTreeSet<String>> {
        self.gene2go.get(gene)
    }

    pub fn genes_of(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.go2gene.get(term)
    }

    /// Number of (gene, term) pairs
    pub fn annotation_count(&self) -> usize {
        self.gene2go.values().map(|terms| terms.len()).sum()
    }

    /// Sorted gene identifiers
    pub fn genes(&self) -> Vec<String> {
        self.gene2go.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.gene2go.is_empty()
    }

    pub fn save(&self, outfile: &str) -> Result<()> {
        crate::libs::io::save_bincode(self, outfile)
    }

    pub fn load(infile: &str) -> Result<Self> {
        crate::libs::io::load_bincode(infile)
    }
}
