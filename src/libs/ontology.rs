use crate::libs::error::{GofmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;

/// One of the three disjoint GO sub-hierarchies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl Aspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::BiologicalProcess => "biological_process",
            Aspect::MolecularFunction => "molecular_function",
            Aspect::CellularComponent => "cellular_component",
        }
    }

    /// Single-letter code used in column 9 of GAF files
    pub fn gaf_code(&self) -> &'static str {
        match self {
            Aspect::BiologicalProcess => "P",
            Aspect::MolecularFunction => "F",
            Aspect::CellularComponent => "C",
        }
    }
}

impl std::fmt::Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Aspect {
    type Err = GofmError;

    /// ```
    /// use gofm::libs::ontology::Aspect;
    /// assert_eq!("bp".parse::<Aspect>().unwrap(), Aspect::BiologicalProcess);
    /// assert_eq!("F".parse::<Aspect>().unwrap(), Aspect::MolecularFunction);
    /// assert!("pathway".parse::<Aspect>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "biological_process" | "bp" | "BP" | "P" => Ok(Aspect::BiologicalProcess),
            "molecular_function" | "mf" | "MF" | "F" => Ok(Aspect::MolecularFunction),
            "cellular_component" | "cc" | "CC" | "C" => Ok(Aspect::CellularComponent),
            _ => Err(GofmError::InvalidAspect(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub id: String,
    pub name: String,
    pub aspect: Aspect,
    /// Targets of `is_a` lines only; other relationships are not kept
    pub parents: BTreeSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Ontology {
    terms: BTreeMap<String, Term>,
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, term: Term) {
        self.terms.insert(term.id.clone(), term);
    }

    pub fn get(&self, id: &str) -> Option<&Term> {
        self.terms.get(id)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn aspect_of(&self, id: &str) -> Option<Aspect> {
        self.terms.get(id).map(|t| t.aspect)
    }

    /// Term IDs belonging to `aspect`, sorted
    pub fn terms_in(&self, aspect: Aspect) -> Vec<&str> {
        self.terms
            .values()
            .filter(|t| t.aspect == aspect)
            .map(|t| t.id.as_str())
            .collect()
    }

    /// `(parent, child)` is-a pairs with both ends inside `aspect`.
    pub fn is_a_pairs(&self, aspect: Aspect) -> Vec<(String, String)> {
        let mut pairs = vec![];
        for term in self.terms.values().filter(|t| t.aspect == aspect) {
            for parent in &term.parents {
                if self.aspect_of(parent) == Some(aspect) {
                    pairs.push((parent.clone(), term.id.clone()));
                }
            }
        }
        pairs
    }

    /// Load `[Term]` stanzas from an OBO file.
    ///
    /// Obsolete terms and terms outside the three GO namespaces are skipped.
    pub fn from_obo(infile: &str) -> Result<Self> {
        let reader = crate::reader(infile)?;
        let mut ontology = Ontology::new();

        let mut in_term = false;
        let mut stanza = Stanza::default();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.starts_with('[') {
                if let Some(term) = stanza.finish() {
                    ontology.insert(term);
                }
                in_term = line == "[Term]";
                continue;
            }
            if !in_term || line.is_empty() {
                continue;
            }

            let Some((tag, value)) = line.split_once(':') else {
                return Err(GofmError::Parse {
                    path: PathBuf::from(infile),
                    line: lineno + 1,
                    message: format!("expected 'tag: value', got '{}'", line),
                });
            };
            // strip trailing `! comment`
            let value = value.split(" !").next().unwrap_or("").trim();

            match tag {
                "id" => stanza.id = Some(value.to_string()),
                "name" => stanza.name = value.to_string(),
                "namespace" => stanza.namespace = Some(value.to_string()),
                "is_a" => {
                    // drop trailing `{qualifier=...}`
                    let parent = value.split('{').next().unwrap_or("").trim();
                    if !parent.is_empty() {
                        stanza.parents.insert(parent.to_string());
                    }
                }
                "is_obsolete" => stanza.obsolete = value == "true",
                _ => {}
            }
        }
        if let Some(term) = stanza.finish() {
            ontology.insert(term);
        }

        Ok(ontology)
    }
}

#[derive(Default)]
struct Stanza {
    id: Option<String>,
    name: String,
    namespace: Option<String>,
    parents: BTreeSet<String>,
    obsolete: bool,
}

impl Stanza {
    /// Emit the collected term and reset for the next stanza
    fn finish(&mut self) -> Option<Term> {
        let stanza = std::mem::take(self);
        if stanza.obsolete {
            return None;
        }
        let aspect = stanza.namespace?.parse::<Aspect>().ok()?;
        Some(Term {
            id: stanza.id?,
            name: stanza.name,
            aspect,
            parents: stanza.parents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const OBO: &str = "format-version: 1.2

[Term]
id: GO:0000001
name: root process
namespace: biological_process

[Term]
id: GO:0000002
name: child process
namespace: biological_process
is_a: GO:0000001 ! root process
relationship: part_of GO:0000003 ! other

[Term]
id: GO:0000003
name: some function
namespace: molecular_function

[Term]
id: GO:0000005
name: qualified child
namespace: biological_process
is_a: GO:0000002 {source=\"GOC:x\"} ! child process

[Term]
id: GO:0000004
name: gone
namespace: biological_process
is_a: GO:0000001
is_obsolete: true

[Typedef]
id: part_of
name: part of
";

    fn load(content: &str) -> Ontology {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        Ontology::from_obo(file.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn parse_terms() {
        let ont = load(OBO);
        assert_eq!(ont.len(), 4);
        assert_eq!(
            ont.aspect_of("GO:0000003"),
            Some(Aspect::MolecularFunction)
        );
        assert!(ont.get("GO:0000004").is_none());

        let child = ont.get("GO:0000002").unwrap();
        assert_eq!(child.name, "child process");
        assert_eq!(child.parents.len(), 1);
        assert!(child.parents.contains("GO:0000001"));

        let qualified = ont.get("GO:0000005").unwrap();
        assert_eq!(qualified.parents.len(), 1);
        assert!(qualified.parents.contains("GO:0000002"));
    }

    #[test]
    fn is_a_pairs_stay_in_aspect() {
        let ont = load(OBO);
        let pairs = ont.is_a_pairs(Aspect::BiologicalProcess);
        assert_eq!(
            pairs,
            vec![
                ("GO:0000001".to_string(), "GO:0000002".to_string()),
                ("GO:0000002".to_string(), "GO:0000005".to_string()),
            ]
        );
        assert!(ont.is_a_pairs(Aspect::MolecularFunction).is_empty());
    }

    #[test]
    fn missing_file() {
        let err = Ontology::from_obo("tests/data/absent.obo").unwrap_err();
        assert!(matches!(err, GofmError::MissingInput { .. }));
    }
}
