use crate::libs::annotation::GeneAnnotations;
use crate::libs::error::{GofmError, Result};
use crate::libs::ontology::{Aspect, Ontology};
use fxhash::FxHashMap;
use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tracing::{info, warn};

/// Weighted undirected graph over the GO terms of one aspect.
///
/// Nodes are inserted in sorted order, so `NodeIndex(k)` is the k-th term
/// identifier and the node list doubles as the entity order for distances.
#[derive(Debug, Clone)]
pub struct TermGraph {
    aspect: Aspect,
    graph: UnGraph<String, f64>,
    index: FxHashMap<String, NodeIndex>,
}

#[derive(Serialize, Deserialize)]
struct TermGraphData {
    aspect: Aspect,
    nodes: Vec<String>,
    edges: Vec<(u32, u32, f64)>,
}

/// `-ln(|genes(t)| / N)` for every annotated term `t` of `aspect`, where `N`
/// is the number of (gene, term) annotations in the aspect.
pub fn information_content(
    mapping: &GeneAnnotations,
    ontology: &Ontology,
    aspect: Aspect,
) -> BTreeMap<String, f64> {
    let counts: BTreeMap<&str, usize> = mapping
        .go2gene()
        .iter()
        .filter(|(term, genes)| ontology.aspect_of(term) == Some(aspect) && !genes.is_empty())
        .map(|(term, genes)| (term.as_str(), genes.len()))
        .collect();
    let total: usize = counts.values().sum();

    counts
        .into_iter()
        .map(|(term, n)| (term.to_string(), -(n as f64 / total as f64).ln()))
        .collect()
}

/// Linear-interpolated percentile of ascending `sorted`, `q` in `[0, 100]`.
///
/// ```
/// use gofm::libs::term_graph::percentile;
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), 3.0);
/// assert!((percentile(&[0.0, 10.0], 5.0) - 0.5).abs() < 1e-12);
/// ```
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let pos = q / 100.0 * (len - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

impl TermGraph {
    /// Combine is-a structure and annotation co-occurrence into one graph.
    ///
    /// * is-a pairs with both ends annotated weigh `|IC(parent) - IC(child)|`;
    /// * the remaining is-a pairs weigh the largest of those weights;
    /// * terms sharing `s` genes without an is-a edge weigh `p5 / s`, with
    ///   `p5` the 5th percentile of the is-a weights.
    ///
    /// Every annotated term of the aspect is a node, even when isolated.
    pub fn build(ontology: &Ontology, mapping: &GeneAnnotations, aspect: Aspect) -> Result<Self> {
        let ic = information_content(mapping, ontology, aspect);

        //----------------------------
        // is-a edges
        //----------------------------
        let mut edges: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut pending: Vec<(String, String)> = vec![];
        let mut computed: Vec<f64> = vec![];

        for (parent, child) in ontology.is_a_pairs(aspect) {
            if parent == child {
                continue;
            }
            let key = ordered(parent, child);
            match (ic.get(&key.0), ic.get(&key.1)) {
                (Some(a), Some(b)) => {
                    let w = (a - b).abs();
                    computed.push(w);
                    edges.insert(key, w);
                }
                _ => pending.push(key),
            }
        }

        let max_weight = computed.iter().cloned().fold(None, |acc: Option<f64>, w| {
            Some(acc.map_or(w, |m| m.max(w)))
        });
        match max_weight {
            Some(fallback) => {
                for key in pending {
                    edges.entry(key).or_insert(fallback);
                }
            }
            None if !pending.is_empty() => {
                warn!(
                    "{}: no is-a pair has both ends annotated, {} unweighted is-a pairs dropped",
                    aspect,
                    pending.len()
                );
            }
            None => {}
        }

        //----------------------------
        // co-annotation edges
        //----------------------------
        let mut structural: Vec<f64> = edges.values().cloned().collect();
        structural.sort_by(|a, b| a.total_cmp(b));
        let p5 = percentile(&structural, 5.0);

        let mut shared: BTreeMap<(String, String), usize> = BTreeMap::new();
        if !structural.is_empty() {
            for terms in mapping.gene2go().values() {
                let terms: Vec<&String> = terms.iter().filter(|t| ic.contains_key(*t)).collect();
                for (a, b) in terms.into_iter().tuple_combinations() {
                    *shared.entry(ordered(a.clone(), b.clone())).or_default() += 1;
                }
            }
        }
        let mut co_edges = 0;
        for (key, n) in shared {
            if let std::collections::btree_map::Entry::Vacant(e) = edges.entry(key) {
                e.insert(p5 / n as f64);
                co_edges += 1;
            }
        }

        if edges.is_empty() {
            return Err(GofmError::EmptyGraph {
                aspect: aspect.to_string(),
            });
        }
        info!(
            "{}: {} annotated terms, {} is-a edges, {} co-annotation edges, p5 = {:.4}",
            aspect,
            ic.len(),
            edges.len() - co_edges,
            co_edges,
            p5
        );

        //----------------------------
        // assemble
        //----------------------------
        let mut names: BTreeSet<String> = ic.keys().cloned().collect();
        for (a, b) in edges.keys() {
            names.insert(a.clone());
            names.insert(b.clone());
        }

        let mut graph = UnGraph::with_capacity(names.len(), edges.len());
        let mut index = FxHashMap::default();
        for name in names {
            let idx = graph.add_node(name.clone());
            index.insert(name, idx);
        }
        for ((a, b), w) in edges {
            graph.add_edge(index[&a], index[&b], w);
        }

        Ok(Self {
            aspect,
            graph,
            index,
        })
    }

    pub fn aspect(&self) -> Aspect {
        self.aspect
    }

    pub fn graph(&self) -> &UnGraph<String, f64> {
        &self.graph
    }

    pub fn node(&self, term: &str) -> Option<NodeIndex> {
        self.index.get(term).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Term identifiers in node order (sorted)
    pub fn terms(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Edge weight between two terms, if adjacent
    pub fn weight(&self, a: &str, b: &str) -> Option<f64> {
        let e = self.graph.find_edge(self.node(a)?, self.node(b)?)?;
        self.graph.edge_weight(e).copied()
    }

    /// All edges as `(a, b, weight)` with `a < b`, sorted
    pub fn edges(&self) -> Vec<(String, String, f64)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                let (a, b) = ordered(
                    self.graph[e.source()].clone(),
                    self.graph[e.target()].clone(),
                );
                (a, b, *e.weight())
            })
            .collect();
        edges.sort_by(|x, y| (&x.0, &x.1).cmp(&(&y.0, &y.1)));
        edges
    }

    /// Dump edges as `term<TAB>term<TAB>weight`
    pub fn write_edges(&self, writer: &mut dyn Write) -> Result<()> {
        for (a, b, w) in self.edges() {
            writeln!(writer, "{}\t{}\t{}", a, b, w)?;
        }
        Ok(())
    }

    pub fn save(&self, outfile: &str) -> Result<()> {
        let data = TermGraphData {
            aspect: self.aspect,
            nodes: self.terms().iter().map(|s| s.to_string()).collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| (e.source().index() as u32, e.target().index() as u32, *e.weight()))
                .collect(),
        };
        crate::libs::io::save_bincode(&data, outfile)
    }

    pub fn load(infile: &str) -> Result<Self> {
        let data: TermGraphData = crate::libs::io::load_bincode(infile)?;

        let mut graph = UnGraph::with_capacity(data.nodes.len(), data.edges.len());
        let mut index = FxHashMap::default();
        for name in data.nodes {
            let idx = graph.add_node(name.clone());
            index.insert(name, idx);
        }
        for (a, b, w) in data.edges {
            if a as usize >= graph.node_count() || b as usize >= graph.node_count() {
                return Err(GofmError::Parse {
                    path: infile.into(),
                    line: 0,
                    message: "edge refers to a missing node".to_string(),
                });
            }
            graph.add_edge(NodeIndex::new(a as usize), NodeIndex::new(b as usize), w);
        }

        Ok(Self {
            aspect: data.aspect,
            graph,
            index,
        })
    }
}

fn ordered(a: String, b: String) -> (String, String) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
