use crate::libs::distance::PairDistance;
use crate::libs::pairs::{total_pairs, PairRange};
use crate::libs::term_graph::TermGraph;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

/// Shortest-path distances between terms of a [`TermGraph`].
///
/// The entity list defaults to the graph's nodes; a caller-supplied list may
/// name terms missing from the graph, whose pairs are simply never reported.
pub struct TermDistances<'a> {
    graph: &'a TermGraph,
    entities: Vec<String>,
    nodes: Vec<Option<NodeIndex>>,
}

impl<'a> TermDistances<'a> {
    pub fn new(graph: &'a TermGraph) -> Self {
        let entities = graph.terms().iter().map(|s| s.to_string()).collect();
        Self::with_entities(graph, entities)
    }

    /// Entities are sorted and deduplicated to fix the pair linearization
    pub fn with_entities(graph: &'a TermGraph, mut entities: Vec<String>) -> Self {
        entities.sort();
        entities.dedup();
        let nodes = entities.iter().map(|t| graph.node(t)).collect();
        Self {
            graph,
            entities,
            nodes,
        }
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn total_pairs(&self) -> usize {
        total_pairs(self.entities.len())
    }

    /// Distances of the pairs in `range` that have a finite path.
    ///
    /// Pairs sharing a first entity are consecutive in the linearization, so
    /// one single-source Dijkstra per first entity answers all of them.
    pub fn compute(&self, range: PairRange) -> Vec<PairDistance> {
        let n = self.entities.len();
        let mut out = vec![];

        let mut source: Option<usize> = None;
        let mut reached: HashMap<NodeIndex, f64> = HashMap::new();

        for (i, j) in range.iter(n) {
            let (Some(a), Some(b)) = (self.nodes[i], self.nodes[j]) else {
                continue;
            };
            if source != Some(i) {
                reached = petgraph::algo::dijkstra(self.graph.graph(), a, None, |e| *e.weight());
                source = Some(i);
            }
            if let Some(&d) = reached.get(&b) {
                out.push(PairDistance { i, j, distance: d });
            }
        }

        out
    }
}
