//! services/graph.rs
//!
//! Static concept graph used to enrich decisions with related concepts.
//! Undirected, weighted, immutable after construction. Adjacency keeps edge
//! insertion order so neighbor lists are stable across runs.

use std::collections::HashMap;

use crate::config::GraphConfig;

#[derive(Debug, Clone)]
pub struct ConceptGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<(usize, f32)>>,
    edge_count: usize,
}

impl ConceptGraph {
    /// The built-in AI vocabulary.
    pub fn build() -> Self {
        Self::from_config(&GraphConfig::default())
    }

    /// Edges that name undeclared concepts add them; a repeated edge keeps its
    /// first position and takes the latest weight.
    pub fn from_config(cfg: &GraphConfig) -> Self {
        let mut g = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            edge_count: 0,
        };
        for n in &cfg.nodes {
            g.add_node(n);
        }
        for e in &cfg.edges {
            let w = if (0.0..=1.0).contains(&e.weight) {
                e.weight
            } else {
                tracing::warn!(
                    a = %e.a,
                    b = %e.b,
                    weight = e.weight,
                    "edge weight outside [0, 1]; clamped"
                );
                if e.weight.is_nan() { 0.0 } else { e.weight.clamp(0.0, 1.0) }
            };
            g.add_edge(&e.a, &e.b, w);
        }
        tracing::debug!(nodes = g.node_count(), edges = g.edge_count(), "concept graph built");
        g
    }

    fn add_node(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.adjacency.push(Vec::new());
        i
    }

    fn add_edge(&mut self, a: &str, b: &str, weight: f32) {
        let ia = self.add_node(a);
        let ib = self.add_node(b);
        if let Some(slot) = self.adjacency[ia].iter_mut().find(|(n, _)| *n == ib) {
            slot.1 = weight;
            if let Some(back) = self.adjacency[ib].iter_mut().find(|(n, _)| *n == ia) {
                back.1 = weight;
            }
            return;
        }
        self.adjacency[ia].push((ib, weight));
        if ia != ib {
            self.adjacency[ib].push((ia, weight));
        }
        self.edge_count += 1;
    }

    /// Adjacent concepts in edge insertion order. Unknown concepts have none.
    pub fn neighbors(&self, concept: &str) -> Vec<String> {
        match self.index.get(concept) {
            Some(&i) => self.adjacency[i]
                .iter()
                .map(|(n, _)| self.nodes[*n].clone())
                .collect(),
            None => {
                tracing::debug!(concept, "concept not in graph; no enrichment");
                Vec::new()
            }
        }
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.index.contains_key(concept)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn weight(&self, a: &str, b: &str) -> Option<f32> {
        let ia = *self.index.get(a)?;
        let ib = *self.index.get(b)?;
        self.adjacency[ia]
            .iter()
            .find(|(n, _)| *n == ib)
            .map(|(_, w)| *w)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeConfig;

    #[test]
    fn fixed_graph_shape() {
        let g = ConceptGraph::build();
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(
            g.neighbors("Machine Learning"),
            vec!["Artificial Intelligence", "Neural Networks"]
        );
        assert_eq!(
            g.neighbors("Artificial Intelligence"),
            vec!["Machine Learning", "Computer Vision"]
        );
        assert_eq!(g.neighbors("Reinforcement Learning"), vec!["Neural Networks"]);
        assert_eq!(g.weight("Computer Vision", "Artificial Intelligence"), Some(0.85));
        assert_eq!(g.weight("Computer Vision", "Neural Networks"), None);
    }

    #[test]
    fn unknown_concept_is_an_empty_enrichment() {
        let g = ConceptGraph::build();
        assert!(!g.contains("Quantum Computing"));
        assert!(g.neighbors("Quantum Computing").is_empty());
        // Lookup is exact, not case-folded.
        assert!(g.neighbors("machine learning").is_empty());
    }

    #[test]
    fn undeclared_edge_endpoints_are_added() {
        let cfg = GraphConfig {
            nodes: vec!["A".into()],
            edges: vec![
                EdgeConfig::new("A", "B", 0.5),
                EdgeConfig::new("B", "C", 2.0),
                EdgeConfig::new("A", "B", 0.25),
            ],
        };
        let g = ConceptGraph::from_config(&cfg);
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.weight("B", "A"), Some(0.25));
        assert_eq!(g.weight("C", "B"), Some(1.0));
        assert_eq!(g.neighbors("B"), vec!["A", "C"]);
    }
}
