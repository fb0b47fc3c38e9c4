// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Pipeline topology graph
//!
//! Turns a pipeline definition into a directed graph of its elements for
//! display. Compositions become nodes of their own, followed by their
//! members; split branches fan out from the split node and join at the
//! element after it.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::definition::{ElementDef, PipelineDefinition};

/// A node: element kind and where it sits in the definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub kind: &'static str,
    pub path: String,
}

/// Directed graph of a pipeline's elements
#[derive(Debug, Default)]
pub struct PipelineGraph {
    graph: DiGraph<GraphNode, ()>,
}

/// Builds a [`PipelineGraph`] from a definition
pub struct GraphBuilder {
    graph: DiGraph<GraphNode, ()>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
        }
    }

    /// Build the graph of a whole pipeline
    pub fn build(definition: &PipelineDefinition) -> PipelineGraph {
        let mut builder = Self::new();
        builder.add_list(&definition.source, "source", Vec::new());
        PipelineGraph {
            graph: builder.graph,
        }
    }

    /// Chain `list` after `entries`, returning the nodes the list exits from
    fn add_list(&mut self, list: &[ElementDef], path: &str, entries: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let mut exits = entries;
        for (index, def) in list.iter().enumerate() {
            let here = format!("{}[{}]", path, index);
            let node = self.graph.add_node(GraphNode {
                kind: def.kind(),
                path: here.clone(),
            });
            for from in &exits {
                self.graph.add_edge(*from, node, ());
            }

            exits = match def {
                ElementDef::Split { branches, .. } if !branches.is_empty() => branches
                    .iter()
                    .enumerate()
                    .flat_map(|(branch, members)| {
                        let nested = format!("{}.branches[{}]", here, branch);
                        self.add_list(members, &nested, vec![node])
                    })
                    .collect(),
                _ => match def.children().first() {
                    Some(members) => self.add_list(members, &here, vec![node]),
                    None => vec![node],
                },
            };
        }
        exits
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in an order where every node follows its predecessors
    pub fn ordered(&self) -> Vec<&GraphNode> {
        match toposort(&self.graph, None) {
            Ok(order) => order.into_iter().map(|n| &self.graph[n]).collect(),
            // built from a tree, so there is no cycle to report
            Err(_) => self.graph.node_weights().collect(),
        }
    }

    /// Generate Mermaid diagram of the pipeline
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for node in self.graph.node_indices() {
            out.push_str(&format!("    n{}[{}]\n", node.index(), self.graph[node].kind));
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    n{} --> n{}\n",
                edge.source().index(),
                edge.target().index()
            ));
        }

        out
    }

    /// Generate DOT diagram of the pipeline
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in self.graph.node_indices() {
            let weight = &self.graph[node];
            out.push_str(&format!(
                "    n{} [label=\"{}\", tooltip=\"{}\"];\n",
                node.index(),
                weight.kind,
                weight.path
            ));
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    n{} -> n{};\n",
                edge.source().index(),
                edge.target().index()
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text listing of the elements in flow order
    pub fn to_text(&self) -> String {
        let order = toposort(&self.graph, None).unwrap_or_else(|_| self.graph.node_indices().collect());
        let mut out = String::new();

        for (i, node) in order.iter().enumerate() {
            let weight = &self.graph[*node];
            out.push_str(&format!("{}. {} ({})", i + 1, weight.kind, weight.path));

            let inputs: Vec<&str> = self
                .graph
                .neighbors_directed(*node, Direction::Incoming)
                .map(|n| self.graph[n].kind)
                .collect();
            if inputs.len() > 1 {
                out.push_str(&format!(" [joins: {}]", inputs.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(yaml: &str) -> PipelineGraph {
        GraphBuilder::build(&PipelineDefinition::from_yaml(yaml).unwrap())
    }

    const SPLIT: &str = r#"
name: fan
source:
  - count_from: {}
  - slice: { stop: 3 }
  - split:
      branches:
        - [ { scale: { factor: 2 } } ]
        - [ { offset: { shift: 1 } }, { sum: {} } ]
  - print: {}
"#;

    #[test]
    fn test_linear_graph() {
        let g = graph("name: line\nsource:\n  - values: [1]\n  - scale: { factor: 2 }\n  - end: {}\n");
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        let kinds: Vec<_> = g.ordered().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec!["values", "scale", "end"]);
    }

    #[test]
    fn test_split_fans_out_and_joins() {
        let g = graph(SPLIT);
        // count_from, slice, split, scale, offset, sum, print
        assert_eq!(g.node_count(), 7);
        // slice<-count_from, split<-slice, 2 branch heads, sum<-offset, 2 joins
        assert_eq!(g.edge_count(), 7);

        let text = g.to_text();
        assert!(text.starts_with("1. count_from (source[0])"));
        assert!(text.contains("print (source[3]) [joins: "));
        assert!(text.contains("sum (source[2].branches[1][1])"));
    }

    #[test]
    fn test_mermaid_and_dot_output() {
        let g = graph("name: two\nsource:\n  - values: [1]\n  - print: {}\n");

        let mermaid = g.to_mermaid();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("n0 --> n1"));

        let dot = g.to_dot();
        assert!(dot.starts_with("digraph pipeline {"));
        assert!(dot.contains("n1 [label=\"print\", tooltip=\"source[1]\"];"));
    }
}
