// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;
use std::path::PathBuf;

use super::{with_suggestion, GraphFormat};
use crate::pipeline::{GraphBuilder, PipelineDefinition};

/// Run the graph command
pub fn run(pipeline_path: PathBuf, format: GraphFormat, verbose: bool) -> Result<()> {
    let definition = PipelineDefinition::from_file(&pipeline_path).map_err(with_suggestion)?;

    let graph = GraphBuilder::build(&definition);
    if verbose {
        eprintln!(
            "{}: {} nodes, {} edges",
            definition.name,
            graph.node_count(),
            graph.edge_count()
        );
    }

    let output = match format {
        GraphFormat::Text => graph.to_text(),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    print!("{}", output);

    Ok(())
}
