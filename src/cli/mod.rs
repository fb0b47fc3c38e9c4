// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for seqflow.

pub mod graph;
pub mod init;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::errors::{FlowError, RecoverySuggestion};

/// Lazy pipeline runner
///
/// Build pipelines of sources, transforms, accumulators and splits from a
/// file and run them.
#[derive(Parser, Debug)]
#[clap(
    name = "seqflow",
    version,
    about = "Compose and run lazy data-flow pipelines",
    long_about = None,
    after_help = "Examples:\n\
        seqflow init                    Write an example .seqflow.yaml\n\
        seqflow validate                Check the pipeline before running it\n\
        seqflow run --limit 10          Run the pipeline, print 10 items\n\
        seqflow graph --format mermaid  Draw the pipeline\n\n\
        See 'seqflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example pipeline file
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Starting point (basic, windows, context)
        #[clap(short, long)]
        template: Option<String>,

        /// Overwrite an existing pipeline file
        #[clap(short, long)]
        force: bool,
    },

    /// Run the pipeline and print its output
    Run {
        /// Pipeline file (YAML, TOML or JSON)
        #[clap(default_value = crate::pipeline::DEFAULT_FILE)]
        pipeline: PathBuf,

        /// Print one JSON object per item
        #[clap(long)]
        json: bool,

        /// Stop after this many items
        #[clap(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = crate::pipeline::DEFAULT_FILE)]
        pipeline: PathBuf,
    },

    /// Show pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = crate::pipeline::DEFAULT_FILE)]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Print recovery steps for `error` to stderr, then hand it to miette
pub(crate) fn with_suggestion(error: FlowError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&error) {
        eprintln!("{}", suggestion);
    }
    error.into()
}
