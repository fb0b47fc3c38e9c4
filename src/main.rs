// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! seqflow - lazy data-flow pipelines
//!
//! Build pipelines from a file and run them from the command line.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seqflow::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "seqflow=debug" } else { "seqflow=info" };

    // Logs go to stderr so stdout carries only pipeline output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    seqflow::utils::configure_colors();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Init {
            name,
            template,
            force,
        } => seqflow::cli::init::run(name, template, force, cli.verbose),
        Commands::Run {
            pipeline,
            json,
            limit,
        } => seqflow::cli::run::run(pipeline, json, limit, cli.verbose),
        Commands::Validate { pipeline } => seqflow::cli::validate::run(pipeline, cli.verbose),
        Commands::Graph { pipeline, format } => {
            seqflow::cli::graph::run(pipeline, format, cli.verbose)
        }
    }
}
