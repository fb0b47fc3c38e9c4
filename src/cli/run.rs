// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Run command - build the pipeline and print its output

use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use super::with_suggestion;
use crate::pipeline::{Flow, PipelineDefinition, PipelineValidator};

/// Run the run command
///
/// Items go to stdout, one per line; everything else goes to stderr.
pub fn run(pipeline_path: PathBuf, json: bool, limit: Option<usize>, verbose: bool) -> Result<()> {
    let definition = PipelineDefinition::from_file(&pipeline_path).map_err(with_suggestion)?;

    let validation = PipelineValidator::validate(&definition);
    for warning in &validation.warnings {
        eprintln!("{} {}", "⚠".yellow(), warning);
    }
    if limit.is_none() && validation.warnings.iter().any(|w| w.contains("never ends")) {
        tracing::warn!("pipeline '{}' may run forever, stop it with Ctrl-C", definition.name);
    }

    let mut source = definition.build().map_err(with_suggestion)?;
    tracing::debug!(pipeline = %definition.name, ?limit, "running pipeline");

    let start = Instant::now();
    let flow: Flow<'_> = match limit {
        Some(n) => Box::new(source.call().take(n)),
        None => source.call(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut produced = 0usize;
    for result in flow {
        let item = result?;
        if json {
            let line = serde_json::to_string(&item.to_json()).into_diagnostic()?;
            writeln!(out, "{}", line).into_diagnostic()?;
        } else {
            writeln!(out, "{}", item).into_diagnostic()?;
        }
        produced += 1;
    }
    out.flush().into_diagnostic()?;

    if verbose {
        eprintln!(
            "{} {} produced {} item(s) in {:.2?}",
            "✓".green(),
            definition.name.bold(),
            produced,
            start.elapsed()
        );
    }

    Ok(())
}
