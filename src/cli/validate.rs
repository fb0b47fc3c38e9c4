// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::with_suggestion;
use crate::errors::FlowError;
use crate::pipeline::{ElementDef, PipelineDefinition, PipelineValidator};
use crate::utils::{print_error, print_info, print_section, print_success, print_warning};

/// Run the validate command
pub fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let definition = match PipelineDefinition::from_file(&pipeline_path) {
        Ok(d) => d,
        Err(e @ FlowError::DefinitionNotFound { .. }) => return Err(with_suggestion(e)),
        Err(e) => {
            print_error("Failed to parse pipeline");
            println!();
            return Err(with_suggestion(e));
        }
    };

    print_success(&format!("{} parsed", pipeline_path.display()));

    let validation = PipelineValidator::validate(&definition);

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if validation.has_warnings() {
        print_section(&"Warnings".yellow().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        print_section("Pipeline summary");
        print_info(&format!("Name: {}", definition.name));
        if let Some(description) = &definition.description {
            print_info(&format!("Description: {}", description));
        }
        print_info("Elements:");
        print_tree(&definition.source, 2);
    }

    println!();

    if !validation.is_valid() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}

fn print_tree(list: &[ElementDef], depth: usize) {
    for def in list {
        println!("{}- {}", "  ".repeat(depth), def.kind());
        for (branch, children) in def.children().into_iter().enumerate() {
            if matches!(def, ElementDef::Split { .. }) {
                println!("{}{}", "  ".repeat(depth + 1), format!("branch {}", branch).dimmed());
            }
            print_tree(children, depth + 2);
        }
    }
}
