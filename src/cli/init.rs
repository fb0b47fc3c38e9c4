// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Init command - write an example pipeline

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::errors::FlowError;
use crate::pipeline::DEFAULT_FILE;
use crate::utils::{code, print_success};

/// Run the init command
pub fn run(name: Option<String>, template: Option<String>, force: bool, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-pipeline".to_string())
    });

    println!("{}", "Initializing seqflow pipeline...".bold());
    println!();

    let path = Path::new(DEFAULT_FILE);
    if path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite it.",
            DEFAULT_FILE
        ));
    }

    let content = match template.as_deref() {
        None | Some("basic") => generate_basic_template(&pipeline_name),
        Some("windows") => generate_windows_template(&pipeline_name),
        Some("context") => generate_context_template(&pipeline_name),
        Some(t) => {
            return Err(miette::miette!(
                "Unknown template: '{}'\n\nAvailable templates:\n\
                 • basic    - Count, slice and split into two branches\n\
                 • windows  - Sums over windows of buffered items\n\
                 • context  - Label items through their context",
                t
            ));
        }
    };

    std::fs::write(path, &content).map_err(|e| FlowError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    print_success(&format!("Created {}", DEFAULT_FILE));

    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to define your pipeline", code(DEFAULT_FILE));
    println!("  2. Run {} to check it", code("seqflow validate"));
    println!("  3. Run {} to see its output", code("seqflow run"));
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", content.dimmed());
    }

    Ok(())
}

fn generate_basic_template(name: &str) -> String {
    format!(
        r#"# seqflow pipeline
version: "1"
name: "{name}"

source:
  - count_from: {{ start: 1 }}
  - slice: {{ stop: 5 }}
  - split:
      branches:
        - [ {{ scale: {{ factor: 2 }} }} ]
        - [ {{ sum: {{}} }} ]

# Other elements: values, filter, offset, count, mean, collect,
# update_context, delete_context, print, progress, end,
# sequence, fill_compute, fill_request
"#
    )
}

fn generate_windows_template(name: &str) -> String {
    format!(
        r#"# seqflow pipeline - windowed sums
version: "1"
name: "{name}"

source:
  - count_from: {{ start: 1 }}
  - slice: {{ stop: 10 }}
  - fill_request:
      elements:
        - sum: {{}}
      policy:
        buffer_input: 3
        yield_on_remainder: true
"#
    )
}

fn generate_context_template(name: &str) -> String {
    format!(
        r#"# seqflow pipeline - context labels
version: "1"
name: "{name}"

source:
  - values: [1.5, 2.5, 4.0]
  - update_context:
      merge: {{ variable: {{ name: x, unit: m }} }}
  - update_context:
      path: output.name
      format: "{{{{variable.name}}}}_{{{{variable.unit}}}}"
  - split:
      branches:
        - [ {{ count: {{ name: items }} }} ]
        - [ {{ mean: {{}} }} ]
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineDefinition, PipelineValidator};

    #[test]
    fn test_templates_are_valid_pipelines() {
        for content in [
            generate_basic_template("a"),
            generate_windows_template("b"),
            generate_context_template("c"),
        ] {
            let definition = PipelineDefinition::from_yaml(&content).unwrap();
            let result = PipelineValidator::validate(&definition);
            assert!(result.is_valid(), "{:?}", result.errors);
            assert!(!result.has_warnings(), "{:?}", result.warnings);
        }
    }

    #[test]
    fn test_context_template_renders_labels() {
        let definition = PipelineDefinition::from_yaml(&generate_context_template("c")).unwrap();
        let mut source = definition.build().unwrap();
        let items: Vec<_> = source.call().map(|r| r.unwrap()).collect();
        // three counted items, then the mean
        assert_eq!(items.len(), 4);
        assert_eq!(
            items[0].context.get("output.name"),
            Some(&serde_json::json!("x_m"))
        );
        assert_eq!(items[2].context.get("items"), Some(&serde_json::json!(3)));
        assert_eq!(*items[3].data, serde_json::json!(8.0 / 3.0));
    }
}
