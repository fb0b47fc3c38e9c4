// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Pipeline validation
//!
//! Validates a pipeline definition before it runs. Errors are anything that
//! would stop the pipeline from being built; warnings flag pipelines that
//! build but probably do not do what was meant.

use super::definition::{ElementDef, PipelineDefinition};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline definition
    pub fn validate(definition: &PipelineDefinition) -> ValidationResult {
        let mut result = ValidationResult::new();

        if definition.name.trim().is_empty() {
            result.add_error("Pipeline has no name");
        }

        if definition.version != "1" {
            result.add_warning(&format!(
                "Unknown pipeline version '{}', reading it as version 1",
                definition.version
            ));
        }

        if definition.source.is_empty() {
            result.add_error("Pipeline has no source elements defined");
            return result;
        }

        // Assembly performs every composition check
        if let Err(e) = definition.build() {
            result.add_error(&e.to_string());
        }

        Self::check_bounded(&definition.source, &mut result);
        Self::check_list(&definition.source, "source", &mut result);

        result
    }

    /// Warn if an infinite source is never limited
    fn check_bounded(source: &[ElementDef], result: &mut ValidationResult) {
        let Some(ElementDef::CountFrom { .. }) = source.first() else {
            return;
        };
        if !source.iter().skip(1).any(Self::limits) {
            result.add_warning(
                "Source 'count_from' never ends and no 'slice' with a stop follows it. \
                 Running will not terminate without --limit.",
            );
        }
    }

    /// Whether `def` stops the flow, looking inside nested sequences
    fn limits(def: &ElementDef) -> bool {
        match def {
            ElementDef::Slice(slice) => slice.stop.is_some(),
            ElementDef::End {} => true,
            ElementDef::Sequence(list) => list.iter().any(Self::limits),
            _ => false,
        }
    }

    /// Check one element list and every list nested in it
    fn check_list(list: &[ElementDef], path: &str, result: &mut ValidationResult) {
        if let Some(end) = list.iter().position(|def| matches!(def, ElementDef::End {})) {
            let after = list.len() - end - 1;
            if after > 0 {
                result.add_warning(&format!(
                    "{}[{}]: {} element(s) after 'end' will never receive items",
                    path, end, after
                ));
            }
        }

        for (index, def) in list.iter().enumerate() {
            let here = format!("{}[{}].{}", path, index, def.kind());
            match def {
                ElementDef::Split { branches, .. } if branches.len() == 1 => {
                    result.add_warning(&format!(
                        "{}: split with a single branch, a sequence does the same",
                        here
                    ));
                }
                ElementDef::Sequence(list) if list.is_empty() => {
                    result.add_warning(&format!("{}: empty sequence passes items unchanged", here));
                }
                _ => {}
            }

            for (branch, children) in def.children().into_iter().enumerate() {
                let nested = match def {
                    ElementDef::Split { .. } => format!("{}.branches[{}]", here, branch),
                    _ => here.clone(),
                };
                Self::check_list(children, &nested, result);
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
