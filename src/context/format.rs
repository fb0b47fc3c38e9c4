// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Context templates
//!
//! `"{{variable.name}}_{{bins}}"` renders nested context values into a
//! string. Used for output names and labels.

use regex::Regex;
use serde_json::Value;
use std::fmt;

use super::Context;
use crate::errors::{FlowError, FlowResult};

const FIELD_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_\-.]+)\s*\}\}";

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Field(String),
}

/// A parsed template with `{{dotted.path}}` fields
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTemplate {
    source: String,
    parts: Vec<Part>,
}

impl ContextTemplate {
    /// Parse a template, rejecting single or unbalanced braces
    pub fn parse(template: &str) -> FlowResult<Self> {
        let invalid = |reason: &str| FlowError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        if template.matches('{').count() != template.matches('}').count() {
            return Err(invalid("unbalanced braces"));
        }

        let pattern = Regex::new(FIELD_PATTERN).map_err(|e| invalid(&e.to_string()))?;

        let mut parts = Vec::new();
        let mut last = 0;
        for captures in pattern.captures_iter(template) {
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(Part::Literal(template[last..whole.start()].to_string()));
            }
            parts.push(Part::Field(path.as_str().to_string()));
            last = whole.end();
        }
        if last < template.len() {
            parts.push(Part::Literal(template[last..].to_string()));
        }

        let stray = parts.iter().any(|part| match part {
            Part::Literal(text) => text.contains('{') || text.contains('}'),
            Part::Field(_) => false,
        });
        if stray {
            return Err(invalid("fields must be written with double braces, e.g. '{{x}}'"));
        }

        Ok(Self {
            source: template.to_string(),
            parts,
        })
    }

    /// Dotted paths referenced by the template, in order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Field(path) => Some(path.as_str()),
            Part::Literal(_) => None,
        })
    }

    /// Render the template, failing if a referenced key is missing
    pub fn render(&self, context: &Context) -> FlowResult<String> {
        let mut output = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => output.push_str(text),
                Part::Field(path) => match context.require(path)? {
                    Value::String(s) => output.push_str(s),
                    other => output.push_str(&other.to_string()),
                },
            }
        }
        Ok(output)
    }
}

impl fmt::Display for ContextTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
