// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for fixing a pipeline that failed to
//! assemble or load.

use super::FlowError;
use crate::pipeline::{Placement, Protocol};

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
    /// Whether this is an automated fix
    pub auto_fixable: bool,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &FlowError) -> Option<Self> {
        match error {
            FlowError::UnclassifiedElement { position, element } => {
                Some(Self::implement_protocol(*position, element))
            }
            FlowError::IllegalPosition {
                position,
                element,
                protocol,
                placement,
                ..
            } => Some(Self::move_element(*position, element, *protocol, *placement)),
            FlowError::EmptySource => Some(Self::add_source_head()),
            FlowError::InvalidBuffering {
                position, element, ..
            } => Some(Self::fix_buffering(*position, element)),
            FlowError::DefinitionNotFound { .. } => Some(Self::create_pipeline()),
            FlowError::Yaml { .. } => Some(Self::fix_yaml_syntax()),
            _ => None,
        }
    }

    /// Suggest giving an element a recognised protocol
    pub fn implement_protocol(position: usize, element: &str) -> Self {
        Self {
            action: format!("Give element {} ({}) a protocol", position, element),
            steps: vec![
                "Implement one of the element traits:".into(),
                "  • Run for elements that map a whole flow".into(),
                "  • FillRequest or FillCompute for accumulators".into(),
                "  • Transform for per-item functions".into(),
                "  • Generate for elements producing a flow".into(),
                "Then wrap it with the matching Element constructor".into(),
            ],
            commands: vec![],
            auto_fixable: false,
        }
    }

    /// Suggest moving an element out of a position it cannot occupy
    pub fn move_element(
        position: usize,
        element: &str,
        protocol: Protocol,
        placement: Placement,
    ) -> Self {
        let mut steps = vec![format!(
            "Element {} ({}) is a {} element placed {}",
            position, element, protocol, placement
        )];

        match protocol {
            Protocol::Source => {
                steps.push("Move it to the head of a Source".into());
                steps.push("A pipeline has exactly one generating element".into());
            }
            _ if placement == Placement::SourceHead => {
                steps.push("Start the Source with a generating element such as count_from".into());
            }
            _ => {
                steps.push("Wrap it in a composition that accepts this protocol".into());
            }
        }

        Self {
            action: format!("Move element {}", position),
            steps,
            commands: vec![
                "# Inspect the pipeline topology:".into(),
                "seqflow graph".into(),
            ],
            auto_fixable: false,
        }
    }

    /// Suggest starting a Source with a generating element
    pub fn add_source_head() -> Self {
        Self {
            action: "Add a generating element".into(),
            steps: vec![
                "The 'source' list of the pipeline is empty".into(),
                "Its first entry must produce items, e.g. count_from or values".into(),
            ],
            commands: vec![],
            auto_fixable: false,
        }
    }

    /// Suggest fixing a buffering policy
    pub fn fix_buffering(position: usize, element: &str) -> Self {
        Self {
            action: format!("Fix the buffering of element {} ({})", position, element),
            steps: vec![
                "buffer_input must be at least 1".into(),
                "buffer_output of 0 only makes sense with yield_on_remainder".into(),
                "Declare a policy in FillRequest::buffering or pass one explicitly".into(),
            ],
            commands: vec![],
            auto_fixable: false,
        }
    }

    /// Suggest creating a pipeline file
    pub fn create_pipeline() -> Self {
        Self {
            action: "Create a pipeline definition".into(),
            steps: vec![
                "No .seqflow.yaml found in current directory".into(),
                "Initialize an example pipeline or create the file manually".into(),
            ],
            commands: vec!["# Write an example pipeline:".into(), "seqflow init".into()],
            auto_fixable: true,
        }
    }

    /// Suggest fixing invalid YAML
    pub fn fix_yaml_syntax() -> Self {
        Self {
            action: "Fix YAML syntax error".into(),
            steps: vec![
                "Check for common YAML issues:".into(),
                "  • Incorrect indentation (use spaces, not tabs)".into(),
                "  • Each element is a single-key mapping, e.g. '- slice: { stop: 5 }'".into(),
                "  • Unquoted special characters".into(),
            ],
            commands: vec!["# Re-check the file:".into(), "seqflow validate".into()],
            auto_fixable: false,
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_for_misplaced_source() {
        let err = FlowError::illegal_position(
            1,
            "count_from",
            Protocol::Source,
            Placement::SequenceStage,
        );
        let suggestion = RecoverySuggestion::for_error(&err).unwrap();
        let text = suggestion.to_string();
        assert!(text.contains("Move element 1"));
        assert!(text.contains("head of a Source"));
    }

    #[test]
    fn test_no_suggestion_for_run_errors() {
        let err = FlowError::element("sum", "boom");
        assert!(RecoverySuggestion::for_error(&err).is_none());
    }
}
