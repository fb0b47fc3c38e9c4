// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Error types
//!
//! Composition errors are raised while a pipeline is assembled, before any
//! item flows. Run errors travel inside the flow as `Err` items and reach the
//! caller unchanged.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::{Placement, Protocol};

/// Result type for seqflow operations
pub type FlowResult<T> = Result<T, FlowError>;

/// Main error type for seqflow
#[derive(Error, Debug, Diagnostic)]
pub enum FlowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Composition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Element {position} ({element}) implements none of the recognized protocols")]
    #[diagnostic(
        code(seqflow::unclassified_element),
        help("Implement one of Run, FillRequest, FillCompute, Transform or Generate for '{element}'")
    )]
    UnclassifiedElement { position: usize, element: String },

    #[error("Element {position} ({element}) is a {protocol} element and cannot be placed {placement}")]
    #[diagnostic(code(seqflow::illegal_position))]
    IllegalPosition {
        position: usize,
        element: String,
        protocol: Protocol,
        placement: Placement,
        #[help]
        help: Option<String>,
    },

    #[error("Source must be built from at least one element")]
    #[diagnostic(
        code(seqflow::empty_source),
        help("The first element of a Source must generate the flow")
    )]
    EmptySource,

    #[error("{composition} contains no {protocol} element")]
    #[diagnostic(code(seqflow::missing_element))]
    MissingElement {
        composition: &'static str,
        protocol: Protocol,
    },

    #[error("Invalid buffering for element {position} ({element}): {reason}")]
    #[diagnostic(
        code(seqflow::invalid_buffering),
        help("buffer_input must be at least 1; buffer_output 0 needs yield_on_remainder")
    )]
    InvalidBuffering {
        position: usize,
        element: String,
        reason: String,
    },

    #[error("Invalid option '{option}': {reason}")]
    #[diagnostic(code(seqflow::invalid_option))]
    InvalidOption { option: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(seqflow::definition_not_found),
        help("Create a pipeline with 'seqflow init' or write .seqflow.yaml manually")
    )]
    DefinitionNotFound { path: PathBuf },

    #[error("Invalid pipeline definition: {reason}")]
    #[diagnostic(code(seqflow::invalid_definition))]
    InvalidDefinition {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid context template '{template}': {reason}")]
    #[diagnostic(
        code(seqflow::invalid_template),
        help("Use double braces around dotted keys, e.g. '{{{{variable.name}}}}'")
    )]
    InvalidTemplate { template: String, reason: String },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(seqflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(seqflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Run Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Context key '{path}' not found")]
    #[diagnostic(code(seqflow::context_key))]
    ContextKey { path: String },

    #[error("Element '{element}' failed: {message}")]
    #[diagnostic(code(seqflow::element_failed))]
    ElementFailed { element: String, message: String },

    #[error("Element '{element}' received an invalid value: {message}")]
    #[diagnostic(code(seqflow::invalid_value))]
    InvalidValue { element: String, message: String },

    #[error("Element '{element}' cannot compute: {message}")]
    #[diagnostic(code(seqflow::domain_error))]
    Domain { element: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(seqflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(seqflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(seqflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(seqflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for FlowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl FlowError {
    /// Whether this error was raised while assembling a pipeline
    pub fn is_composition(&self) -> bool {
        matches!(
            self,
            Self::UnclassifiedElement { .. }
                | Self::IllegalPosition { .. }
                | Self::EmptySource
                | Self::MissingElement { .. }
                | Self::InvalidBuffering { .. }
                | Self::InvalidOption { .. }
        )
    }

    /// Position of the offending element, for composition errors that have one
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::UnclassifiedElement { position, .. }
            | Self::IllegalPosition { position, .. }
            | Self::InvalidBuffering { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Shorthand for an element's own failure
    pub fn element(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ElementFailed {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a value an element cannot handle
    pub fn invalid_value(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create an illegal-position error with a hint suited to the placement
    pub fn illegal_position(
        position: usize,
        element: impl Into<String>,
        protocol: Protocol,
        placement: Placement,
    ) -> Self {
        let help = match (protocol, placement) {
            (Protocol::Source, Placement::SplitBranch) => Some(
                "A Split branch consumes the upstream flow; a Source ignores input".to_string(),
            ),
            (Protocol::Source, _) => {
                Some("Only the head of a Source may generate a flow".to_string())
            }
            (_, Placement::SourceHead) => {
                Some("Put a generating element first, or build a Sequence instead".to_string())
            }
            (_, Placement::BeforeFill) => Some(
                "Only Transform and Run elements can preprocess items before a fill element"
                    .to_string(),
            ),
            _ => None,
        };

        Self::IllegalPosition {
            position,
            element: element.into(),
            protocol,
            placement,
            help,
        }
    }
}
