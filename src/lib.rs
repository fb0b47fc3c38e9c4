// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! # seqflow - lazy data-flow pipelines
//!
//! `seqflow` composes processing elements into pull-based pipelines over
//! flows of `(data, context)` items.
//!
//! ## Features
//!
//! - **Five element protocols** - Transform, Run, Fill/Compute, Fill/Request, Source
//! - **Compositions** - Sequence, Source, Split, FillComputeSeq, FillRequestSeq
//! - **Lazy** - nothing upstream runs ahead of demand, infinite sources are fine
//! - **Context** - nested metadata with deep merge travels with every item
//! - **Pipeline files** - YAML, TOML or JSON, validated before anything runs
//!
//! ## Quick Start
//!
//! ```
//! use seqflow::elements::{CountFrom, Scale, Slice, Sum};
//! use seqflow::pipeline::{Element, Source, Split};
//!
//! let split = Split::new(vec![
//!     Element::transform(Scale::new(2.0)),
//!     Element::fill_compute(Sum::new()),
//! ])
//! .unwrap();
//! let mut source = Source::new(vec![
//!     Element::source(CountFrom::new(1)),
//!     Element::run(Slice::first(3)),
//!     split.into(),
//! ])
//! .unwrap();
//!
//! let output: Vec<String> = source.call().map(|r| r.unwrap().to_string()).collect();
//! assert_eq!(output, ["2.0", "4.0", "6.0", "6"]);
//! ```

pub mod cli;
pub mod context;
pub mod elements;
pub mod errors;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use context::Context;
pub use errors::{FlowError, FlowResult};
pub use pipeline::{Element, Flow, FlowItem, PipelineDefinition, Sequence, Source, Split};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
