// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Pipeline composition
//!
//! This module defines flows, the element protocols and the compositions
//! built from them: [`Sequence`], [`Source`], [`FillComputeSeq`],
//! [`FillRequestSeq`] and [`Split`]. Declarative pipeline files are loaded,
//! validated and drawn from here as well.

mod adapter;
mod definition;
mod fill;
pub mod flow;
mod graph;
mod protocol;
mod sequence;
mod source;
mod split;
mod validation;

pub use adapter::{Adapter, Capabilities, Element, Placement, Protocol, SourceAdapter};
pub use definition::*;
pub use fill::{FillComputeSeq, FillRequestSeq, RequestFromCompute};
pub use flow::{Data, Flow, FlowItem};
pub use graph::{GraphBuilder, GraphNode, PipelineGraph};
pub use protocol::{BufferPolicy, FillCompute, FillRequest, Generate, Run, Transform};
pub use sequence::Sequence;
pub use source::Source;
pub use split::{Split, SplitOptions};
pub use validation::{PipelineValidator, ValidationResult};
