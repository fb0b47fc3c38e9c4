// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Built-in elements
//!
//! Small, general elements usable from code and from pipeline files.
//! Anything implementing one of the protocols in [`crate::pipeline`] can
//! stand beside them.

mod accumulators;
mod flow;
mod sources;
mod transforms;

pub use accumulators::{Collect, Mean, Sum};
pub use flow::{Count, End, Filter, Print, Progress, Selector, Slice, ValueKind};
pub use sources::{CountFrom, Values};
pub use transforms::{DeleteContext, Offset, Scale, UpdateContext};
