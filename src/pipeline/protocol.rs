// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Element protocols
//!
//! An element takes part in a pipeline by implementing one of five traits.
//! Compositions never inspect an element beyond the trait it was wrapped as.

use serde::{Deserialize, Serialize};

use super::flow::{Flow, FlowItem};
use crate::errors::FlowResult;

/// Maps one item to one item
pub trait Transform {
    fn transform(&mut self, item: FlowItem) -> FlowResult<FlowItem>;
}

impl<F> Transform for F
where
    F: FnMut(FlowItem) -> FlowResult<FlowItem>,
{
    fn transform(&mut self, item: FlowItem) -> FlowResult<FlowItem> {
        self(item)
    }
}

/// Consumes a whole flow and returns a new lazy flow
///
/// The returned flow may expand, filter or stop early. It must not pull
/// from `flow` before it is itself asked for an item.
pub trait Run {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a>;

    /// Discard state kept across runs
    fn reset(&mut self) {}
}

/// Accumulates items, then emits results on demand
///
/// State persists across `compute` calls until `reset` is called.
pub trait FillCompute {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()>;

    fn compute(&mut self) -> Flow<'_>;

    fn reset(&mut self) {}

    /// Whether `compute` is meaningful after zero fills
    fn compute_on_empty(&self) -> bool {
        false
    }
}

/// Accumulates items and emits results incrementally
pub trait FillRequest {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()>;

    fn request(&mut self) -> Flow<'_>;

    fn reset(&mut self) {}

    /// How often the element is asked for output
    ///
    /// An element that returns `None` can only be used with an explicit
    /// policy.
    fn buffering(&self) -> Option<BufferPolicy>;

    /// Whether `request` is meaningful after zero fills
    fn request_on_empty(&self) -> bool {
        false
    }
}

/// Produces a flow from nothing
pub trait Generate {
    fn generate(&mut self) -> Flow<'_>;

    fn reset(&mut self) {}
}

impl<F, I> Generate for F
where
    F: FnMut() -> I,
    I: Iterator<Item = FlowResult<FlowItem>> + 'static,
{
    fn generate(&mut self) -> Flow<'_> {
        Box::new(self())
    }
}

/// When a Fill/Request element is asked for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPolicy {
    /// Fills between two requests
    pub buffer_input: usize,

    /// Items taken from one request; `Some(0)` disables requests until the
    /// flow ends
    pub buffer_output: Option<usize>,

    /// Request once more at flow end if anything was filled since the last
    /// request
    pub yield_on_remainder: bool,

    /// Reset the element after every request
    pub reset: bool,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            buffer_input: 1,
            buffer_output: None,
            yield_on_remainder: false,
            reset: false,
        }
    }
}

impl BufferPolicy {
    /// Request after every `buffer_input` fills
    pub fn every(buffer_input: usize) -> Self {
        Self {
            buffer_input,
            ..Self::default()
        }
    }

    pub fn with_output(mut self, buffer_output: usize) -> Self {
        self.buffer_output = Some(buffer_output);
        self
    }

    pub fn with_remainder(mut self, yield_on_remainder: bool) -> Self {
        self.yield_on_remainder = yield_on_remainder;
        self
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Whether requests happen only at flow end
    pub fn is_deferred(&self) -> bool {
        self.buffer_output == Some(0)
    }

    /// Check for contradictory settings
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_input == 0 {
            return Err("buffer_input must be at least 1".to_string());
        }
        if self.is_deferred() && !self.yield_on_remainder {
            return Err(
                "buffer_output 0 without yield_on_remainder would never produce output"
                    .to_string(),
            );
        }
        Ok(())
    }
}
