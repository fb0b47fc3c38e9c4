// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Generating elements

use serde_json::Value;

use crate::context::Context;
use crate::pipeline::{Flow, FlowItem, Generate};

/// Integers from `start`, `step` apart, without end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountFrom {
    start: i64,
    step: i64,
}

impl CountFrom {
    pub fn new(start: i64) -> Self {
        Self { start, step: 1 }
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }
}

impl Generate for CountFrom {
    fn generate(&mut self) -> Flow<'_> {
        let Self { start, step } = *self;
        Box::new((0i64..).map(move |i| Ok(FlowItem::new(start + i * step))))
    }
}

/// A fixed list of items, replayed on every call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    items: Vec<FlowItem>,
}

impl Values {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            items: values.into_iter().map(FlowItem::new).collect(),
        }
    }

    /// Give every item the same context
    pub fn with_context(mut self, context: Context) -> Self {
        for item in &mut self.items {
            item.context = context.clone();
        }
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<FlowItem>> for Values {
    fn from(items: Vec<FlowItem>) -> Self {
        Self { items }
    }
}

impl Generate for Values {
    fn generate(&mut self) -> Flow<'_> {
        Box::new(self.items.iter().cloned().map(Ok))
    }
}
