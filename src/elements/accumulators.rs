// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Fill/Compute accumulators
//!
//! Each keeps the context of the last filled item and yields it with the
//! result. State survives `compute` and is cleared only by `reset`.

use serde_json::Value;

use crate::context::Context;
use crate::errors::{FlowError, FlowResult};
use crate::pipeline::{FillCompute, Flow, FlowItem};

fn single<'a>(data: Value, context: &Context) -> Flow<'a> {
    Box::new(std::iter::once(Ok(FlowItem::with_context(data, context.clone()))))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Total {
    Int(i64),
    Float(f64),
}

impl Total {
    fn add(self, value: &Value) -> Option<Self> {
        match (self, value.as_i64()) {
            (Total::Int(total), Some(n)) => Some(match total.checked_add(n) {
                Some(sum) => Total::Int(sum),
                None => Total::Float(total as f64 + n as f64),
            }),
            (Total::Int(total), None) => value.as_f64().map(|x| Total::Float(total as f64 + x)),
            (Total::Float(total), _) => value.as_f64().map(|x| Total::Float(total + x)),
        }
    }

    fn to_value(self) -> Value {
        match self {
            Total::Int(n) => Value::from(n),
            Total::Float(x) => Value::from(x),
        }
    }
}

/// Sum of numeric data
///
/// Stays an integer while every filled value is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Sum {
    total: Total,
    context: Context,
}

impl Sum {
    pub fn new() -> Self {
        Self {
            total: Total::Int(0),
            context: Context::new(),
        }
    }
}

impl Default for Sum {
    fn default() -> Self {
        Self::new()
    }
}

impl FillCompute for Sum {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        self.total = self.total.add(&item.data).ok_or_else(|| {
            FlowError::invalid_value("Sum", format!("expected a number, got {}", *item.data))
        })?;
        self.context = item.context;
        Ok(())
    }

    fn compute(&mut self) -> Flow<'_> {
        tracing::trace!(total = ?self.total, "Sum computed");
        single(self.total.to_value(), &self.context)
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Arithmetic mean of numeric data
///
/// Computing with nothing filled is a domain error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mean {
    sum: f64,
    count: u64,
    context: Context,
}

impl Mean {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FillCompute for Mean {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        let x = item.data.as_f64().ok_or_else(|| {
            FlowError::invalid_value("Mean", format!("expected a number, got {}", *item.data))
        })?;
        self.sum += x;
        self.count += 1;
        self.context = item.context;
        Ok(())
    }

    fn compute(&mut self) -> Flow<'_> {
        if self.count == 0 {
            return Box::new(std::iter::once(Err(FlowError::Domain {
                element: "Mean".to_string(),
                message: "mean of zero values".to_string(),
            })));
        }
        single(Value::from(self.sum / self.count as f64), &self.context)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// All filled data as one array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collect {
    values: Vec<Value>,
    context: Context,
}

impl Collect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FillCompute for Collect {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        let (data, context) = item.into_parts();
        self.values.push(data.into_value());
        self.context = context;
        Ok(())
    }

    fn compute(&mut self) -> Flow<'_> {
        single(Value::Array(self.values.clone()), &self.context)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
