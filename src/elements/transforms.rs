// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Per-item transforms

use serde_json::Value;

use crate::context::{merge_in_place, Context, ContextTemplate};
use crate::errors::{FlowError, FlowResult};
use crate::pipeline::{FlowItem, Transform};

fn number(element: &str, item: &FlowItem) -> FlowResult<f64> {
    item.data
        .as_f64()
        .ok_or_else(|| FlowError::invalid_value(element, format!("expected a number, got {}", *item.data)))
}

/// Multiplies numeric data by a factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    factor: f64,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl Transform for Scale {
    fn transform(&mut self, mut item: FlowItem) -> FlowResult<FlowItem> {
        let value = number("Scale", &item)? * self.factor;
        *item.data.make_mut() = Value::from(value);
        Ok(item)
    }
}

/// Adds a constant to numeric data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    shift: f64,
}

impl Offset {
    pub fn new(shift: f64) -> Self {
        Self { shift }
    }
}

impl Transform for Offset {
    fn transform(&mut self, mut item: FlowItem) -> FlowResult<FlowItem> {
        let value = number("Offset", &item)? + self.shift;
        *item.data.make_mut() = Value::from(value);
        Ok(item)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Update {
    Merge { context: Context, level: Option<usize> },
    Format { path: String, template: ContextTemplate },
}

/// Writes into the context of every item
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateContext {
    update: Update,
}

impl UpdateContext {
    /// Deep-merge `context` into each item's context
    pub fn merge(context: Context) -> Self {
        Self {
            update: Update::Merge {
                context,
                level: None,
            },
        }
    }

    /// Merge only `level` mappings deep; `Some(0)` overwrites top-level keys
    pub fn with_level(mut self, new_level: Option<usize>) -> Self {
        if let Update::Merge { level, .. } = &mut self.update {
            *level = new_level;
        }
        self
    }

    /// Set `path` to `template` rendered from the item's own context
    pub fn format(path: impl Into<String>, template: &str) -> FlowResult<Self> {
        Ok(Self {
            update: Update::Format {
                path: path.into(),
                template: ContextTemplate::parse(template)?,
            },
        })
    }
}

impl Transform for UpdateContext {
    fn transform(&mut self, mut item: FlowItem) -> FlowResult<FlowItem> {
        match &self.update {
            Update::Merge { context, level } => merge_in_place(&mut item.context, context, *level),
            Update::Format { path, template } => {
                let rendered = template.render(&item.context)?;
                item.context.set(path, rendered);
            }
        }
        Ok(item)
    }
}

/// Removes dotted paths from the context of every item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteContext {
    paths: Vec<String>,
}

impl DeleteContext {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for DeleteContext {
    fn transform(&mut self, mut item: FlowItem) -> FlowResult<FlowItem> {
        for path in &self.paths {
            item.context.remove(path);
        }
        Ok(item)
    }
}
