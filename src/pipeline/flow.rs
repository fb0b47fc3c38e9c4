// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Flow items and lazy flows

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::context::Context;
use crate::errors::FlowResult;

/// Shared, copy-on-write item payload
///
/// Cloning shares the value. Mutation goes through [`Data::make_mut`], which
/// copies the value first if anyone else still holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Data(Rc<Value>);

impl Data {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Rc::new(value.into()))
    }

    /// Mutable access, copying the value if it is shared
    pub fn make_mut(&mut self) -> &mut Value {
        Rc::make_mut(&mut self.0)
    }

    /// An independent copy that shares nothing with `self`
    pub fn deep_copy(&self) -> Self {
        Self(Rc::new(Value::clone(&self.0)))
    }

    /// Whether both handles point at the same value
    pub fn is_shared_with(&self, other: &Data) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn into_value(self) -> Value {
        Rc::try_unwrap(self.0).unwrap_or_else(|shared| Value::clone(&shared))
    }
}

impl Deref for Data {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

macro_rules! data_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Data {
            fn from(value: $t) -> Self {
                Self::new(value)
            }
        }

        impl From<$t> for FlowItem {
            fn from(value: $t) -> Self {
                Self::new(value)
            }
        })*
    };
}

data_from!(i32, i64, u64, usize, f64, bool, String, &str);

/// A value travelling through a pipeline together with its context
///
/// A bare value converts into an item with an empty context, so the two are
/// indistinguishable downstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowItem {
    pub data: Data,
    pub context: Context,
}

impl FlowItem {
    pub fn new(data: impl Into<Data>) -> Self {
        Self {
            data: data.into(),
            context: Context::new(),
        }
    }

    pub fn with_context(data: impl Into<Data>, context: Context) -> Self {
        Self {
            data: data.into(),
            context,
        }
    }

    /// A copy whose data is not shared with `self`
    pub fn deep_copy(&self) -> Self {
        Self {
            data: self.data.deep_copy(),
            context: self.context.clone(),
        }
    }

    pub fn into_parts(self) -> (Data, Context) {
        (self.data, self.context)
    }

    /// `{"data": ..., "context": ...}` as one JSON value
    pub fn to_json(&self) -> Value {
        json!({ "data": *self.data, "context": self.context })
    }
}

impl From<Value> for FlowItem {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<Data> for FlowItem {
    fn from(data: Data) -> Self {
        Self::new(data)
    }
}

impl fmt::Display for FlowItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.data)
        } else {
            write!(f, "{} {}", self.data, self.context)
        }
    }
}

/// A lazy, single-pass, possibly infinite sequence of flow items
///
/// Run errors travel as `Err` items. Stages stop producing after
/// forwarding the first error.
pub type Flow<'a> = Box<dyn Iterator<Item = FlowResult<FlowItem>> + 'a>;

/// A flow over already built items
pub fn from_items<'a, I>(items: I) -> Flow<'a>
where
    I: IntoIterator<Item = FlowItem>,
    I::IntoIter: 'a,
{
    Box::new(items.into_iter().map(Ok))
}

/// A flow of bare values with empty contexts
pub fn from_values<'a, I, T>(values: I) -> Flow<'a>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
    T: Into<Data>,
{
    Box::new(values.into_iter().map(|value| Ok(FlowItem::new(value))))
}

/// A flow with no items
pub fn empty<'a>() -> Flow<'a> {
    Box::new(std::iter::empty())
}

/// Stops after the first error has been yielded
pub(crate) struct StopOnError<'a> {
    inner: Flow<'a>,
    failed: bool,
}

impl<'a> StopOnError<'a> {
    pub(crate) fn new(inner: Flow<'a>) -> Self {
        Self {
            inner,
            failed: false,
        }
    }
}

impl Iterator for StopOnError<'_> {
    type Item = FlowResult<FlowItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.inner.next();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}
