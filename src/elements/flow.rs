// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Elements that work with the whole flow

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::context::Context;
use crate::errors::FlowResult;
use crate::pipeline::flow::{Flow, FlowItem};
use crate::pipeline::{Capabilities, FillCompute, Run};
use crate::utils::{item_bar, item_counter};

/// Items at positions `start..stop`, `step` apart
///
/// Never pulls past `stop`, so it bounds an infinite flow. Positions are
/// counted anew on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Slice {
    pub start: Option<usize>,
    pub stop: Option<usize>,
    pub step: Option<usize>,
}

impl Slice {
    pub fn new(start: Option<usize>, stop: Option<usize>, step: Option<usize>) -> Self {
        Self { start, stop, step }
    }

    /// The first `n` items
    pub fn first(n: usize) -> Self {
        Self::new(None, Some(n), None)
    }
}

struct Sliced<'a> {
    inner: Flow<'a>,
    index: usize,
    start: usize,
    stop: Option<usize>,
    step: usize,
    failed: bool,
}

impl Iterator for Sliced<'_> {
    type Item = FlowResult<FlowItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed || self.stop.is_some_and(|stop| self.index >= stop) {
                return None;
            }
            let next = self.inner.next()?;
            if next.is_err() {
                self.failed = true;
                return Some(next);
            }
            let index = self.index;
            self.index += 1;
            if index >= self.start && (index - self.start) % self.step == 0 {
                return Some(next);
            }
        }
    }
}

impl Run for Slice {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        Box::new(Sliced {
            inner: flow,
            index: 0,
            start: self.start.unwrap_or(0),
            stop: self.stop,
            step: self.step.unwrap_or(1).max(1),
            failed: false,
        })
    }
}

/// JSON value kinds a [`Selector`] can match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Declarative item predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// The context contains this dotted path (or a leaf equal to its last part)
    Context(String),
    /// The data has this kind
    Kind(ValueKind),
    Any(Vec<Selector>),
    All(Vec<Selector>),
    Not(Box<Selector>),
}

impl Selector {
    pub fn matches(&self, item: &FlowItem) -> bool {
        match self {
            Selector::Context(path) => item.context.contains(path),
            Selector::Kind(kind) => ValueKind::of(&item.data) == *kind,
            Selector::Any(selectors) => selectors.iter().any(|s| s.matches(item)),
            Selector::All(selectors) => selectors.iter().all(|s| s.matches(item)),
            Selector::Not(selector) => !selector.matches(item),
        }
    }
}

enum Predicate {
    Selector(Selector),
    Closure(Box<dyn FnMut(&FlowItem) -> bool>),
}

/// Keeps the items a predicate selects
pub struct Filter {
    predicate: Predicate,
}

impl Filter {
    pub fn new(selector: Selector) -> Self {
        Self {
            predicate: Predicate::Selector(selector),
        }
    }

    pub fn by<F>(predicate: F) -> Self
    where
        F: FnMut(&FlowItem) -> bool + 'static,
    {
        Self {
            predicate: Predicate::Closure(Box::new(predicate)),
        }
    }

    fn accepts(&mut self, item: &FlowItem) -> bool {
        match &mut self.predicate {
            Predicate::Selector(selector) => selector.matches(item),
            Predicate::Closure(f) => f(item),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Predicate::Selector(selector) => f.debug_tuple("Filter").field(selector).finish(),
            Predicate::Closure(_) => f.write_str("Filter(<closure>)"),
        }
    }
}

impl Run for Filter {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        let mut failed = false;
        Box::new(
            flow.take_while(move |result| {
                let go = !failed;
                failed |= result.is_err();
                go
            })
            .filter(move |result| match result {
                Ok(item) => self.accepts(item),
                Err(_) => true,
            }),
        )
    }
}

/// Exhausts the flow and yields nothing
///
/// Placed last, it runs a pipeline for its side effects only.
#[derive(Debug, Clone, Copy, Default)]
pub struct End;

impl Run for End {
    fn run<'a>(&'a mut self, mut flow: Flow<'a>) -> Flow<'a> {
        let mut done = false;
        Box::new(std::iter::from_fn(move || {
            if done {
                return None;
            }
            done = true;
            flow.by_ref().find(|result| result.is_err())
        }))
    }
}

/// Logs every item and passes it on
#[derive(Debug, Clone, Default)]
pub struct Print {
    prefix: Option<String>,
}

impl Print {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Run for Print {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        let prefix = self.prefix.as_deref().unwrap_or("");
        Box::new(flow.inspect(move |result| match result {
            Ok(item) => tracing::info!("{}{}", prefix, item),
            Err(e) => tracing::warn!("{}{}", prefix, e),
        }))
    }
}

/// Shows progress of the items passing through
///
/// A spinner by default, a bar when the number of items is known.
#[derive(Debug, Clone)]
pub struct Progress {
    message: String,
    total: Option<u64>,
}

impl Progress {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            total: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new("processed")
    }
}

impl Run for Progress {
    fn run<'a>(&'a mut self, mut flow: Flow<'a>) -> Flow<'a> {
        let pb = match self.total {
            Some(total) => item_bar(total, &self.message),
            None => item_counter(&self.message),
        };
        Box::new(std::iter::from_fn(move || match flow.next() {
            Some(result) => {
                pb.inc(1);
                Some(result)
            }
            None => {
                pb.finish_and_clear();
                None
            }
        }))
    }
}

/// Counts the items passing through
///
/// As a mapper it passes items on unchanged and writes the running total
/// under `name` into the context of the last item. Filled, it yields the
/// total with the last filled context.
#[derive(Debug, Clone, PartialEq)]
pub struct Count {
    name: String,
    count: u64,
    context: Context,
}

impl Count {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            context: Context::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.context = Context::new();
    }
}

impl Default for Count {
    fn default() -> Self {
        Self::new("count")
    }
}

struct Counted<'a> {
    inner: Flow<'a>,
    counter: &'a mut Count,
    pending: Option<FlowItem>,
    seen: u64,
    done: bool,
}

impl Iterator for Counted<'_> {
    type Item = FlowResult<FlowItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.inner.next() {
                Some(Ok(item)) => {
                    self.seen += 1;
                    if let Some(previous) = self.pending.replace(item) {
                        return Some(Ok(previous));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    let mut last = self.pending.take()?;
                    self.counter.count += self.seen;
                    last.context.set(&self.counter.name, self.counter.count);
                    return Some(Ok(last));
                }
            }
        }
    }
}

impl Run for Count {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        Box::new(Counted {
            inner: flow,
            counter: self,
            pending: None,
            seen: 0,
            done: false,
        })
    }

    fn reset(&mut self) {
        Count::reset(self);
    }
}

impl FillCompute for Count {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        self.count += 1;
        self.context = item.context;
        Ok(())
    }

    fn compute(&mut self) -> Flow<'_> {
        self.context.set(&self.name, self.count);
        let item = FlowItem::with_context(self.count, self.context.clone());
        Box::new(std::iter::once(Ok(item)))
    }

    fn reset(&mut self) {
        Count::reset(self);
    }

    fn compute_on_empty(&self) -> bool {
        true
    }
}

impl Capabilities for Count {
    fn into_run(self: Box<Self>) -> Result<Box<dyn Run>, Box<Self>> {
        Ok(self)
    }

    fn into_fill_compute(self: Box<Self>) -> Result<Box<dyn FillCompute>, Box<Self>> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FlowError;
    use crate::pipeline::{flow, Element, Protocol};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn data(flow: Flow<'_>) -> Vec<Value> {
        flow.map(|r| (*r.unwrap().data).clone()).collect()
    }

    #[test]
    fn test_slice_start_stop_step() {
        let mut slice = Slice::new(Some(1), Some(8), Some(3));
        assert_eq!(
            data(slice.run(flow::from_values(0..20))),
            vec![json!(1), json!(4), json!(7)]
        );
    }

    #[test]
    fn test_slice_stops_pulling_at_stop() {
        let pulled = Rc::new(Cell::new(0));
        let counter = pulled.clone();
        let upstream: Flow = Box::new((0..).map(move |i| {
            counter.set(counter.get() + 1);
            Ok(FlowItem::new(i))
        }));

        let mut slice = Slice::first(4);
        assert_eq!(slice.run(upstream).count(), 4);
        assert_eq!(pulled.get(), 4);
    }

    #[test]
    fn test_selector_deserialize_and_match() {
        let selector: Selector =
            serde_yaml::from_str("any:\n  - context: detector.name\n  - kind: string").unwrap();
        let in_context = FlowItem::with_context(1, Context::from_dotted("detector.name", "d1"));
        assert!(selector.matches(&in_context));
        assert!(selector.matches(&FlowItem::new("text")));
        assert!(!selector.matches(&FlowItem::new(3)));
        assert!(Selector::Not(Box::new(selector)).matches(&FlowItem::new(3)));
    }

    #[test]
    fn test_filter_keeps_selected_items() {
        let mut filter = Filter::by(|item: &FlowItem| item.data.as_i64().unwrap_or(0) % 2 == 0);
        assert_eq!(
            data(filter.run(flow::from_values(1..=6))),
            vec![json!(2), json!(4), json!(6)]
        );
    }

    #[test]
    fn test_filter_stops_after_error() {
        let upstream: Flow = Box::new(
            vec![
                Err(FlowError::element("src", "broken")),
                Ok(FlowItem::new(1)),
            ]
            .into_iter(),
        );
        let mut filter = Filter::new(Selector::Kind(ValueKind::Number));
        let results: Vec<_> = filter.run(upstream).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_end_drains_flow() {
        let pulled = Rc::new(Cell::new(0));
        let counter = pulled.clone();
        let upstream: Flow = Box::new((0..5).map(move |i| {
            counter.set(counter.get() + 1);
            Ok(FlowItem::new(i))
        }));
        assert_eq!(End.run(upstream).count(), 0);
        assert_eq!(pulled.get(), 5);
    }

    #[test]
    fn test_count_run_marks_last_item() {
        let mut count = Count::new("my_counter");
        let out: Vec<_> = count
            .run(flow::from_values(vec![0, 1, 2]))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out.len(), 3);
        assert!(out[1].context.is_empty());
        assert_eq!(out[2].context.get("my_counter"), Some(&json!(3)));

        // the total carries over to the next run
        let out: Vec<_> = count.run(flow::from_values(vec![7])).map(|r| r.unwrap()).collect();
        assert_eq!(out[0].context.get("my_counter"), Some(&json!(4)));
        assert!(count.run(flow::empty()).next().is_none());
    }

    #[test]
    fn test_count_fill_compute() {
        let mut count = Count::default();
        FillCompute::fill(&mut count, FlowItem::with_context(1, Context::from_dotted("a", 1))).unwrap();
        FillCompute::fill(&mut count, FlowItem::new(2)).unwrap();
        let out: Vec<_> = count.compute().map(|r| r.unwrap()).collect();
        assert_eq!(out, vec![FlowItem::with_context(2, Context::from_dotted("count", 2))]);

        count.reset();
        assert_eq!(count.count(), 0);
    }

    #[test]
    fn test_count_detected_as_run() {
        assert_eq!(Element::detect(Count::new("n")).protocol(), Some(Protocol::Run));
    }
}
