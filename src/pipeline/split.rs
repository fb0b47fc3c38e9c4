// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Fan-out to several branches
//!
//! Upstream is read once. Each window of `bufsize` items is handed to every
//! branch in order before the next window is pulled, and branch outputs are
//! yielded in branch order.
//!
//! Mapping branches run once per window. A Sequence branch holding a fill
//! stage is regrouped around it, so its accumulator sees the whole flow.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::adapter::{Adapter, Element, Placement, Protocol, RequestDriver, Stage};
use super::fill::regroup;
use super::flow::{self, Flow, FlowItem};
use super::protocol::Run;
use crate::errors::{FlowError, FlowResult};

fn default_bufsize() -> usize {
    1
}

fn default_copy_buf() -> bool {
    true
}

/// How upstream items are handed to branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Upstream items dispatched together
    #[serde(default = "default_bufsize")]
    pub bufsize: usize,

    /// Deep-copy items for every branch but the last; otherwise branches
    /// share data, copied only when a branch mutates it
    #[serde(default = "default_copy_buf")]
    pub copy_buf: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            bufsize: default_bufsize(),
            copy_buf: default_copy_buf(),
        }
    }
}

/// Feeds one flow into several independent branches
#[derive(Debug)]
pub struct Split {
    branches: Vec<Adapter>,
    options: SplitOptions,
}

impl Split {
    pub fn new<I>(branches: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        Self::with_options(branches, SplitOptions::default())
    }

    /// A branch may be any element except a Source
    ///
    /// A Sequence branch with a Fill/Compute or Fill/Request stage becomes
    /// a [`FillComputeSeq`](super::FillComputeSeq) or
    /// [`FillRequestSeq`](super::FillRequestSeq) around its first such stage.
    pub fn with_options<I>(branches: I, options: SplitOptions) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        if options.bufsize == 0 {
            return Err(FlowError::InvalidOption {
                option: "bufsize".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let branches = branches
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                let label = element.label().to_string();
                let element = match element.into_sequence() {
                    Ok(sequence) => regroup(sequence).named(label),
                    Err(element) => element,
                };
                Adapter::new(index, element, Placement::SplitBranch)
            })
            .collect::<FlowResult<Vec<_>>>()?;

        tracing::debug!(
            branches = branches.len(),
            bufsize = options.bufsize,
            copy_buf = options.copy_buf,
            "assembled split"
        );

        Ok(Self { branches, options })
    }

    pub fn branches(&self) -> &[Adapter] {
        &self.branches
    }

    pub fn options(&self) -> SplitOptions {
        self.options
    }

    /// Run every branch over `flow`, interleaving their outputs
    pub fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        if self.branches.is_empty() {
            return flow;
        }
        Box::new(SplitStage::new(&mut self.branches, self.options, flow))
    }

    pub fn reset(&mut self) {
        for branch in &mut self.branches {
            branch.reset();
        }
    }
}

impl Run for Split {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        Split::run(self, flow)
    }

    fn reset(&mut self) {
        Split::reset(self)
    }
}

impl From<Split> for Element {
    fn from(split: Split) -> Self {
        Element::run(split)
    }
}

struct Branch<'a> {
    adapter: &'a mut Adapter,
    driver: Option<RequestDriver>,
}

struct SplitStage<'a> {
    branches: Vec<Branch<'a>>,
    upstream: Flow<'a>,
    options: SplitOptions,
    pending: VecDeque<FlowResult<FlowItem>>,
    seen_input: bool,
    exhausted: bool,
    failed: bool,
}

impl<'a> SplitStage<'a> {
    fn new(adapters: &'a mut [Adapter], options: SplitOptions, upstream: Flow<'a>) -> Self {
        let branches = adapters
            .iter_mut()
            .map(|adapter| {
                let driver = adapter.policy().map(RequestDriver::new);
                Branch { adapter, driver }
            })
            .collect();

        Self {
            branches,
            upstream,
            options,
            pending: VecDeque::new(),
            seen_input: false,
            exhausted: false,
            failed: false,
        }
    }

    /// Pull up to `bufsize` items; an upstream error ends the window
    fn pull_window(&mut self) -> (Vec<FlowItem>, Option<FlowError>) {
        let mut window = Vec::with_capacity(self.options.bufsize);
        while window.len() < self.options.bufsize {
            match self.upstream.next() {
                Some(Ok(item)) => window.push(item),
                Some(Err(e)) => return (window, Some(e)),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        (window, None)
    }

    fn dispatch(&mut self, mut window: Vec<FlowItem>) -> FlowResult<()> {
        let last = self.branches.len() - 1;

        for (index, branch) in self.branches.iter_mut().enumerate() {
            let items = if index == last {
                std::mem::take(&mut window)
            } else if self.options.copy_buf {
                window.iter().map(FlowItem::deep_copy).collect()
            } else {
                window.clone()
            };

            if maps_windows(branch.adapter) {
                for result in branch.adapter.advance(flow::from_items(items)) {
                    self.pending.push_back(Ok(result?));
                }
                continue;
            }

            match &mut branch.adapter.stage {
                Stage::FillCompute(element) => {
                    for item in items {
                        element.fill(item)?;
                    }
                }
                Stage::FillRequest(element, _) => {
                    if let Some(driver) = branch.driver.as_mut() {
                        for item in items {
                            driver.fill(element.as_mut(), item, &mut self.pending)?;
                        }
                    }
                }
                Stage::Run(_) | Stage::Sequence(_) | Stage::Transform(_) => {}
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> FlowResult<()> {
        for branch in &mut self.branches {
            if maps_windows(branch.adapter) {
                // a mapper still sees one (empty) run when nothing arrived
                if !self.seen_input {
                    for result in branch.adapter.advance(flow::empty()) {
                        self.pending.push_back(Ok(result?));
                    }
                }
                continue;
            }

            match &mut branch.adapter.stage {
                Stage::FillCompute(element) => {
                    if self.seen_input || element.compute_on_empty() {
                        for result in element.compute() {
                            self.pending.push_back(Ok(result?));
                        }
                    }
                }
                Stage::FillRequest(element, _) => {
                    if let Some(driver) = branch.driver.as_mut() {
                        driver.finish(element.as_mut(), &mut self.pending);
                    }
                }
                Stage::Run(_) | Stage::Sequence(_) | Stage::Transform(_) => {}
            }
        }
        Ok(())
    }
}

fn maps_windows(adapter: &Adapter) -> bool {
    matches!(adapter.protocol(), Protocol::Run | Protocol::Transform)
}

impl Iterator for SplitStage<'_> {
    type Item = FlowResult<FlowItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(next) = self.pending.pop_front() {
                if next.is_err() {
                    self.failed = true;
                }
                return Some(next);
            }
            if self.exhausted {
                return None;
            }

            let (window, upstream_error) = self.pull_window();
            if !window.is_empty() {
                self.seen_input = true;
                if let Err(e) = self.dispatch(window) {
                    self.pending.push_back(Err(e));
                    continue;
                }
            }
            if let Some(e) = upstream_error {
                self.pending.push_back(Err(e));
                continue;
            }
            if self.exhausted {
                tracing::trace!(seen_input = self.seen_input, "split upstream exhausted");
                if let Err(e) = self.finish() {
                    self.pending.push_back(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Collect, Count, CountFrom, Scale, Slice, Sum};
    use crate::pipeline::{
        BufferPolicy, Capabilities, FillRequestSeq, RequestFromCompute, Sequence, Source,
    };
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn values(flow: Flow<'_>) -> Vec<Value> {
        flow.map(|r| (*r.unwrap().data).clone()).collect()
    }

    fn counted(values: Vec<i64>, pulled: Rc<Cell<usize>>) -> Flow<'static> {
        Box::new(values.into_iter().map(move |v| {
            pulled.set(pulled.get() + 1);
            Ok(FlowItem::new(v))
        }))
    }

    #[test]
    fn test_fan_out_pulls_upstream_once() {
        let pulled = Rc::new(Cell::new(0));
        let mut split = Split::new(vec![
            Element::from(Sequence::new(Vec::new()).unwrap()),
            Element::transform(Scale::new(2.0)),
        ])
        .unwrap();

        let out = values(split.run(counted(vec![1, 2, 3], pulled.clone())));
        assert_eq!(pulled.get(), 3);
        assert_eq!(
            out,
            vec![json!(1), json!(2.0), json!(2), json!(4.0), json!(3), json!(6.0)]
        );
    }

    #[test]
    fn test_pulled_window_by_window() {
        let pulled = Rc::new(Cell::new(0));
        let mut split = Split::with_options(
            vec![
                Element::transform(Scale::new(1.0)),
                Element::transform(Scale::new(1.0)),
            ],
            SplitOptions {
                bufsize: 2,
                copy_buf: false,
            },
        )
        .unwrap();

        let mut out = split.run(counted(vec![1, 2, 3, 4], pulled.clone()));
        assert_eq!(pulled.get(), 0);
        out.next();
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn test_fill_branches_compute_at_end() {
        let mut split = Split::new(vec![
            Element::fill_compute(Sum::new()),
            Element::fill_compute(Collect::new()),
        ])
        .unwrap();
        let out = values(split.run(flow::from_values(vec![1, 2, 3])));
        assert_eq!(out, vec![json!(6), json!([1, 2, 3])]);
    }

    #[test]
    fn test_fill_request_branch_follows_policy() {
        let request = FillRequestSeq::with_policy(
            vec![Element::fill_request(RequestFromCompute::new(
                Sum::new(),
                BufferPolicy::every(1),
            ))],
            BufferPolicy::every(2),
        )
        .unwrap();
        let mut split = Split::new(vec![Element::from(request)]).unwrap();

        let out = values(split.run(flow::from_values(vec![1, 2, 3, 4])));
        assert_eq!(out, vec![json!(3), json!(7)]);
    }

    #[test]
    fn test_empty_flow_runs_branches_once() {
        let mut split = Split::new(vec![
            Element::fill_compute(Sum::new()),
            Element::fill_compute(Count::new("n")),
            Element::run(Count::new("m")),
        ])
        .unwrap();
        // only the counter opting into on-empty output emits anything
        let out: Vec<_> = split.run(flow::empty()).map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(*out[0].data, json!(0));
        assert_eq!(out[0].context.get("n"), Some(&json!(0)));
    }

    #[test]
    fn test_copy_buf_controls_sharing() {
        for copy_buf in [true, false] {
            let first = Rc::new(RefCell::new(None));
            let keep = first.clone();
            let mut split = Split::with_options(
                vec![
                    Element::map(move |item: FlowItem| {
                        *keep.borrow_mut() = Some(item.data.clone());
                        Ok(item)
                    }),
                    Element::map(Ok),
                ],
                SplitOptions { bufsize: 1, copy_buf },
            )
            .unwrap();

            let outputs: Vec<_> = split
                .run(flow::from_values(vec![json!({"k": 1})]))
                .map(|r| r.unwrap())
                .collect();
            let seen = first.borrow().clone().unwrap();
            assert_eq!(seen.is_shared_with(&outputs[1].data), !copy_buf);
            assert_eq!(outputs[0], outputs[1]);
        }
    }

    #[test]
    fn test_source_branch_is_rejected() {
        let err = Split::new(vec![
            Element::transform(Scale::new(1.0)),
            Element::source(CountFrom::new(0)),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::IllegalPosition {
                position: 1,
                protocol: Protocol::Source,
                placement: Placement::SplitBranch,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_bufsize_is_rejected() {
        let err = Split::with_options(
            vec![Element::transform(Scale::new(1.0))],
            SplitOptions {
                bufsize: 0,
                copy_buf: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidOption { .. }));
    }

    #[test]
    fn test_no_branches_is_identity() {
        let mut split = Split::new(Vec::new()).unwrap();
        assert_eq!(values(split.run(flow::from_values(vec![5]))), vec![json!(5)]);
    }

    #[test]
    fn test_split_inside_source_with_limit() {
        let mut source = Source::new(vec![
            Element::source(CountFrom::new(1)),
            Element::run(Slice::new(None, Some(3), None)),
            Element::from(
                Split::new(vec![
                    Element::transform(Scale::new(10.0)),
                    Element::fill_compute(Sum::new()),
                ])
                .unwrap(),
            ),
        ])
        .unwrap();

        let out = values(source.call());
        assert_eq!(
            out,
            vec![json!(10.0), json!(20.0), json!(30.0), json!(6)]
        );
    }

    #[test]
    fn test_branch_error_stops_the_split() {
        let mut split = Split::new(vec![Element::map(|item: FlowItem| {
            if item.data.as_i64() == Some(2) {
                Err(FlowError::element("branch", "boom"))
            } else {
                Ok(item)
            }
        })])
        .unwrap();

        let results: Vec<_> = split.run(flow::from_values(vec![1, 2, 3])).collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_sequence_branch_accumulates_over_whole_flow() {
        let branch = || {
            Sequence::new(vec![
                Element::transform(Scale::new(1.0)),
                Element::fill_compute(Sum::new()),
            ])
            .unwrap()
        };
        let direct = values(branch().run(flow::from_values(vec![1, 2, 3])));

        let mut split = Split::new(vec![Element::from(branch())]).unwrap();
        assert_eq!(split.branches()[0].protocol(), Protocol::FillCompute);
        assert_eq!(split.branches()[0].label(), "Sequence");

        let via_split = values(split.run(flow::from_values(vec![1, 2, 3])));
        assert_eq!(via_split, direct);
        assert_eq!(via_split, vec![json!(6.0)]);
    }

    #[test]
    fn test_sequence_branch_keeps_request_policy_across_windows() {
        let request = FillRequestSeq::with_policy(
            vec![Element::fill_request(RequestFromCompute::new(
                Sum::new(),
                BufferPolicy::every(1),
            ))],
            BufferPolicy::every(2),
        )
        .unwrap();
        let branch = Sequence::new(vec![
            Element::transform(Scale::new(1.0)),
            Element::from(request),
        ])
        .unwrap();
        let mut split = Split::new(vec![Element::from(branch)]).unwrap();
        assert_eq!(split.branches()[0].policy(), Some(BufferPolicy::every(2)));

        let out = values(split.run(flow::from_values(vec![1, 2, 3, 4])));
        assert_eq!(out, vec![json!(3.0), json!(7.0)]);
    }

    #[test]
    fn test_nested_sequence_branch_is_flattened() {
        let inner = Sequence::new(vec![
            Element::fill_compute(Sum::new()),
            Element::transform(Scale::new(10.0)),
        ])
        .unwrap();
        let branch = Sequence::new(vec![
            Element::transform(Scale::new(2.0)),
            Element::from(inner),
        ])
        .unwrap();
        let mut split = Split::with_options(
            vec![Element::from(branch), Element::transform(Scale::new(1.0))],
            SplitOptions {
                bufsize: 2,
                copy_buf: true,
            },
        )
        .unwrap();

        let out = values(split.run(flow::from_values(vec![1, 2, 3])));
        assert_eq!(out, vec![json!(1.0), json!(2.0), json!(3.0), json!(120.0)]);
    }

    #[test]
    fn test_mapping_sequence_branch_stays_run() {
        let branch = Sequence::new(vec![Element::transform(Scale::new(3.0))]).unwrap();
        let mut split = Split::new(vec![Element::from(branch)]).unwrap();
        assert_eq!(split.branches()[0].protocol(), Protocol::Run);
        assert_eq!(
            values(split.run(flow::from_values(vec![1, 2]))),
            vec![json!(3.0), json!(6.0)]
        );
    }

    #[test]
    fn test_unclassified_branch_is_rejected() {
        struct Inert;
        impl Capabilities for Inert {}

        let touched = Rc::new(Cell::new(false));
        let flag = touched.clone();
        let err = Split::new(vec![
            Element::map(move |item| {
                flag.set(true);
                Ok(item)
            }),
            Element::detect(Inert),
        ])
        .unwrap_err();
        assert!(matches!(err, FlowError::UnclassifiedElement { position: 1, .. }));
        assert!(!touched.get());
    }
}
