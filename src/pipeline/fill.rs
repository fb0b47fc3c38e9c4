// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Compositions around a single accumulating element
//!
//! Elements before the accumulator preprocess every filled item; a Sequence
//! after it postprocesses whatever it emits.

use super::adapter::{
    Adapter, Element, ElementKind, FillComputeStage, FillRequestStage, Placement, Protocol, Stage,
};
use super::flow::{self, Flow, FlowItem};
use super::protocol::{BufferPolicy, FillCompute, FillRequest};
use super::sequence::Sequence;
use crate::errors::{FlowError, FlowResult};

/// Preprocessing elements in front of the accumulator
#[derive(Debug, Default)]
struct Before {
    adapters: Vec<Adapter>,
}

impl Before {
    /// Run one item through the preprocessing elements
    fn apply<'a>(&'a mut self, item: FlowItem) -> Flow<'a> {
        let flow = flow::from_items(std::iter::once(item));
        self.adapters
            .iter_mut()
            .fold(flow, |flow, adapter| adapter.advance(flow))
    }

    fn reset(&mut self) {
        for adapter in &mut self.adapters {
            adapter.reset();
        }
    }
}

/// Elements split around the first one of `wanted` protocol
struct Parts {
    before: Before,
    label: String,
    kind: ElementKind,
    position: usize,
    after: Sequence,
}

fn split_at_fill<I>(elements: I, wanted: Protocol, composition: &'static str) -> FlowResult<Parts>
where
    I: IntoIterator<Item = Element>,
{
    let mut elements = elements.into_iter().enumerate();
    let mut before = Before::default();

    while let Some((position, element)) = elements.next() {
        if element.protocol() == Some(wanted) {
            let (label, kind) = element.into_parts();
            let after = Sequence::assemble(elements.map(|(_, e)| e), position + 1, Placement::AfterFill)?;
            return Ok(Parts {
                before,
                label,
                kind,
                position,
                after,
            });
        }

        match element.protocol() {
            Some(Protocol::Run) | Some(Protocol::Transform) | None => {
                before
                    .adapters
                    .push(Adapter::new(position, element, Placement::BeforeFill)?);
            }
            Some(protocol) => {
                return Err(FlowError::illegal_position(
                    position,
                    element.label(),
                    protocol,
                    Placement::BeforeFill,
                ))
            }
        }
    }

    Err(FlowError::MissingElement {
        composition,
        protocol: wanted,
    })
}

/// Regroup a Sequence around its first fill stage
///
/// Stages before it preprocess every filled item and the stages after it
/// postprocess its output, as in [`FillComputeSeq`] and [`FillRequestSeq`].
/// Nested Sequences are flattened first. Without a fill stage the Sequence
/// comes back unchanged.
pub(crate) fn regroup(sequence: Sequence) -> Element {
    let mut before = Before::default();
    let mut adapters = sequence.into_flat_adapters().into_iter();

    while let Some(adapter) = adapters.next() {
        let (position, label, stage) = adapter.into_parts();
        let element: Element = match stage {
            Stage::FillCompute(element) => FillComputeSeq {
                before,
                label,
                element,
                after: Sequence::from_adapters(adapters.collect()),
            }
            .into(),
            Stage::FillRequest(element, policy) => FillRequestSeq {
                before,
                label,
                element,
                policy,
                after: Sequence::from_adapters(adapters.collect()),
            }
            .into(),
            stage => {
                before.adapters.push(Adapter::from_parts(position, label, stage));
                continue;
            }
        };
        tracing::debug!(position, "regrouped sequence around its fill stage");
        return element;
    }

    Sequence::from_adapters(before.adapters).into()
}

/// A Fill/Compute element with optional pre- and postprocessing
///
/// Elements up to the first Fill/Compute element preprocess every filled
/// item. Elements after it form a Sequence applied to computed output.
pub struct FillComputeSeq {
    before: Before,
    label: String,
    element: Box<dyn FillCompute>,
    after: Sequence,
}

impl FillComputeSeq {
    pub fn new<I>(elements: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        let parts = split_at_fill(elements, Protocol::FillCompute, "FillComputeSeq")?;
        let ElementKind::FillCompute(element) = parts.kind else {
            return Err(FlowError::MissingElement {
                composition: "FillComputeSeq",
                protocol: Protocol::FillCompute,
            });
        };

        tracing::debug!(
            element = %parts.label,
            before = parts.before.adapters.len(),
            after = parts.after.len(),
            "assembled fill/compute sequence"
        );

        Ok(Self {
            before: parts.before,
            label: parts.label,
            element,
            after: parts.after,
        })
    }

    /// Label of the accumulating element
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Fill from `flow`, then yield the postprocessed result
    pub fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        Box::new(FillComputeStage::new(self, flow))
    }
}

impl FillCompute for FillComputeSeq {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        if self.before.adapters.is_empty() {
            return self.element.fill(item);
        }
        for result in self.before.apply(item) {
            self.element.fill(result?)?;
        }
        Ok(())
    }

    fn compute(&mut self) -> Flow<'_> {
        let output = self.element.compute();
        self.after.run(output)
    }

    fn reset(&mut self) {
        self.before.reset();
        self.element.reset();
        self.after.reset();
    }

    fn compute_on_empty(&self) -> bool {
        self.element.compute_on_empty()
    }
}

impl std::fmt::Debug for FillComputeSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillComputeSeq")
            .field("before", &self.before)
            .field("element", &self.label)
            .field("after", &self.after)
            .finish()
    }
}

impl From<FillComputeSeq> for Element {
    fn from(seq: FillComputeSeq) -> Self {
        Element::fill_compute(seq)
    }
}

/// A Fill/Request element with optional pre- and postprocessing
pub struct FillRequestSeq {
    before: Before,
    label: String,
    element: Box<dyn FillRequest>,
    policy: BufferPolicy,
    after: Sequence,
}

impl FillRequestSeq {
    /// Use the buffering declared by the Fill/Request element
    pub fn new<I>(elements: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        Self::build(elements, None)
    }

    /// Override the element's buffering
    pub fn with_policy<I>(elements: I, policy: BufferPolicy) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        Self::build(elements, Some(policy))
    }

    fn build<I>(elements: I, policy: Option<BufferPolicy>) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        let parts = split_at_fill(elements, Protocol::FillRequest, "FillRequestSeq")?;
        let ElementKind::FillRequest(element) = parts.kind else {
            return Err(FlowError::MissingElement {
                composition: "FillRequestSeq",
                protocol: Protocol::FillRequest,
            });
        };

        let invalid = |reason: String| FlowError::InvalidBuffering {
            position: parts.position,
            element: parts.label.clone(),
            reason,
        };
        let policy = policy
            .or_else(|| element.buffering())
            .ok_or_else(|| invalid("no buffering policy declared".to_string()))?;
        policy.validate().map_err(invalid)?;

        tracing::debug!(
            element = %parts.label,
            buffer_input = policy.buffer_input,
            "assembled fill/request sequence"
        );

        Ok(Self {
            before: parts.before,
            label: parts.label,
            element,
            policy,
            after: parts.after,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Fill from `flow`, yielding postprocessed requests as the policy allows
    pub fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        let policy = self.policy;
        Box::new(FillRequestStage::new(self, policy, flow))
    }
}

impl FillRequest for FillRequestSeq {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        if self.before.adapters.is_empty() {
            return self.element.fill(item);
        }
        for result in self.before.apply(item) {
            self.element.fill(result?)?;
        }
        Ok(())
    }

    fn request(&mut self) -> Flow<'_> {
        let output = self.element.request();
        self.after.run(output)
    }

    fn reset(&mut self) {
        self.before.reset();
        self.element.reset();
        self.after.reset();
    }

    fn buffering(&self) -> Option<BufferPolicy> {
        Some(self.policy)
    }

    fn request_on_empty(&self) -> bool {
        self.element.request_on_empty()
    }
}

impl std::fmt::Debug for FillRequestSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillRequestSeq")
            .field("before", &self.before)
            .field("element", &self.label)
            .field("policy", &self.policy)
            .field("after", &self.after)
            .finish()
    }
}

impl From<FillRequestSeq> for Element {
    fn from(seq: FillRequestSeq) -> Self {
        Element::fill_request(seq)
    }
}

/// Use a Fill/Compute element where Fill/Request is expected
///
/// Every request is a compute followed by a reset, so each request covers
/// only the items filled since the previous one.
#[derive(Debug)]
pub struct RequestFromCompute<E> {
    element: E,
    policy: BufferPolicy,
}

impl<E: FillCompute> RequestFromCompute<E> {
    pub fn new(element: E, policy: BufferPolicy) -> Self {
        Self { element, policy }
    }

    pub fn into_inner(self) -> E {
        self.element
    }
}

impl<E: FillCompute> FillRequest for RequestFromCompute<E> {
    fn fill(&mut self, item: FlowItem) -> FlowResult<()> {
        self.element.fill(item)
    }

    fn request(&mut self) -> Flow<'_> {
        // output borrows the element and must be released before the reset
        let output: Vec<_> = self.element.compute().collect();
        self.element.reset();
        Box::new(output.into_iter())
    }

    fn reset(&mut self) {
        self.element.reset();
    }

    fn buffering(&self) -> Option<BufferPolicy> {
        Some(self.policy)
    }

    fn request_on_empty(&self) -> bool {
        self.element.compute_on_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Collect, Count, Mean, Scale, Slice, Sum};
    use serde_json::{json, Value};

    fn values(flow: Flow<'_>) -> Vec<Value> {
        flow.map(|r| (*r.unwrap().data).clone()).collect()
    }

    fn computed(seq: &mut FillComputeSeq) -> Vec<Value> {
        values(seq.compute())
    }

    #[test]
    fn test_fill_compute_reset_round_trip() {
        let mut seq = FillComputeSeq::new(vec![Element::fill_compute(Sum::new())]).unwrap();

        for v in [1, 2, 3] {
            seq.fill(FlowItem::new(v)).unwrap();
        }
        let first = computed(&mut seq);
        seq.reset();
        for v in [4, 5] {
            seq.fill(FlowItem::new(v)).unwrap();
        }
        let second = computed(&mut seq);

        assert_eq!(first, vec![json!(6)]);
        assert_eq!(second, vec![json!(9)]);
    }

    #[test]
    fn test_before_and_after_elements() {
        let mut seq = FillComputeSeq::new(vec![
            Element::transform(Scale::new(2.0)),
            Element::fill_compute(Sum::new()),
            Element::transform(Scale::new(0.5)),
        ])
        .unwrap();

        let out = values(seq.run(flow::from_values(vec![1, 2, 3])));
        assert_eq!(out, vec![json!(6.0)]);
    }

    #[test]
    fn test_run_element_before_fill_sees_each_item() {
        let mut seq = FillComputeSeq::new(vec![
            Element::run(Slice::new(None, Some(1), None)),
            Element::fill_compute(Collect::new()),
        ])
        .unwrap();

        let out = values(seq.run(flow::from_values(vec![1, 2, 3])));
        assert_eq!(out, vec![json!([1, 2, 3])]);
    }

    #[test]
    fn test_missing_fill_element() {
        let err = FillComputeSeq::new(vec![Element::transform(Scale::new(2.0))]).unwrap_err();
        assert!(matches!(
            err,
            FlowError::MissingElement {
                protocol: Protocol::FillCompute,
                ..
            }
        ));
    }

    #[test]
    fn test_only_first_fill_element_accumulates() {
        // the second accumulator postprocesses computed output
        let mut seq = FillComputeSeq::new(vec![
            Element::fill_compute(Sum::new()),
            Element::fill_compute(Collect::new()),
        ])
        .unwrap();
        assert_eq!(seq.label(), "Sum");
        assert_eq!(values(seq.run(flow::from_values(vec![1, 2]))), vec![json!([3])]);
    }

    #[test]
    fn test_empty_flow_honours_on_empty_contract() {
        let mut sum = FillComputeSeq::new(vec![Element::fill_compute(Sum::new())]).unwrap();
        assert!(values(sum.run(flow::empty())).is_empty());

        let mut count = FillComputeSeq::new(vec![Element::fill_compute(Count::new("n"))]).unwrap();
        let out: Vec<_> = count.run(flow::empty()).map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(*out[0].data, json!(0));
    }

    #[test]
    fn test_mean_domain_error_on_compute() {
        let mut seq = FillComputeSeq::new(vec![Element::fill_compute(Mean::new())]).unwrap();
        let results: Vec<_> = seq.compute().collect();
        assert!(matches!(results.as_slice(), [Err(FlowError::Domain { .. })]));
    }

    #[test]
    fn test_fill_request_seq_with_policy() {
        let err = FillRequestSeq::with_policy(
            vec![Element::fill_compute(Sum::new())],
            BufferPolicy::every(2),
        )
        .unwrap_err();
        // a Fill/Compute element cannot preprocess for a Fill/Request element
        assert!(matches!(
            err,
            FlowError::IllegalPosition {
                protocol: Protocol::FillCompute,
                placement: Placement::BeforeFill,
                ..
            }
        ));

        let mut seq = FillRequestSeq::with_policy(
            vec![
                Element::transform(Scale::new(1.0)),
                Element::fill_request(RequestFromCompute::new(Sum::new(), BufferPolicy::every(1))),
            ],
            BufferPolicy::every(2).with_remainder(true),
        )
        .unwrap();
        assert_eq!(seq.policy().buffer_input, 2);

        let out = values(seq.run(flow::from_values(vec![1, 2, 3, 4, 5])));
        // windows of two, reset after each request
        assert_eq!(out, vec![json!(3.0), json!(7.0), json!(5.0)]);
    }

    #[test]
    fn test_fill_request_seq_requires_policy() {
        struct Undeclared;

        impl FillRequest for Undeclared {
            fn fill(&mut self, _item: FlowItem) -> FlowResult<()> {
                Ok(())
            }

            fn request(&mut self) -> Flow<'_> {
                flow::empty()
            }

            fn buffering(&self) -> Option<BufferPolicy> {
                None
            }
        }

        let err = FillRequestSeq::new(vec![Element::fill_request(Undeclared)]).unwrap_err();
        assert!(matches!(err, FlowError::InvalidBuffering { position: 0, .. }));
    }

    #[test]
    fn test_request_from_compute_resets_after_each_request() {
        let mut cast = RequestFromCompute::new(Sum::new(), BufferPolicy::every(3));
        cast.fill(FlowItem::new(1)).unwrap();
        cast.fill(FlowItem::new(2)).unwrap();
        assert_eq!(values(cast.request()), vec![json!(3)]);

        cast.fill(FlowItem::new(4)).unwrap();
        assert_eq!(values(cast.request()), vec![json!(4)]);
        assert_eq!(cast.buffering(), Some(BufferPolicy::every(3)));
    }

    #[test]
    fn test_unclassified_element_fails_construction() {
        struct Inert;
        impl crate::pipeline::Capabilities for Inert {}

        let err = FillComputeSeq::new(vec![
            Element::transform(Scale::new(1.0)),
            Element::detect(Inert),
            Element::fill_compute(Sum::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, FlowError::UnclassifiedElement { position: 1, .. }));

        let err = FillComputeSeq::new(vec![Element::fill_compute(Sum::new()), Element::detect(Inert)])
            .unwrap_err();
        assert!(matches!(err, FlowError::UnclassifiedElement { position: 1, .. }));

        let err = FillRequestSeq::with_policy(
            vec![
                Element::detect(Inert),
                Element::fill_request(RequestFromCompute::new(Sum::new(), BufferPolicy::every(1))),
            ],
            BufferPolicy::every(2),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::UnclassifiedElement { position: 0, .. }));
    }

    #[test]
    fn test_regroup_without_fill_stage_keeps_sequence() {
        let sequence = Sequence::new(vec![Element::transform(Scale::new(2.0))]).unwrap();
        let element = regroup(sequence);
        assert_eq!(element.protocol(), Some(Protocol::Run));

        let mut sequence = element.into_sequence().unwrap();
        assert_eq!(values(sequence.run(flow::from_values(vec![1]))), vec![json!(2.0)]);
    }
}
