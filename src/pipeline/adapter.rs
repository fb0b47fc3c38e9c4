// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Protocol classification and adapters
//!
//! An [`Element`] is a raw processing unit tagged with the protocol it takes
//! part in. An [`Adapter`] is an element validated for its position in a
//! composition, exposing the single operation [`Adapter::advance`].

use std::collections::VecDeque;
use std::fmt;

use super::flow::{Flow, FlowItem, StopOnError};
use super::protocol::{BufferPolicy, FillCompute, FillRequest, Generate, Run, Transform};
use super::sequence::Sequence;
use crate::errors::{FlowError, FlowResult};

/// The five element protocols, in classification precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Run,
    FillRequest,
    FillCompute,
    Transform,
    Source,
}

impl Protocol {
    /// First match wins when an element supports several protocols
    pub const PRECEDENCE: [Protocol; 5] = [
        Protocol::Run,
        Protocol::FillRequest,
        Protocol::FillCompute,
        Protocol::Transform,
        Protocol::Source,
    ];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Run => "Run",
            Protocol::FillRequest => "Fill/Request",
            Protocol::FillCompute => "Fill/Compute",
            Protocol::Transform => "Transform",
            Protocol::Source => "Source",
        };
        f.write_str(name)
    }
}

/// Where an element is being placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    SequenceStage,
    SourceHead,
    SourceTail,
    SplitBranch,
    BeforeFill,
    AfterFill,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Placement::SequenceStage => "inside a Sequence",
            Placement::SourceHead => "at the head of a Source",
            Placement::SourceTail => "after the head of a Source",
            Placement::SplitBranch => "as a Split branch",
            Placement::BeforeFill => "before a fill element",
            Placement::AfterFill => "after a fill element",
        };
        f.write_str(text)
    }
}

/// Conversions for types supporting several protocols
///
/// Implement the conversions a type supports and build its element with
/// [`Element::detect`], which picks the first supported protocol in
/// [`Protocol::PRECEDENCE`].
pub trait Capabilities: Sized + 'static {
    fn into_run(self: Box<Self>) -> Result<Box<dyn Run>, Box<Self>> {
        Err(self)
    }

    fn into_fill_request(self: Box<Self>) -> Result<Box<dyn FillRequest>, Box<Self>> {
        Err(self)
    }

    fn into_fill_compute(self: Box<Self>) -> Result<Box<dyn FillCompute>, Box<Self>> {
        Err(self)
    }

    fn into_transform(self: Box<Self>) -> Result<Box<dyn Transform>, Box<Self>> {
        Err(self)
    }

    fn into_source(self: Box<Self>) -> Result<Box<dyn Generate>, Box<Self>> {
        Err(self)
    }
}

pub(crate) enum ElementKind {
    Run(Box<dyn Run>),
    Sequence(Sequence),
    FillRequest(Box<dyn FillRequest>),
    FillCompute(Box<dyn FillCompute>),
    Transform(Box<dyn Transform>),
    Source(Box<dyn Generate>),
    Unrecognized,
}

/// A processing unit tagged with its protocol and a label for diagnostics
pub struct Element {
    label: String,
    kind: ElementKind,
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

impl Element {
    pub fn run<R: Run + 'static>(element: R) -> Self {
        Self {
            label: short_type_name::<R>(),
            kind: ElementKind::Run(Box::new(element)),
        }
    }

    pub fn fill_request<R: FillRequest + 'static>(element: R) -> Self {
        Self {
            label: short_type_name::<R>(),
            kind: ElementKind::FillRequest(Box::new(element)),
        }
    }

    pub fn fill_compute<C: FillCompute + 'static>(element: C) -> Self {
        Self {
            label: short_type_name::<C>(),
            kind: ElementKind::FillCompute(Box::new(element)),
        }
    }

    pub fn transform<T: Transform + 'static>(element: T) -> Self {
        Self {
            label: short_type_name::<T>(),
            kind: ElementKind::Transform(Box::new(element)),
        }
    }

    /// A Transform element from a closure
    pub fn map<F>(f: F) -> Self
    where
        F: FnMut(FlowItem) -> FlowResult<FlowItem> + 'static,
    {
        Self::transform(f).named("map")
    }

    pub fn source<G: Generate + 'static>(element: G) -> Self {
        Self {
            label: short_type_name::<G>(),
            kind: ElementKind::Source(Box::new(element)),
        }
    }

    /// Classify a type supporting several protocols
    ///
    /// The result is unrecognised if the type converts into none of them;
    /// compositions reject it with its position.
    pub fn detect<C: Capabilities>(element: C) -> Self {
        let label = short_type_name::<C>();
        let boxed = Box::new(element);

        let boxed = match boxed.into_run() {
            Ok(run) => return Self { label, kind: ElementKind::Run(run) },
            Err(boxed) => boxed,
        };
        let boxed = match boxed.into_fill_request() {
            Ok(fr) => return Self { label, kind: ElementKind::FillRequest(fr) },
            Err(boxed) => boxed,
        };
        let boxed = match boxed.into_fill_compute() {
            Ok(fc) => return Self { label, kind: ElementKind::FillCompute(fc) },
            Err(boxed) => boxed,
        };
        let boxed = match boxed.into_transform() {
            Ok(t) => return Self { label, kind: ElementKind::Transform(t) },
            Err(boxed) => boxed,
        };
        match boxed.into_source() {
            Ok(g) => Self { label, kind: ElementKind::Source(g) },
            Err(_) => Self {
                label,
                kind: ElementKind::Unrecognized,
            },
        }
    }

    /// Replace the label used in diagnostics
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The protocol this element was classified as
    pub fn protocol(&self) -> Option<Protocol> {
        match self.kind {
            ElementKind::Run(_) | ElementKind::Sequence(_) => Some(Protocol::Run),
            ElementKind::FillRequest(_) => Some(Protocol::FillRequest),
            ElementKind::FillCompute(_) => Some(Protocol::FillCompute),
            ElementKind::Transform(_) => Some(Protocol::Transform),
            ElementKind::Source(_) => Some(Protocol::Source),
            ElementKind::Unrecognized => None,
        }
    }

    pub(crate) fn into_parts(self) -> (String, ElementKind) {
        (self.label, self.kind)
    }

    pub(crate) fn from_sequence(sequence: Sequence) -> Self {
        Self {
            label: "Sequence".to_string(),
            kind: ElementKind::Sequence(sequence),
        }
    }

    /// The Sequence this element wraps, if it is one
    pub(crate) fn into_sequence(self) -> Result<Sequence, Self> {
        match self.kind {
            ElementKind::Sequence(sequence) => Ok(sequence),
            kind => Err(Self {
                label: self.label,
                kind,
            }),
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("label", &self.label)
            .field("protocol", &self.protocol())
            .finish()
    }
}

pub(crate) enum Stage {
    Run(Box<dyn Run>),
    Sequence(Sequence),
    FillRequest(Box<dyn FillRequest>, BufferPolicy),
    FillCompute(Box<dyn FillCompute>),
    Transform(Box<dyn Transform>),
}

/// An element validated for a non-head position
pub struct Adapter {
    position: usize,
    label: String,
    pub(crate) stage: Stage,
}

impl Adapter {
    /// Adapt `element` for `placement`, using its declared buffering
    pub fn new(position: usize, element: Element, placement: Placement) -> FlowResult<Self> {
        Self::with_policy(position, element, placement, None)
    }

    /// Adapt `element`, overriding its buffering if it is a Fill/Request element
    pub fn with_policy(
        position: usize,
        element: Element,
        placement: Placement,
        policy: Option<BufferPolicy>,
    ) -> FlowResult<Self> {
        let (label, kind) = element.into_parts();

        let stage = match kind {
            ElementKind::Run(run) => Stage::Run(run),
            ElementKind::Sequence(sequence) => Stage::Sequence(sequence),
            ElementKind::FillCompute(fc) => Stage::FillCompute(fc),
            ElementKind::Transform(t) => Stage::Transform(t),
            ElementKind::FillRequest(fr) => {
                let policy = resolve_policy(position, &label, fr.as_ref(), policy)?;
                Stage::FillRequest(fr, policy)
            }
            ElementKind::Source(_) => {
                return Err(FlowError::illegal_position(
                    position,
                    label,
                    Protocol::Source,
                    placement,
                ))
            }
            ElementKind::Unrecognized => {
                return Err(FlowError::UnclassifiedElement {
                    position,
                    element: label,
                })
            }
        };

        Ok(Self {
            position,
            label,
            stage,
        })
    }

    pub(crate) fn from_parts(position: usize, label: String, stage: Stage) -> Self {
        Self {
            position,
            label,
            stage,
        }
    }

    pub(crate) fn into_parts(self) -> (usize, String, Stage) {
        (self.position, self.label, self.stage)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn protocol(&self) -> Protocol {
        match self.stage {
            Stage::Run(_) | Stage::Sequence(_) => Protocol::Run,
            Stage::FillRequest(..) => Protocol::FillRequest,
            Stage::FillCompute(_) => Protocol::FillCompute,
            Stage::Transform(_) => Protocol::Transform,
        }
    }

    /// Buffering in effect, for Fill/Request elements
    pub fn policy(&self) -> Option<BufferPolicy> {
        match self.stage {
            Stage::FillRequest(_, policy) => Some(policy),
            _ => None,
        }
    }

    /// Thread `flow` through this element
    ///
    /// Nothing is pulled from `flow` until the returned flow is polled.
    pub fn advance<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        match &mut self.stage {
            Stage::Transform(element) => {
                let mapped = flow.map(move |result| result.and_then(|item| element.transform(item)));
                Box::new(StopOnError::new(Box::new(mapped)))
            }
            Stage::Run(element) => element.run(flow),
            Stage::Sequence(sequence) => sequence.run(flow),
            Stage::FillCompute(element) => {
                Box::new(FillComputeStage::new(element.as_mut(), flow))
            }
            Stage::FillRequest(element, policy) => {
                let policy = *policy;
                Box::new(FillRequestStage::new(element.as_mut(), policy, flow))
            }
        }
    }

    /// Return the element to a fresh state
    pub fn reset(&mut self) {
        match &mut self.stage {
            Stage::Run(element) => element.reset(),
            Stage::Sequence(sequence) => sequence.reset(),
            Stage::FillRequest(element, _) => element.reset(),
            Stage::FillCompute(element) => element.reset(),
            Stage::Transform(_) => {}
        }
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("position", &self.position)
            .field("label", &self.label)
            .field("protocol", &self.protocol())
            .finish()
    }
}

fn resolve_policy(
    position: usize,
    label: &str,
    element: &dyn FillRequest,
    policy: Option<BufferPolicy>,
) -> FlowResult<BufferPolicy> {
    let invalid = |reason: String| FlowError::InvalidBuffering {
        position,
        element: label.to_string(),
        reason,
    };

    let policy = policy
        .or_else(|| element.buffering())
        .ok_or_else(|| invalid("no buffering policy declared".to_string()))?;
    policy.validate().map_err(invalid)?;
    Ok(policy)
}

/// The generating head of a Source
pub struct SourceAdapter {
    label: String,
    generator: Box<dyn Generate>,
}

impl SourceAdapter {
    pub fn new(position: usize, element: Element) -> FlowResult<Self> {
        let (label, kind) = element.into_parts();
        let protocol = match kind {
            ElementKind::Source(generator) => return Ok(Self { label, generator }),
            ElementKind::Run(_) | ElementKind::Sequence(_) => Protocol::Run,
            ElementKind::FillRequest(_) => Protocol::FillRequest,
            ElementKind::FillCompute(_) => Protocol::FillCompute,
            ElementKind::Transform(_) => Protocol::Transform,
            ElementKind::Unrecognized => {
                return Err(FlowError::UnclassifiedElement {
                    position,
                    element: label,
                })
            }
        };
        Err(FlowError::illegal_position(
            position,
            label,
            protocol,
            Placement::SourceHead,
        ))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn generate(&mut self) -> Flow<'_> {
        self.generator.generate()
    }

    pub fn reset(&mut self) {
        self.generator.reset();
    }
}

impl fmt::Debug for SourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("label", &self.label)
            .finish()
    }
}

/// Drains upstream into a Fill/Compute element, then yields its output
pub(crate) struct FillComputeStage<'a, E: FillCompute + ?Sized> {
    element: Option<&'a mut E>,
    upstream: Flow<'a>,
    output: Option<Flow<'a>>,
    failed: bool,
}

impl<'a, E: FillCompute + ?Sized> FillComputeStage<'a, E> {
    pub(crate) fn new(element: &'a mut E, upstream: Flow<'a>) -> Self {
        Self {
            element: Some(element),
            upstream,
            output: None,
            failed: false,
        }
    }
}

impl<'a, E: FillCompute + ?Sized> Iterator for FillComputeStage<'a, E> {
    type Item = FlowResult<FlowItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some(output) = self.output.as_mut() {
            let next = output.next();
            if matches!(next, Some(Err(_))) {
                self.failed = true;
            }
            return next;
        }

        let element = self.element.take()?;
        let mut filled = 0usize;
        for result in self.upstream.by_ref() {
            match result.and_then(|item| element.fill(item)) {
                Ok(()) => filled += 1,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        if filled == 0 && !element.compute_on_empty() {
            return None;
        }

        tracing::trace!(filled, "computing");
        self.output = Some(element.compute());
        self.next()
    }
}

/// Fill and request bookkeeping for one run of a Fill/Request element
pub(crate) struct RequestDriver {
    policy: BufferPolicy,
    since_request: usize,
    filled: usize,
}

impl RequestDriver {
    pub(crate) fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            since_request: 0,
            filled: 0,
        }
    }

    /// Fill one item, requesting into `pending` when the policy says so
    pub(crate) fn fill<E: FillRequest + ?Sized>(
        &mut self,
        element: &mut E,
        item: FlowItem,
        pending: &mut VecDeque<FlowResult<FlowItem>>,
    ) -> FlowResult<()> {
        element.fill(item)?;
        self.filled += 1;
        self.since_request += 1;

        if self.since_request >= self.policy.buffer_input && !self.policy.is_deferred() {
            self.request(element, pending, self.policy.buffer_output);
        }
        Ok(())
    }

    /// Final request at flow end, if one is due
    pub(crate) fn finish<E: FillRequest + ?Sized>(
        &mut self,
        element: &mut E,
        pending: &mut VecDeque<FlowResult<FlowItem>>,
    ) {
        let remainder = self.since_request > 0 && self.policy.yield_on_remainder;
        let on_empty = self.filled == 0 && element.request_on_empty();
        if remainder || on_empty {
            let cap = self.policy.buffer_output.filter(|&cap| cap > 0);
            self.request(element, pending, cap);
        }
    }

    fn request<E: FillRequest + ?Sized>(
        &mut self,
        element: &mut E,
        pending: &mut VecDeque<FlowResult<FlowItem>>,
        cap: Option<usize>,
    ) {
        tracing::trace!(filled = self.since_request, "requesting");
        self.since_request = 0;
        {
            let mut output = element.request();
            match cap {
                Some(cap) => {
                    pending.extend(output.by_ref().take(cap));
                    if output.next().is_some() {
                        tracing::trace!(cap, "request output truncated to buffer_output");
                    }
                }
                None => pending.extend(output),
            }
        }
        if self.policy.reset {
            element.reset();
        }
    }
}

/// Feeds upstream into a Fill/Request element, splicing in its requests
pub(crate) struct FillRequestStage<'a, E: FillRequest + ?Sized> {
    element: &'a mut E,
    upstream: Flow<'a>,
    driver: RequestDriver,
    pending: VecDeque<FlowResult<FlowItem>>,
    exhausted: bool,
    failed: bool,
}

impl<'a, E: FillRequest + ?Sized> FillRequestStage<'a, E> {
    pub(crate) fn new(element: &'a mut E, policy: BufferPolicy, upstream: Flow<'a>) -> Self {
        Self {
            element,
            upstream,
            driver: RequestDriver::new(policy),
            pending: VecDeque::new(),
            exhausted: false,
            failed: false,
        }
    }
}

impl<'a, E: FillRequest + ?Sized> Iterator for FillRequestStage<'a, E> {
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

            match self.upstream.next() {
                Some(Ok(item)) => {
                    let filled = self.driver.fill(&mut *self.element, item, &mut self.pending);
                    if let Err(e) = filled {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => {
                    self.exhausted = true;
                    self.driver.finish(&mut *self.element, &mut self.pending);
                }
            }
        }
    }
}
