// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Self-generating pipelines

use super::adapter::{Element, Placement, SourceAdapter};
use super::flow::Flow;
use super::protocol::Generate;
use super::sequence::Sequence;
use crate::errors::{FlowError, FlowResult};

/// A generating element followed by an ordinary Sequence
///
/// A Source runs standalone: [`Source::call`] needs no input.
#[derive(Debug)]
pub struct Source {
    head: SourceAdapter,
    tail: Sequence,
}

impl Source {
    /// The first element must generate the flow; the rest must not
    pub fn new<I>(elements: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        let mut elements = elements.into_iter();
        let head = elements.next().ok_or(FlowError::EmptySource)?;
        let head = SourceAdapter::new(0, head)?;
        let tail = Sequence::assemble(elements, 1, Placement::SourceTail)?;

        tracing::debug!(head = head.label(), tail = tail.len(), "assembled source");

        Ok(Self { head, tail })
    }

    pub fn head(&self) -> &SourceAdapter {
        &self.head
    }

    pub fn tail(&self) -> &Sequence {
        &self.tail
    }

    /// Generate the flow and thread it through the tail
    pub fn call(&mut self) -> Flow<'_> {
        let flow = self.head.generate();
        self.tail.run(flow)
    }

    pub fn reset(&mut self) {
        self.head.reset();
        self.tail.reset();
    }
}

impl Generate for Source {
    fn generate(&mut self) -> Flow<'_> {
        self.call()
    }

    fn reset(&mut self) {
        Source::reset(self)
    }
}

impl From<Source> for Element {
    fn from(source: Source) -> Self {
        Element::source(source)
    }
}
