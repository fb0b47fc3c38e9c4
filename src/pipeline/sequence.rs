// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Linear composition of elements

use super::adapter::{Adapter, Element, Placement, Stage};
use super::flow::Flow;
use super::protocol::Run;
use crate::errors::FlowResult;

/// An ordered chain of adapted elements
///
/// Each element receives the flow produced by the one before it. An empty
/// Sequence returns its input unchanged.
#[derive(Debug, Default)]
pub struct Sequence {
    adapters: Vec<Adapter>,
}

impl Sequence {
    /// Adapt every element, failing on the first one that cannot be placed
    pub fn new<I>(elements: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        Self::assemble(elements, 0, Placement::SequenceStage)
    }

    /// Adapt elements numbered from `offset`, for use inside other compositions
    pub(crate) fn assemble<I>(elements: I, offset: usize, placement: Placement) -> FlowResult<Self>
    where
        I: IntoIterator<Item = Element>,
    {
        let adapters = elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| Adapter::new(offset + index, element, placement))
            .collect::<FlowResult<Vec<_>>>()?;

        tracing::debug!(
            stages = adapters.len(),
            labels = ?adapters.iter().map(Adapter::label).collect::<Vec<_>>(),
            "assembled sequence"
        );

        Ok(Self { adapters })
    }

    pub(crate) fn from_adapters(adapters: Vec<Adapter>) -> Self {
        Self { adapters }
    }

    /// Stages in order, with nested Sequences spliced in
    pub(crate) fn into_flat_adapters(self) -> Vec<Adapter> {
        let mut flat = Vec::with_capacity(self.adapters.len());
        for adapter in self.adapters {
            match adapter.into_parts() {
                (_, _, Stage::Sequence(inner)) => flat.extend(inner.into_flat_adapters()),
                (position, label, stage) => flat.push(Adapter::from_parts(position, label, stage)),
            }
        }
        flat
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    /// Thread `flow` through every element, lazily
    pub fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        self.adapters
            .iter_mut()
            .fold(flow, |flow, adapter| adapter.advance(flow))
    }

    /// Reset every element
    pub fn reset(&mut self) {
        for adapter in &mut self.adapters {
            adapter.reset();
        }
    }
}

impl Run for Sequence {
    fn run<'a>(&'a mut self, flow: Flow<'a>) -> Flow<'a> {
        Sequence::run(self, flow)
    }

    fn reset(&mut self) {
        Sequence::reset(self)
    }
}

impl From<Sequence> for Element {
    fn from(sequence: Sequence) -> Self {
        Element::from_sequence(sequence)
    }
}
