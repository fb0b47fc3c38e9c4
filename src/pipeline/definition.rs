// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .seqflow.yaml files and builds them into a
//! runnable [`Source`]. TOML and JSON files follow the same schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::adapter::Element;
use super::fill::{FillComputeSeq, FillRequestSeq, RequestFromCompute};
use super::protocol::{BufferPolicy, FillCompute};
use super::sequence::Sequence;
use super::source::Source;
use super::split::{Split, SplitOptions};
use crate::context::Context;
use crate::elements;
use crate::errors::{FlowError, FlowResult};

/// Default pipeline file name
pub const DEFAULT_FILE: &str = ".seqflow.yaml";

/// Pipeline definition from .seqflow.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Schema version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Source elements; the first one generates the flow
    pub source: Vec<ElementDef>,
}

fn default_version() -> String {
    "1".to_string()
}

/// Serialization format of a pipeline file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Yaml,
    Toml,
    Json,
}

impl DefinitionFormat {
    /// Pick the format from a file extension, YAML if unknown
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl PipelineDefinition {
    /// Load a definition, choosing the parser by extension
    pub fn from_file(path: &Path) -> FlowResult<Self> {
        if !path.exists() {
            return Err(FlowError::DefinitionNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| FlowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content, DefinitionFormat::from_path(path))
    }

    pub fn parse(content: &str, format: DefinitionFormat) -> FlowResult<Self> {
        match format {
            DefinitionFormat::Yaml => Self::from_yaml(content),
            DefinitionFormat::Toml => toml::from_str(content).map_err(Into::into),
            DefinitionFormat::Json => serde_json::from_str(content).map_err(Into::into),
        }
    }

    pub fn from_yaml(yaml: &str) -> FlowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> FlowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Build the runnable pipeline
    ///
    /// Every composition error surfaces here, before any item flows.
    pub fn build(&self) -> FlowResult<Source> {
        let elements = build_list(&self.source, Role::Stage)?;
        let source = Source::new(elements)?;
        tracing::debug!(pipeline = %self.name, elements = self.source.len(), "built pipeline");
        Ok(source)
    }
}

/// One element of a pipeline file
///
/// Written as a single-key mapping, e.g. `slice: { stop: 5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementDef {
    /// Integers from `start`, without end
    CountFrom {
        #[serde(default)]
        start: i64,
        #[serde(default = "default_step")]
        step: i64,
    },

    /// A fixed list of values
    Values(Vec<Value>),

    Slice(elements::Slice),

    Filter(elements::Selector),

    End {},

    Print {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },

    Progress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Item counter; an accumulator inside `fill_compute`
    Count {
        #[serde(default = "default_count_name")]
        name: String,
    },

    Scale { factor: f64 },

    Offset { shift: f64 },

    /// Merge a mapping into the context, or set a path from a template
    UpdateContext {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        merge: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    DeleteContext { paths: Vec<String> },

    Sum {},

    Mean {},

    Collect {},

    /// Nested sequence of elements
    Sequence(Vec<ElementDef>),

    /// Fan the flow out into independent branches
    Split {
        branches: Vec<Vec<ElementDef>>,
        #[serde(flatten)]
        options: SplitOptions,
    },

    /// Elements around one accumulator, computed at flow end
    FillCompute(Vec<ElementDef>),

    /// Elements around one accumulator, requested per buffered window
    FillRequest {
        elements: Vec<ElementDef>,
        #[serde(default)]
        policy: BufferPolicy,
    },
}

fn default_step() -> i64 {
    1
}

fn default_count_name() -> String {
    "count".to_string()
}

/// How a definition is being built
#[derive(Debug, Clone, Copy)]
enum Role {
    Stage,
    Accumulate,
}

impl ElementDef {
    /// The key this element is written with
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CountFrom { .. } => "count_from",
            Self::Values(_) => "values",
            Self::Slice(_) => "slice",
            Self::Filter(_) => "filter",
            Self::End {} => "end",
            Self::Print { .. } => "print",
            Self::Progress { .. } => "progress",
            Self::Count { .. } => "count",
            Self::Scale { .. } => "scale",
            Self::Offset { .. } => "offset",
            Self::UpdateContext { .. } => "update_context",
            Self::DeleteContext { .. } => "delete_context",
            Self::Sum {} => "sum",
            Self::Mean {} => "mean",
            Self::Collect {} => "collect",
            Self::Sequence(_) => "sequence",
            Self::Split { .. } => "split",
            Self::FillCompute(_) => "fill_compute",
            Self::FillRequest { .. } => "fill_request",
        }
    }

    /// Nested element lists, one per branch for a split
    pub fn children(&self) -> Vec<&[ElementDef]> {
        match self {
            Self::Sequence(list) | Self::FillCompute(list) => vec![list.as_slice()],
            Self::FillRequest { elements, .. } => vec![elements.as_slice()],
            Self::Split { branches, .. } => branches.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether this element only accumulates
    fn is_accumulator(&self) -> bool {
        matches!(
            self,
            Self::Sum {} | Self::Mean {} | Self::Collect {} | Self::FillCompute(_)
        )
    }

    /// Build the element for use in an ordinary sequence
    pub fn to_element(&self) -> FlowResult<Element> {
        self.build(Role::Stage)
    }

    fn build(&self, role: Role) -> FlowResult<Element> {
        let element = match self {
            Self::CountFrom { start, step } => {
                Element::source(elements::CountFrom::new(*start).with_step(*step))
            }
            Self::Values(values) => Element::source(elements::Values::new(values.clone())),
            Self::Slice(slice) => Element::run(*slice),
            Self::Filter(selector) => Element::run(elements::Filter::new(selector.clone())),
            Self::End {} => Element::run(elements::End),
            Self::Print { prefix } => Element::run(match prefix {
                Some(prefix) => elements::Print::with_prefix(prefix.clone()),
                None => elements::Print::new(),
            }),
            Self::Progress { message, total } => {
                let progress = match message {
                    Some(message) => elements::Progress::new(message.clone()),
                    None => elements::Progress::default(),
                };
                Element::run(match total {
                    Some(total) => progress.with_total(*total),
                    None => progress,
                })
            }
            Self::Count { name } => match role {
                Role::Stage => Element::detect(elements::Count::new(name.clone())),
                Role::Accumulate => Element::fill_compute(elements::Count::new(name.clone())),
            },
            Self::Scale { factor } => Element::transform(elements::Scale::new(*factor)),
            Self::Offset { shift } => Element::transform(elements::Offset::new(*shift)),
            Self::UpdateContext {
                merge,
                level,
                path,
                format,
            } => Element::transform(update_context(merge, *level, path, format)?),
            Self::DeleteContext { paths } => {
                Element::transform(elements::DeleteContext::new(paths.iter().cloned()))
            }
            Self::Sum {} => Element::fill_compute(elements::Sum::new()),
            Self::Mean {} => Element::fill_compute(elements::Mean::new()),
            Self::Collect {} => Element::fill_compute(elements::Collect::new()),
            Self::Sequence(list) => Sequence::new(build_list(list, role)?)?.into(),
            Self::Split { branches, options } => {
                let branches = branches
                    .iter()
                    .map(|branch| build_branch(branch))
                    .collect::<FlowResult<Vec<_>>>()?;
                Split::with_options(branches, *options)?.into()
            }
            Self::FillCompute(list) => fill_compute_seq(list)?.into(),
            Self::FillRequest { elements, policy } => fill_request_seq(elements, *policy)?.into(),
        };
        Ok(element.named(self.kind()))
    }

    /// Build an accumulator as Fill/Request under `policy`
    fn build_request(&self, policy: BufferPolicy) -> FlowResult<Element> {
        fn cast<E: FillCompute + 'static>(element: E, policy: BufferPolicy) -> Element {
            Element::fill_request(RequestFromCompute::new(element, policy))
        }

        let element = match self {
            Self::Sum {} => cast(elements::Sum::new(), policy),
            Self::Mean {} => cast(elements::Mean::new(), policy),
            Self::Collect {} => cast(elements::Collect::new(), policy),
            Self::Count { name } => cast(elements::Count::new(name.clone()), policy),
            Self::FillCompute(list) => cast(fill_compute_seq(list)?, policy),
            other => return other.build(Role::Stage),
        };
        Ok(element.named(self.kind()))
    }
}

fn build_list(list: &[ElementDef], role: Role) -> FlowResult<Vec<Element>> {
    list.iter().map(|def| def.build(role)).collect()
}

/// A split branch: accumulating branches compute once at flow end
///
/// Accumulators listed directly in the branch make it a `fill_compute`
/// list, so `count` accumulates too. Fill stages nested deeper are
/// regrouped by the Split itself.
fn build_branch(branch: &[ElementDef]) -> FlowResult<Element> {
    if branch.iter().any(ElementDef::is_accumulator) {
        return Ok(fill_compute_seq(branch)?.into());
    }
    match branch {
        [single] => single.build(Role::Stage),
        _ => Ok(Sequence::new(build_list(branch, Role::Stage)?)?.into()),
    }
}

fn fill_compute_seq(list: &[ElementDef]) -> FlowResult<FillComputeSeq> {
    FillComputeSeq::new(build_list(list, Role::Accumulate)?)
}

fn fill_request_seq(list: &[ElementDef], policy: BufferPolicy) -> FlowResult<FillRequestSeq> {
    let mut cast = false;
    let mut elements = Vec::with_capacity(list.len());
    for def in list {
        let accumulates = def.is_accumulator() || matches!(def, ElementDef::Count { .. });
        if accumulates && !cast {
            cast = true;
            elements.push(def.build_request(policy)?);
        } else {
            elements.push(def.build(Role::Stage)?);
        }
    }
    FillRequestSeq::with_policy(elements, policy)
}

fn update_context(
    merge: &Option<Value>,
    level: Option<usize>,
    path: &Option<String>,
    format: &Option<String>,
) -> FlowResult<elements::UpdateContext> {
    match (merge, path, format) {
        (Some(merge), None, None) => {
            let context = Context::try_from(merge.clone()).map_err(|_| FlowError::InvalidDefinition {
                reason: "update_context.merge must be a mapping".to_string(),
                help: None,
            })?;
            Ok(elements::UpdateContext::merge(context).with_level(level))
        }
        (None, Some(path), Some(format)) => elements::UpdateContext::format(path.clone(), format),
        _ => Err(FlowError::InvalidDefinition {
            reason: "update_context needs either 'merge' or both 'path' and 'format'".to_string(),
            help: Some("update_context: { merge: { key: value } }".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Placement, Protocol};
    use serde_json::json;

    fn run(definition: &PipelineDefinition) -> Vec<Value> {
        let mut source = definition.build().unwrap();
        source.call().map(|r| (*r.unwrap().data).clone()).collect()
    }

    #[test]
    fn test_parse_and_run_split_pipeline() {
        let yaml = r#"
version: "1"
name: demo
source:
  - count_from: { start: 1 }
  - slice: { stop: 3 }
  - split:
      branches:
        - [ { scale: { factor: 2 } } ]
        - [ { sum: {} } ]
"#;
        let definition = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(definition.source.len(), 3);
        assert_eq!(definition.source[2].kind(), "split");
        assert_eq!(
            run(&definition),
            vec![json!(2.0), json!(4.0), json!(6.0), json!(6)]
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
name = "from-toml"

[[source]]
values = [1, 2, 3]

[[source]]
fill_compute = [{ scale = { factor = 10.0 } }, { mean = {} }]
"#;
        let definition = PipelineDefinition::parse(toml, DefinitionFormat::Toml).unwrap();
        assert_eq!(definition.version, "1");
        assert_eq!(run(&definition), vec![json!(20.0)]);
    }

    #[test]
    fn test_fill_request_windows() {
        let yaml = r#"
name: windows
source:
  - values: [1, 2, 3, 4, 5]
  - fill_request:
      elements: [ { sum: {} } ]
      policy: { buffer_input: 2, yield_on_remainder: true }
"#;
        let definition = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(run(&definition), vec![json!(3), json!(7), json!(5)]);
    }

    #[test]
    fn test_nested_fill_stages_in_branches() {
        let yaml = r#"
name: nested-branches
source:
  - values: [1, 2, 3, 4]
  - split:
      branches:
        - [ { sequence: [ { scale: { factor: 1 } }, { sum: {} } ] } ]
        - - scale: { factor: 1 }
          - fill_request:
              elements: [ { sum: {} } ]
              policy: { buffer_input: 2 }
"#;
        let definition = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(run(&definition), vec![json!(3.0), json!(7.0), json!(10.0)]);
    }

    #[test]
    fn test_count_accumulates_inside_fill_compute() {
        let yaml = r#"
name: counting
source:
  - values: ["a", "b"]
  - fill_compute: [ { count: { name: total } } ]
"#;
        let mut source = PipelineDefinition::from_yaml(yaml).unwrap().build().unwrap();
        let items: Vec<_> = source.call().map(|r| r.unwrap()).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].context.get("total"), Some(&json!(2)));
    }

    #[test]
    fn test_build_reports_position_and_kind() {
        let yaml = r#"
name: broken
source:
  - values: [1]
  - scale: { factor: 2 }
  - count_from: {}
"#;
        let err = PipelineDefinition::from_yaml(yaml).unwrap().build().unwrap_err();
        match err {
            FlowError::IllegalPosition {
                position,
                element,
                protocol,
                placement,
                ..
            } => {
                assert_eq!(position, 2);
                assert_eq!(element, "count_from");
                assert_eq!(protocol, Protocol::Source);
                assert_eq!(placement, Placement::SourceTail);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_update_context_requires_one_form() {
        let def = ElementDef::UpdateContext {
            merge: None,
            level: None,
            path: Some("a".into()),
            format: None,
        };
        assert!(matches!(
            def.to_element().unwrap_err(),
            FlowError::InvalidDefinition { .. }
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let definition = PipelineDefinition {
            version: "1".into(),
            name: "round".into(),
            description: Some("trip".into()),
            source: vec![
                ElementDef::CountFrom { start: 0, step: 1 },
                ElementDef::Slice(elements::Slice::first(2)),
                ElementDef::UpdateContext {
                    merge: Some(json!({"run": 1})),
                    level: None,
                    path: None,
                    format: None,
                },
            ],
        };
        let parsed = PipelineDefinition::from_yaml(&definition.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed, definition);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineDefinition::from_file(Path::new("/nonexistent/.seqflow.yaml")).unwrap_err();
        assert!(matches!(err, FlowError::DefinitionNotFound { .. }));
    }
}
