use serde::{Deserialize, Serialize};

use crate::ir::{Condition, StepFlowEntry, StepRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "default-node")]
    Default,
    #[serde(rename = "nested-node")]
    Nested,
    #[serde(rename = "condition-node")]
    Condition,
    #[serde(rename = "loop-result-node")]
    LoopResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopOutcome {
    Continue,
    Finished,
}

/// Construct-specific render hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepDetail {
    Sleep { duration: u64 },
    SleepUntil { date: String },
    WaitForEvent { event: String },
    Map { map_config: String },
    Foreach {
        concurrency: Option<u32>,
        map_config: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePayload {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub without_top_handle: bool,
    pub without_bottom_handle: bool,
    /// Nested IR of a workflow-valued step, compiled lazily on drill-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_graph: Option<Vec<StepFlowEntry>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
    pub is_large: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_result: Option<LoopOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StepDetail>,
}

impl NodePayload {
    pub fn labelled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            description: None,
            without_top_handle: false,
            without_bottom_handle: false,
            step_graph: None,
            conditions: Vec::new(),
            previous_step_id: None,
            next_step_id: None,
            is_large: false,
            loop_result: None,
            detail: None,
        }
    }

    pub fn step(step: &StepRef) -> Self {
        Self {
            description: step.description.clone(),
            step_graph: step.nested().map(<[StepFlowEntry]>::to_vec),
            detail: step
                .map_config
                .clone()
                .map(|map_config| StepDetail::Map { map_config }),
            ..Self::labelled(&step.id)
        }
    }

    /// Payload of a synthetic condition node. Nodes carrying several
    /// conditions or a raw expression are sized large by the layout engine.
    pub fn condition(
        label: &str,
        conditions: Vec<Condition>,
        previous_step_id: Option<&str>,
        next_step_id: Option<&str>,
    ) -> Self {
        let is_large = conditions.len() > 1
            || conditions
                .iter()
                .any(|condition| condition.raw_expression.is_some());
        Self {
            conditions,
            previous_step_id: previous_step_id.map(str::to_string),
            next_step_id: next_step_id.map(str::to_string),
            is_large,
            ..Self::labelled(label)
        }
    }

    pub fn loop_result(outcome: LoopOutcome, step_id: &str) -> Self {
        let label = match outcome {
            LoopOutcome::Continue => "continue",
            LoopOutcome::Finished => "finished",
        };
        Self {
            loop_result: Some(outcome),
            previous_step_id: Some(step_id.to_string()),
            ..Self::labelled(label)
        }
    }

    pub fn with_detail(mut self, detail: StepDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = description.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    #[serde(rename = "data")]
    pub payload: NodePayload,
}

impl VisualNode {
    pub fn is_nested(&self) -> bool {
        self.kind == NodeKind::Nested
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerEnd {
    ArrowClosed,
    Arrow,
}

/// Drawing defaults attached to every edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub animated: bool,
    pub stroke: String,
    pub stroke_width: f32,
    pub marker_end: Option<MarkerEnd>,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            animated: true,
            stroke: "#8e8e8e".to_string(),
            stroke_width: 1.0,
            marker_end: Some(MarkerEnd::ArrowClosed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualEdge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    /// Declared id of the step the edge leaves, even when the node was renamed.
    pub previous_step_id: String,
    /// Declared id of the step the edge enters, even when the node was renamed.
    pub next_step_id: String,
    pub style_defaults: EdgeStyle,
}

/// Open edge tails after a construct: emitted node ids and, index-aligned,
/// the declared step ids they stand for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frontier {
    pub node_ids: Vec<String>,
    pub step_ids: Vec<String>,
}

impl Frontier {
    pub fn single(node_id: &str, step_id: &str) -> Self {
        Self {
            node_ids: vec![node_id.to_string()],
            step_ids: vec![step_id.to_string()],
        }
    }

    pub fn push(&mut self, node_id: &str, step_id: &str) {
        self.node_ids.push(node_id.to_string());
        self.step_ids.push(step_id.to_string());
    }

    pub fn extend(&mut self, other: Frontier) {
        self.node_ids.extend(other.node_ids);
        self.step_ids.extend(other.step_ids);
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn last_step_id(&self) -> Option<&str> {
        self.step_ids.last().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.node_ids
            .iter()
            .map(String::as_str)
            .zip(self.step_ids.iter().map(String::as_str))
    }
}

/// Compiled, not yet positioned graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StepGraph {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
}

impl StepGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&VisualNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&VisualEdge> {
        self.edges
            .iter()
            .find(|edge| edge.source_node_id == source && edge.target_node_id == target)
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a VisualEdge> {
        self.edges.iter().filter(move |edge| edge.source_node_id == id)
    }

    pub fn edges_into<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a VisualEdge> {
        self.edges.iter().filter(move |edge| edge.target_node_id == id)
    }
}
