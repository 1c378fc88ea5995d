use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Step id used by condition references that read the workflow trigger payload.
pub const TRIGGER_STEP_ID: &str = "trigger";

/// One construct of a serialized step flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepFlowEntry {
    Step(StepRef),
    Foreach {
        step: StepRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opts: Option<ForeachOptions>,
    },
    Sleep {
        id: String,
        duration: u64,
    },
    SleepUntil {
        id: String,
        date: String,
    },
    WaitForEvent {
        id: String,
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Loop {
        step: StepRef,
        exit_condition: ExitCondition,
        loop_kind: LoopKind,
    },
    Parallel {
        branches: Vec<Vec<StepFlowEntry>>,
    },
    Conditional {
        branches: Vec<Vec<StepFlowEntry>>,
        branch_conditions: Vec<Condition>,
    },
}

impl StepFlowEntry {
    pub fn step(id: &str) -> Self {
        Self::Step(StepRef::new(id))
    }

    /// Declared id of the node this entry emits first, if it emits exactly one.
    pub fn declared_id(&self) -> Option<&str> {
        match self {
            Self::Step(step) | Self::Foreach { step, .. } | Self::Loop { step, .. } => {
                Some(step.id.as_str())
            }
            Self::Sleep { id, .. } | Self::SleepUntil { id, .. } | Self::WaitForEvent { id, .. } => {
                Some(id.as_str())
            }
            Self::Parallel { .. } | Self::Conditional { .. } => None,
        }
    }

    /// First declared step id reachable from this entry, descending into branches.
    pub fn first_declared_id(&self) -> Option<&str> {
        match self {
            Self::Parallel { branches } | Self::Conditional { branches, .. } => branches
                .iter()
                .find_map(|branch| branch.first().and_then(Self::first_declared_id)),
            _ => self.declared_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_workflow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_flow: Option<Vec<StepFlowEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_config: Option<String>,
}

impl StepRef {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            description: None,
            is_workflow: false,
            nested_flow: None,
            map_config: None,
        }
    }

    pub fn workflow(id: &str, nested: Vec<StepFlowEntry>) -> Self {
        Self {
            is_workflow: true,
            nested_flow: Some(nested),
            ..Self::new(id)
        }
    }

    /// Nested IR carried by a workflow-valued step.
    pub fn nested(&self) -> Option<&[StepFlowEntry]> {
        if !self.is_workflow {
            return None;
        }
        self.nested_flow.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeachOptions {
    pub concurrency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCondition {
    pub id: String,
    pub expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopKind {
    #[serde(alias = "dountil")]
    Until,
    #[serde(alias = "dowhile")]
    While,
}

impl From<LoopKind> for ConditionKind {
    fn from(kind: LoopKind) -> Self {
        match kind {
            LoopKind::Until => ConditionKind::Until,
            LoopKind::While => ConditionKind::While,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    If,
    Else,
    When,
    Until,
    While,
    Dountil,
    Dowhile,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Else => "else",
            Self::When => "when",
            Self::Until => "until",
            Self::While => "while",
            Self::Dountil => "dountil",
            Self::Dowhile => "dowhile",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
    And,
    Or,
    Not,
}

impl Conjunction {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub step_id: String,
    pub path: String,
}

impl Reference {
    pub fn new(step_id: &str, path: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            path: path.to_string(),
        }
    }

    pub fn is_trigger(&self) -> bool {
        self.step_id == TRIGGER_STEP_ID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Is,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
}

impl ComparisonOp {
    /// Maps a legacy `$op` query key to its comparison.
    pub fn from_query_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$in" => Some(Self::In),
            "$nin" => Some(Self::Nin),
            "$exists" => Some(Self::Exists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conjunction: Option<Conjunction>,
}

impl Condition {
    pub fn bare(kind: ConditionKind) -> Self {
        Self {
            kind,
            reference: None,
            comparison: None,
            raw_expression: None,
            conjunction: None,
        }
    }

    pub fn raw(kind: ConditionKind, expression: &str) -> Self {
        Self {
            raw_expression: Some(expression.to_string()),
            ..Self::bare(kind)
        }
    }

    pub fn compare(kind: ConditionKind, reference: Reference, comparison: Comparison) -> Self {
        Self {
            reference: Some(reference),
            comparison: Some(comparison),
            ..Self::bare(kind)
        }
    }

    pub fn with_conjunction(mut self, conjunction: Option<Conjunction>) -> Self {
        self.conjunction = conjunction;
        self
    }
}

/// Nested IR found by [`find_nested_flow`], with its breadcrumb label.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedFlow<'a> {
    pub label: String,
    pub entries: &'a [StepFlowEntry],
}

/// Resolves a `/`-separated path of workflow-valued step ids to the nested IR
/// the rendering surface drills into.
pub fn find_nested_flow<'a>(entries: &'a [StepFlowEntry], path: &str) -> Result<NestedFlow<'a>> {
    let segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(Error::NestedFlowNotFound {
            path: path.to_string(),
        });
    }

    let mut current = entries;
    for segment in &segments {
        current = find_workflow_step(current, segment)
            .and_then(StepRef::nested)
            .ok_or_else(|| Error::NestedFlowNotFound {
                path: path.to_string(),
            })?;
    }

    Ok(NestedFlow {
        label: segments.join(" › "),
        entries: current,
    })
}

fn find_workflow_step<'a>(entries: &'a [StepFlowEntry], id: &str) -> Option<&'a StepRef> {
    for entry in entries {
        let found = match entry {
            StepFlowEntry::Step(step)
            | StepFlowEntry::Foreach { step, .. }
            | StepFlowEntry::Loop { step, .. } => (step.id == id && step.is_workflow).then_some(step),
            StepFlowEntry::Parallel { branches } | StepFlowEntry::Conditional { branches, .. } => {
                branches
                    .iter()
                    .find_map(|branch| find_workflow_step(branch, id))
            }
            StepFlowEntry::Sleep { .. }
            | StepFlowEntry::SleepUntil { .. }
            | StepFlowEntry::WaitForEvent { .. } => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Legacy workflow document: chained step graph plus subscriber graphs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyWorkflow {
    #[serde(default)]
    pub step_graph: LegacyStepGraph,
    #[serde(default)]
    pub step_subscriber_graph: BTreeMap<String, LegacyStepGraph>,
}

/// `initial` starts one chain per node; every other key continues the chain
/// of the step with that id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegacyStepGraph {
    #[serde(default)]
    pub initial: Vec<LegacyStepNode>,
    #[serde(flatten)]
    pub chains: BTreeMap<String, Vec<LegacyStepNode>>,
}

impl LegacyStepGraph {
    /// The chain started by `head`: the head itself followed by its followers.
    pub fn chain<'a>(&'a self, head: &'a LegacyStepNode) -> impl Iterator<Item = &'a LegacyStepNode> {
        std::iter::once(head).chain(self.chains.get(&head.step.id).into_iter().flatten())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyStepNode {
    pub step: LegacyStep,
    #[serde(default)]
    pub config: LegacyStepConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStep {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyStepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_type: Option<LoopKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_label: Option<String>,
}
