//! Lowering of legacy workflows: `initial` chains plus subscriber graphs
//! hanging off previously emitted steps.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::emit::{Emitter, SyntheticRole};
use super::types::{EdgeStyle, Frontier, LoopOutcome, NodeKind, NodePayload, StepGraph};
use crate::condition::extract_conditions;
use crate::error::{Error, Result};
use crate::ir::{ConditionKind, LegacyStepGraph, LegacyStepNode, LegacyWorkflow};

/// Separator of subscriber keys that wait on several steps.
const SUBSCRIBER_JOIN: &str = "&&";

pub fn compile_legacy(workflow: &LegacyWorkflow) -> Result<StepGraph> {
    compile_legacy_with_style(workflow, &EdgeStyle::default())
}

pub fn compile_legacy_with_style(workflow: &LegacyWorkflow, style: &EdgeStyle) -> Result<StepGraph> {
    let mut lowering = LegacyLowering {
        emit: Emitter::new(style),
        latest: HashMap::new(),
    };
    lowering.lower_graph(&workflow.step_graph, &Frontier::default(), 0);

    // A subscriber may wait on steps only another subscriber emits, so keep
    // sweeping until a pass makes no progress.
    let mut pending: Vec<(&String, &LegacyStepGraph)> =
        workflow.step_subscriber_graph.iter().collect();
    while !pending.is_empty() {
        let mut waiting = Vec::new();
        let mut progressed = false;
        for (key, graph) in pending {
            match lowering.subscriber_sources(key) {
                Ok((frontier, rank)) => {
                    trace!(key = %key, rank, "lowering subscriber graph");
                    lowering.lower_graph(graph, &frontier, rank);
                    progressed = true;
                }
                Err(step_id) => waiting.push((key, graph, step_id)),
            }
        }
        if !progressed {
            if let Some((key, _, step_id)) = waiting.into_iter().next() {
                return Err(Error::UnknownSubscriberSource {
                    key: key.clone(),
                    step_id,
                });
            }
            break;
        }
        pending = waiting
            .into_iter()
            .map(|(key, graph, _)| (key, graph))
            .collect();
    }

    let graph = lowering.emit.finish();
    debug!(
        subscribers = workflow.step_subscriber_graph.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "compiled legacy workflow"
    );
    Ok(graph)
}

struct LegacyLowering {
    emit: Emitter,
    /// Declared step id -> (node the step left its chain on, rank).
    latest: HashMap<String, (String, usize)>,
}

impl LegacyLowering {
    fn lower_graph(&mut self, graph: &LegacyStepGraph, incoming: &Frontier, base_rank: usize) {
        for head in &graph.initial {
            let mut frontier = incoming.clone();
            for (offset, node) in graph.chain(head).enumerate() {
                frontier = self.lower_node(node, base_rank + offset, &frontier);
            }
        }
    }

    fn lower_node(&mut self, node: &LegacyStepNode, rank: usize, incoming: &Frontier) -> Frontier {
        let step_id = node.step.id.as_str();
        let tips = match node.config.loop_type {
            Some(loop_kind) => self.lower_loop_back(node, loop_kind.into(), rank, incoming),
            None => {
                let guarded = match &node.config.when {
                    Some(group) => {
                        let condition_id = self.emit.ids.synthetic(step_id, rank, SyntheticRole::When);
                        let previous_step_id = incoming.last_step_id();
                        let payload = NodePayload::condition(
                            ConditionKind::When.as_str(),
                            extract_conditions(group, ConditionKind::When),
                            previous_step_id,
                            Some(step_id),
                        );
                        self.emit.push(&condition_id, NodeKind::Condition, payload);
                        self.emit
                            .connect_all(incoming, &Frontier::single(&condition_id, step_id));
                        Frontier::single(
                            &condition_id,
                            previous_step_id.unwrap_or(condition_id.as_str()),
                        )
                    }
                    None => incoming.clone(),
                };
                let node_id = self.push_step(node, rank);
                let tips = Frontier::single(&node_id, step_id);
                self.emit.connect_all(&guarded, &tips);
                tips
            }
        };
        if let Some(tip) = tips.node_ids.first() {
            self.latest.insert(step_id.to_string(), (tip.clone(), rank));
        }
        tips
    }

    /// Loop condition, then a `continue` branch re-running the step and a
    /// `finished` branch the chain carries on from.
    fn lower_loop_back(
        &mut self,
        node: &LegacyStepNode,
        kind: ConditionKind,
        rank: usize,
        incoming: &Frontier,
    ) -> Frontier {
        let step_id = node.step.id.as_str();
        let label = node.config.loop_label.as_deref().unwrap_or(kind.as_str());
        let conditions = node
            .config
            .when
            .as_ref()
            .map(|group| extract_conditions(group, kind))
            .unwrap_or_default();

        let condition_id = self.emit.ids.synthetic(step_id, rank, SyntheticRole::Loop);
        let payload = NodePayload::condition(label, conditions, incoming.last_step_id(), Some(step_id));
        self.emit.push(&condition_id, NodeKind::Condition, payload);
        self.emit
            .connect_all(incoming, &Frontier::single(&condition_id, step_id));

        let continue_id = self.emit.ids.synthetic(step_id, rank, SyntheticRole::Continue);
        self.emit.push(
            &continue_id,
            NodeKind::LoopResult,
            NodePayload::loop_result(LoopOutcome::Continue, step_id),
        );
        self.emit.connect(&condition_id, &continue_id, step_id, step_id);

        let rerun_id = self.push_step(node, rank);
        self.emit.connect(&continue_id, &rerun_id, step_id, step_id);

        // The re-run step never feeds the finished branch.
        let finished_id = self.emit.ids.synthetic(step_id, rank, SyntheticRole::Finished);
        self.emit.push(
            &finished_id,
            NodeKind::LoopResult,
            NodePayload::loop_result(LoopOutcome::Finished, step_id),
        );
        self.emit.connect(&condition_id, &finished_id, step_id, step_id);

        Frontier::single(&finished_id, step_id)
    }

    fn push_step(&mut self, node: &LegacyStepNode, rank: usize) -> String {
        let node_id = self.emit.ids.claim(&node.step.id, rank);
        let payload =
            NodePayload::labelled(&node.step.id).with_description(node.step.description.as_deref());
        self.emit.push(&node_id, NodeKind::Default, payload);
        node_id
    }

    /// Tails a subscriber key hangs off, and the rank its chain starts at.
    /// Returns the first step id that has not been emitted yet otherwise.
    fn subscriber_sources(&self, key: &str) -> std::result::Result<(Frontier, usize), String> {
        let mut frontier = Frontier::default();
        let mut rank = 0;
        for step_id in key
            .split(SUBSCRIBER_JOIN)
            .map(str::trim)
            .filter(|part| !part.is_empty())
        {
            let (node_id, source_rank) = self
                .latest
                .get(step_id)
                .ok_or_else(|| step_id.to_string())?;
            frontier.push(node_id, step_id);
            rank = rank.max(source_rank + 1);
        }
        if frontier.is_empty() {
            return Err(key.to_string());
        }
        Ok((frontier, rank))
    }
}
