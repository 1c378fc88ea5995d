//! Lowers step-flow IR into visual nodes and edges.
//!
//! Lowering walks each sibling list in order while carrying a [`Frontier`] of
//! open edge tails. Before an entry is lowered its entry points are resolved
//! (the lookahead from its predecessor) and the predecessor's tails are wired
//! to them; the entry then returns the tails its successor attaches to.

mod emit;
mod legacy;
mod types;

pub use legacy::{compile_legacy, compile_legacy_with_style};
pub use types::{
    EdgeStyle, Frontier, LoopOutcome, MarkerEnd, NodeKind, NodePayload, Position, StepDetail,
    StepGraph, VisualEdge, VisualNode,
};

use tracing::debug;

use crate::error::{Error, Result};
use crate::ir::{Condition, ConditionKind, StepFlowEntry, StepRef};
use emit::{Emitter, SyntheticRole};

pub fn compile(entries: &[StepFlowEntry]) -> Result<StepGraph> {
    compile_with_style(entries, &EdgeStyle::default())
}

pub fn compile_with_style(entries: &[StepFlowEntry], style: &EdgeStyle) -> Result<StepGraph> {
    let entries = fold_else_branches(entries);
    let mut lowering = FlowLowering {
        emit: Emitter::new(style),
    };
    lowering.lower_sequence(&entries, 0, Frontier::default(), None)?;
    let graph = lowering.emit.finish();
    debug!(
        entries = entries.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "compiled step flow"
    );
    Ok(graph)
}

/// Entry points of one construct, claimed before the construct is lowered.
#[derive(Debug, Default)]
struct FanOut {
    targets: Frontier,
    /// Fan-out of each parallel branch's first entry.
    branches: Vec<Option<FanOut>>,
}

impl FanOut {
    fn node(node_id: &str, step_id: &str) -> Self {
        Self {
            targets: Frontier::single(node_id, step_id),
            branches: Vec::new(),
        }
    }
}

struct FlowLowering {
    emit: Emitter,
}

impl FlowLowering {
    fn lower_sequence(
        &mut self,
        entries: &[StepFlowEntry],
        base_rank: usize,
        incoming: Frontier,
        head: Option<FanOut>,
    ) -> Result<Frontier> {
        let mut frontier = incoming;
        let mut head = head;
        for (offset, entry) in entries.iter().enumerate() {
            let rank = base_rank + offset;
            let fan_out = match head.take() {
                Some(fan_out) => fan_out,
                None => self.resolve_fan_out(entry, rank)?,
            };
            self.emit.connect_all(&frontier, &fan_out.targets);
            frontier = self.lower_entry(entry, rank, &frontier, fan_out)?;
        }
        Ok(frontier)
    }

    fn resolve_fan_out(&mut self, entry: &StepFlowEntry, rank: usize) -> Result<FanOut> {
        match entry {
            StepFlowEntry::Parallel { branches } => {
                let mut fan_out = FanOut::default();
                for branch in branches {
                    let head = match branch.first() {
                        Some(first) => Some(self.resolve_fan_out(first, rank)?),
                        None => None,
                    };
                    if let Some(head) = &head {
                        fan_out.targets.extend(head.targets.clone());
                    }
                    fan_out.branches.push(head);
                }
                Ok(fan_out)
            }
            StepFlowEntry::Conditional {
                branches,
                branch_conditions,
            } => {
                check_branch_conditions(branches, branch_conditions, rank)?;
                let mut fan_out = FanOut::default();
                for (index, branch) in branches.iter().enumerate() {
                    let condition_id = self.claim_branch_condition(branch, index, rank);
                    fan_out
                        .targets
                        .push(&condition_id, branch_step_id(branch, &condition_id));
                }
                Ok(fan_out)
            }
            single => {
                let declared = single.declared_id().unwrap_or_default();
                let node_id = self.emit.ids.claim(declared, rank);
                Ok(FanOut::node(&node_id, declared))
            }
        }
    }

    fn lower_entry(
        &mut self,
        entry: &StepFlowEntry,
        rank: usize,
        incoming: &Frontier,
        mut fan_out: FanOut,
    ) -> Result<Frontier> {
        let entry_node = |emit: &mut Emitter, declared: &str| {
            fan_out
                .targets
                .node_ids
                .first()
                .cloned()
                .unwrap_or_else(|| emit.ids.claim(declared, rank))
        };

        let tips = match entry {
            StepFlowEntry::Step(step) => {
                let node_id = entry_node(&mut self.emit, &step.id);
                self.emit
                    .push(&node_id, step_kind(step), NodePayload::step(step));
                self.attach(incoming, &node_id, &step.id)
            }
            StepFlowEntry::Foreach { step, opts } => {
                let node_id = entry_node(&mut self.emit, &step.id);
                let payload = NodePayload::step(step).with_detail(StepDetail::Foreach {
                    concurrency: opts.map(|opts| opts.concurrency),
                    map_config: step.map_config.clone(),
                });
                self.emit.push(&node_id, step_kind(step), payload);
                self.attach(incoming, &node_id, &step.id)
            }
            StepFlowEntry::Sleep { id, duration } => {
                let node_id = entry_node(&mut self.emit, id);
                let payload = NodePayload::labelled(id).with_detail(StepDetail::Sleep {
                    duration: *duration,
                });
                self.emit.push(&node_id, NodeKind::Default, payload);
                self.attach(incoming, &node_id, id)
            }
            StepFlowEntry::SleepUntil { id, date } => {
                let node_id = entry_node(&mut self.emit, id);
                let payload = NodePayload::labelled(id)
                    .with_detail(StepDetail::SleepUntil { date: date.clone() });
                self.emit.push(&node_id, NodeKind::Default, payload);
                self.attach(incoming, &node_id, id)
            }
            StepFlowEntry::WaitForEvent {
                id,
                event,
                description,
            } => {
                let node_id = entry_node(&mut self.emit, id);
                let payload = NodePayload::labelled(id)
                    .with_description(description.as_deref())
                    .with_detail(StepDetail::WaitForEvent {
                        event: event.clone(),
                    });
                self.emit.push(&node_id, NodeKind::Default, payload);
                self.attach(incoming, &node_id, id)
            }
            StepFlowEntry::Loop {
                step,
                exit_condition,
                loop_kind,
            } => {
                let node_id = entry_node(&mut self.emit, &step.id);
                self.emit
                    .push(&node_id, step_kind(step), NodePayload::step(step));
                self.attach(incoming, &node_id, &step.id);

                let condition_id = self.emit.ids.claim(&exit_condition.id, rank);
                let payload = NodePayload::condition(
                    &exit_condition.id,
                    vec![Condition::raw((*loop_kind).into(), &exit_condition.expr)],
                    Some(&step.id),
                    Some(&step.id),
                );
                self.emit.push(&condition_id, NodeKind::Condition, payload);
                self.emit
                    .connect(&node_id, &condition_id, &step.id, &step.id);
                Frontier::single(&condition_id, &step.id)
            }
            StepFlowEntry::Parallel { branches } => {
                let mut tips = Frontier::default();
                for (index, branch) in branches.iter().enumerate() {
                    if branch.is_empty() {
                        continue;
                    }
                    let head = fan_out.branches.get_mut(index).and_then(Option::take);
                    tips.extend(self.lower_sequence(branch, rank, incoming.clone(), head)?);
                }
                tips
            }
            StepFlowEntry::Conditional {
                branches,
                branch_conditions,
            } => {
                check_branch_conditions(branches, branch_conditions, rank)?;
                let mut tips = Frontier::default();
                for (index, (branch, condition)) in
                    branches.iter().zip(branch_conditions).enumerate()
                {
                    let condition_id = match fan_out.targets.node_ids.get(index) {
                        Some(id) => id.clone(),
                        None => self.claim_branch_condition(branch, index, rank),
                    };
                    let next_step_id = branch_step_id(branch, &condition_id).to_string();
                    let previous_step_id = incoming.last_step_id();
                    let payload = NodePayload::condition(
                        condition.kind.as_str(),
                        vec![condition.clone()],
                        previous_step_id,
                        Some(&next_step_id),
                    );
                    self.emit.push(&condition_id, NodeKind::Condition, payload);
                    self.attach(incoming, &condition_id, &next_step_id);

                    // Condition nodes never propagate: the successor hangs off
                    // the branch outcomes, and an empty branch is a dead end.
                    if branch.is_empty() {
                        continue;
                    }
                    let guard = Frontier::single(
                        &condition_id,
                        previous_step_id.unwrap_or(condition_id.as_str()),
                    );
                    tips.extend(self.lower_sequence(branch, rank, guard, None)?);
                }
                tips
            }
        };
        Ok(tips)
    }

    /// Wires every incoming tail to `node_id` and returns it as the new frontier.
    fn attach(&mut self, incoming: &Frontier, node_id: &str, step_id: &str) -> Frontier {
        let tips = Frontier::single(node_id, step_id);
        self.emit.connect_all(incoming, &tips);
        tips
    }

    fn claim_branch_condition(
        &mut self,
        branch: &[StepFlowEntry],
        index: usize,
        rank: usize,
    ) -> String {
        let anchor = branch
            .first()
            .and_then(StepFlowEntry::first_declared_id)
            .unwrap_or("conditional");
        self.emit
            .ids
            .synthetic(anchor, rank, SyntheticRole::BranchCondition(index))
    }
}

fn step_kind(step: &StepRef) -> NodeKind {
    if step.is_workflow {
        NodeKind::Nested
    } else {
        NodeKind::Default
    }
}

/// Declared id a branch's condition node stands in front of.
fn branch_step_id<'a>(branch: &'a [StepFlowEntry], condition_id: &'a str) -> &'a str {
    branch
        .first()
        .and_then(StepFlowEntry::first_declared_id)
        .unwrap_or(condition_id)
}

fn check_branch_conditions(
    branches: &[Vec<StepFlowEntry>],
    conditions: &[Condition],
    rank: usize,
) -> Result<()> {
    if branches.len() != conditions.len() {
        return Err(Error::BranchConditionMismatch {
            rank,
            branches: branches.len(),
            conditions: conditions.len(),
        });
    }
    Ok(())
}

/// Merges every conditional opened by an `else` condition into the
/// conditional right before it, at every nesting level.
fn fold_else_branches(entries: &[StepFlowEntry]) -> Vec<StepFlowEntry> {
    let mut folded: Vec<StepFlowEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match fold_nested(entry) {
            StepFlowEntry::Conditional {
                branches,
                branch_conditions,
            } if opens_with_else(&branch_conditions)
                && matches!(folded.last(), Some(StepFlowEntry::Conditional { .. })) =>
            {
                if let Some(StepFlowEntry::Conditional {
                    branches: previous_branches,
                    branch_conditions: previous_conditions,
                }) = folded.last_mut()
                {
                    previous_branches.extend(branches);
                    previous_conditions.extend(branch_conditions);
                }
            }
            other => folded.push(other),
        }
    }
    folded
}

fn fold_nested(entry: &StepFlowEntry) -> StepFlowEntry {
    match entry {
        StepFlowEntry::Parallel { branches } => StepFlowEntry::Parallel {
            branches: branches
                .iter()
                .map(|branch| fold_else_branches(branch))
                .collect(),
        },
        StepFlowEntry::Conditional {
            branches,
            branch_conditions,
        } => StepFlowEntry::Conditional {
            branches: branches
                .iter()
                .map(|branch| fold_else_branches(branch))
                .collect(),
            branch_conditions: branch_conditions.clone(),
        },
        other => other.clone(),
    }
}

fn opens_with_else(conditions: &[Condition]) -> bool {
    conditions
        .first()
        .is_some_and(|condition| condition.kind == ConditionKind::Else)
}
