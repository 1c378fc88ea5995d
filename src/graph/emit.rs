use std::collections::HashSet;
use std::fmt;

use tracing::trace;

use super::types::{EdgeStyle, Frontier, NodeKind, NodePayload, Position, StepGraph, VisualEdge, VisualNode};

/// Role tag of a node the IR does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyntheticRole {
    BranchCondition(usize),
    When,
    Loop,
    Continue,
    Finished,
}

impl fmt::Display for SyntheticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchCondition(branch) => write!(f, "when-{branch}"),
            Self::When => f.write_str("when"),
            Self::Loop => f.write_str("loop"),
            Self::Continue => f.write_str("continue"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

/// Every node id handed out by one compilation.
///
/// First come keeps the declared id, later claims become `<id>-<rank>`, and
/// `<id>-<rank>-<n>` (n >= 2) if even that is taken.
#[derive(Debug, Default)]
pub(crate) struct NodeIdArena {
    seen: HashSet<String>,
}

impl NodeIdArena {
    pub(crate) fn claim(&mut self, declared: &str, rank: usize) -> String {
        let id = self.resolve(declared, rank);
        if id != declared {
            trace!(declared, emitted = %id, rank, "renamed colliding node id");
        }
        self.seen.insert(id.clone());
        id
    }

    pub(crate) fn synthetic(&mut self, anchor: &str, rank: usize, role: SyntheticRole) -> String {
        self.claim(&format!("{anchor}-{rank}-{role}"), rank)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn resolve(&self, declared: &str, rank: usize) -> String {
        if !self.seen.contains(declared) {
            return declared.to_string();
        }
        let ranked = format!("{declared}-{rank}");
        if !self.seen.contains(&ranked) {
            return ranked;
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{ranked}-{n}");
            if !self.seen.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// `e<source>-<target>`, suffixed `-<n>` (n >= 2) when hyphenated ids of
/// another pair already produced the same string.
fn edge_id(taken: &HashSet<String>, source: &str, target: &str) -> String {
    let base = format!("e{source}-{target}");
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Node and edge sink shared by both IR front-ends.
#[derive(Debug)]
pub(crate) struct Emitter {
    pub(crate) ids: NodeIdArena,
    nodes: Vec<VisualNode>,
    edges: Vec<VisualEdge>,
    wired: HashSet<(String, String)>,
    edge_ids: HashSet<String>,
    style: EdgeStyle,
}

impl Emitter {
    pub(crate) fn new(style: &EdgeStyle) -> Self {
        Self {
            ids: NodeIdArena::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            wired: HashSet::new(),
            edge_ids: HashSet::new(),
            style: style.clone(),
        }
    }

    pub(crate) fn push(&mut self, id: &str, kind: NodeKind, payload: NodePayload) {
        debug_assert!(self.ids.contains(id), "node id {id} was never claimed");
        self.nodes.push(VisualNode {
            id: id.to_string(),
            kind,
            position: Position::default(),
            payload,
        });
    }

    /// Adds `source -> target` unless that pair is already wired.
    pub(crate) fn connect(
        &mut self,
        source: &str,
        target: &str,
        previous_step_id: &str,
        next_step_id: &str,
    ) {
        if !self
            .wired
            .insert((source.to_string(), target.to_string()))
        {
            trace!(source, target, "skipped duplicate edge");
            return;
        }
        let id = edge_id(&self.edge_ids, source, target);
        self.edge_ids.insert(id.clone());
        self.edges.push(VisualEdge {
            id,
            source_node_id: source.to_string(),
            target_node_id: target.to_string(),
            previous_step_id: previous_step_id.to_string(),
            next_step_id: next_step_id.to_string(),
            style_defaults: self.style.clone(),
        });
    }

    /// One edge per (open tail, entry point) pair.
    pub(crate) fn connect_all(&mut self, from: &Frontier, to: &Frontier) {
        for (source, previous_step_id) in from.iter() {
            for (target, next_step_id) in to.iter() {
                self.connect(source, target, previous_step_id, next_step_id);
            }
        }
    }

    /// Records connector visibility from the final edge set.
    pub(crate) fn finish(self) -> StepGraph {
        let sources: HashSet<&str> = self
            .edges
            .iter()
            .map(|edge| edge.source_node_id.as_str())
            .collect();
        let targets: HashSet<&str> = self
            .edges
            .iter()
            .map(|edge| edge.target_node_id.as_str())
            .collect();
        let nodes = self
            .nodes
            .into_iter()
            .map(|mut node| {
                node.payload.without_top_handle = !targets.contains(node.id.as_str());
                node.payload.without_bottom_handle = !sources.contains(node.id.as_str());
                node
            })
            .collect();
        StepGraph {
            nodes,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_suffixes_repeated_ids_with_rank() {
        let mut ids = NodeIdArena::default();
        assert_eq!(ids.claim("A", 0), "A");
        assert_eq!(ids.claim("A", 1), "A-1");
        assert_eq!(ids.claim("A", 1), "A-1-2");
        assert_eq!(ids.claim("A", 1), "A-1-3");
        assert_eq!(ids.claim("B", 1), "B");
    }

    #[test]
    fn synthetic_ids_are_derived_from_anchor_rank_and_role() {
        let mut ids = NodeIdArena::default();
        assert_eq!(ids.synthetic("B", 2, SyntheticRole::BranchCondition(0)), "B-2-when-0");
        assert_eq!(ids.synthetic("B", 2, SyntheticRole::Finished), "B-2-finished");
        assert_eq!(ids.synthetic("B", 2, SyntheticRole::Finished), "B-2-finished-2");
    }

    #[test]
    fn emitter_deduplicates_edges_and_sets_handles() {
        let mut emitter = Emitter::new(&EdgeStyle::default());
        for id in ["A", "B"] {
            let id = emitter.ids.claim(id, 0);
            emitter.push(&id, NodeKind::Default, NodePayload::labelled(&id));
        }
        emitter.connect("A", "B", "A", "B");
        emitter.connect("A", "B", "A", "B");
        let graph = emitter.finish();

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "eA-B");
        let a = graph.node("A").unwrap();
        let b = graph.node("B").unwrap();
        assert!(a.payload.without_top_handle);
        assert!(!a.payload.without_bottom_handle);
        assert!(!b.payload.without_top_handle);
        assert!(b.payload.without_bottom_handle);
    }

    #[test]
    fn hyphenated_ids_keep_distinct_edges() {
        let mut emitter = Emitter::new(&EdgeStyle::default());
        for id in ["a", "b-c", "a-b", "c"] {
            let id = emitter.ids.claim(id, 0);
            emitter.push(&id, NodeKind::Default, NodePayload::labelled(&id));
        }
        emitter.connect("a", "b-c", "a", "b-c");
        emitter.connect("a-b", "c", "a-b", "c");
        emitter.connect("a-b", "c", "a-b", "c");
        let graph = emitter.finish();

        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].id, "ea-b-c");
        assert_eq!(graph.edges[1].id, "ea-b-c-2");
        assert!(graph.edge("a-b", "c").is_some());
        assert!(!graph.node("c").unwrap().payload.without_top_handle);
    }
}
