//! Layered top-to-bottom placement of a compiled step graph.
//!
//! Ranks come from the longest path, edges spanning several ranks are routed
//! through zero-sized dummies, and ranks are ordered by neighbour medians.
//! Placement is computed center-anchored and handed out top-left anchored.

mod ranking;

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::config::LayoutConfig;
use crate::graph::{Position, StepGraph, VisualEdge, VisualNode};
use ranking::{LayerEdge, compute_ranks, order_rank_nodes};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeLayout {
    /// The node, its `position` set to the top-left corner.
    pub node: VisualNode,
    pub center: Position,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layout {
    pub nodes: Vec<NodeLayout>,
    pub edges: Vec<VisualEdge>,
    /// Half the horizontal extent of the whole graph.
    pub full_width: f32,
    /// Half the vertical extent of the whole graph.
    pub full_height: f32,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.iter().find(|layout| layout.node.id == id)
    }
}

pub fn node_size(node: &VisualNode, config: &LayoutConfig) -> (f32, f32) {
    let height = if node.payload.is_large {
        config.large_node_height
    } else {
        config.node_height
    };
    (config.node_width, height)
}

pub fn compute_layout(graph: StepGraph, config: &LayoutConfig) -> Layout {
    if graph.nodes.is_empty() {
        return Layout {
            edges: graph.edges,
            ..Layout::default()
        };
    }

    let node_ids: Vec<String> = graph.nodes.iter().map(|node| node.id.clone()).collect();
    let mut sizes: HashMap<String, (f32, f32)> = graph
        .nodes
        .iter()
        .map(|node| (node.id.clone(), node_size(node, config)))
        .collect();
    let mut order_map: HashMap<String, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.clone(), idx))
        .collect();
    let layer_edges: Vec<LayerEdge> = graph
        .edges
        .iter()
        .filter(|edge| {
            sizes.contains_key(&edge.source_node_id) && sizes.contains_key(&edge.target_node_id)
        })
        .map(|edge| LayerEdge::new(&edge.source_node_id, &edge.target_node_id))
        .collect();

    let ranks = compute_ranks(&node_ids, &layer_edges, &order_map);
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut rank_nodes: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for node_id in &node_ids {
        let rank = ranks.get(node_id).copied().unwrap_or(0);
        rank_nodes[rank].push(node_id.clone());
    }

    let mut expanded_edges: Vec<LayerEdge> = Vec::new();
    let mut dummy_counter = 0usize;
    for edge in &layer_edges {
        let from_rank = ranks.get(&edge.from).copied().unwrap_or(0);
        let to_rank = ranks.get(&edge.to).copied().unwrap_or(0);
        if to_rank <= from_rank {
            continue;
        }
        let mut prev = edge.from.clone();
        for current_rank in from_rank + 1..to_rank {
            let dummy_id = format!("__dummy_{dummy_counter}__");
            dummy_counter += 1;
            order_map.insert(dummy_id.clone(), order_map.len());
            sizes.insert(dummy_id.clone(), (0.0, 0.0));
            rank_nodes[current_rank].push(dummy_id.clone());
            expanded_edges.push(LayerEdge::new(&prev, &dummy_id));
            prev = dummy_id;
        }
        expanded_edges.push(LayerEdge::new(&prev, &edge.to));
    }

    for bucket in &mut rank_nodes {
        bucket.sort_by_key(|id| order_map.get(id).copied().unwrap_or(usize::MAX));
    }
    order_rank_nodes(&mut rank_nodes, &expanded_edges, &order_map, config.order_passes);

    let size_of = |id: &str| sizes.get(id).copied().unwrap_or((0.0, 0.0));

    // Main axis: every rank is a band as tall as its tallest node.
    let mut main_pos: HashMap<String, f32> = HashMap::new();
    let mut main_cursor = 0.0;
    for bucket in &rank_nodes {
        let band = bucket
            .iter()
            .map(|id| size_of(id).1)
            .fold(0.0_f32, f32::max);
        for node_id in bucket {
            main_pos.insert(node_id.clone(), main_cursor + band / 2.0);
        }
        if band > 0.0 {
            main_cursor += band + config.rank_spacing;
        }
    }

    // Cross axis: start packed, then pull every node towards its neighbours.
    let mut cross_pos: HashMap<String, f32> = HashMap::new();
    for bucket in &rank_nodes {
        let mut cursor = 0.0;
        for node_id in bucket {
            let width = size_of(node_id).0;
            cross_pos.insert(node_id.clone(), cursor + width / 2.0);
            cursor += width + config.node_spacing;
        }
    }

    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
    for edge in &expanded_edges {
        incoming
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());
        outgoing
            .entry(edge.from.clone())
            .or_default()
            .push(edge.to.clone());
    }

    let mut place_rank = |bucket: &[String], use_incoming: bool| {
        if bucket.is_empty() {
            return;
        }
        let neighbors = if use_incoming { &incoming } else { &outgoing };
        let mut entries: Vec<(&String, f32, f32, usize)> = Vec::new();
        for (idx, node_id) in bucket.iter().enumerate() {
            let mut neighbor_centers: Vec<f32> = neighbors
                .get(node_id)
                .into_iter()
                .flatten()
                .filter_map(|neighbor| cross_pos.get(neighbor).copied())
                .collect();
            let current = cross_pos.get(node_id).copied().unwrap_or(0.0);
            let desired = if neighbor_centers.is_empty() {
                current
            } else {
                neighbor_centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                let mid = neighbor_centers.len() / 2;
                let median = if neighbor_centers.len() % 2 == 1 {
                    neighbor_centers[mid]
                } else {
                    (neighbor_centers[mid - 1] + neighbor_centers[mid]) * 0.5
                };
                median * 0.85 + current * 0.15
            };
            entries.push((node_id, desired, size_of(node_id).0 / 2.0, idx));
        }
        entries.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.3.cmp(&b.3))
        });
        let desired_mean =
            entries.iter().map(|(_, d, _, _)| *d).sum::<f32>() / entries.len() as f32;
        let mut assigned: Vec<(&String, f32)> = Vec::with_capacity(entries.len());
        let mut prev: Option<(f32, f32)> = None;
        for (node_id, desired, half, _idx) in entries {
            let center = match prev {
                Some((prev_center, prev_half)) => {
                    desired.max(prev_center + prev_half + half + config.node_spacing)
                }
                None => desired,
            };
            assigned.push((node_id, center));
            prev = Some((center, half));
        }
        let actual_mean = assigned.iter().map(|(_, c)| *c).sum::<f32>() / assigned.len() as f32;
        let delta = desired_mean - actual_mean;
        for (node_id, center) in assigned {
            cross_pos.insert(node_id.clone(), center + delta);
        }
    };

    for _ in 0..config.order_passes.max(1) {
        for bucket in &rank_nodes {
            place_rank(bucket, true);
        }
        for bucket in rank_nodes.iter().rev() {
            place_rank(bucket, false);
        }
    }

    let mut nodes: Vec<NodeLayout> = graph
        .nodes
        .into_iter()
        .map(|node| {
            let (width, height) = size_of(&node.id);
            let center = Position {
                x: cross_pos.get(&node.id).copied().unwrap_or(0.0),
                y: main_pos.get(&node.id).copied().unwrap_or(0.0),
            };
            NodeLayout {
                node,
                center,
                width,
                height,
            }
        })
        .collect();

    // Shift so the bounding box starts at the origin.
    let min_x = nodes
        .iter()
        .map(|layout| layout.center.x - layout.width / 2.0)
        .fold(f32::INFINITY, f32::min);
    let min_y = nodes
        .iter()
        .map(|layout| layout.center.y - layout.height / 2.0)
        .fold(f32::INFINITY, f32::min);
    let mut max_x = 0.0_f32;
    let mut max_y = 0.0_f32;
    for layout in &mut nodes {
        layout.center.x -= min_x;
        layout.center.y -= min_y;
        layout.node.position = Position {
            x: layout.center.x - layout.width / 2.0,
            y: layout.center.y - layout.height / 2.0,
        };
        max_x = max_x.max(layout.center.x + layout.width / 2.0);
        max_y = max_y.max(layout.center.y + layout.height / 2.0);
    }

    debug!(
        nodes = nodes.len(),
        ranks = rank_nodes.len(),
        dummies = dummy_counter,
        width = max_x,
        height = max_y,
        "laid out step graph"
    );

    Layout {
        nodes,
        edges: graph.edges,
        full_width: max_x / 2.0,
        full_height: max_y / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::compile;
    use crate::ir::{Condition, ConditionKind, StepFlowEntry};

    fn step(id: &str) -> StepFlowEntry {
        StepFlowEntry::step(id)
    }

    fn diamond() -> StepGraph {
        compile(&[
            step("A"),
            StepFlowEntry::Parallel {
                branches: vec![vec![step("B")], vec![step("C")]],
            },
            step("D"),
        ])
        .unwrap()
    }

    #[test]
    fn positions_are_top_left_of_the_center() {
        let layout = compute_layout(diamond(), &LayoutConfig::default());
        assert_eq!(layout.nodes.len(), 4);
        for node in &layout.nodes {
            assert_eq!(node.node.position.x, node.center.x - node.width / 2.0);
            assert_eq!(node.node.position.y, node.center.y - node.height / 2.0);
        }
    }

    #[test]
    fn edges_point_downwards() {
        let layout = compute_layout(diamond(), &LayoutConfig::default());
        for edge in &layout.edges {
            let source = layout.node(&edge.source_node_id).unwrap();
            let target = layout.node(&edge.target_node_id).unwrap();
            assert!(source.center.y < target.center.y, "{} -> {}", edge.source_node_id, edge.target_node_id);
        }
    }

    #[test]
    fn siblings_in_one_rank_do_not_overlap() {
        let config = LayoutConfig::default();
        let layout = compute_layout(diamond(), &config);
        let b = layout.node("B").unwrap();
        let c = layout.node("C").unwrap();
        assert_eq!(b.center.y, c.center.y);
        let gap = (b.center.x - c.center.x).abs();
        assert!(gap >= config.node_width + config.node_spacing - 0.01);
    }

    #[test]
    fn bounding_box_is_half_the_extent() {
        let config = LayoutConfig::default();
        let layout = compute_layout(compile(&[step("A"), step("B")]).unwrap(), &config);
        assert!((layout.full_width - config.node_width / 2.0).abs() < 0.01);
        let height = 2.0 * config.node_height + config.rank_spacing;
        assert_eq!(layout.full_height, height / 2.0);
        let a = &layout.node("A").unwrap().node.position;
        assert!(a.x.abs() < 0.01);
        assert_eq!(a.y, 0.0);
    }

    #[test]
    fn large_condition_nodes_use_large_height() {
        let config = LayoutConfig::default();
        let graph = compile(&[
            step("A"),
            StepFlowEntry::Conditional {
                branches: vec![vec![step("B")]],
                branch_conditions: vec![Condition::raw(ConditionKind::If, "ctx.ready")],
            },
        ])
        .unwrap();
        let layout = compute_layout(graph, &config);
        let condition = layout.node("B-1-when-0").unwrap();
        assert_eq!(condition.height, config.large_node_height);
        assert_eq!(layout.node("A").unwrap().height, config.node_height);
    }

    #[test]
    fn long_edges_keep_their_target_below() {
        let graph = compile(&[
            step("A"),
            StepFlowEntry::Parallel {
                branches: vec![vec![step("B1"), step("B2"), step("B3")], vec![step("C")]],
            },
            step("D"),
        ])
        .unwrap();
        let layout = compute_layout(graph, &LayoutConfig::default());
        let c = layout.node("C").unwrap();
        let d = layout.node("D").unwrap();
        let b3 = layout.node("B3").unwrap();
        assert!(c.center.y < d.center.y);
        assert!(b3.center.y < d.center.y);
        assert_eq!(layout.nodes.len(), 6);
    }

    #[test]
    fn layout_is_deterministic() {
        let config = LayoutConfig::default();
        let first = compute_layout(diamond(), &config);
        let second = compute_layout(diamond(), &config);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_graph_has_zero_extent() {
        let layout = compute_layout(StepGraph::default(), &LayoutConfig::default());
        assert!(layout.nodes.is_empty());
        assert_eq!(layout.full_width, 0.0);
        assert_eq!(layout.full_height, 0.0);
    }
}
