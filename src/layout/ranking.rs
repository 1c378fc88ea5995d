use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Directed edge between two layout vertices, real nodes or dummies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LayerEdge {
    pub(super) from: String,
    pub(super) to: String,
}

impl LayerEdge {
    pub(super) fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub(super) fn order_rank_nodes(
    rank_nodes: &mut [Vec<String>],
    edges: &[LayerEdge],
    node_order: &HashMap<String, usize>,
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();

    for edge in edges {
        outgoing
            .entry(edge.from.clone())
            .or_default()
            .push(edge.to.clone());
        incoming
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let update_positions = |rank_nodes: &mut [Vec<String>],
                            positions: &mut HashMap<String, usize>| {
        positions.clear();
        for bucket in rank_nodes.iter() {
            for (idx, node_id) in bucket.iter().enumerate() {
                positions.insert(node_id.clone(), idx);
            }
        }
    };

    update_positions(rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<String>,
                       neighbors: &HashMap<String, Vec<String>>,
                       positions: &HashMap<String, usize>| {
        let current_positions: HashMap<String, usize> = bucket
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        bucket.sort_by(|a, b| {
            let a_score = median_position(a, neighbors, positions, &current_positions);
            let b_score = median_position(b, neighbors, positions, &current_positions);
            match a_score.partial_cmp(&b_score) {
                Some(std::cmp::Ordering::Equal) | None => {
                    let a_pos = current_positions.get(a).copied().unwrap_or(0);
                    let b_pos = current_positions.get(b).copied().unwrap_or(0);
                    a_pos.cmp(&b_pos).then_with(|| {
                        node_order
                            .get(a)
                            .copied()
                            .unwrap_or(usize::MAX)
                            .cmp(&node_order.get(b).copied().unwrap_or(usize::MAX))
                    })
                }
                Some(ordering) => ordering,
            }
        });
    };

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len().saturating_sub(1)).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(rank_nodes, &mut positions);
        }
    }
}

pub(super) fn median_position(
    node_id: &str,
    neighbors: &HashMap<String, Vec<String>>,
    positions: &HashMap<String, usize>,
    current_positions: &HashMap<String, usize>,
) -> f32 {
    let fallback = *current_positions.get(node_id).unwrap_or(&0) as f32;
    let Some(list) = neighbors.get(node_id) else {
        return fallback;
    };
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor))
        .map(|pos| *pos as f32)
        .collect();
    if values.is_empty() {
        return fallback;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

/// Longest-path ranks. Cycles are broken at the remaining node that comes
/// first in `node_order`, its incoming edges acting as back-edges.
pub(super) fn compute_ranks(
    node_ids: &[String],
    edges: &[LayerEdge],
    node_order: &HashMap<String, usize>,
) -> HashMap<String, usize> {
    let set: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = set.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        let (from, to) = (edge.from.as_str(), edge.to.as_str());
        if set.contains(from) && set.contains(to) && from != to {
            adj.entry(from).or_default().push(to);
            if let Some(deg) = indeg.get_mut(to) {
                *deg += 1;
            }
        }
    }

    let order_key = |id: &str| node_order.get(id).copied().unwrap_or(usize::MAX);

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = node_ids
        .iter()
        .map(String::as_str)
        .filter(|id| indeg.get(id).copied().unwrap_or(0) == 0)
        .map(|id| Reverse((order_key(id), id)))
        .collect();

    let mut order: Vec<&str> = Vec::with_capacity(set.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id);
            for next in adj.get(id).into_iter().flatten() {
                if processed.contains(next) {
                    continue;
                }
                if let Some(deg) = indeg.get_mut(next) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse((order_key(*next), *next)));
                    }
                }
            }
        }

        if processed.len() >= set.len() {
            break;
        }

        let best = node_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !processed.contains(id))
            .min_by_key(|id| (order_key(*id), *id));
        match best {
            Some(id) => ready.push(Reverse((order_key(id), id))),
            None => break,
        }
    }

    let order_index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx))
        .collect();

    let mut ranks: HashMap<String, usize> = HashMap::new();
    for node in &order {
        let rank = *ranks.entry(node.to_string()).or_insert(0);
        let from_idx = order_index.get(node).copied().unwrap_or(0);
        for next in adj.get(node).into_iter().flatten() {
            let to_idx = order_index.get(next).copied().unwrap_or(from_idx);
            if to_idx <= from_idx {
                continue;
            }
            let entry = ranks.entry(next.to_string()).or_insert(0);
            *entry = (*entry).max(rank + 1);
        }
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|id| id.to_string()).collect()
    }

    fn order_of(node_ids: &[String]) -> HashMap<String, usize> {
        node_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect()
    }

    #[test]
    fn ranks_follow_the_longest_path() {
        let nodes = ids(&["a", "b", "c", "d"]);
        let edges = vec![
            LayerEdge::new("a", "b"),
            LayerEdge::new("b", "c"),
            LayerEdge::new("a", "c"),
            LayerEdge::new("c", "d"),
        ];
        let ranks = compute_ranks(&nodes, &edges, &order_of(&nodes));
        assert_eq!(ranks["a"], 0);
        assert_eq!(ranks["b"], 1);
        assert_eq!(ranks["c"], 2);
        assert_eq!(ranks["d"], 3);
    }

    #[test]
    fn cycles_are_broken_in_declaration_order() {
        let nodes = ids(&["a", "b", "c"]);
        let edges = vec![
            LayerEdge::new("a", "b"),
            LayerEdge::new("b", "c"),
            LayerEdge::new("c", "a"),
        ];
        let ranks = compute_ranks(&nodes, &edges, &order_of(&nodes));
        assert_eq!(ranks["a"], 0);
        assert_eq!(ranks["b"], 1);
        assert_eq!(ranks["c"], 2);
    }

    #[test]
    fn ordering_uncrosses_edges() {
        let nodes = ids(&["a", "b", "x", "y"]);
        let mut rank_nodes = vec![ids(&["a", "b"]), ids(&["x", "y"])];
        let edges = vec![LayerEdge::new("a", "y"), LayerEdge::new("b", "x")];
        order_rank_nodes(&mut rank_nodes, &edges, &order_of(&nodes), 2);
        let upper = rank_nodes[0].iter().position(|id| id == "a").unwrap();
        let lower = rank_nodes[1].iter().position(|id| id == "y").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn median_falls_back_to_current_slot() {
        let neighbors = HashMap::new();
        let positions = HashMap::new();
        let current: HashMap<String, usize> = [("n".to_string(), 3)].into_iter().collect();
        assert_eq!(median_position("n", &neighbors, &positions, &current), 3.0);
    }
}
