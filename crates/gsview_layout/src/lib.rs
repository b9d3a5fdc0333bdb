//! Layered ("Sugiyama-style") layout for the extracted node graph.
//!
//! The input is nothing but a node count and a connection list; the output
//! is one finite position per node. Functional nodes get longest-path
//! layers, compaction, an oversized-layer split and a few barycenter
//! ordering sweeps; nodes that only produce variables go into a grid zone
//! below the functional block.
//!
//! The whole pass is deterministic: iteration is in node-index order and
//! every re-sort is stable, so identical inputs produce identical positions.

use serde::Serialize;
use std::collections::VecDeque;

/// Horizontal distance between adjacent layers.
pub const LAYER_GAP_X: f32 = 360.0;
/// Vertical distance between nodes within a layer.
pub const LAYER_GAP_Y: f32 = 140.0;
/// Layers holding more than this many nodes get split.
pub const MAX_PER_LAYER: usize = 4;

const VARIABLE_CELL_W: f32 = 240.0;
const VARIABLE_CELL_H: f32 = 100.0;
const VARIABLE_COLS: usize = 6;
/// Vertical gap between the functional block and the variable zone, and
/// again between the variable zone and the orphan row.
const ZONE_GAP: f32 = 160.0;
const ORPHAN_GAP_X: f32 = 300.0;

const ORDERING_PASSES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Flow,
    Variable,
}

/// A directed connection as the layout cares about it: endpoints and kind,
/// no pin information.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEdge {
    pub source: u32,
    pub target: u32,
    pub kind: EdgeKind,
}

impl LayoutEdge {
    pub fn new(source: u32, target: u32, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }
}

/// Computes a position for every node index in `0..node_count`.
///
/// Never fails: cycles, empty graphs and out-of-range edge endpoints all
/// produce a complete, finite position map (bad endpoints are ignored).
pub fn compute(node_count: usize, edges: &[LayoutEdge]) -> Vec<Point> {
    let n = node_count;
    let in_range = |a: u32, b: u32| (a as usize) < n && (b as usize) < n;

    // A node that feeds any variable connection is placed in the variable
    // zone; everything else takes part in the layered flow layout.
    let mut is_variable = vec![false; n];
    for edge in edges {
        if edge.kind == EdgeKind::Variable && (edge.source as usize) < n {
            is_variable[edge.source as usize] = true;
        }
    }

    // Flow adjacency, parallel edges kept as-is.
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in edges {
        if edge.kind == EdgeKind::Flow && in_range(edge.source, edge.target) {
            children[edge.source as usize].push(edge.target as usize);
            parents[edge.target as usize].push(edge.source as usize);
        }
    }

    let layers = assign_layers(n, &is_variable, &parents, &children);
    let mut members = split_layers(collect_members(n, &is_variable, &layers));
    order_members(&mut members, &is_variable, &parents, &children);

    let mut points = vec![Point { x: 0.0, y: 0.0 }; n];
    let mut placed = vec![false; n];

    // Functional placement: one column per layer, vertically centered.
    for (layer, nodes) in members.iter().enumerate() {
        let k = nodes.len();
        for (i, &node) in nodes.iter().enumerate() {
            points[node] = Point {
                x: layer as f32 * LAYER_GAP_X,
                y: (i as f32 - (k as f32 - 1.0) / 2.0) * LAYER_GAP_Y,
            };
            placed[node] = true;
        }
    }

    // Variable zone: a grid anchored at the functional block's left edge,
    // below its lowest row.
    let mut bottom_y = 0.0f32;
    let mut min_x = 0.0f32;
    if members.iter().any(|nodes| !nodes.is_empty()) {
        bottom_y = points
            .iter()
            .zip(&placed)
            .filter(|(_, &p)| p)
            .map(|(pt, _)| pt.y)
            .fold(f32::MIN, f32::max);
        min_x = points
            .iter()
            .zip(&placed)
            .filter(|(_, &p)| p)
            .map(|(pt, _)| pt.x)
            .fold(f32::MAX, f32::min);
    }
    let base_y = bottom_y + ZONE_GAP;

    let variables: Vec<usize> = (0..n).filter(|&u| is_variable[u]).collect();
    for (i, &node) in variables.iter().enumerate() {
        points[node] = Point {
            x: min_x + (i % VARIABLE_COLS) as f32 * VARIABLE_CELL_W,
            y: base_y + (i / VARIABLE_COLS) as f32 * VARIABLE_CELL_H,
        };
        placed[node] = true;
    }

    // Safety net: anything the passes above somehow missed lands on a row
    // below the variable grid instead of defaulting to the origin.
    let variable_rows = variables.len().div_ceil(VARIABLE_COLS);
    let orphan_y = base_y + variable_rows as f32 * VARIABLE_CELL_H + ZONE_GAP;
    let mut orphan = 0;
    for node in 0..n {
        if !placed[node] {
            points[node] = Point {
                x: min_x + orphan as f32 * ORPHAN_GAP_X,
                y: orphan_y,
            };
            orphan += 1;
        }
    }

    points
}

/// Longest-path layering over functional nodes (Kahn traversal) followed by
/// a compaction pass that pulls parentless stragglers back to the left.
///
/// Cycle members never reach zero in-degree; they keep whatever layer the
/// relaxation last gave them (layer 0 when untouched) and are skipped by
/// compaction, which only sees properly ordered nodes.
fn assign_layers(
    n: usize,
    is_variable: &[bool],
    parents: &[Vec<usize>],
    children: &[Vec<usize>],
) -> Vec<usize> {
    let mut layer = vec![0usize; n];
    let mut indegree = vec![0usize; n];
    for target in 0..n {
        if is_variable[target] {
            continue;
        }
        indegree[target] = parents[target]
            .iter()
            .filter(|&&p| !is_variable[p])
            .count();
    }

    let mut queue: VecDeque<usize> = (0..n)
        .filter(|&u| !is_variable[u] && indegree[u] == 0)
        .collect();
    let mut topological = Vec::with_capacity(n);

    while let Some(node) = queue.pop_front() {
        topological.push(node);
        for &child in &children[node] {
            if is_variable[child] {
                continue;
            }
            layer[child] = layer[child].max(layer[node] + 1);
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    for &node in &topological {
        let deepest_parent = parents[node]
            .iter()
            .filter(|&&p| !is_variable[p])
            .map(|&p| layer[p])
            .max();
        layer[node] = match deepest_parent {
            Some(deepest) => deepest + 1,
            None => 0,
        };
    }

    layer
}

/// Groups functional nodes by layer, members in ascending index order.
fn collect_members(n: usize, is_variable: &[bool], layers: &[usize]) -> Vec<Vec<usize>> {
    let depth = (0..n)
        .filter(|&u| !is_variable[u])
        .map(|u| layers[u] + 1)
        .max()
        .unwrap_or(0);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for node in 0..n {
        if !is_variable[node] {
            members[layers[node]].push(node);
        }
    }
    members
}

/// Splits layers that exceed [`MAX_PER_LAYER`] into chunks, inserting the
/// extra layers immediately to the right. Processing runs right to left so
/// freshly inserted layers are never revisited.
fn split_layers(mut members: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    for layer in (0..members.len()).rev() {
        if members[layer].len() > MAX_PER_LAYER {
            let chunks: Vec<Vec<usize>> = members[layer]
                .chunks(MAX_PER_LAYER)
                .map(|chunk| chunk.to_vec())
                .collect();
            members.splice(layer..=layer, chunks);
        }
    }
    members
}

/// Barycenter crossing reduction: alternating forward/backward sweeps,
/// each re-sorting a layer by the mean rank of its neighbors in the sweep
/// direction. Nodes without neighbors keep their rank. Sorting is stable,
/// which is what makes the whole layout reproducible.
fn order_members(
    members: &mut [Vec<usize>],
    is_variable: &[bool],
    parents: &[Vec<usize>],
    children: &[Vec<usize>],
) {
    let node_count = is_variable.len();
    let mut rank = vec![0usize; node_count];
    for nodes in members.iter() {
        for (i, &node) in nodes.iter().enumerate() {
            rank[node] = i;
        }
    }

    for pass in 0..ORDERING_PASSES {
        let forward = pass % 2 == 0;
        let sweep: Vec<usize> = match forward {
            true => (1..members.len()).collect(),
            false => (0..members.len().saturating_sub(1)).rev().collect(),
        };

        for layer in sweep {
            let mut keyed: Vec<(f64, usize)> = members[layer]
                .iter()
                .map(|&node| {
                    let neighborhood = match forward {
                        true => &parents[node],
                        false => &children[node],
                    };
                    let ranks: Vec<usize> = neighborhood
                        .iter()
                        .filter(|&&peer| !is_variable[peer])
                        .map(|&peer| rank[peer])
                        .collect();
                    let key = match ranks.is_empty() {
                        true => rank[node] as f64,
                        false => ranks.iter().sum::<usize>() as f64 / ranks.len() as f64,
                    };
                    (key, node)
                })
                .collect();

            keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            members[layer] = keyed.iter().map(|&(_, node)| node).collect();
            for (i, &node) in members[layer].iter().enumerate() {
                rank[node] = i;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(source: u32, target: u32) -> LayoutEdge {
        LayoutEdge::new(source, target, EdgeKind::Flow)
    }

    fn variable(source: u32, target: u32) -> LayoutEdge {
        LayoutEdge::new(source, target, EdgeKind::Variable)
    }

    #[test]
    fn empty_graph() {
        assert!(compute(0, &[]).is_empty());
    }

    #[test]
    fn single_node_sits_at_origin() {
        let points = compute(1, &[]);
        assert_eq!(points, vec![Point { x: 0.0, y: 0.0 }]);
    }

    #[test]
    fn linear_chain_spreads_across_layers() {
        let points = compute(3, &[flow(0, 1), flow(1, 2)]);
        assert_eq!(points[0], Point { x: 0.0, y: 0.0 });
        assert_eq!(points[1], Point { x: 360.0, y: 0.0 });
        assert_eq!(points[2], Point { x: 720.0, y: 0.0 });
    }

    #[test]
    fn fan_out_splits_oversized_layer() {
        // One root with five children: the child layer must split 4 + 1.
        let edges: Vec<LayoutEdge> = (1..=5).map(|t| flow(0, t)).collect();
        let points = compute(6, &edges);

        let first_layer: Vec<usize> = (1..=5)
            .filter(|&i| points[i].x == LAYER_GAP_X)
            .collect();
        let second_layer: Vec<usize> = (1..=5)
            .filter(|&i| points[i].x == 2.0 * LAYER_GAP_X)
            .collect();
        assert_eq!(first_layer.len(), 4);
        assert_eq!(second_layer.len(), 1);
    }

    #[test]
    fn fully_cyclic_graph_still_gets_positions() {
        let points = compute(3, &[flow(0, 1), flow(1, 2), flow(2, 0)]);
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
        // No node ever leaves layer 0, so all three stack in one column.
        assert!(points.iter().all(|p| p.x == 0.0));
    }

    #[test]
    fn compaction_pulls_floating_roots_right() {
        // 0 -> 1 -> 3, 2 -> 3: node 2 is a root but its only child sits at
        // layer 2, so compaction alone decides its layer (still 0), while 3
        // lands past both parents.
        let points = compute(4, &[flow(0, 1), flow(1, 3), flow(2, 3)]);
        assert_eq!(points[0].x, 0.0);
        assert_eq!(points[1].x, LAYER_GAP_X);
        assert_eq!(points[2].x, 0.0);
        assert_eq!(points[3].x, 2.0 * LAYER_GAP_X);
    }

    #[test]
    fn variable_sources_go_to_the_grid_zone() {
        // 0 -> 1 flow; 2 and 3 feed variables into 1.
        let points = compute(4, &[flow(0, 1), variable(2, 1), variable(3, 1)]);

        let functional_bottom = points[0].y.max(points[1].y);
        assert!(points[2].y >= functional_bottom + ZONE_GAP);
        assert_eq!(points[2].y, points[3].y);
        assert_eq!(points[3].x - points[2].x, VARIABLE_CELL_W);
    }

    #[test]
    fn variable_grid_wraps_after_six_columns() {
        let edges: Vec<LayoutEdge> = (1..=8).map(|s| variable(s, 0)).collect();
        let points = compute(9, &edges);

        // Eight variable nodes: six in the first row, two in the second.
        assert_eq!(points[7].y, points[1].y + VARIABLE_CELL_H);
        assert_eq!(points[7].x, points[1].x);
        assert_eq!(points[6].x, points[1].x + 5.0 * VARIABLE_CELL_W);
    }

    #[test]
    fn barycenter_orders_children_under_parents() {
        // Two disjoint chains; the crossing-reduction sweeps must keep each
        // child in its parent's row rather than interleaving them.
        let points = compute(4, &[flow(0, 2), flow(1, 3)]);
        assert_eq!(points[0].y, points[2].y);
        assert_eq!(points[1].y, points[3].y);
    }

    #[test]
    fn layout_is_deterministic() {
        let edges = [
            flow(0, 1),
            flow(0, 2),
            flow(2, 3),
            flow(1, 3),
            variable(4, 3),
            flow(3, 5),
        ];
        let a = compute(6, &edges);
        let b = compute(6, &edges);
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_endpoints_are_ignored() {
        let points = compute(2, &[flow(0, 7), variable(9, 1), flow(0, 1)]);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }
}
