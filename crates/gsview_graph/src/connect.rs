//! Recovers directed connections from pin datasets.
//!
//! The file doesn't store edges as records. Each descriptor under a pin
//! holds an offset into the global data blob, and the u32 at that offset
//! is a node index. Flow descriptors live under `output_pins` and point at
//! the edge's target; variable descriptors live under `variable_pins` and
//! point at the edge's *source* — a variable node supplies data to the
//! node that declared the slot, so the stored direction is reversed.

use crate::decode::{GsGraph, OUTPUT_PINS_HASH, VARIABLE_PINS_HASH};
use crate::value::{blob_u32, lead_u32};
use crate::Edge;
use gsview_adf::Endian;
use gsview_layout::EdgeKind;
use log::debug;

/// Scans every node's pin datasets and produces the edge list.
///
/// Malformed descriptors (short values, offsets past the blob, indices
/// past the node table) are skipped; a damaged file still renders, minus
/// its broken edges.
pub fn extract_edges(graph: &GsGraph, endian: Endian) -> Vec<Edge> {
    let blob = graph.blob();
    let node_count = graph.nodes.len();
    let mut edges = Vec::new();

    for node in &graph.nodes {
        for category in &node.dataset.children {
            if category.name_hash == OUTPUT_PINS_HASH {
                for pin in &category.children {
                    for descriptor in &pin.data {
                        let Some(target) = deref_index(blob, &descriptor.bytes, endian) else {
                            debug!("node {}: unreadable flow descriptor, skipped", node.index);
                            continue;
                        };
                        if (target as usize) >= node_count {
                            debug!("node {}: flow target {target} out of range", node.index);
                            continue;
                        }
                        edges.push(Edge {
                            source_index: node.index,
                            source_pin_hash: pin.name_hash,
                            target_index: target,
                            target_pin_hash: descriptor.name_hash,
                            kind: EdgeKind::Flow,
                        });
                    }
                }
            } else if category.name_hash == VARIABLE_PINS_HASH {
                for pin in &category.children {
                    for descriptor in &pin.data {
                        let Some(source) = deref_index(blob, &descriptor.bytes, endian) else {
                            debug!(
                                "node {}: unreadable variable descriptor, skipped",
                                node.index
                            );
                            continue;
                        };
                        if (source as usize) >= node_count {
                            debug!("node {}: variable source {source} out of range", node.index);
                            continue;
                        }
                        edges.push(Edge {
                            source_index: source,
                            source_pin_hash: pin.name_hash,
                            target_index: node.index,
                            target_pin_hash: pin.name_hash,
                            kind: EdgeKind::Variable,
                        });
                    }
                }
            }
        }
    }

    edges
}

/// Two-hop dereference: descriptor value → blob offset → node index.
fn deref_index(blob: &[u8], bytes: &[u8], endian: Endian) -> Option<u32> {
    let offset = lead_u32(bytes, endian)? as usize;
    blob_u32(blob, offset, endian)
}
