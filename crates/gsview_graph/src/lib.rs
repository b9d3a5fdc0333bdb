//! Decoding pipeline for GraphScript assets.
//!
//! Takes the raw bytes of an ADF container and produces everything a
//! node-editor viewport needs: nodes with resolved names, grouped pins and
//! rendered parameter values, a typed connection list, and a position per
//! node. The stages are strictly one-way:
//!
//! ```text
//! bytes -> ADF container -> GS tree -> (nodes, connections) -> positions
//! ```
//!
//! Everything is plain owned data once [`load_graph`] returns; the input
//! buffer can be dropped immediately.

use gsview_adf::AdfFile;
use gsview_layout::LayoutEdge;
use gsview_utils::registry;
use log::debug;
use serde::Serialize;

pub mod connect;
pub mod decode;
pub mod present;
pub mod value;

pub use gsview_adf::{Endian, ReadError};
pub use gsview_layout::{EdgeKind, Point};

/// A displayable leaf value.
#[derive(Debug, Clone, Serialize)]
pub struct Value {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub bytes: Vec<u8>,
    pub reference: bool,
    pub display: String,
}

/// A named connection point on a node.
#[derive(Debug, Clone, Serialize)]
pub struct Pin {
    pub hash: u32,
    pub name: String,
    pub data: Vec<Value>,
}

/// A graph vertex, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub index: u32,
    pub class_hash: u32,
    pub class_name: String,
    /// Opaque; the engine binds this to a function pointer at runtime.
    pub function_hash: u32,
    pub parameters: Vec<Value>,
    pub input_pins: Vec<Pin>,
    pub output_pins: Vec<Pin>,
    pub variable_pins: Vec<Pin>,
    pub position: Point,
}

/// A directed connection between two nodes, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source_index: u32,
    pub source_pin_hash: u32,
    pub target_index: u32,
    pub target_pin_hash: u32,
    pub kind: EdgeKind,
}

/// The complete decoded graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Decodes an ADF GraphScript buffer into a laid-out graph.
///
/// The GraphScript payload is expected in the container's first instance;
/// a container without instances is [`ReadError::NoInstance`]. Container
/// damage is fatal, anything inside the payload degrades per descriptor.
pub fn load_graph(buf: &[u8]) -> Result<GraphView, ReadError> {
    registry::init();

    let adf = AdfFile::read(buf)?;
    let instance = adf.instances.first().ok_or(ReadError::NoInstance)?;
    let payload = adf.payload(instance)?;

    let graph = decode::decode_graph(payload, adf.endian)?;
    let edges = connect::extract_edges(&graph, adf.endian);

    let layout_edges: Vec<LayoutEdge> = edges
        .iter()
        .map(|edge| LayoutEdge::new(edge.source_index, edge.target_index, edge.kind))
        .collect();
    let positions = gsview_layout::compute(graph.nodes.len(), &layout_edges);

    let nodes = present::present(&graph, &positions, adf.endian);
    debug!(
        "instance '{}': {} nodes, {} connections",
        instance.name,
        nodes.len(),
        edges.len()
    );

    Ok(GraphView { nodes, edges })
}
