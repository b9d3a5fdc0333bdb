//! Walks a GraphScript instance payload into an owned tree.
//!
//! The payload is a pointer graph of fixed-stride records; every stored
//! offset is relative to the payload base. The graph head and the node
//! table must be readable (anything else means the file lied about its
//! structure), while the per-node data degrades gracefully: a dataset or
//! value that points outside the payload is dropped with a warning and the
//! rest of the graph survives.

use gsview_adf::{Endian, ReadError};
use gsview_utils::lookup3;
use log::warn;

pub const INPUT_PINS_HASH: u32 = lookup3(b"input_pins");
pub const OUTPUT_PINS_HASH: u32 = lookup3(b"output_pins");
pub const VARIABLE_PINS_HASH: u32 = lookup3(b"variable_pins");

const NODE_STRIDE: usize = 0x40;
const DATA_STRIDE: usize = 0x20;
const DATASET_STRIDE: usize = 0x30;

/// The graph head embeds its global Data record here.
const GRAPH_DATA_OFFSET: usize = 0x10;
/// A node embeds its root DataSet record here.
const NODE_DATASET_OFFSET: usize = 0x10;

/// A malformed child offset can point a dataset back into its ancestors;
/// the walk gives up past this depth instead of recursing forever.
const MAX_DATASET_DEPTH: usize = 64;

/// A leaf value: raw bytes plus the hashes needed to name and type it.
#[derive(Debug, Clone)]
pub struct GsData {
    pub name_hash: u32,
    pub type_hash: u32,
    pub bytes: Vec<u8>,
    /// When set, the 4-byte value is an offset into the graph's global
    /// data blob rather than the value itself.
    pub reference: bool,
}

/// A named container of values and nested datasets. Pin categories are
/// ordinary datasets whose name hash matches one of the `*_PINS_HASH`
/// constants.
#[derive(Debug, Clone)]
pub struct GsDataSet {
    pub name_hash: u32,
    pub data: Vec<GsData>,
    pub children: Vec<GsDataSet>,
}

impl GsDataSet {
    pub fn child(&self, name_hash: u32) -> Option<&GsDataSet> {
        self.children.iter().find(|c| c.name_hash == name_hash)
    }
}

#[derive(Debug, Clone)]
pub struct GsNode {
    /// Position in the node table; connection descriptors refer to nodes
    /// by this index.
    pub index: u32,
    pub class_hash: u32,
    /// Bound to a function pointer by the engine at runtime; opaque here
    /// and carried through for tooling.
    pub function_hash: u32,
    pub dataset: GsDataSet,
}

#[derive(Debug, Clone)]
pub struct GsGraph {
    pub nodes: Vec<GsNode>,
    /// The graph's single top-level Data record. Its bytes are the global
    /// data blob that variable fields and connection descriptors index
    /// into.
    pub global: GsData,
}

impl GsGraph {
    pub fn blob(&self) -> &[u8] {
        &self.global.bytes
    }
}

/// Decodes an instance payload as a GraphScript graph.
pub fn decode_graph(payload: &[u8], endian: Endian) -> Result<GsGraph, ReadError> {
    let frame = Frame { payload, endian };

    let nodes_offset = frame.usize_at(0x00).ok_or(ReadError::Truncated {
        offset: 0,
        need: GRAPH_DATA_OFFSET + DATA_STRIDE,
    })?;
    let node_count = frame.usize_at(0x08).ok_or(ReadError::Truncated {
        offset: 0x08,
        need: 8,
    })?;
    let global = frame
        .data_at(GRAPH_DATA_OFFSET)
        .ok_or(ReadError::Truncated {
            offset: GRAPH_DATA_OFFSET,
            need: DATA_STRIDE,
        })?;

    let mut nodes = Vec::new();
    if nodes_offset != 0 && node_count != 0 {
        // The node table is structural: indices into it are how the file
        // encodes connections, so a short table is a hard error rather
        // than a shorter graph with shifted indices.
        if !frame.in_bounds(nodes_offset, node_count, NODE_STRIDE) {
            return Err(ReadError::Truncated {
                offset: nodes_offset,
                need: node_count.saturating_mul(NODE_STRIDE),
            });
        }
        nodes.reserve(node_count);
        for index in 0..node_count {
            let at = nodes_offset + index * NODE_STRIDE;
            let node = frame.node_at(at, index as u32).ok_or(ReadError::Truncated {
                offset: at,
                need: NODE_STRIDE,
            })?;
            nodes.push(node);
        }
    }

    Ok(GsGraph { nodes, global })
}

/// The payload window plus its byte order; all record readers hang off
/// this so the payload base is added exactly once per stored offset.
struct Frame<'a> {
    payload: &'a [u8],
    endian: Endian,
}

impl Frame<'_> {
    fn u8_at(&self, at: usize) -> Option<u8> {
        self.payload.get(at).copied()
    }

    fn u32_at(&self, at: usize) -> Option<u32> {
        let bytes = self.payload.get(at..at.checked_add(4)?)?;
        Some(self.endian.u32(bytes))
    }

    fn usize_at(&self, at: usize) -> Option<usize> {
        let bytes = self.payload.get(at..at.checked_add(8)?)?;
        usize::try_from(self.endian.u64(bytes)).ok()
    }

    fn in_bounds(&self, offset: usize, count: usize, stride: usize) -> bool {
        count
            .checked_mul(stride)
            .and_then(|size| offset.checked_add(size))
            .is_some_and(|end| end <= self.payload.len())
    }

    fn node_at(&self, at: usize, index: u32) -> Option<GsNode> {
        let class_hash = self.u32_at(at)?;
        let function_hash = self.u32_at(at + 0x08)?;
        let dataset = self.dataset_at(at + NODE_DATASET_OFFSET, 0)?;
        Some(GsNode {
            index,
            class_hash,
            function_hash,
            dataset,
        })
    }

    fn dataset_at(&self, at: usize, depth: usize) -> Option<GsDataSet> {
        let name_hash = self.u32_at(at)?;
        let data_offset = self.usize_at(at + 0x08)?;
        let data_count = self.usize_at(at + 0x10)?;
        let child_offset = self.usize_at(at + 0x18)?;
        let child_count = self.usize_at(at + 0x20)?;

        let mut data = Vec::new();
        if data_offset != 0 && data_count != 0 {
            if self.in_bounds(data_offset, data_count, DATA_STRIDE) {
                data.reserve(data_count);
                for i in 0..data_count {
                    data.push(self.data_at(data_offset + i * DATA_STRIDE)?);
                }
            } else {
                warn!("data array of dataset {name_hash:#010X} out of bounds, dropped");
            }
        }

        let mut children = Vec::new();
        if child_offset != 0 && child_count != 0 {
            if depth >= MAX_DATASET_DEPTH {
                warn!("dataset {name_hash:#010X} nested deeper than {MAX_DATASET_DEPTH}, pruned");
            } else if self.in_bounds(child_offset, child_count, DATASET_STRIDE) {
                children.reserve(child_count);
                for i in 0..child_count {
                    match self.dataset_at(child_offset + i * DATASET_STRIDE, depth + 1) {
                        Some(child) => children.push(child),
                        None => {
                            warn!("child dataset of {name_hash:#010X} unreadable, dropped");
                        }
                    }
                }
            } else {
                warn!("child array of dataset {name_hash:#010X} out of bounds, dropped");
            }
        }

        Some(GsDataSet {
            name_hash,
            data,
            children,
        })
    }

    fn data_at(&self, at: usize) -> Option<GsData> {
        let name_hash = self.u32_at(at)?;
        let type_hash = self.u32_at(at + 0x04)?;
        let value_offset = self.usize_at(at + 0x08)?;
        let value_count = self.usize_at(at + 0x10)?;
        let reference = self.u8_at(at + 0x18)? != 0;

        // Value bytes are copied out so the decoded tree doesn't borrow
        // the input buffer; a range reaching past the payload keeps the
        // part that exists.
        let bytes = match value_offset == 0 || value_count == 0 {
            true => Vec::new(),
            false => {
                let start = value_offset.min(self.payload.len());
                let end = value_offset
                    .saturating_add(value_count)
                    .min(self.payload.len());
                self.payload[start..end].to_vec()
            }
        };

        Some(GsData {
            name_hash,
            type_hash,
            bytes,
            reference,
        })
    }
}
