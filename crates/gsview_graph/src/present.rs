//! Builds the public, viewport-facing node records out of the decoded tree.

use crate::decode::{GsData, GsDataSet, GsGraph, INPUT_PINS_HASH, OUTPUT_PINS_HASH, VARIABLE_PINS_HASH};
use crate::value::{self, VariableKind};
use crate::{Node, Pin, Value};
use gsview_adf::Endian;
use gsview_layout::Point;
use gsview_utils::{registry, Lookup3Ext};

/// Resolves names, groups pins by category, renders display strings and
/// attaches positions. One output record per decoded node, same order.
pub fn present(graph: &GsGraph, positions: &[Point], endian: Endian) -> Vec<Node> {
    let blob = graph.blob();
    graph
        .nodes
        .iter()
        .map(|node| {
            let class_name = registry::resolve_or_hex(node.class_hash);
            let kind = value::variable_kind(&class_name);
            Node {
                index: node.index,
                class_hash: node.class_hash,
                class_name,
                function_hash: node.function_hash,
                parameters: node
                    .dataset
                    .data
                    .iter()
                    .map(|data| present_parameter(data, kind, blob, endian))
                    .collect(),
                input_pins: collect_pins(&node.dataset, INPUT_PINS_HASH, endian),
                output_pins: collect_pins(&node.dataset, OUTPUT_PINS_HASH, endian),
                variable_pins: collect_pins(&node.dataset, VARIABLE_PINS_HASH, endian),
                position: positions
                    .get(node.index as usize)
                    .copied()
                    .unwrap_or(Point { x: 0.0, y: 0.0 }),
            }
        })
        .collect()
}

fn collect_pins(root: &GsDataSet, category_hash: u32, endian: Endian) -> Vec<Pin> {
    let Some(category) = root.child(category_hash) else {
        return Vec::new();
    };
    category
        .children
        .iter()
        .map(|pin| Pin {
            hash: pin.name_hash,
            name: registry::resolve_or_hex(pin.name_hash),
            data: pin
                .data
                .iter()
                .map(|data| present_value(data, endian))
                .collect(),
        })
        .collect()
}

/// A parameter of a variable node hides its payload behind the global
/// blob: `Name` stores an offset to the variable's identity hash, and a
/// referenced `Value` stores an offset to the typed payload. Everything
/// else displays like an ordinary value.
fn present_parameter(
    data: &GsData,
    kind: Option<VariableKind>,
    blob: &[u8],
    endian: Endian,
) -> Value {
    let display = match kind {
        Some(_) if data.name_hash.lookup3_matches("Name") => {
            let identity = value::lead_u32(&data.bytes, endian)
                .and_then(|offset| value::blob_u32(blob, offset as usize, endian));
            match identity {
                Some(identity) => registry::resolve_or_hex(identity),
                None => value::display_value(data.type_hash, &data.bytes, endian),
            }
        }
        Some(kind) if data.reference && data.name_hash.lookup3_matches("Value") => {
            match value::lead_u32(&data.bytes, endian) {
                Some(offset) => value::deref_display(kind, blob, offset as usize, endian),
                None => value::display_value(data.type_hash, &data.bytes, endian),
            }
        }
        _ => value::display_value(data.type_hash, &data.bytes, endian),
    };
    build_value(data, display)
}

fn present_value(data: &GsData, endian: Endian) -> Value {
    let display = value::display_value(data.type_hash, &data.bytes, endian);
    build_value(data, display)
}

fn build_value(data: &GsData, display: String) -> Value {
    Value {
        name: registry::resolve_or_hex(data.name_hash),
        type_name: registry::resolve_or_hex(data.type_hash),
        bytes: data.bytes.clone(),
        reference: data.reference,
        display,
    }
}
