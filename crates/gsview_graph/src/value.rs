//! Turns raw value bytes into display strings.
//!
//! Types are identified by the hash of their primitive type name. Anything
//! that cannot be decoded under its declared type degrades to a hex dump;
//! nothing in here returns an error or panics.

use gsview_adf::Endian;
use gsview_utils::{lookup3, registry};

pub const TYPE_BOOL: u32 = lookup3(b"bool");
pub const TYPE_INT: u32 = lookup3(b"int");
pub const TYPE_ENUM: u32 = lookup3(b"enum");
pub const TYPE_UINT32: u32 = lookup3(b"uint32");
pub const TYPE_INT64: u32 = lookup3(b"int64");
pub const TYPE_UINT64: u32 = lookup3(b"uint64");
pub const TYPE_FLOAT: u32 = lookup3(b"float");
pub const TYPE_VECTOR: u32 = lookup3(b"vector");
pub const TYPE_STRING: u32 = lookup3(b"string");
pub const TYPE_STRING_PTR: u32 = lookup3(b"string_ptr");

/// Reads the leading u32 of a value, the form every stored offset takes.
pub fn lead_u32(bytes: &[u8], endian: Endian) -> Option<u32> {
    bytes.get(0..4).map(|b| endian.u32(b))
}

/// Reads a u32 out of the global data blob.
pub fn blob_u32(blob: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    blob.get(offset..offset + 4).map(|b| endian.u32(b))
}

/// Produces the canonical display string for a typed value.
pub fn display_value(type_hash: u32, bytes: &[u8], endian: Endian) -> String {
    match type_hash {
        TYPE_BOOL if !bytes.is_empty() => match bytes[0] != 0 {
            true => "true".to_owned(),
            false => "false".to_owned(),
        },
        TYPE_INT | TYPE_ENUM if bytes.len() >= 4 => (endian.u32(bytes) as i32).to_string(),
        TYPE_UINT32 if bytes.len() >= 4 => {
            let value = endian.u32(bytes);
            match registry::resolve(value) {
                Some(name) => format!("{value} ({name})"),
                None => value.to_string(),
            }
        }
        TYPE_INT64 if bytes.len() >= 8 => (endian.u64(bytes) as i64).to_string(),
        TYPE_UINT64 if bytes.len() >= 8 => endian.u64(bytes).to_string(),
        TYPE_FLOAT if bytes.len() >= 4 => format!("{:.4}", endian.f32(bytes)),
        TYPE_VECTOR if bytes.len() >= 16 => format!(
            "({:.2}, {:.2}, {:.2}, {:.2})",
            endian.f32(&bytes[0..]),
            endian.f32(&bytes[4..]),
            endian.f32(&bytes[8..]),
            endian.f32(&bytes[12..]),
        ),
        TYPE_STRING | TYPE_STRING_PTR => {
            // Stored strings carry their NUL terminators.
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        _ => hex_display(bytes),
    }
}

fn hex_display(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "(empty)".to_owned();
    }
    let mut out = bytes
        .iter()
        .take(16)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > 16 {
        out.push_str(" ...");
    }
    out
}

/// Payload type of a variable node, derived from its class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Float,
    Int,
    Bool,
    Uint32,
    Uint64,
    StringHash,
    Vector,
    Enum,
    Event,
}

/// Classifies a node class name as a variable node.
///
/// `External` and `Global` prefixed classes behave like their plain
/// counterparts; anything that doesn't start with `Variable` after
/// stripping those isn't a variable node at all. Unrecognized suffixes
/// default to a u32 payload, which is how the engine stores handles.
pub fn variable_kind(class_name: &str) -> Option<VariableKind> {
    let stripped = class_name
        .strip_prefix("External")
        .or_else(|| class_name.strip_prefix("Global"))
        .unwrap_or(class_name);
    if !stripped.starts_with("Variable") {
        return None;
    }

    if stripped == "VariableEventSend" || stripped == "VariableEventReceive" {
        return Some(VariableKind::Event);
    }

    const SUFFIX_KINDS: &[(&str, VariableKind)] = &[
        ("VariableFloat", VariableKind::Float),
        ("VariableInt", VariableKind::Int),
        ("VariableBool", VariableKind::Bool),
        ("VariableUint32", VariableKind::Uint32),
        ("VariableUint64", VariableKind::Uint64),
        ("VariableObject", VariableKind::Uint64),
        ("VariableFile", VariableKind::Uint64),
        ("VariableGraphFile", VariableKind::Uint64),
        ("VariableGlobalRef", VariableKind::Uint64),
        ("VariableStringHash", VariableKind::StringHash),
        ("VariableString", VariableKind::StringHash),
        ("VariableHash", VariableKind::StringHash),
        ("VariableVector", VariableKind::Vector),
        ("VariableTransform", VariableKind::Vector),
        ("VariableEnum", VariableKind::Enum),
    ];
    for (prefix, kind) in SUFFIX_KINDS {
        if stripped.starts_with(prefix) {
            return Some(*kind);
        }
    }
    Some(VariableKind::Uint32)
}

/// Decodes a variable's payload through the global data blob.
///
/// `offset` is the value stored in the node's `Value` field. When the blob
/// is too short for the full payload the display falls back to the u32 at
/// the offset, or `"??"` when not even that much exists.
pub fn deref_display(kind: VariableKind, blob: &[u8], offset: usize, endian: Endian) -> String {
    if kind == VariableKind::Event {
        return "(event)".to_owned();
    }

    let (type_hash, width) = match kind {
        VariableKind::Float => (TYPE_FLOAT, 4),
        VariableKind::Int => (TYPE_INT, 4),
        VariableKind::Bool => (TYPE_BOOL, 1),
        VariableKind::Uint32 => (TYPE_UINT32, 4),
        VariableKind::Uint64 => (TYPE_UINT64, 8),
        VariableKind::StringHash => (0, 4),
        VariableKind::Vector => (TYPE_VECTOR, 16),
        VariableKind::Enum => (TYPE_ENUM, 4),
        VariableKind::Event => unreachable!(),
    };

    match blob.get(offset..offset + width) {
        Some(bytes) if kind == VariableKind::StringHash => {
            registry::resolve_or_hex(endian.u32(bytes))
        }
        Some(bytes) => display_value(type_hash, bytes, endian),
        None => match blob_u32(blob, offset, endian) {
            Some(word) => format!("0x{word:08X}"),
            None => "??".to_owned(),
        },
    }
}
