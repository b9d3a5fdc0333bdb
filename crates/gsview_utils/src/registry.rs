//! Process-wide hash → name registry.
//!
//! Asset files never store identifier strings, only their [`lookup3`]
//! hashes. The registry is the reverse mapping used for display: it is
//! seeded once from a curated identifier list and a bulk dictionary, and
//! files may append to it (ADF type names, string tables) while decoding.
//!
//! Entries are append-only and a hash is never re-bound; when the curated
//! list and the bulk dictionary collide, the curated spelling wins.

use crate::lookup3;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::{Once, RwLock};

static REGISTRY: Lazy<RwLock<AHashMap<u32, String>>> =
    Lazy::new(|| RwLock::new(AHashMap::new()));

static SEED: Once = Once::new();

/// Bulk identifier dictionary shipped with the tool. One identifier per
/// line; `#` starts a comment.
const DICTIONARY: &str = include_str!("dictionary.txt");

/// Identifiers the decoder itself depends on, registered before the bulk
/// dictionary so their spelling always wins.
const CURATED: &[&str] = &[
    // pin categories
    "input_pins",
    "output_pins",
    "variable_pins",
    // primitive type names
    "bool",
    "int",
    "enum",
    "uint32",
    "int64",
    "uint64",
    "float",
    "vector",
    "string",
    "string_ptr",
    // variable node parameters
    "Name",
    "Value",
    "Type",
    "Default",
];

/// Registers a name, returning its hash. A hash that is already bound keeps
/// its existing name.
pub fn register(name: &str) -> u32 {
    let hash = lookup3(name.as_bytes());
    bind(hash, name);
    hash
}

/// Registers every name in the iterator under a single write lock.
pub fn register_all<'a>(names: impl IntoIterator<Item = &'a str>) {
    let mut map = REGISTRY.write();
    for name in names {
        let hash = lookup3(name.as_bytes());
        map.entry(hash).or_insert_with(|| name.to_owned());
    }
}

fn bind(hash: u32, name: &str) {
    REGISTRY
        .write()
        .entry(hash)
        .or_insert_with(|| name.to_owned());
}

/// Looks a hash up, if it has been registered.
pub fn resolve(hash: u32) -> Option<String> {
    REGISTRY.read().get(&hash).cloned()
}

/// Looks a hash up, falling back to the canonical `0xXXXXXXXX` form.
///
/// ## Example
/// ```
/// use gsview_utils::registry;
///
/// assert_eq!(registry::resolve_or_hex(0x12AB34CD), "0x12AB34CD");
/// ```
pub fn resolve_or_hex(hash: u32) -> String {
    resolve(hash).unwrap_or_else(|| format!("0x{hash:08X}"))
}

/// Seeds the registry from the curated list and the bulk dictionary.
///
/// Idempotent; the decode entry points call this so lookups work no matter
/// which crate the caller came in through.
pub fn init() {
    SEED.call_once(|| {
        register_all(CURATED.iter().copied());
        register_all(
            DICTIONARY
                .lines()
                .map(|line| line.split('#').next().unwrap_or("").trim())
                .filter(|line| !line.is_empty()),
        );
    });
}
