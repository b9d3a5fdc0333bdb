//! Shared utilities of the gsview crates.

mod lookup3;
pub use lookup3::{lookup3, lookup3_seeded, Lookup3Ext};

pub mod registry;
