//! Reader for the ADF (Avalanche Data Format) container.
//!
//! ADF is a self-describing binary envelope: a header, a type directory, an
//! instance directory, and (depending on the version) string tables. This
//! crate only gives access to the raw container structure; decoding an
//! instance's payload is the consumer's job (see `gsview_graph` for the
//! GraphScript payload).
//!
//! Three header versions (2, 3, 4) are supported, in both byte orders.

use byteorder::{ByteOrder, BE, LE};
use thiserror::Error;

mod file;
mod scan;

pub use file::{AdfFile, AdfInstance, AdfMember, AdfType, TypeKind};
pub use scan::Scanner;

/// Byte order of a parsed file, decided by its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LE::read_u32(bytes),
            Endian::Big => BE::read_u32(bytes),
        }
    }

    pub fn u64(self, bytes: &[u8]) -> u64 {
        match self {
            Endian::Little => LE::read_u64(bytes),
            Endian::Big => BE::read_u64(bytes),
        }
    }

    pub fn f32(self, bytes: &[u8]) -> f32 {
        match self {
            Endian::Little => LE::read_f32(bytes),
            Endian::Big => BE::read_f32(bytes),
        }
    }
}

/// Container-level failures. Everything past the container degrades
/// gracefully instead of erroring; see the decoder crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("not an ADF file (bad magic)")]
    BadMagic,
    #[error("unsupported ADF version {0}")]
    UnsupportedVersion(u32),
    #[error("file truncated: needed {need} bytes at offset {offset:#x}")]
    Truncated { offset: usize, need: usize },
    #[error("file contains no instances")]
    NoInstance,
}
