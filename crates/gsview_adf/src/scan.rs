use crate::{Endian, ReadError};

/// Bounds-checked sequential reader over a byte buffer.
///
/// Every read either returns the decoded value or [`ReadError::Truncated`];
/// the scanner never panics on short input. Integer fields are decoded with
/// the endianness the container's magic selected.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self::at(buf, endian, 0)
    }

    /// Creates a scanner positioned at an arbitrary offset. Out-of-range
    /// offsets are accepted here and surface as `Truncated` on first read.
    pub fn at(buf: &'a [u8], endian: Endian, pos: usize) -> Self {
        Self { buf, pos, endian }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn take(&mut self, need: usize) -> Result<&'a [u8], ReadError> {
        let end = self
            .pos
            .checked_add(need)
            .filter(|&end| end <= self.buf.len())
            .ok_or(ReadError::Truncated {
                offset: self.pos,
                need,
            })?;
        let taken = &self.buf[self.pos..end];
        self.pos = end;
        Ok(taken)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), ReadError> {
        self.take(count).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, ReadError> {
        let endian = self.endian;
        Ok(endian.u32(self.take(4)?))
    }

    pub fn u64(&mut self) -> Result<u64, ReadError> {
        let endian = self.endian;
        Ok(endian.u64(self.take(8)?))
    }

    /// Reads a NUL-terminated string, consuming the terminator. Non-UTF-8
    /// bytes are replaced rather than rejected; the engine writes plain
    /// ASCII identifiers but nothing enforces that.
    pub fn cstr(&mut self) -> Result<String, ReadError> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::Truncated {
                offset: self.pos,
                need: rest.len() + 1,
            })?;
        let s = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_byte_orders() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        let mut le = Scanner::new(&bytes, Endian::Little);
        let mut be = Scanner::new(&bytes, Endian::Big);
        assert_eq!(le.u32().unwrap(), 0x04030201);
        assert_eq!(be.u32().unwrap(), 0x01020304);
    }

    #[test]
    fn truncation_reports_offset_and_need() {
        let bytes = [0u8; 6];
        let mut s = Scanner::new(&bytes, Endian::Little);
        s.u32().unwrap();
        assert_eq!(
            s.u32(),
            Err(ReadError::Truncated { offset: 4, need: 4 })
        );
    }

    #[test]
    fn cstr_stops_at_terminator() {
        let bytes = b"graph\0tail";
        let mut s = Scanner::new(bytes, Endian::Little);
        assert_eq!(s.cstr().unwrap(), "graph");
        assert_eq!(s.pos(), 6);
    }

    #[test]
    fn cstr_without_terminator_is_truncated() {
        let mut s = Scanner::new(b"graph", Endian::Little);
        assert!(matches!(s.cstr(), Err(ReadError::Truncated { .. })));
    }
}
