use crate::{Endian, ReadError, Scanner};
use ahash::AHashMap;
use byteorder::{ByteOrder, LE};
use gsview_utils::registry;
use log::debug;

/// `"ADF "` read little-endian from the first four bytes.
const MAGIC: u32 = 0x4144_4620;
/// The byte-swapped twin, marking a big-endian file.
const MAGIC_SWAPPED: u32 = 0x2046_4441;

/// Version 4 keeps a NUL-terminated description at this fixed offset.
const DESCRIPTION_OFFSET: usize = 64;

const TYPE_HEAD_SIZE: usize = 32;
const TYPE_MEMBER_SIZE: usize = 32;
const INSTANCE_ENTRY_V4: usize = 24;
const INSTANCE_ENTRY_LEGACY: usize = 48;

/// The upper 8 bits of a member's stored offset are flags with undocumented
/// meaning; they are masked off and never interpreted.
const MEMBER_OFFSET_MASK: u32 = 0x00FF_FFFF;

/// Kind discriminant of a type directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Struct,
    Pointer,
    Array,
    InlineArray,
    String,
    Enum,
    StringHash,
    /// Kinds this reader doesn't know. The GraphScript walk doesn't depend
    /// on the type directory, so an exotic entry shouldn't kill the file.
    Unknown(u32),
}

impl TypeKind {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => TypeKind::Scalar,
            1 => TypeKind::Struct,
            2 => TypeKind::Pointer,
            3 => TypeKind::Array,
            4 => TypeKind::InlineArray,
            5 => TypeKind::String,
            6 => TypeKind::Enum,
            7 => TypeKind::StringHash,
            other => TypeKind::Unknown(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdfMember {
    pub name_hash: u32,
    pub type_hash: u32,
    /// Byte offset inside the owning struct; low 24 bits of the stored word.
    pub offset: u32,
    pub size: u32,
    pub bit_offset: u32,
    pub default_value: u32,
}

#[derive(Debug, Clone)]
pub struct AdfType {
    pub kind: TypeKind,
    pub size: u32,
    pub alignment: u32,
    pub name_hash: u32,
    pub name: String,
    pub flags: u32,
    pub members: Vec<AdfMember>,
}

#[derive(Debug, Clone)]
pub struct AdfInstance {
    pub name_hash: u32,
    pub type_hash: u32,
    pub payload_offset: u32,
    pub payload_size: u32,
    /// Resolved from the string table on version 4; synthesized as
    /// `instance_<i>` on older versions, which don't store instance names.
    pub name: String,
}

/// A parsed ADF container, borrowing the input buffer.
#[derive(Debug, Clone)]
pub struct AdfFile<'a> {
    buf: &'a [u8],
    pub endian: Endian,
    pub version: u32,
    pub declared_size: Option<u32>,
    pub description: Option<String>,
    pub instances: Vec<AdfInstance>,
    pub types: AHashMap<u32, AdfType>,
    pub strings: Vec<String>,
}

impl<'a> AdfFile<'a> {
    /// Parses the container structure out of `buf`.
    ///
    /// Payloads are not touched here; use [`AdfFile::payload`] to get an
    /// instance's byte window.
    pub fn read(buf: &'a [u8]) -> Result<Self, ReadError> {
        let magic_bytes = buf.get(0..4).ok_or(ReadError::Truncated {
            offset: 0,
            need: 4,
        })?;
        let endian = match LE::read_u32(magic_bytes) {
            MAGIC => Endian::Little,
            MAGIC_SWAPPED => Endian::Big,
            _ => return Err(ReadError::BadMagic),
        };

        let mut s = Scanner::at(buf, endian, 4);
        let version = s.u32()?;
        if !matches!(version, 2..=4) {
            return Err(ReadError::UnsupportedVersion(version));
        }

        let instance_count = s.u32()?;
        let instance_offset = s.u32()?;
        let type_count = s.u32()?;
        let type_offset = s.u32()?;
        let (string_hash_count, string_hash_offset) = match version >= 3 {
            true => (s.u32()?, s.u32()?),
            false => (0, 0),
        };
        let (string_count, string_offset) = match version >= 4 {
            true => (s.u32()?, s.u32()?),
            false => (0, 0),
        };
        let declared_size = match version >= 4 {
            true => Some(s.u32()?),
            false => None,
        };
        let description = match version >= 4 {
            true => Some(Scanner::at(buf, endian, DESCRIPTION_OFFSET).cstr()?),
            false => None,
        };

        // Names recovered from the file itself feed the global registry, so
        // later hash lookups can resolve file-defined identifiers.
        registry::init();

        let strings = read_string_table(buf, endian, string_count, string_offset)?;
        read_string_hashes(buf, endian, string_hash_count, string_hash_offset)?;
        let types = read_types(buf, endian, type_count, type_offset)?;
        let instances =
            read_instances(buf, endian, version, instance_count, instance_offset, &strings)?;

        debug!(
            "ADF v{} ({:?}): {} instances, {} types, {} strings",
            version,
            endian,
            instances.len(),
            types.len(),
            strings.len()
        );

        Ok(Self {
            buf,
            endian,
            version,
            declared_size,
            description,
            instances,
            types,
            strings,
        })
    }

    /// Returns the raw payload window of an instance.
    pub fn payload(&self, instance: &AdfInstance) -> Result<&'a [u8], ReadError> {
        let offset = instance.payload_offset as usize;
        let size = instance.payload_size as usize;
        self.buf
            .get(offset..offset + size)
            .ok_or(ReadError::Truncated { offset, need: size })
    }
}

fn read_string_table(
    buf: &[u8],
    endian: Endian,
    count: u32,
    offset: u32,
) -> Result<Vec<String>, ReadError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut s = Scanner::at(buf, endian, offset as usize);
    let mut strings = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        strings.push(s.cstr()?);
    }
    Ok(strings)
}

/// The string-hash table pairs each NUL-terminated string with an 8-byte
/// stored hash. The stored value is redundant for this reader (hashes are
/// recomputed on demand), so only the strings are kept, as registry entries.
fn read_string_hashes(
    buf: &[u8],
    endian: Endian,
    count: u32,
    offset: u32,
) -> Result<(), ReadError> {
    if count == 0 {
        return Ok(());
    }
    let mut s = Scanner::at(buf, endian, offset as usize);
    for _ in 0..count {
        let name = s.cstr()?;
        s.skip(8)?;
        registry::register(&name);
    }
    Ok(())
}

fn read_types(
    buf: &[u8],
    endian: Endian,
    count: u32,
    offset: u32,
) -> Result<AHashMap<u32, AdfType>, ReadError> {
    let mut types = AHashMap::with_capacity(count.min(1024) as usize);
    let mut start = offset as usize;
    for _ in 0..count {
        let mut s = Scanner::at(buf, endian, start);
        let kind_raw = s.u32()?;
        let size = s.u32()?;
        let alignment = s.u32()?;
        let name_hash = s.u32()?;
        let name_offset = s.u32()?;
        let flags = s.u32()?;
        let member_count = s.u32()?;
        let _members_offset = s.u32()?;

        // Member records follow the 32-byte head back to back; reject a
        // count that cannot fit in the buffer before allocating for it.
        let members_size = member_count as usize * TYPE_MEMBER_SIZE;
        if start + TYPE_HEAD_SIZE + members_size > buf.len() {
            return Err(ReadError::Truncated {
                offset: start + TYPE_HEAD_SIZE,
                need: members_size,
            });
        }

        let mut members = Vec::with_capacity(member_count as usize);
        for _ in 0..member_count {
            let name_hash = s.u32()?;
            let type_hash = s.u32()?;
            let offset = s.u32()? & MEMBER_OFFSET_MASK;
            let size = s.u32()?;
            let bit_offset = s.u32()?;
            let default_value = s.u32()?;
            let _name_offset = s.u32()?;
            let _flags = s.u32()?;
            members.push(AdfMember {
                name_hash,
                type_hash,
                offset,
                size,
                bit_offset,
                default_value,
            });
        }

        let name = Scanner::at(buf, endian, start + name_offset as usize).cstr()?;
        registry::register(&name);

        types.insert(
            name_hash,
            AdfType {
                kind: TypeKind::from_raw(kind_raw),
                size,
                alignment,
                name_hash,
                name,
                flags,
                members,
            },
        );

        start += TYPE_HEAD_SIZE + members_size;
    }
    Ok(types)
}

fn read_instances(
    buf: &[u8],
    endian: Endian,
    version: u32,
    count: u32,
    offset: u32,
    strings: &[String],
) -> Result<Vec<AdfInstance>, ReadError> {
    let entry_size = match version >= 4 {
        true => INSTANCE_ENTRY_V4,
        false => INSTANCE_ENTRY_LEGACY,
    };
    let directory_size = count as usize * entry_size;
    if offset as usize + directory_size > buf.len() {
        return Err(ReadError::Truncated {
            offset: offset as usize,
            need: directory_size,
        });
    }

    let mut s = Scanner::at(buf, endian, offset as usize);
    let mut instances = Vec::with_capacity(count as usize);
    for i in 0..count {
        let name_hash = s.u32()?;
        let type_hash = s.u32()?;
        let payload_offset = s.u32()?;
        let payload_size = s.u32()?;
        let name = match version >= 4 {
            true => {
                let name_index = s.u32()?;
                s.skip(INSTANCE_ENTRY_V4 - 20)?;
                match strings.get(name_index as usize) {
                    Some(name) => {
                        registry::register(name);
                        name.clone()
                    }
                    None => format!("instance_{i}"),
                }
            }
            false => {
                s.skip(INSTANCE_ENTRY_LEGACY - 16)?;
                format!("instance_{i}")
            }
        };
        instances.push(AdfInstance {
            name_hash,
            type_hash,
            payload_offset,
            payload_size,
            name,
        });
    }
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

    /// Minimal version 2 container with a single instance.
    fn build_v2<E: ByteOrder>(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<E>(MAGIC).unwrap();
        buf.write_u32::<E>(2).unwrap();
        buf.write_u32::<E>(1).unwrap(); // instance count
        buf.write_u32::<E>(24).unwrap(); // instance directory offset
        buf.write_u32::<E>(0).unwrap(); // type count
        buf.write_u32::<E>(0).unwrap(); // type directory offset

        // one 48-byte instance entry
        buf.write_u32::<E>(0xAABBCCDD).unwrap();
        buf.write_u32::<E>(0x11223344).unwrap();
        buf.write_u32::<E>(24 + 48).unwrap();
        buf.write_u32::<E>(payload.len() as u32).unwrap();
        buf.extend_from_slice(&[0; 32]);

        buf.extend_from_slice(payload);
        buf
    }

    /// Version 4 container: description, string table, one named instance,
    /// and a one-member type record.
    fn build_v4<E: ByteOrder>(payload: &[u8], member_offset_raw: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<E>(MAGIC).unwrap();
        buf.write_u32::<E>(4).unwrap();
        // Offsets get backpatched once the sections are laid down.
        for _ in 0..9 {
            buf.write_u32::<E>(0).unwrap();
        }
        buf.resize(DESCRIPTION_OFFSET, 0);
        buf.extend_from_slice(b"fixture graph\0");

        let string_offset = buf.len() as u32;
        buf.extend_from_slice(b"main_graph\0");

        let type_offset = buf.len() as u32;
        let type_start = buf.len();
        buf.write_u32::<E>(1).unwrap(); // kind: Struct
        buf.write_u32::<E>(64).unwrap(); // size
        buf.write_u32::<E>(8).unwrap(); // alignment
        buf.write_u32::<E>(0x0BADF00D).unwrap(); // name hash
        buf.write_u32::<E>((TYPE_HEAD_SIZE + TYPE_MEMBER_SIZE) as u32).unwrap(); // name offset
        buf.write_u32::<E>(0).unwrap(); // flags
        buf.write_u32::<E>(1).unwrap(); // member count
        buf.write_u32::<E>(TYPE_HEAD_SIZE as u32).unwrap(); // members offset
        buf.write_u32::<E>(0x01020304).unwrap(); // member name hash
        buf.write_u32::<E>(0x05060708).unwrap(); // member type hash
        buf.write_u32::<E>(member_offset_raw).unwrap();
        buf.write_u32::<E>(4).unwrap(); // member size
        buf.write_u32::<E>(0).unwrap(); // bit offset
        buf.write_u32::<E>(0).unwrap(); // default
        buf.write_u32::<E>(0).unwrap(); // member name offset
        buf.write_u32::<E>(0).unwrap(); // member flags
        assert_eq!(buf.len() - type_start, TYPE_HEAD_SIZE + TYPE_MEMBER_SIZE);
        buf.extend_from_slice(b"GraphContainer\0");

        let instance_offset = buf.len() as u32;
        let payload_offset = instance_offset + INSTANCE_ENTRY_V4 as u32;
        buf.write_u32::<E>(0xAABBCCDD).unwrap();
        buf.write_u32::<E>(0x0BADF00D).unwrap();
        buf.write_u32::<E>(payload_offset).unwrap();
        buf.write_u32::<E>(payload.len() as u32).unwrap();
        buf.write_u32::<E>(0).unwrap(); // string table index
        buf.write_u32::<E>(0).unwrap(); // reserved
        buf.extend_from_slice(payload);

        E::write_u32(&mut buf[8..12], 1); // instance count
        E::write_u32(&mut buf[12..16], instance_offset);
        E::write_u32(&mut buf[16..20], 1); // type count
        E::write_u32(&mut buf[20..24], type_offset);
        E::write_u32(&mut buf[32..36], 1); // string count
        E::write_u32(&mut buf[36..40], string_offset);
        let declared_size = buf.len() as u32;
        E::write_u32(&mut buf[40..44], declared_size); // declared size
        buf
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            AdfFile::read(b"NOPE\0\0\0\0"),
            Err(ReadError::BadMagic)
        ));
        assert!(matches!(
            AdfFile::read(b"AD"),
            Err(ReadError::Truncated { offset: 0, need: 4 })
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(MAGIC).unwrap();
        buf.write_u32::<LittleEndian>(5).unwrap();
        assert!(matches!(
            AdfFile::read(&buf),
            Err(ReadError::UnsupportedVersion(5))
        ));
    }

    #[test]
    fn reads_v2_instance_directory() {
        let buf = build_v2::<LittleEndian>(b"payload!");
        let adf = AdfFile::read(&buf).unwrap();

        assert_eq!(adf.endian, Endian::Little);
        assert_eq!(adf.version, 2);
        assert_eq!(adf.description, None);
        assert_eq!(adf.instances.len(), 1);

        let instance = &adf.instances[0];
        assert_eq!(instance.name_hash, 0xAABBCCDD);
        assert_eq!(instance.type_hash, 0x11223344);
        assert_eq!(instance.name, "instance_0");
        assert_eq!(adf.payload(instance).unwrap(), b"payload!");
    }

    #[test]
    fn big_endian_twin_parses_identically() {
        let le = build_v2::<LittleEndian>(b"twin");
        let be = build_v2::<BigEndian>(b"twin");
        let adf_le = AdfFile::read(&le).unwrap();
        let adf_be = AdfFile::read(&be).unwrap();

        assert_eq!(adf_le.endian, Endian::Little);
        assert_eq!(adf_be.endian, Endian::Big);
        assert_eq!(adf_le.version, adf_be.version);
        assert_eq!(
            adf_le.instances[0].name_hash,
            adf_be.instances[0].name_hash
        );
        assert_eq!(
            adf_le.payload(&adf_le.instances[0]).unwrap(),
            adf_be.payload(&adf_be.instances[0]).unwrap()
        );
    }

    #[test]
    fn v3_string_hash_table_feeds_the_registry() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(MAGIC).unwrap();
        buf.write_u32::<LittleEndian>(3).unwrap();
        for _ in 0..4 {
            buf.write_u32::<LittleEndian>(0).unwrap(); // no instances, no types
        }
        buf.write_u32::<LittleEndian>(1).unwrap(); // one string-hash entry
        buf.write_u32::<LittleEndian>(32).unwrap();
        buf.extend_from_slice(b"custom_identifier_v3\0");
        buf.extend_from_slice(&[0; 8]); // stored hash value, unused

        let adf = AdfFile::read(&buf).unwrap();
        assert_eq!(adf.version, 3);
        assert!(adf.instances.is_empty());

        let hash = gsview_utils::lookup3(b"custom_identifier_v3");
        assert_eq!(registry::resolve(hash).as_deref(), Some("custom_identifier_v3"));
    }

    #[test]
    fn reads_v4_strings_types_and_description() {
        let buf = build_v4::<LittleEndian>(b"data", 0x10);
        let adf = AdfFile::read(&buf).unwrap();

        assert_eq!(adf.version, 4);
        assert_eq!(adf.description.as_deref(), Some("fixture graph"));
        assert_eq!(adf.strings, vec!["main_graph".to_owned()]);
        assert_eq!(adf.instances[0].name, "main_graph");
        assert_eq!(adf.declared_size, Some(buf.len() as u32));

        let ty = adf.types.get(&0x0BADF00D).unwrap();
        assert_eq!(ty.kind, TypeKind::Struct);
        assert_eq!(ty.name, "GraphContainer");
        assert_eq!(ty.members.len(), 1);
        assert_eq!(ty.members[0].offset, 0x10);

        assert_eq!(adf.payload(&adf.instances[0]).unwrap(), b"data");
    }

    #[test]
    fn member_offset_upper_bits_are_masked() {
        // High byte carries undocumented flags; only the low 24 bits are
        // a byte offset.
        let buf = build_v4::<LittleEndian>(b"", 0xFF00_0010);
        let adf = AdfFile::read(&buf).unwrap();
        let ty = adf.types.get(&0x0BADF00D).unwrap();
        assert_eq!(ty.members[0].offset, 0x10);
    }

    #[test]
    fn truncated_directory_is_fatal() {
        let mut buf = build_v2::<LittleEndian>(b"payload!");
        buf.truncate(30); // cuts into the instance directory
        assert!(matches!(
            AdfFile::read(&buf),
            Err(ReadError::Truncated { .. })
        ));
    }

    #[test]
    fn out_of_range_payload_window() {
        let mut buf = build_v2::<LittleEndian>(b"payload!");
        let len = buf.len();
        buf.truncate(len - 2); // directory intact, payload short
        let adf = AdfFile::read(&buf).unwrap();
        assert!(matches!(
            adf.payload(&adf.instances[0]),
            Err(ReadError::Truncated { .. })
        ));
    }
}
