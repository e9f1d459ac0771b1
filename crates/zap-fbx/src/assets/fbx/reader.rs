//! Binary FBX container reader.
//!
//! Layout (all little-endian):
//! ```text
//! [Header: 23-byte magic + u32 version]
//! [Node]*  terminated by a null record
//!
//! Node:  endOffset, numProperties, propertyListLength  (u32, or u64 when version >= 7500)
//!        nameLength: u8, name
//!        properties[numProperties]
//!        children[]  (up to endOffset, usually closed by a null record)
//! ```

use std::io::{self, Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;

use super::node::{ArrayData, ArrayKind, BinaryNode, Property};
use crate::assets::options::CompressionPolicy;
use crate::core::error::FbxError;

/// Magic bytes at the start of every binary FBX file.
pub const FBX_MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Magic plus the u32 version field.
pub const HEADER_LEN: usize = 27;

/// Byte offset of the version field.
pub const VERSION_OFFSET: usize = 23;

/// First version that uses 64-bit node record fields.
pub const VERSION_64BIT: u32 = 7500;

/// Lowest version accepted. Binary FBX before 6.0 is not a node tree.
pub const MIN_VERSION: u32 = 6000;

/// Deepest node nesting accepted. Exported files stay in single digits.
pub const MAX_NODE_DEPTH: usize = 256;

/// Largest expansion deflate can produce; a longer declared array is corrupt.
const MAX_INFLATE_RATIO: usize = 1032;

/// Options for the binary reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// What to do when a compressed array fails to inflate.
    pub compression: CompressionPolicy,
}

/// Record layout selected by the file version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// u32 offsets and counts, 13-byte node header.
    Narrow,
    /// u64 offsets and counts, 25-byte node header.
    Wide,
}

impl RecordLayout {
    pub fn for_version(version: u32) -> Self {
        if version >= VERSION_64BIT {
            Self::Wide
        } else {
            Self::Narrow
        }
    }

    /// Size of a node header up to (not including) the name bytes.
    pub fn node_header_len(self) -> usize {
        match self {
            Self::Narrow => 13,
            Self::Wide => 25,
        }
    }
}

/// Parse a binary FBX file into its top-level node list.
pub fn parse_fbx_binary(bytes: &[u8]) -> Result<Vec<BinaryNode>, FbxError> {
    parse_fbx_binary_with(bytes, &ReaderOptions::default())
}

/// Parse with explicit reader options.
pub fn parse_fbx_binary_with(
    bytes: &[u8],
    options: &ReaderOptions,
) -> Result<Vec<BinaryNode>, FbxError> {
    let version = read_version(bytes)?;
    let layout = RecordLayout::for_version(version);
    log::debug!("fbx: version {} ({:?} records, {} bytes)", version, layout, bytes.len());

    let mut reader = Reader {
        cursor: Cursor::new(bytes),
        layout,
        options: *options,
        depth: 0,
    };
    reader.seek(HEADER_LEN);

    let mut nodes = Vec::new();
    while reader.remaining() >= layout.node_header_len() {
        match reader.read_node()? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }
    Ok(nodes)
}

/// Validate the header and return the file version.
pub fn read_version(bytes: &[u8]) -> Result<u32, FbxError> {
    if bytes.len() < HEADER_LEN {
        return Err(FbxError::HeaderTooShort { len: bytes.len() });
    }
    if &bytes[..FBX_MAGIC.len()] != FBX_MAGIC {
        return Err(FbxError::BadMagic);
    }
    let version = LittleEndian::read_u32(&bytes[VERSION_OFFSET..HEADER_LEN]);
    if version < MIN_VERSION {
        return Err(FbxError::UnsupportedVersion(version));
    }
    Ok(version)
}

struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    layout: RecordLayout,
    options: ReaderOptions,
    /// Nesting level of the node being read, 0 at the top level.
    depth: usize,
}

impl<'a> Reader<'a> {
    fn pos(&self) -> usize {
        self.cursor.position() as usize
    }

    fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos())
    }

    fn seek(&mut self, pos: usize) {
        self.cursor.set_position(pos as u64);
    }

    /// Run one fixed-size read. A short read reports the offset it started at.
    fn read<T>(
        &mut self,
        what: &'static str,
        f: impl FnOnce(&mut Cursor<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T, FbxError> {
        let offset = self.pos();
        f(&mut self.cursor).map_err(|_| FbxError::UnexpectedEof { offset, what })
    }

    /// Borrow the next `len` bytes of the file.
    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], FbxError> {
        let buf: &'a [u8] = *self.cursor.get_ref();
        let start = self.pos();
        let end = start
            .checked_add(len)
            .filter(|&end| end <= buf.len())
            .ok_or(FbxError::UnexpectedEof { offset: start, what })?;
        self.seek(end);
        Ok(&buf[start..end])
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, FbxError> {
        self.read(what, |c| c.read_u32::<LittleEndian>())
    }

    fn read_word(&mut self, what: &'static str) -> Result<u64, FbxError> {
        match self.layout {
            RecordLayout::Narrow => self.read_u32(what).map(u64::from),
            RecordLayout::Wide => self.read(what, |c| c.read_u64::<LittleEndian>()),
        }
    }

    /// Read one node record. Returns `None` on the null sentinel record.
    fn read_node(&mut self) -> Result<Option<BinaryNode>, FbxError> {
        let start = self.pos();
        let end_offset = self.read_word("node end offset")?;
        let num_properties = self.read_word("node property count")?;
        let property_list_len = self.read_word("node property list length")?;
        let name_len = self.read("node name length", |c| c.read_u8())? as usize;

        if end_offset == 0 {
            return Ok(None);
        }
        if self.depth >= MAX_NODE_DEPTH {
            return Err(FbxError::NestingTooDeep { offset: start, limit: MAX_NODE_DEPTH });
        }
        let end = usize::try_from(end_offset)
            .ok()
            .filter(|&end| end > start && end <= self.len())
            .ok_or(FbxError::InvalidNodeEnd { offset: start, end: end_offset })?;

        let name = String::from_utf8_lossy(self.take(name_len, "node name")?).into_owned();

        let properties_start = self.pos();
        let mut properties = Vec::with_capacity(num_properties.min(64) as usize);
        for _ in 0..num_properties {
            properties.push(self.read_property()?);
        }

        // Resync on the declared list length; it is authoritative.
        let properties_end = usize::try_from(property_list_len)
            .ok()
            .and_then(|len| properties_start.checked_add(len))
            .filter(|&p| p <= end)
            .ok_or(FbxError::InvalidNodeEnd { offset: start, end: end_offset })?;
        if self.pos() != properties_end {
            log::debug!(
                "fbx: node `{}` property list ends at {} but was declared to end at {}",
                name,
                self.pos(),
                properties_end
            );
            self.seek(properties_end);
        }

        self.depth += 1;
        let children = self.read_children(start, end);
        self.depth -= 1;
        let children = children?;
        self.seek(end);

        Ok(Some(BinaryNode { name, properties, children }))
    }

    /// Children of the node at `start`, up to its end offset.
    fn read_children(&mut self, start: usize, end: usize) -> Result<Vec<BinaryNode>, FbxError> {
        let mut children = Vec::new();
        while end.saturating_sub(self.pos()) >= self.layout.node_header_len() {
            match self.read_node()? {
                Some(child) => children.push(child),
                None => break,
            }
            if self.pos() > end {
                return Err(FbxError::InvalidNodeEnd { offset: start, end: end as u64 });
            }
        }
        Ok(children)
    }

    fn read_property(&mut self) -> Result<Property, FbxError> {
        let offset = self.pos();
        let tag = self.read("property type", |c| c.read_u8())?;
        if let Some(kind) = ArrayKind::from_tag(tag) {
            return self.read_array(kind, offset);
        }

        let property = match tag {
            b'Y' => Property::Int16(self.read("int16 property", |c| c.read_i16::<LittleEndian>())?),
            b'C' => Property::Bool(self.read("bool property", |c| c.read_u8())? != 0),
            b'I' => Property::Int32(self.read("int32 property", |c| c.read_i32::<LittleEndian>())?),
            b'F' => Property::Float32(self.read("float32 property", |c| c.read_f32::<LittleEndian>())?),
            b'D' => Property::Float64(self.read("float64 property", |c| c.read_f64::<LittleEndian>())?),
            b'L' => Property::Int64(self.read("int64 property", |c| c.read_i64::<LittleEndian>())?),
            b'S' => {
                let len = self.read_u32("string length")? as usize;
                let raw = self.take(len, "string property")?;
                Property::String(String::from_utf8_lossy(raw).into_owned())
            }
            b'R' => {
                let len = self.read_u32("raw length")? as usize;
                Property::Bytes(self.take(len, "raw property")?.to_vec())
            }
            _ => return Err(FbxError::UnknownPropertyType { offset, tag: tag as char }),
        };
        Ok(property)
    }

    fn read_array(&mut self, kind: ArrayKind, offset: usize) -> Result<Property, FbxError> {
        let len = self.read_u32("array length")? as usize;
        let encoding = self.read_u32("array encoding")?;
        let byte_len = self.read_u32("array byte length")? as usize;
        let payload = self.take(byte_len, "array payload")?;
        let expected = len.checked_mul(kind.stride());

        if encoding == 0 {
            if expected != Some(payload.len()) {
                return Err(FbxError::CorruptArray {
                    offset,
                    reason: format!("raw payload is {} bytes for {len} elements", payload.len()),
                });
            }
            return Ok(Property::Array(decode_elements(kind, payload)));
        }

        match inflate(payload, expected) {
            Ok(raw) => Ok(Property::Array(decode_elements(kind, &raw))),
            Err(reason) => match self.options.compression {
                CompressionPolicy::Strict => Err(FbxError::CorruptArray { offset, reason }),
                CompressionPolicy::Lenient => {
                    log::warn!(
                        "fbx: compressed {:?} array of {} elements at byte {} is unreadable ({}); treating as empty",
                        kind,
                        len,
                        offset,
                        reason
                    );
                    Ok(Property::UndecodedArray { kind, len })
                }
            },
        }
    }
}

/// Inflate a zlib payload that must expand to exactly `expected` bytes.
fn inflate(payload: &[u8], expected: Option<usize>) -> Result<Vec<u8>, String> {
    let expected = expected
        .filter(|&n| n <= payload.len().saturating_mul(MAX_INFLATE_RATIO))
        .ok_or_else(|| format!("declared length does not fit a {}-byte stream", payload.len()))?;

    // The declared length is only trusted as far as the stream backs it.
    let mut out = Vec::with_capacity(expected.min(payload.len().saturating_mul(4)));
    ZlibDecoder::new(payload)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() != expected {
        return Err(format!("inflated to {} bytes, expected {expected}", out.len()));
    }
    Ok(out)
}

fn decode_elements(kind: ArrayKind, raw: &[u8]) -> ArrayData {
    let count = raw.len() / kind.stride();
    let raw = &raw[..count * kind.stride()];
    match kind {
        ArrayKind::F32 => {
            let mut out = vec![0.0; count];
            LittleEndian::read_f32_into(raw, &mut out);
            ArrayData::F32(out)
        }
        ArrayKind::F64 => {
            let mut out = vec![0.0; count];
            LittleEndian::read_f64_into(raw, &mut out);
            ArrayData::F64(out)
        }
        ArrayKind::I32 => {
            let mut out = vec![0; count];
            LittleEndian::read_i32_into(raw, &mut out);
            ArrayData::I32(out)
        }
        ArrayKind::I64 => {
            let mut out = vec![0; count];
            LittleEndian::read_i64_into(raw, &mut out);
            ArrayData::I64(out)
        }
        ArrayKind::Bool => ArrayData::Bool(raw.iter().map(|&b| b != 0).collect()),
    }
}
