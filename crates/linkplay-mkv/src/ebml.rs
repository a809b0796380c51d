//! EBML primitive decoding.
//!
//! Matroska files are built from EBML elements: a variable-length element ID,
//! a variable-length size, then `size` bytes of payload. Element IDs keep
//! their length-marker bits (the four bytes `1A 45 DF A3` decode to the value
//! `0x1A45DFA3`); sizes strip theirs. An element that declares the
//! "unknown size" sentinel (all data bits set) is rejected, since master
//! traversal relies on declared extents.

use crate::error::{MkvError, Result};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

/// Maximum encoded length of an element ID in bytes.
pub const MAX_ID_LENGTH: usize = 4;

/// Maximum encoded length of an element size in bytes.
pub const MAX_SIZE_LENGTH: usize = 8;

fn read_byte<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read an element ID.
///
/// The marker bit must fall within the first four bits, giving an encoded
/// length of one to four bytes. The returned value keeps the marker bits
/// verbatim. Returns the ID and the number of bytes consumed.
pub fn read_element_id<R: Read>(reader: &mut R) -> Result<(u32, usize)> {
    let first = read_byte(reader)?;
    let length = first.leading_zeros() as usize + 1;
    if length > MAX_ID_LENGTH {
        return Err(MkvError::InvalidElementId);
    }
    let mut value = u32::from(first);
    for _ in 1..length {
        value = (value << 8) | u32::from(read_byte(reader)?);
    }
    Ok((value, length))
}

/// Read an element size.
///
/// The marker bit may fall anywhere within the first byte, giving an encoded
/// length of one to eight bytes. The marker bits are stripped from the
/// returned value. Returns the size and the number of bytes consumed, or
/// [`MkvError::UnknownSize`] if all data bits are set.
pub fn read_element_size<R: Read>(reader: &mut R) -> Result<(u64, usize)> {
    let first = read_byte(reader)?;
    if first == 0 {
        return Err(MkvError::InvalidVint);
    }
    let length = first.leading_zeros() as usize + 1;
    // u16 so the 8-byte length class shifts cleanly to an empty mask.
    let mut value = u64::from(first) & u64::from(0xFF_u16 >> length);
    for _ in 1..length {
        value = (value << 8) | u64::from(read_byte(reader)?);
    }
    if value == unknown_size_marker(length) {
        return Err(MkvError::UnknownSize);
    }
    Ok((value, length))
}

/// The all-data-bits-set sentinel for a size of the given encoded length.
fn unknown_size_marker(length: usize) -> u64 {
    (1u64 << (7 * length)) - 1
}

/// Read a big-endian unsigned integer of `len` bytes. A zero-length field
/// decodes to zero.
pub fn read_uint<R: Read>(reader: &mut R, len: u64) -> Result<u64> {
    if len > 8 {
        return Err(MkvError::IntegerTooWide { len });
    }
    let mut value = 0u64;
    for _ in 0..len {
        value = (value << 8) | u64::from(read_byte(reader)?);
    }
    Ok(value)
}

/// Read at most `max` bytes of a `len`-byte binary field, skipping the rest.
///
/// The stream always ends up positioned past the whole field.
pub fn read_bytes<R: Read + Seek>(reader: &mut R, len: u64, max: usize) -> Result<Vec<u8>> {
    let take = len.min(max as u64) as usize;
    let mut buf = vec![0u8; take];
    reader.read_exact(&mut buf)?;
    if len > take as u64 {
        reader.seek(SeekFrom::Current((len - take as u64) as i64))?;
    }
    Ok(buf)
}

/// Read a string field of `len` bytes, truncated to `max` bytes.
///
/// Matroska strings may be NUL-padded; the value stops at the first NUL.
pub fn read_string<R: Read + Seek>(reader: &mut R, len: u64, max: usize) -> Result<String> {
    let buf = read_bytes(reader, len, max)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Number of bytes needed to encode `value` as a VINT size.
pub fn vint_length(value: u64) -> usize {
    for length in 1..MAX_SIZE_LENGTH {
        // The all-ones pattern of each width is reserved for "unknown size".
        if value < unknown_size_marker(length) {
            return length;
        }
    }
    MAX_SIZE_LENGTH
}

/// Encode a size as a VINT. Returns the encoded bytes.
pub fn encode_vint(value: u64) -> Vec<u8> {
    let length = vint_length(value);
    let mut out = vec![0u8; length];
    let marked = value | (1u64 << (7 * length));
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (marked >> (8 * (length - 1 - i))) as u8;
    }
    out
}

/// Encode an element ID. The value already carries its marker bits, so this
/// is a plain big-endian write without leading zero bytes.
pub fn encode_element_id(id: u32) -> Vec<u8> {
    let length = ((4 - id.leading_zeros() / 8) as usize).max(1);
    let mut out = vec![0u8; length];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (id >> (8 * (length - 1 - i))) as u8;
    }
    out
}

/// A decoded element header: ID, payload size, and encoded header length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Element ID with marker bits.
    pub id: u32,
    /// Payload size in bytes.
    pub size: u64,
    /// Encoded length of the header itself.
    pub header_size: usize,
}

impl ElementHeader {
    /// Read an element header from the stream.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let (id, id_len) = read_element_id(reader)?;
        let (size, size_len) = read_element_size(reader)?;
        Ok(Self {
            id,
            size,
            header_size: id_len + size_len,
        })
    }
}

/// A callback invoked with the stream positioned at a child's payload and the
/// payload length.
pub type Handler<'h, R> = Box<dyn FnMut(&mut R, u64) -> Result<()> + 'h>;

/// Dispatch table for master-element traversal: element ID to handler.
pub struct HandlerTable<'h, R> {
    handlers: BTreeMap<u32, Handler<'h, R>>,
}

impl<'h, R> HandlerTable<'h, R> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler for an element ID.
    pub fn on<F>(mut self, id: u32, handler: F) -> Self
    where
        F: FnMut(&mut R, u64) -> Result<()> + 'h,
    {
        self.handlers.insert(id, Box::new(handler));
        self
    }
}

impl<'h, R> Default for HandlerTable<'h, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the children of a master element of `len` payload bytes.
///
/// Children with a registered handler are dispatched; others are skipped by
/// size. After each child the stream is repositioned to the child's declared
/// end, regardless of what the handler consumed. The stream always ends up
/// at the master's end offset. Returns `Ok(true)` when every child decoded
/// cleanly, `Ok(false)` when some failed; with `stop_on_error` the walk stops
/// at the first failure.
pub fn parse_master<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    table: &mut HandlerTable<'_, R>,
    stop_on_error: bool,
) -> Result<bool> {
    let end = reader.stream_position()? + len;
    let mut clean = true;
    while reader.stream_position()? < end {
        let header = match ElementHeader::read(reader) {
            Ok(header) => header,
            Err(MkvError::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                clean = false;
                break;
            }
            Err(MkvError::Io(e)) => return Err(MkvError::Io(e)),
            Err(_) => {
                // A broken header leaves no way to find the next sibling.
                clean = false;
                break;
            }
        };
        let child_end = reader.stream_position()? + header.size;
        if child_end > end {
            clean = false;
            break;
        }
        if let Some(handler) = table.handlers.get_mut(&header.id) {
            if handler(reader, header.size).is_err() {
                clean = false;
                if stop_on_error {
                    break;
                }
            }
        }
        reader.seek(SeekFrom::Start(child_end))?;
    }
    reader.seek(SeekFrom::Start(end))?;
    Ok(clean)
}
