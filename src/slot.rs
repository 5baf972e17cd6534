//! Tagged slot encoding for literal and runtime values.
//!
//! Every value stored in a slot array is preceded by a header of one or two
//! slots. The top bit of the first word picks the family:
//!
//! - top bit 0: a primitive value. Byte 7 is the type tag, the low 56 bits
//!   are the payload size in bytes.
//! - top bit 1, byte 7 != 0xFF: a heap object. Bits 62-56 are the byte size
//!   (0..=0x7E), bits 55-32 a 24-bit hash, bits 31-24 eight flag bits and
//!   bits 23-0 a 24-bit class index.
//! - top bit 1, byte 7 == 0xFF: a large heap object. The low 56 bits of the
//!   first word carry the full byte size and a second word follows with
//!   hash/flags/class index as above, its own size field pinned to 0x7F.

use std::error::Error as StdError;
use std::fmt;

/// An 8-byte word, the atomic unit of literal and value storage.
pub type Slot = u64;

/// Bytes per slot.
pub const SLOT_BYTES: u64 = 8;

/// Object sizes at or above this use the two-word header form.
pub const DOUBLE_HEADER_THRESHOLD: u64 = 0x7F;

const OBJECT_BIT: Slot = 1 << 63;
const DOUBLE_MARK: Slot = 0xFF;
const DOUBLE_SIZE_SENTINEL: Slot = 0x7F;
const SIZE_MASK: Slot = 0x00FF_FFFF_FFFF_FFFF;
const HASH_MASK: u32 = 0xFF_FFFF;
const CLASS_INDEX_MASK: u32 = 0xFF_FFFF;

const BYTES_BIT: u8 = 1 << 6;
const STRING_BITS: u8 = (1 << 6) | (1 << 5);

/// Type tag carried by a primitive header.
///
/// Tags with bit 6 set are byte arrays; tags with bits 6 and 5 set are the
/// string family (paths and names are strings with a more specific tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Void,
    Int,
    Float,
    Char,
    Bool,
    ClassHandle,
    MethodHandle,
    VariableHandle,
    NamespaceHandle,
    /// Free region of a slot array (heap bookkeeping).
    EmptySpace,
    /// Reserved region of a slot array (heap bookkeeping).
    UnavailableSpace,
    Bytes,
    String,
    NamespacePath,
    ClassPath,
    ClassName,
    MethodName,
    VariableName,
    /// Any tag this runtime does not know; preserved so headers round-trip.
    Unknown(u8),
}

impl PrimitiveType {
    /// Decode a raw tag byte.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => PrimitiveType::Void,
            1 => PrimitiveType::Int,
            2 => PrimitiveType::Float,
            3 => PrimitiveType::Char,
            4 => PrimitiveType::Bool,
            5 => PrimitiveType::ClassHandle,
            6 => PrimitiveType::MethodHandle,
            7 => PrimitiveType::VariableHandle,
            8 => PrimitiveType::NamespaceHandle,
            62 => PrimitiveType::EmptySpace,
            63 => PrimitiveType::UnavailableSpace,
            0x40 => PrimitiveType::Bytes,
            0x60 => PrimitiveType::String,
            0x62 => PrimitiveType::NamespacePath,
            0x63 => PrimitiveType::ClassPath,
            0x64 => PrimitiveType::ClassName,
            0x65 => PrimitiveType::MethodName,
            0x66 => PrimitiveType::VariableName,
            other => PrimitiveType::Unknown(other),
        }
    }

    /// The raw tag byte stored in a header.
    pub const fn to_raw(self) -> u8 {
        match self {
            PrimitiveType::Void => 0,
            PrimitiveType::Int => 1,
            PrimitiveType::Float => 2,
            PrimitiveType::Char => 3,
            PrimitiveType::Bool => 4,
            PrimitiveType::ClassHandle => 5,
            PrimitiveType::MethodHandle => 6,
            PrimitiveType::VariableHandle => 7,
            PrimitiveType::NamespaceHandle => 8,
            PrimitiveType::EmptySpace => 62,
            PrimitiveType::UnavailableSpace => 63,
            PrimitiveType::Bytes => 0x40,
            PrimitiveType::String => 0x60,
            PrimitiveType::NamespacePath => 0x62,
            PrimitiveType::ClassPath => 0x63,
            PrimitiveType::ClassName => 0x64,
            PrimitiveType::MethodName => 0x65,
            PrimitiveType::VariableName => 0x66,
            PrimitiveType::Unknown(other) => other,
        }
    }

    /// True for the byte-array family (bit 6).
    pub const fn is_bytes(self) -> bool {
        self.to_raw() & BYTES_BIT != 0
    }

    /// True for the string family (bits 6 and 5).
    pub const fn is_string(self) -> bool {
        self.to_raw() & STRING_BITS == STRING_BITS
    }
}

/// Errors raised by the slot codec and its typed accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// An accessor was pointed at a value with a different type tag.
    TypeMismatch {
        expected: PrimitiveType,
        found: PrimitiveType,
    },
    /// Fewer slots were available than the header layout requires.
    Truncated,
    /// An ordinal past the last value of a literal pool.
    OutOfRange { ordinal: u32 },
    /// A header declares a span that overruns its pool.
    PoolMismatch,
    /// A string payload that is not valid UTF-8.
    InvalidString,
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::TypeMismatch { expected, found } => {
                write!(f, "expected a {expected:?} value, found {found:?}")
            }
            SlotError::Truncated => write!(f, "not enough slots for the declared value"),
            SlotError::OutOfRange { ordinal } => {
                write!(f, "literal ordinal {ordinal} is out of range")
            }
            SlotError::PoolMismatch => write!(f, "value header overruns its slot array"),
            SlotError::InvalidString => write!(f, "string payload is not valid UTF-8"),
        }
    }
}

impl StdError for SlotError {}

/// Decoded form of the one- or two-word header preceding every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectHeader {
    /// A primitive value: type tag plus payload byte size.
    Primitive { format: PrimitiveType, size: u64 },
    /// A heap object: byte size, identity hash, flag bits and class index.
    Object {
        size: u64,
        hash: u32,
        class_index: u32,
        flags: u8,
    },
}

impl ObjectHeader {
    /// Build a primitive header.
    pub const fn primitive(format: PrimitiveType, size: u64) -> Self {
        ObjectHeader::Primitive { format, size }
    }

    /// Build an object header; out-of-range hash/class-index bits are masked
    /// off exactly as the encoder would drop them.
    pub const fn object(size: u64, hash: u32, class_index: u32, flags: u8) -> Self {
        ObjectHeader::Object {
            size,
            hash: hash & HASH_MASK,
            class_index: class_index & CLASS_INDEX_MASK,
            flags,
        }
    }

    /// Decode the header at the start of `slots`.
    ///
    /// Needs one slot for the primitive and single-object forms, two for the
    /// double-object form; fails with `Truncated` otherwise.
    pub fn decode(slots: &[Slot]) -> Result<ObjectHeader, SlotError> {
        let first = *slots.first().ok_or(SlotError::Truncated)?;
        if first & OBJECT_BIT == 0 {
            return Ok(ObjectHeader::Primitive {
                format: PrimitiveType::from_raw((first >> 56) as u8),
                size: first & SIZE_MASK,
            });
        }
        if first >> 56 == DOUBLE_MARK {
            let second = *slots.get(1).ok_or(SlotError::Truncated)?;
            Ok(ObjectHeader::Object {
                size: first & SIZE_MASK,
                hash: ((second >> 32) as u32) & HASH_MASK,
                class_index: (second as u32) & CLASS_INDEX_MASK,
                flags: (second >> 24) as u8,
            })
        } else {
            Ok(ObjectHeader::Object {
                size: (first >> 56) & 0x7F,
                hash: ((first >> 32) as u32) & HASH_MASK,
                class_index: (first as u32) & CLASS_INDEX_MASK,
                flags: (first >> 24) as u8,
            })
        }
    }

    /// Append the encoded header (one or two words) to `out`.
    pub fn encode_into(&self, out: &mut Vec<Slot>) {
        match *self {
            ObjectHeader::Primitive { format, size } => {
                out.push(((format.to_raw() as Slot) << 56) | (size & SIZE_MASK));
            }
            ObjectHeader::Object {
                size,
                hash,
                class_index,
                flags,
            } => {
                let tail_size = if self.is_double_header() {
                    out.push((DOUBLE_MARK << 56) | (size & SIZE_MASK));
                    DOUBLE_SIZE_SENTINEL
                } else {
                    size
                };
                out.push(
                    OBJECT_BIT
                        | (tail_size << 56)
                        | (((hash & HASH_MASK) as Slot) << 32)
                        | ((flags as Slot) << 24)
                        | (class_index & CLASS_INDEX_MASK) as Slot,
                );
            }
        }
    }

    pub const fn is_primitive(&self) -> bool {
        matches!(self, ObjectHeader::Primitive { .. })
    }

    pub const fn is_double_header(&self) -> bool {
        matches!(self, ObjectHeader::Object { size, .. } if *size >= DOUBLE_HEADER_THRESHOLD)
    }

    /// The primitive type tag; object headers report `Void`.
    pub const fn format(&self) -> PrimitiveType {
        match self {
            ObjectHeader::Primitive { format, .. } => *format,
            ObjectHeader::Object { .. } => PrimitiveType::Void,
        }
    }

    /// Payload size in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            ObjectHeader::Primitive { size, .. } | ObjectHeader::Object { size, .. } => *size,
        }
    }

    pub const fn hash(&self) -> u32 {
        match self {
            ObjectHeader::Primitive { .. } => 0,
            ObjectHeader::Object { hash, .. } => *hash,
        }
    }

    pub const fn class_index(&self) -> u32 {
        match self {
            ObjectHeader::Primitive { .. } => 0,
            ObjectHeader::Object { class_index, .. } => *class_index,
        }
    }

    pub const fn flags(&self) -> u8 {
        match self {
            ObjectHeader::Primitive { .. } => 0,
            ObjectHeader::Object { flags, .. } => *flags,
        }
    }

    pub const fn is_bytes(&self) -> bool {
        self.is_primitive() && self.format().is_bytes()
    }

    pub const fn is_string(&self) -> bool {
        self.is_primitive() && self.format().is_string()
    }

    pub fn is_empty_space(&self) -> bool {
        self.is_primitive() && self.format() == PrimitiveType::EmptySpace
    }

    pub fn is_unavailable_space(&self) -> bool {
        self.is_primitive() && self.format() == PrimitiveType::UnavailableSpace
    }

    /// Number of header words (1 or 2).
    pub const fn header_words(&self) -> u64 {
        if self.is_double_header() {
            2
        } else {
            1
        }
    }

    /// Payload size in whole slots.
    pub const fn slot_size(&self) -> u64 {
        (self.size() + (SLOT_BYTES - 1)) / SLOT_BYTES
    }

    /// Full span of the tagged value, header included.
    pub const fn slot_size_with_header(&self) -> u64 {
        self.header_words() + self.slot_size()
    }
}

/// Advance past the tagged value at the start of `slots`, returning the rest.
pub fn next_value(slots: &[Slot]) -> Result<&[Slot], SlotError> {
    let header = ObjectHeader::decode(slots)?;
    let span = header.slot_size_with_header() as usize;
    slots.get(span..).ok_or(SlotError::PoolMismatch)
}

fn expect_format(header: ObjectHeader, expected: PrimitiveType) -> Result<(), SlotError> {
    if header.format() == expected {
        Ok(())
    } else {
        Err(SlotError::TypeMismatch {
            expected,
            found: header.format(),
        })
    }
}

fn payload(value: &[Slot], header: ObjectHeader) -> Result<&[Slot], SlotError> {
    let words = header.header_words() as usize;
    let payload = value.get(words..).ok_or(SlotError::Truncated)?;
    if (payload.len() as u64) < header.slot_size() {
        return Err(SlotError::Truncated);
    }
    Ok(payload)
}

// ---- numeric payloads ----
//
// Numbers occupy one full slot with no further encoding; floats are stored
// as their raw bit pattern.

pub fn get_int(payload: &[Slot]) -> Result<i64, SlotError> {
    payload
        .first()
        .map(|slot| *slot as i64)
        .ok_or(SlotError::Truncated)
}

pub fn put_int(out: &mut Vec<Slot>, number: i64) {
    out.push(number as Slot);
}

pub fn get_float(payload: &[Slot]) -> Result<f64, SlotError> {
    payload
        .first()
        .map(|slot| f64::from_bits(*slot))
        .ok_or(SlotError::Truncated)
}

pub fn put_float(out: &mut Vec<Slot>, number: f64) {
    out.push(number.to_bits());
}

pub fn get_char(payload: &[Slot]) -> Result<u8, SlotError> {
    payload
        .first()
        .map(|slot| (*slot & 0xFF) as u8)
        .ok_or(SlotError::Truncated)
}

pub fn put_char(out: &mut Vec<Slot>, character: u8) {
    out.push(character as Slot);
}

pub fn get_bool(payload: &[Slot]) -> Result<bool, SlotError> {
    payload
        .first()
        .map(|slot| *slot != 0)
        .ok_or(SlotError::Truncated)
}

pub fn put_bool(out: &mut Vec<Slot>, boolean: bool) {
    out.push(Slot::from(boolean));
}

// ---- tagged accessors ----
//
// The unsloted variants operate on a whole tagged value (header first) and
// verify the header's tag before touching the payload.

pub fn get_unsloted_int(value: &[Slot]) -> Result<i64, SlotError> {
    let header = ObjectHeader::decode(value)?;
    expect_format(header, PrimitiveType::Int)?;
    get_int(payload(value, header)?)
}

pub fn put_unsloted_int(out: &mut Vec<Slot>, number: i64) {
    ObjectHeader::primitive(PrimitiveType::Int, SLOT_BYTES).encode_into(out);
    put_int(out, number);
}

pub fn get_unsloted_float(value: &[Slot]) -> Result<f64, SlotError> {
    let header = ObjectHeader::decode(value)?;
    expect_format(header, PrimitiveType::Float)?;
    get_float(payload(value, header)?)
}

pub fn put_unsloted_float(out: &mut Vec<Slot>, number: f64) {
    ObjectHeader::primitive(PrimitiveType::Float, SLOT_BYTES).encode_into(out);
    put_float(out, number);
}

pub fn get_unsloted_char(value: &[Slot]) -> Result<u8, SlotError> {
    let header = ObjectHeader::decode(value)?;
    expect_format(header, PrimitiveType::Char)?;
    get_char(payload(value, header)?)
}

pub fn put_unsloted_char(out: &mut Vec<Slot>, character: u8) {
    ObjectHeader::primitive(PrimitiveType::Char, SLOT_BYTES).encode_into(out);
    put_char(out, character);
}

pub fn get_unsloted_bool(value: &[Slot]) -> Result<bool, SlotError> {
    let header = ObjectHeader::decode(value)?;
    expect_format(header, PrimitiveType::Bool)?;
    get_bool(payload(value, header)?)
}

pub fn put_unsloted_bool(out: &mut Vec<Slot>, boolean: bool) {
    ObjectHeader::primitive(PrimitiveType::Bool, SLOT_BYTES).encode_into(out);
    put_bool(out, boolean);
}

// ---- byte and string payloads ----
//
// Byte payloads live in the slot array in memory order, zero-padded to a
// slot boundary, so a read-only view needs no copy.

/// Borrow the byte payload of a bytes-family value without copying.
pub fn unsloted_bytes(value: &[Slot]) -> Result<&[u8], SlotError> {
    let header = ObjectHeader::decode(value)?;
    if !header.is_bytes() {
        return Err(SlotError::TypeMismatch {
            expected: PrimitiveType::Bytes,
            found: header.format(),
        });
    }
    let payload = payload(value, header)?;
    // The payload words store the bytes contiguously in memory order and the
    // length was bounds-checked against them above.
    let bytes =
        unsafe { std::slice::from_raw_parts(payload.as_ptr().cast::<u8>(), header.size() as usize) };
    Ok(bytes)
}

/// Copy the byte payload of a bytes-family value.
pub fn copy_unsloted_bytes(value: &[Slot]) -> Result<Vec<u8>, SlotError> {
    unsloted_bytes(value).map(<[u8]>::to_vec)
}

/// Copy the payload of a string-family value into an owned `String`.
pub fn copy_unsloted_string(value: &[Slot]) -> Result<String, SlotError> {
    let header = ObjectHeader::decode(value)?;
    if !header.is_string() {
        return Err(SlotError::TypeMismatch {
            expected: PrimitiveType::String,
            found: header.format(),
        });
    }
    let bytes = unsloted_bytes(value)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| SlotError::InvalidString)
}

fn put_byte_payload(out: &mut Vec<Slot>, bytes: &[u8]) {
    for chunk in bytes.chunks(SLOT_BYTES as usize) {
        let mut word = [0u8; SLOT_BYTES as usize];
        word[..chunk.len()].copy_from_slice(chunk);
        out.push(Slot::from_ne_bytes(word));
    }
}

pub fn put_unsloted_bytes(out: &mut Vec<Slot>, bytes: &[u8]) {
    ObjectHeader::primitive(PrimitiveType::Bytes, bytes.len() as u64).encode_into(out);
    put_byte_payload(out, bytes);
}

/// Append a string value under a specific string-family tag.
pub fn put_unsloted_string_as(out: &mut Vec<Slot>, format: PrimitiveType, string: &str) {
    debug_assert!(format.is_string());
    ObjectHeader::primitive(format, string.len() as u64).encode_into(out);
    put_byte_payload(out, string.as_bytes());
}

pub fn put_unsloted_string(out: &mut Vec<Slot>, string: &str) {
    put_unsloted_string_as(out, PrimitiveType::String, string);
}
