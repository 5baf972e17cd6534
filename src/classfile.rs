//! The binary class-file document.
//!
//! Layout (big-endian throughout): magic, two-part version, literal pool
//! (slot count + tagged values), the class descriptor, the method and
//! variable descriptor lists, and the raw bytecode blob. `input` and
//! `output` are mutual inverses over this layout.

use crate::path::PathError;
use crate::pool::LiteralPool;
use crate::slot::{self, ObjectHeader, PrimitiveType, Slot, SlotError};
use crate::stream::{self, StreamError};
use log::{debug, warn};
use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Read, Write};

/// Magic number opening every class file (`b"MANT"`).
pub const MAGIC: u32 = 0x4D41_4E54;
pub const MAJOR_VERSION: u16 = 0;
pub const MINOR_VERSION: u16 = 1;

/// Marker for a descriptor field with no literal assigned.
pub const NO_INDEX: u32 = u32::MAX;

/// Bits of the 16-bit descriptor flag word.
pub mod flags {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const ABSTRACT: u16 = 0x0020;
}

/// The single failure category reported for a malformed, truncated or
/// otherwise unloadable class file.
#[derive(Debug)]
pub enum ClassLoadError {
    /// The stream ended before the class was fully loaded.
    Truncated,
    /// The underlying transport failed mid-load.
    Stream(io::Error),
    /// Declared sizes or headers inconsistent with the actual content.
    Malformed(String),
    /// A namespace or class-name literal failed grammar validation.
    InvalidPath(PathError),
    /// A literal referenced by a descriptor has the wrong shape.
    BadLiteral(SlotError),
    /// A class with this name already exists in the target namespace.
    DuplicateClass(String),
    /// The namespace tree rejected the link step.
    Namespace(crate::namespace::NamespaceError),
}

impl fmt::Display for ClassLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLoadError::Truncated => {
                write!(f, "reached end of stream before the class was fully loaded")
            }
            ClassLoadError::Stream(err) => {
                write!(f, "stream failure while loading class: {err}")
            }
            ClassLoadError::Malformed(msg) => write!(f, "malformed class file: {msg}"),
            ClassLoadError::InvalidPath(err) => write!(f, "{err}"),
            ClassLoadError::BadLiteral(err) => write!(f, "bad literal: {err}"),
            ClassLoadError::DuplicateClass(name) => {
                write!(
                    f,
                    "a class named {name:?} already exists in the same namespace"
                )
            }
            ClassLoadError::Namespace(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for ClassLoadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ClassLoadError::Stream(err) => Some(err),
            ClassLoadError::InvalidPath(err) => Some(err),
            ClassLoadError::BadLiteral(err) => Some(err),
            ClassLoadError::Namespace(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StreamError> for ClassLoadError {
    fn from(value: StreamError) -> Self {
        match value {
            StreamError::EndOfStream => ClassLoadError::Truncated,
            StreamError::Io(err) => ClassLoadError::Stream(err),
        }
    }
}

impl From<SlotError> for ClassLoadError {
    fn from(value: SlotError) -> Self {
        ClassLoadError::BadLiteral(value)
    }
}

impl From<PathError> for ClassLoadError {
    fn from(value: PathError) -> Self {
        ClassLoadError::InvalidPath(value)
    }
}

impl From<crate::namespace::NamespaceError> for ClassLoadError {
    fn from(value: crate::namespace::NamespaceError) -> Self {
        ClassLoadError::Namespace(value)
    }
}

/// Annex attached to a class, method or variable descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Unrecognized or payload-free attribute.
    Generic,
    /// A literal-pool ordinal holding the descriptor's constant value.
    ConstantValue { value_index: u32 },
    /// Location and stack bound of a method's bytecode.
    Code {
        code_start: u32,
        code_length: u32,
        max_stack: u16,
    },
}

impl Attribute {
    /// Wire tag of this variant.
    pub const fn type_tag(&self) -> u32 {
        match self {
            Attribute::Generic => 0,
            Attribute::ConstantValue { .. } => 1,
            Attribute::Code { .. } => 2,
        }
    }

    /// Declared byte span of the whole triple: 8 bytes of tag+size plus the
    /// variant payload.
    pub const fn wire_size(&self) -> u32 {
        match self {
            Attribute::Generic => 8,
            Attribute::ConstantValue { .. } => 12,
            Attribute::Code { .. } => 18,
        }
    }
}

const ATTRIBUTE_SIZE_MISMATCH: &str = "attribute sizes do not match";

fn input_attributes(stream: &mut impl Read) -> Result<Vec<Attribute>, ClassLoadError> {
    let total = stream::read_u32(stream)?;
    let mut attributes = Vec::new();
    let mut consumed = 0u32;
    while consumed < total {
        if total - consumed < 8 {
            return Err(ClassLoadError::Malformed(ATTRIBUTE_SIZE_MISMATCH.into()));
        }
        let tag = stream::read_u32(stream)?;
        let size = stream::read_u32(stream)?;
        if size < 8 || consumed.checked_add(size).map_or(true, |end| end > total) {
            return Err(ClassLoadError::Malformed(ATTRIBUTE_SIZE_MISMATCH.into()));
        }
        let attribute = match tag {
            1 => Attribute::ConstantValue {
                value_index: stream::read_u32(stream)?,
            },
            2 => Attribute::Code {
                code_start: stream::read_u32(stream)?,
                code_length: stream::read_u32(stream)?,
                max_stack: stream::read_u16(stream)?,
            },
            // Unknown tags are kept as Generic; their declared span still
            // counts against the block total, but no payload is decoded.
            _ => Attribute::Generic,
        };
        attributes.push(attribute);
        consumed += size;
    }
    Ok(attributes)
}

fn output_attributes(
    stream: &mut impl Write,
    attributes: &[Attribute],
) -> Result<(), ClassLoadError> {
    let total: u32 = attributes.iter().map(Attribute::wire_size).sum();
    stream::write_u32(stream, total)?;
    for attribute in attributes {
        stream::write_u32(stream, attribute.type_tag())?;
        stream::write_u32(stream, attribute.wire_size())?;
        match *attribute {
            Attribute::Generic => {}
            Attribute::ConstantValue { value_index } => {
                stream::write_u32(stream, value_index)?;
            }
            Attribute::Code {
                code_start,
                code_length,
                max_stack,
            } => {
                stream::write_u32(stream, code_start)?;
                stream::write_u32(stream, code_length)?;
                stream::write_u16(stream, max_stack)?;
            }
        }
    }
    Ok(())
}

/// The class descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFormat {
    pub flags: u16,
    /// Literal ordinal of the class name (a `ClassName` string).
    pub name_index: u32,
    /// Literal ordinal of the owning namespace path (a `NamespacePath` string).
    pub namespace_index: u32,
    /// Literal ordinal of the superclass path (a `ClassPath` string).
    pub superclass_index: u32,
    pub indexable: bool,
    pub primitive: bool,
    pub indexed_slot_size: u8,
    pub primitive_type: PrimitiveType,
    pub attributes: Vec<Attribute>,
}

impl Default for ClassFormat {
    fn default() -> Self {
        ClassFormat {
            flags: 0,
            name_index: NO_INDEX,
            namespace_index: NO_INDEX,
            superclass_index: NO_INDEX,
            indexable: false,
            primitive: false,
            indexed_slot_size: slot::SLOT_BYTES as u8,
            primitive_type: PrimitiveType::Void,
            attributes: Vec::new(),
        }
    }
}

impl ClassFormat {
    fn input(stream: &mut impl Read) -> Result<Self, ClassLoadError> {
        Ok(ClassFormat {
            flags: stream::read_u16(stream)?,
            name_index: stream::read_u32(stream)?,
            namespace_index: stream::read_u32(stream)?,
            superclass_index: stream::read_u32(stream)?,
            indexable: stream::read_u8(stream)? != 0,
            primitive: stream::read_u8(stream)? != 0,
            indexed_slot_size: stream::read_u8(stream)?,
            primitive_type: PrimitiveType::from_raw(stream::read_u8(stream)?),
            attributes: input_attributes(stream)?,
        })
    }

    fn output(&self, stream: &mut impl Write) -> Result<(), ClassLoadError> {
        stream::write_u16(stream, self.flags)?;
        stream::write_u32(stream, self.name_index)?;
        stream::write_u32(stream, self.namespace_index)?;
        stream::write_u32(stream, self.superclass_index)?;
        stream::write_u8(stream, u8::from(self.indexable))?;
        stream::write_u8(stream, u8::from(self.primitive))?;
        stream::write_u8(stream, self.indexed_slot_size)?;
        stream::write_u8(stream, self.primitive_type.to_raw())?;
        output_attributes(stream, &self.attributes)
    }
}

/// A method descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodFormat {
    pub flags: u16,
    /// Literal ordinal of the method name (a `MethodName` string).
    pub name_index: u32,
    /// Literal ordinal of the return type path (a `ClassPath` string).
    pub return_type_index: u32,
    /// Literal ordinals of the argument type paths, in argument order.
    pub argument_type_indexes: Vec<u32>,
    pub attributes: Vec<Attribute>,
}

impl Default for MethodFormat {
    fn default() -> Self {
        MethodFormat {
            flags: 0,
            name_index: NO_INDEX,
            return_type_index: NO_INDEX,
            argument_type_indexes: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

impl MethodFormat {
    pub fn argument_count(&self) -> u16 {
        self.argument_type_indexes.len() as u16
    }

    pub fn argument_type_index(&self, argument: u16) -> Option<u32> {
        self.argument_type_indexes.get(argument as usize).copied()
    }

    fn input(stream: &mut impl Read) -> Result<Self, ClassLoadError> {
        let flags = stream::read_u16(stream)?;
        let name_index = stream::read_u32(stream)?;
        let return_type_index = stream::read_u32(stream)?;

        let argument_count = stream::read_u16(stream)?;
        let mut argument_type_indexes = Vec::with_capacity(argument_count as usize);
        for _ in 0..argument_count {
            argument_type_indexes.push(stream::read_u32(stream)?);
        }

        Ok(MethodFormat {
            flags,
            name_index,
            return_type_index,
            argument_type_indexes,
            attributes: input_attributes(stream)?,
        })
    }

    fn output(&self, stream: &mut impl Write) -> Result<(), ClassLoadError> {
        stream::write_u16(stream, self.flags)?;
        stream::write_u32(stream, self.name_index)?;
        stream::write_u32(stream, self.return_type_index)?;
        stream::write_u16(stream, self.argument_count())?;
        for index in &self.argument_type_indexes {
            stream::write_u32(stream, *index)?;
        }
        output_attributes(stream, &self.attributes)
    }
}

/// A variable descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableFormat {
    pub flags: u16,
    /// Literal ordinal of the variable name (a `VariableName` string).
    pub name_index: u32,
    /// Literal ordinal of the variable type path (a `ClassPath` string).
    pub type_index: u32,
    pub attributes: Vec<Attribute>,
}

impl Default for VariableFormat {
    fn default() -> Self {
        VariableFormat {
            flags: 0,
            name_index: NO_INDEX,
            type_index: NO_INDEX,
            attributes: Vec::new(),
        }
    }
}

impl VariableFormat {
    fn input(stream: &mut impl Read) -> Result<Self, ClassLoadError> {
        Ok(VariableFormat {
            flags: stream::read_u16(stream)?,
            name_index: stream::read_u32(stream)?,
            type_index: stream::read_u32(stream)?,
            attributes: input_attributes(stream)?,
        })
    }

    fn output(&self, stream: &mut impl Write) -> Result<(), ClassLoadError> {
        stream::write_u16(stream, self.flags)?;
        stream::write_u32(stream, self.name_index)?;
        stream::write_u32(stream, self.type_index)?;
        output_attributes(stream, &self.attributes)
    }
}

/// One compiled class: literal pool, descriptors and bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub magic: u32,
    pub version: [u16; 2],
    pub literals: LiteralPool,
    pub class_format: ClassFormat,
    pub methods: Vec<MethodFormat>,
    pub variables: Vec<VariableFormat>,
    pub bytecode: Vec<u8>,
}

impl Default for ClassFile {
    fn default() -> Self {
        ClassFile::new()
    }
}

impl ClassFile {
    pub fn new() -> Self {
        ClassFile {
            magic: MAGIC,
            version: [MAJOR_VERSION, MINOR_VERSION],
            literals: LiteralPool::new(),
            class_format: ClassFormat::default(),
            methods: Vec::new(),
            variables: Vec::new(),
            bytecode: Vec::new(),
        }
    }

    /// Drop the literal pool, descriptors and bytecode.
    pub fn clear(&mut self) {
        self.literals.clear();
        self.class_format = ClassFormat::default();
        self.methods.clear();
        self.variables.clear();
        self.bytecode.clear();
    }

    /// The tagged literal value at `index`.
    pub fn literal(&self, index: u32) -> Result<&[Slot], SlotError> {
        self.literals.at(index)
    }

    /// The string literal at `index`.
    pub fn literal_string(&self, index: u32) -> Result<String, SlotError> {
        slot::copy_unsloted_string(self.literals.at(index)?)
    }

    /// Reset this instance and load it from the stream.
    pub fn input(&mut self, stream: &mut impl Read) -> Result<(), ClassLoadError> {
        self.clear();

        self.magic = stream::read_u32(stream)?;
        if self.magic != MAGIC {
            warn!("class file magic {:#010x} does not match {:#010x}", self.magic, MAGIC);
        }
        self.version = [stream::read_u16(stream)?, stream::read_u16(stream)?];
        let literal_slots = stream::read_u32(stream)?;
        let _reserved = stream::read_u32(stream)?;

        self.literals = input_literals(stream, literal_slots)?;
        self.class_format = ClassFormat::input(stream)?;

        let method_count = stream::read_u16(stream)?;
        for _ in 0..method_count {
            self.methods.push(MethodFormat::input(stream)?);
        }

        let variable_count = stream::read_u16(stream)?;
        for _ in 0..variable_count {
            self.variables.push(VariableFormat::input(stream)?);
        }

        let bytecode_size = stream::read_u32(stream)?;
        self.bytecode = vec![0u8; bytecode_size as usize];
        stream::read_bytes(stream, &mut self.bytecode)?;

        debug!(
            "read class file: {} literal slots, {} methods, {} variables, {} bytecode bytes",
            self.literals.slot_count(),
            self.methods.len(),
            self.variables.len(),
            self.bytecode.len()
        );
        Ok(())
    }

    /// Write this instance to the stream, the exact inverse of `input`.
    pub fn output(&self, stream: &mut impl Write) -> Result<(), ClassLoadError> {
        stream::write_u32(stream, self.magic)?;
        stream::write_u16(stream, self.version[0])?;
        stream::write_u16(stream, self.version[1])?;
        stream::write_u32(stream, self.literals.slot_count())?;
        stream::write_u32(stream, 0)?;

        output_literals(stream, &self.literals)?;
        self.class_format.output(stream)?;

        stream::write_u16(stream, self.methods.len() as u16)?;
        for method in &self.methods {
            method.output(stream)?;
        }

        stream::write_u16(stream, self.variables.len() as u16)?;
        for variable in &self.variables {
            variable.output(stream)?;
        }

        stream::write_u32(stream, self.bytecode.len() as u32)?;
        stream::write_bytes(stream, &self.bytecode)?;
        Ok(())
    }
}

const POOL_SIZE_MISMATCH: &str = "literal pool size and headers do not match";

fn input_literals(
    stream: &mut impl Read,
    declared_slots: u32,
) -> Result<LiteralPool, ClassLoadError> {
    let mut slots: Vec<Slot> = Vec::with_capacity(declared_slots as usize);
    while (slots.len() as u32) < declared_slots {
        let value_start = slots.len() as u64;
        let lead = stream::read_u64(stream)?;
        slots.push(lead);
        // The two-word header form carries its byte size in the first word
        // and hash/flags/class index in a second.
        if lead >> 56 == 0xFF {
            slots.push(stream::read_u64(stream)?);
        }

        let header = ObjectHeader::decode(&slots[value_start as usize..])?;
        if value_start + header.slot_size_with_header() > declared_slots as u64 {
            return Err(ClassLoadError::Malformed(POOL_SIZE_MISMATCH.into()));
        }

        if header.is_bytes() {
            // Byte payloads travel as raw memory-order chunks.
            for _ in 0..header.slot_size() {
                let mut chunk = [0u8; slot::SLOT_BYTES as usize];
                stream::read_bytes(stream, &mut chunk)?;
                slots.push(Slot::from_ne_bytes(chunk));
            }
        } else {
            for _ in 0..header.slot_size() {
                slots.push(stream::read_u64(stream)?);
            }
        }
    }
    Ok(LiteralPool::from_slots(slots)?)
}

fn output_literals(stream: &mut impl Write, pool: &LiteralPool) -> Result<(), ClassLoadError> {
    for value in pool.values() {
        let (header, value) =
            value.map_err(|_| ClassLoadError::Malformed(POOL_SIZE_MISMATCH.into()))?;
        let words = header.header_words() as usize;
        for word in &value[..words] {
            stream::write_u64(stream, *word)?;
        }
        if header.is_bytes() {
            for word in &value[words..] {
                stream::write_bytes(stream, &word.to_ne_bytes())?;
            }
        } else {
            for word in &value[words..] {
                stream::write_u64(stream, *word)?;
            }
        }
    }
    Ok(())
}
