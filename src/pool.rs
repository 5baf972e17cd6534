//! The literal pool: an ordinally indexed sequence of tagged values.
//!
//! Values are addressed by ordinal, not byte offset; resolving ordinal `i`
//! walks the pool from the start, summing each value's full slot span.

use crate::slot::{self, ObjectHeader, PrimitiveType, Slot, SlotError};

/// A contiguous slot array holding a sequence of tagged values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteralPool {
    slots: Vec<Slot>,
    values: u32,
}

impl LiteralPool {
    pub fn new() -> Self {
        LiteralPool::default()
    }

    /// Adopt a raw slot array, validating that it is a well-formed sequence
    /// of tagged values.
    pub fn from_slots(slots: Vec<Slot>) -> Result<Self, SlotError> {
        let mut values = 0u32;
        let mut rest: &[Slot] = &slots;
        while !rest.is_empty() {
            rest = slot::next_value(rest)?;
            values += 1;
        }
        Ok(LiteralPool { slots, values })
    }

    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn value_count(&self) -> u32 {
        self.values
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn as_slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.values = 0;
    }

    /// Resolve a value by ordinal, returning its tagged slot span
    /// (header first). Walks sequentially from the start of the pool.
    pub fn at(&self, ordinal: u32) -> Result<&[Slot], SlotError> {
        let mut remaining = ordinal;
        for value in self.values() {
            let (_, value) = value?;
            if remaining == 0 {
                return Ok(value);
            }
            remaining -= 1;
        }
        Err(SlotError::OutOfRange { ordinal })
    }

    /// Iterate the tagged values in order.
    pub fn values(&self) -> Values<'_> {
        Values { rest: &self.slots }
    }

    // ---- builders ----
    //
    // Each push appends one tagged value and returns its ordinal.

    pub fn push_int(&mut self, number: i64) -> u32 {
        slot::put_unsloted_int(&mut self.slots, number);
        self.bump()
    }

    pub fn push_float(&mut self, number: f64) -> u32 {
        slot::put_unsloted_float(&mut self.slots, number);
        self.bump()
    }

    pub fn push_char(&mut self, character: u8) -> u32 {
        slot::put_unsloted_char(&mut self.slots, character);
        self.bump()
    }

    pub fn push_bool(&mut self, boolean: bool) -> u32 {
        slot::put_unsloted_bool(&mut self.slots, boolean);
        self.bump()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> u32 {
        slot::put_unsloted_bytes(&mut self.slots, bytes);
        self.bump()
    }

    pub fn push_string(&mut self, format: PrimitiveType, string: &str) -> u32 {
        slot::put_unsloted_string_as(&mut self.slots, format, string);
        self.bump()
    }

    fn bump(&mut self) -> u32 {
        let ordinal = self.values;
        self.values += 1;
        ordinal
    }
}

/// Iterator over the tagged values of a pool.
pub struct Values<'a> {
    rest: &'a [Slot],
}

impl<'a> Iterator for Values<'a> {
    type Item = Result<(ObjectHeader, &'a [Slot]), SlotError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let header = match ObjectHeader::decode(self.rest) {
            Ok(header) => header,
            Err(err) => {
                self.rest = &[];
                return Some(Err(err));
            }
        };
        let span = header.slot_size_with_header() as usize;
        if span > self.rest.len() {
            self.rest = &[];
            return Some(Err(SlotError::PoolMismatch));
        }
        let (value, rest) = self.rest.split_at(span);
        self.rest = rest;
        Some(Ok((header, value)))
    }
}
