//! Bit-field extraction
//!
//! Extracts typed sub-fields from the 32-bit operand words of an event. The
//! field position is a byte offset whose meaning depends on the byte order:
//!
//! - Little-endian: offset 0 is the least significant byte of the word
//! - Big-endian: offset 0 is the most significant byte of the word
//!
//! A big-endian field therefore reads the same bytes a big-endian target
//! would have stored at that offset of a blob payload.

use crate::schema::{ByteOrder, IntegerType};

/// Width of the source word in bytes
pub const WORD_BYTES: u32 = 4;

/// Sub-field extractor over 32-bit source words
pub struct BitFieldExtractor;

impl BitFieldExtractor {
    /// Extract a field of `integer_type` at byte `offset` of `word`
    ///
    /// Returns `None` if the field does not fit inside the word.
    pub fn extract(word: u32, offset: u32, integer_type: IntegerType, order: ByteOrder) -> Option<i64> {
        let width = integer_type.width();
        if offset.checked_add(width)? > WORD_BYTES {
            return None;
        }

        let shift = match order {
            ByteOrder::LittleEndian => offset * 8,
            ByteOrder::BigEndian => (WORD_BYTES - offset - width) * 8,
        };
        let bits = (width * 8) as usize;
        let raw = ((word as u64) >> shift) & Self::mask(bits);

        if integer_type.is_signed() {
            Some(Self::sign_extend(raw, bits))
        } else {
            Some(raw as i64)
        }
    }

    fn mask(bits: usize) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Sign-extend a value from N bits to 64 bits
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}
