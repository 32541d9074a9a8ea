//! Byte cursor and primitive reads for the binary format.
//!
//! Every primitive advances the cursor and yields a value or an [`Error`]
//! carrying the byte offset of the failing position. LEB128 reads enforce
//! the canonical encoding: a group count past the maximum is "LEB128 too
//! long", and spare bits in the final group that disagree with the value's
//! width (or sign extension) are "Invalid LEB128 encoding".

use crate::error::Error;
use crate::features::Features;
use crate::location::Span;
use byteorder::{ByteOrder, LittleEndian};

pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Offset of `bytes[0]` within the whole input, so nested cursors report
    /// absolute positions.
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
        }
    }

    /// A cursor over a sub-slice, reporting positions relative to the
    /// original input.
    pub fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self { bytes, pos: 0, base }
    }

    /// Absolute offset of the next byte.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.base + self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    /// A zero-length span at the current position.
    #[must_use]
    pub fn here(&self) -> Span {
        Span::bytes(self.pos(), self.pos())
    }

    /// A span from an earlier absolute position to the current one.
    #[must_use]
    pub fn span_from(&self, start: usize) -> Span {
        Span::bytes(start, self.pos())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error {
            span: self.here(),
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        if len > self.remaining() {
            return Err(self.error("Unexpected end of section or input"));
        }
        self.pos += len;
        Ok(())
    }

    #[must_use]
    pub fn peek_u8(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        match self.bytes.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                Ok(byte)
            }
            None => Err(self.error("Unable to read u8: unexpected end of input")),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(self.error(format!(
                "Unable to read {} bytes: only {} remaining",
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    // ------------------------------------------------------------------
    // LEB128
    // ------------------------------------------------------------------

    fn read_unsigned_leb(&mut self, bits: u32) -> Result<u64, Error> {
        let max_bytes = (bits + 6) / 7;
        let mut result: u64 = 0;
        for i in 0..max_bytes {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                if i + 1 == max_bytes {
                    // Spare bits of the final group must be zero.
                    let used = bits - 7 * (max_bytes - 1);
                    if used < 7 && byte >> used != 0 {
                        return Err(self.error("Invalid LEB128 encoding"));
                    }
                }
                return Ok(result);
            }
        }
        Err(self.error("LEB128 too long"))
    }

    fn read_signed_leb(&mut self, bits: u32) -> Result<i64, Error> {
        let max_bytes = (bits + 6) / 7;
        let mut result: i64 = 0;
        let mut shift = 0u32;
        for i in 0..max_bytes {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7f) as i64) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                if i + 1 == max_bytes {
                    // Spare bits of the final group must extend the sign.
                    let used = bits - 7 * (max_bytes - 1);
                    if used < 7 {
                        let spare = byte >> (used - 1) & (0x7f >> (used - 1));
                        let all = 0x7fu8 >> (used - 1);
                        if spare != 0 && spare != all {
                            return Err(self.error("Invalid LEB128 encoding"));
                        }
                    }
                }
                return Ok(result);
            }
        }
        Err(self.error("LEB128 too long"))
    }

    pub fn read_u32_leb(&mut self) -> Result<u32, Error> {
        self.read_unsigned_leb(32).map(|v| v as u32)
    }

    pub fn read_u64_leb(&mut self) -> Result<u64, Error> {
        self.read_unsigned_leb(64)
    }

    pub fn read_s32_leb(&mut self) -> Result<i32, Error> {
        self.read_signed_leb(32).map(|v| v as i32)
    }

    /// Signed 33-bit integer, used by block types.
    pub fn read_s33_leb(&mut self) -> Result<i64, Error> {
        self.read_signed_leb(33)
    }

    pub fn read_s64_leb(&mut self) -> Result<i64, Error> {
        self.read_signed_leb(64)
    }

    // ------------------------------------------------------------------
    // Fixed-width values
    // ------------------------------------------------------------------

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        let bytes = self.read_bytes(4)?;
        Ok(LittleEndian::read_f32(bytes))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        let bytes = self.read_bytes(8)?;
        Ok(LittleEndian::read_f64(bytes))
    }

    pub fn read_v128(&mut self) -> Result<[u8; 16], Error> {
        let bytes = self.read_bytes(16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Length-prefixed raw bytes. UTF-8 validation is the caller's choice.
    pub fn read_string(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_u32_leb()? as usize;
        self.read_bytes(len)
    }

    /// A vector count, bounded by the remaining data so corrupt counts fail
    /// fast instead of over-allocating.
    pub fn read_count(&mut self) -> Result<u32, Error> {
        let count = self.read_u32_leb()?;
        if count as usize > self.remaining() {
            return Err(self.error(format!(
                "Count of {} exceeds remaining section length {}",
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }

    /// The reserved immediate of call_indirect and pre-bulk-memory
    /// memory/table ops: must be zero, unless reference types relax it into
    /// a real index.
    pub fn read_reserved(&mut self, features: Features) -> Result<u32, Error> {
        let span = self.here();
        let value = self.read_u32_leb()?;
        if value != 0 && !features.reference_types_enabled() {
            return Err(Error {
                span,
                message: format!("Expected reserved byte 0, got {}", value),
                context: Vec::new(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(bytes: &[u8]) -> Cursor<'_> {
        Cursor::new(bytes)
    }

    #[test]
    fn read_u8_and_eof() {
        let mut c = cursor(&[0xab]);
        assert_eq!(c.read_u8().unwrap(), 0xab);
        assert!(c.read_u8().is_err());
    }

    #[test]
    fn read_u32_leb_values() {
        assert_eq!(cursor(&[0]).read_u32_leb().unwrap(), 0);
        assert_eq!(cursor(&[1]).read_u32_leb().unwrap(), 1);
        assert_eq!(cursor(&[0x7f]).read_u32_leb().unwrap(), 127);
        assert_eq!(cursor(&[0x80, 0x7f]).read_u32_leb().unwrap(), 16256);
        assert_eq!(
            cursor(&[0xe5, 0x8e, 0x26]).read_u32_leb().unwrap(),
            624485
        );
        assert_eq!(
            cursor(&[0xff, 0xff, 0xff, 0xff, 0x0f]).read_u32_leb().unwrap(),
            u32::MAX
        );
        assert_eq!(
            cursor(&[0x80, 0x80, 0x80, 0x80, 0x08]).read_u32_leb().unwrap(),
            0x80000000
        );
    }

    #[test]
    fn read_u32_leb_too_long() {
        // Six continuation groups: one past the 5-group limit.
        let err = cursor(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00])
            .read_u32_leb()
            .unwrap_err();
        assert_eq!(err.message, "LEB128 too long");
    }

    #[test]
    fn read_u32_leb_spare_bits() {
        // Fifth group may only carry 4 value bits.
        let err = cursor(&[0x80, 0x80, 0x80, 0x80, 0x10])
            .read_u32_leb()
            .unwrap_err();
        assert_eq!(err.message, "Invalid LEB128 encoding");
    }

    #[test]
    fn read_u64_leb_max() {
        assert_eq!(
            cursor(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01])
                .read_u64_leb()
                .unwrap(),
            u64::MAX
        );
        let err = cursor(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02])
            .read_u64_leb()
            .unwrap_err();
        assert_eq!(err.message, "Invalid LEB128 encoding");
    }

    #[test]
    fn read_s32_leb_values() {
        assert_eq!(cursor(&[0]).read_s32_leb().unwrap(), 0);
        assert_eq!(cursor(&[0x7f]).read_s32_leb().unwrap(), -1);
        assert_eq!(cursor(&[0x80, 0x7f]).read_s32_leb().unwrap(), -128);
        assert_eq!(
            cursor(&[0x9b, 0xf1, 0x59]).read_s32_leb().unwrap(),
            -624485
        );
        assert_eq!(
            cursor(&[0x80, 0x80, 0x80, 0x80, 0x78]).read_s32_leb().unwrap(),
            i32::MIN
        );
        assert_eq!(
            cursor(&[0xff, 0xff, 0xff, 0xff, 0x07]).read_s32_leb().unwrap(),
            i32::MAX
        );
    }

    #[test]
    fn read_s32_leb_spare_bits() {
        // Sign bits in the final group must agree.
        let err = cursor(&[0x80, 0x80, 0x80, 0x80, 0x38])
            .read_s32_leb()
            .unwrap_err();
        assert_eq!(err.message, "Invalid LEB128 encoding");
    }

    #[test]
    fn read_s64_leb_values() {
        assert_eq!(cursor(&[0x7f]).read_s64_leb().unwrap(), -1);
        assert_eq!(
            cursor(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7f])
                .read_s64_leb()
                .unwrap(),
            i64::MIN
        );
    }

    #[test]
    fn read_s33_leb_values() {
        assert_eq!(cursor(&[0x40]).read_s33_leb().unwrap(), -64);
        assert_eq!(cursor(&[0x2a]).read_s33_leb().unwrap(), 42);
        assert_eq!(
            cursor(&[0xff, 0xff, 0xff, 0xff, 0x0f]).read_s33_leb().unwrap(),
            0xffffffff
        );
    }

    #[test]
    fn read_floats() {
        let mut c = cursor(&[0, 0, 0x80, 0x3f]);
        assert_eq!(c.read_f32().unwrap(), 1.0);
        let mut c = cursor(&[0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
        assert_eq!(c.read_f64().unwrap(), 1.0);
        let mut c = cursor(&[0, 0, 0xc0, 0x7f]);
        assert!(c.read_f32().unwrap().is_nan());
    }

    #[test]
    fn read_v128_bytes() {
        let bytes: Vec<u8> = (0..16).collect();
        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_v128().unwrap(), <[u8; 16]>::try_from(&bytes[..]).unwrap());
    }

    #[test]
    fn read_string_length_prefixed() {
        let mut c = cursor(&[3, b'a', b'b', b'c', 0xff]);
        assert_eq!(c.read_string().unwrap(), b"abc");
        assert_eq!(c.pos(), 4);
    }

    #[test]
    fn read_string_out_of_bounds() {
        let mut c = cursor(&[5, b'a']);
        assert!(c.read_string().is_err());
    }

    #[test]
    fn read_count_bounded_by_remaining() {
        let mut c = cursor(&[0xff, 0x01]);
        assert!(c.read_count().is_err());
    }

    #[test]
    fn reserved_is_zero_without_reference_types() {
        assert_eq!(
            cursor(&[0x00]).read_reserved(Features::new()).unwrap(),
            0
        );
        let err = cursor(&[0x01]).read_reserved(Features::new()).unwrap_err();
        assert!(err.message.contains("Expected reserved byte 0"));

        let mut features = Features::new();
        features.enable_reference_types();
        assert_eq!(cursor(&[0x01]).read_reserved(features).unwrap(), 1);
    }

    #[test]
    fn nested_cursor_reports_absolute_positions() {
        let bytes = [0u8; 10];
        let mut c = Cursor::with_base(&bytes[4..], 4);
        c.read_u8().unwrap();
        assert_eq!(c.pos(), 5);
        assert_eq!(c.span_from(4), Span::bytes(4, 5));
    }
}
