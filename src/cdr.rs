// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The codec cursor: [`Cdr`], a buffer plus the alignment/endianness/framing
//! state described in the data model. One object drives both serialization
//! and deserialization, matching the eProsima Fast-CDR `Cdr` class this
//! crate is modeled on.

use crate::buffer::Buffer;
use crate::config::{CdrVersion, EncodingAlgorithm, Endianness, HeaderSelection};
use crate::error::{CdrError, Result};
use crate::state::SavedState;

#[cfg(feature = "logging")]
macro_rules! cdr_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}
#[cfg(not(feature = "logging"))]
macro_rules! cdr_trace {
    ($($arg:tt)*) => {};
}
pub(crate) use cdr_trace;

/// Sentinel member id meaning "no member id assigned".
pub const MEMBER_ID_INVALID: u32 = 0xFFFF_FFFF;

/// Padding needed to bring `rel_offset` up to a multiple of `alignment`.
/// Shared between [`Cdr`] and [`crate::size_calc::SizeCalculator`] so the
/// two implementations cannot drift apart on the arithmetic.
pub(crate) fn padding_for_alignment(rel_offset: usize, alignment: usize) -> usize {
    (alignment - (rel_offset % alignment)) % alignment
}

/// `rel_offset` rounded up to a multiple of `alignment`.
pub(crate) fn align_offset(rel_offset: usize, alignment: usize) -> usize {
    rel_offset + padding_for_alignment(rel_offset, alignment)
}

/// Alignment applied to a primitive of the given width, after the XCDRv2
/// 64-bit cap. Shared with [`crate::size_calc::SizeCalculator`].
pub(crate) fn effective_alignment(width: usize, align64: usize) -> usize {
    if width >= 8 {
        align64
    } else {
        width
    }
}

/// The codec cursor: owns (or borrows) an [`Buffer`] plus the alignment,
/// endianness, and member-framing state needed to serialize or deserialize
/// CDR/XCDR streams.
pub struct Cdr<'b> {
    pub(crate) buffer: Buffer<'b>,
    /// Logical length: bytes considered valid to read (== high-water mark
    /// while serializing, == full buffer while deserializing a received
    /// stream).
    pub(crate) len: usize,
    pub(crate) offset: usize,
    pub(crate) origin: usize,
    pub(crate) swap_bytes: bool,
    pub(crate) endianness: Endianness,
    pub(crate) cdr_version: CdrVersion,
    pub(crate) encoding: EncodingAlgorithm,
    pub(crate) last_data_size: usize,
    pub(crate) options: u16,
    pub(crate) next_member_id: Option<u32>,
    pub(crate) header_selection: HeaderSelection,
    pub(crate) align64: usize,
    pub(crate) serialized_dheader: bool,
    pub(crate) dheader_slot: Option<usize>,
}

impl<'b> Cdr<'b> {
    /// Build a codec over a fresh buffer for serialization; logical length
    /// starts at zero and grows as bytes are written.
    pub fn for_serialization(buffer: Buffer<'b>, endianness: Endianness, cdr_version: CdrVersion) -> Self {
        Self::new(buffer, 0, endianness, cdr_version)
    }

    /// Build a codec over a received stream for deserialization; the whole
    /// buffer is considered valid data up front.
    pub fn for_deserialization(buffer: Buffer<'b>, endianness: Endianness, cdr_version: CdrVersion) -> Self {
        let len = buffer.len();
        Self::new(buffer, len, endianness, cdr_version)
    }

    fn new(buffer: Buffer<'b>, len: usize, endianness: Endianness, cdr_version: CdrVersion) -> Self {
        let align64 = cdr_version.align64();
        let default_encoding = match cdr_version {
            CdrVersion::Xcdr2 => EncodingAlgorithm::PlainCdr2,
            _ => EncodingAlgorithm::PlainCdr,
        };
        Cdr {
            buffer,
            len,
            offset: 0,
            origin: 0,
            swap_bytes: endianness != Endianness::HOST,
            endianness,
            cdr_version,
            encoding: default_encoding,
            last_data_size: 0,
            options: 0,
            next_member_id: None,
            header_selection: HeaderSelection::AutoShortDefault,
            align64,
            serialized_dheader: false,
            dheader_slot: None,
        }
    }

    /// Reset cursor, origin, and alignment short-circuit state to the
    /// start of the buffer. Does not touch buffer contents.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.origin = 0;
        self.last_data_size = 0;
        self.next_member_id = None;
        self.serialized_dheader = false;
        self.dheader_slot = None;
    }

    /// Move the cursor forward by `n` bytes without reading or writing
    /// anything (used to skip unknown members).
    pub fn jump(&mut self, n: usize) -> Result<()> {
        let target = self
            .offset
            .checked_add(n)
            .ok_or_else(|| CdrError::bad_param("jump overflow"))?;
        if target > self.len {
            return Err(CdrError::not_enough_memory(self.offset, n, self.len - self.offset));
        }
        self.offset = target;
        self.last_data_size = 0;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn cdr_version(&self) -> CdrVersion {
        self.cdr_version
    }

    pub fn encoding(&self) -> EncodingAlgorithm {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: EncodingAlgorithm) {
        self.encoding = encoding;
    }

    pub fn options(&self) -> u16 {
        self.options
    }

    pub fn set_options(&mut self, options: u16) {
        self.options = options;
    }

    pub fn header_selection(&self) -> HeaderSelection {
        self.header_selection
    }

    pub fn set_header_selection(&mut self, selection: HeaderSelection) {
        self.header_selection = selection;
    }

    /// Set the member id the next `begin_serialize_member`/member-aware
    /// deserialize call should use (PLAIN encoding ignores it).
    pub fn set_next_member_id(&mut self, id: u32) {
        self.next_member_id = Some(id);
    }

    /// Bytes written (or, for a decode-mode codec, the size of the
    /// underlying stream).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The encoded bytes produced so far (valid for a serialization-mode
    /// codec).
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.len]
    }

    /// Capture the cursor's current state for later rollback.
    pub fn save_state(&self) -> SavedState {
        SavedState {
            offset: self.offset,
            origin: self.origin,
            swap_bytes: self.swap_bytes,
            last_data_size: self.last_data_size,
            next_member_id: self.next_member_id,
            encoding: self.encoding,
            serialized_dheader: self.serialized_dheader,
            dheader_slot: self.dheader_slot,
        }
    }

    /// Rewind the cursor to a previously captured state.
    pub fn restore_state(&mut self, state: SavedState) {
        self.offset = state.offset;
        self.origin = state.origin;
        self.swap_bytes = state.swap_bytes;
        self.last_data_size = state.last_data_size;
        self.next_member_id = state.next_member_id;
        self.encoding = state.encoding;
        self.serialized_dheader = state.serialized_dheader;
        self.dheader_slot = state.dheader_slot;
    }

    // ------------------------------------------------------------------
    // Alignment / endianness primitives (§4.2)
    // ------------------------------------------------------------------

    /// Padding needed before a primitive of `width` bytes, honoring the
    /// short-circuit rule: no padding if the previous primitive was at
    /// least as wide.
    fn pad_for(&self, width: usize) -> usize {
        if width <= 1 || width <= self.last_data_size {
            return 0;
        }
        let align = effective_alignment(width, self.align64);
        padding_for_alignment(self.offset - self.origin, align)
    }

    /// Toggle `swap_bytes` to reflect encoding in `endianness` instead of
    /// the buffer's declared endianness, returning the previous value so
    /// the caller can restore it (used by [`crate::composite`]'s
    /// endianness-override guard).
    pub(crate) fn set_effective_endianness(&mut self, endianness: Endianness) -> bool {
        let prev = self.swap_bytes;
        self.swap_bytes = endianness != Endianness::HOST;
        prev
    }

    pub(crate) fn restore_swap_bytes(&mut self, swap_bytes: bool) {
        self.swap_bytes = swap_bytes;
    }

    /// Pad unconditionally to `alignment` relative to `origin`, ignoring the
    /// short-circuit rule (used for member/DHEADER/EMHEADER framing, which
    /// is always aligned regardless of the previous primitive's width).
    /// Resets `last_data_size` since the header that follows starts a fresh
    /// alignment context.
    pub(crate) fn align_to(&mut self, alignment: usize) -> Result<()> {
        let rel = self.offset - self.origin;
        let pad = padding_for_alignment(rel, alignment);
        if pad > 0 {
            self.buffer.write_at(self.offset, &[0u8; 8][..pad])?;
            self.offset += pad;
            self.len = self.len.max(self.offset);
        }
        self.last_data_size = 0;
        Ok(())
    }

    /// Overwrite `len` already-written bytes at `offset` (used to back-patch
    /// a provisional header once the real member size is known).
    pub(crate) fn patch_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.buffer.write_at(offset, data)
    }

    /// Shift bytes in `[src_start, src_end)` forward by `shift`, growing the
    /// logical length accordingly (used when a provisional header must be
    /// rewritten to a wider form).
    pub(crate) fn shift_body(&mut self, src_start: usize, shift: usize) -> Result<()> {
        self.buffer.shift_right(src_start, self.offset, shift)?;
        self.offset += shift;
        self.len = self.len.max(self.offset);
        Ok(())
    }

    /// Swap `width` bytes of `value` into wire order for the codec's
    /// current effective endianness (used by member-framing code that
    /// writes raw header words rather than going through a `serialize_*`
    /// method).
    pub(crate) fn to_wire_bytes(&self, width: usize, bytes: &mut [u8]) {
        if self.swap_bytes && width > 1 {
            bytes[..width].reverse();
        }
    }

    /// Write one primitive, padding first if needed. The cursor is left
    /// untouched if either the padding or the value write fails partway
    /// through — a failed primitive write is a no-op from the caller's
    /// point of view, matching the atomicity contract every forward-moving
    /// operation in this crate provides.
    fn write_primitive(&mut self, width: usize, bytes: &[u8]) -> Result<()> {
        debug_assert!(width <= 16);
        let start_offset = self.offset;
        match self.write_primitive_inner(width, bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.offset = start_offset;
                Err(e)
            }
        }
    }

    fn write_primitive_inner(&mut self, width: usize, bytes: &[u8]) -> Result<()> {
        let pad = self.pad_for(width);
        if pad > 0 {
            self.buffer.write_at(self.offset, &[0u8; 16][..pad])?;
            self.offset += pad;
            self.len = self.len.max(self.offset);
        }
        let mut tmp = [0u8; 16];
        tmp[..width].copy_from_slice(bytes);
        if self.swap_bytes && width > 1 {
            tmp[..width].reverse();
        }
        self.buffer.write_at(self.offset, &tmp[..width])?;
        self.offset += width;
        self.len = self.len.max(self.offset);
        self.last_data_size = width;
        Ok(())
    }

    /// Read one primitive, skipping padding first if needed. Same
    /// all-or-nothing cursor contract as [`Cdr::write_primitive`].
    fn read_primitive(&mut self, width: usize) -> Result<[u8; 16]> {
        debug_assert!(width <= 16);
        let start_offset = self.offset;
        match self.read_primitive_inner(width) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.offset = start_offset;
                Err(e)
            }
        }
    }

    fn read_primitive_inner(&mut self, width: usize) -> Result<[u8; 16]> {
        let pad = self.pad_for(width);
        if pad > 0 {
            if self.offset + pad > self.len {
                return Err(CdrError::not_enough_memory(
                    self.offset,
                    pad,
                    self.len.saturating_sub(self.offset),
                ));
            }
            self.offset += pad;
        }
        let slice = self.buffer.read_at(self.offset, width, self.len)?;
        let mut tmp = [0u8; 16];
        tmp[..width].copy_from_slice(slice);
        if self.swap_bytes && width > 1 {
            tmp[..width].reverse();
        }
        self.offset += width;
        self.last_data_size = width;
        Ok(tmp)
    }

    pub fn serialize_u8(&mut self, v: u8) -> Result<()> {
        self.write_primitive(1, &v.to_le_bytes())
    }
    pub fn deserialize_u8(&mut self) -> Result<u8> {
        Ok(self.read_primitive(1)?[0])
    }

    pub fn serialize_i8(&mut self, v: i8) -> Result<()> {
        self.write_primitive(1, &v.to_le_bytes())
    }
    pub fn deserialize_i8(&mut self) -> Result<i8> {
        Ok(self.read_primitive(1)?[0] as i8)
    }

    pub fn serialize_bool(&mut self, v: bool) -> Result<()> {
        self.serialize_u8(u8::from(v))
    }
    pub fn deserialize_bool(&mut self) -> Result<bool> {
        match self.deserialize_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CdrError::bad_param(format!(
                "boolean octet must be 0 or 1, got {other}"
            ))),
        }
    }

    pub fn serialize_char(&mut self, v: u8) -> Result<()> {
        self.serialize_u8(v)
    }
    pub fn deserialize_char(&mut self) -> Result<u8> {
        self.deserialize_u8()
    }

    /// Wide character: a 32-bit code unit, not validated as a Unicode
    /// scalar value (matches the wire contract in §4.2).
    pub fn serialize_wchar(&mut self, v: u32) -> Result<()> {
        self.serialize_u32(v)
    }
    pub fn deserialize_wchar(&mut self) -> Result<u32> {
        self.deserialize_u32()
    }
}

macro_rules! impl_primitive {
    ($ser:ident, $de:ident, $ty:ty, $width:expr) => {
        impl<'b> Cdr<'b> {
            pub fn $ser(&mut self, v: $ty) -> Result<()> {
                self.write_primitive($width, &v.to_le_bytes())
            }
            pub fn $de(&mut self) -> Result<$ty> {
                let bytes = self.read_primitive($width)?;
                let mut arr = [0u8; $width];
                arr.copy_from_slice(&bytes[..$width]);
                Ok(<$ty>::from_le_bytes(arr))
            }
        }
    };
}

impl_primitive!(serialize_u16, deserialize_u16, u16, 2);
impl_primitive!(serialize_i16, deserialize_i16, i16, 2);
impl_primitive!(serialize_u32, deserialize_u32, u32, 4);
impl_primitive!(serialize_i32, deserialize_i32, i32, 4);
impl_primitive!(serialize_u64, deserialize_u64, u64, 8);
impl_primitive!(serialize_i64, deserialize_i64, i64, 8);
impl_primitive!(serialize_f32, deserialize_f32, f32, 4);
impl_primitive!(serialize_f64, deserialize_f64, f64, 8);

impl<'b> Cdr<'b> {
    /// `long double`: an opaque 16-byte payload (see DESIGN.md for why this
    /// crate does not expose a native floating-point type for it).
    pub fn serialize_long_double(&mut self, v: &[u8; 16]) -> Result<()> {
        self.write_primitive(16, v)
    }
    pub fn deserialize_long_double(&mut self) -> Result<[u8; 16]> {
        self.read_primitive(16)
    }
}
