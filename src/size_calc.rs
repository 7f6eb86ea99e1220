// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Computes the exact serialized size of a value without producing bytes
//! (§4.6). Mirrors [`crate::cdr::Cdr`]'s alignment/framing arithmetic
//! through the same shared helper functions, so the two cannot drift.

use crate::cdr::{align_offset, effective_alignment, padding_for_alignment};
use crate::config::{CdrVersion, EncodingAlgorithm};

/// A mirror of [`crate::cdr::Cdr`] that tracks only the running size and
/// alignment state; it never allocates or writes and its public methods
/// cannot fail.
pub struct SizeCalculator {
    size: usize,
    origin: usize,
    last_data_size: usize,
    align64: usize,
    encoding: EncodingAlgorithm,
}

impl SizeCalculator {
    pub fn new(cdr_version: CdrVersion) -> Self {
        SizeCalculator {
            size: 0,
            origin: 0,
            last_data_size: 0,
            align64: cdr_version.align64(),
            encoding: EncodingAlgorithm::PlainCdr,
        }
    }

    /// The accumulated size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn encoding(&self) -> EncodingAlgorithm {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: EncodingAlgorithm) {
        self.encoding = encoding;
    }

    /// Account for the 4-octet encapsulation header, resetting the
    /// alignment origin to just after it.
    pub fn add_encapsulation_header(&mut self) {
        self.size += 4;
        self.origin = self.size;
        self.last_data_size = 0;
    }

    fn add_primitive(&mut self, width: usize) {
        if !(width <= 1 || width <= self.last_data_size) {
            let align = effective_alignment(width, self.align64);
            self.size += padding_for_alignment(self.size - self.origin, align);
        }
        self.size += width;
        self.last_data_size = width;
    }

    /// Pad unconditionally to `alignment`, ignoring the short-circuit rule
    /// (used by the member/DHEADER framing below).
    fn align_to(&mut self, alignment: usize) {
        let rel = self.size - self.origin;
        self.size += padding_for_alignment(rel, alignment);
        self.last_data_size = 0;
    }

    pub fn add_u8(&mut self) {
        self.add_primitive(1);
    }
    pub fn add_i8(&mut self) {
        self.add_primitive(1);
    }
    pub fn add_bool(&mut self) {
        self.add_primitive(1);
    }
    pub fn add_char(&mut self) {
        self.add_primitive(1);
    }
    pub fn add_u16(&mut self) {
        self.add_primitive(2);
    }
    pub fn add_i16(&mut self) {
        self.add_primitive(2);
    }
    pub fn add_u32(&mut self) {
        self.add_primitive(4);
    }
    pub fn add_i32(&mut self) {
        self.add_primitive(4);
    }
    pub fn add_f32(&mut self) {
        self.add_primitive(4);
    }
    pub fn add_wchar(&mut self) {
        self.add_primitive(4);
    }
    pub fn add_u64(&mut self) {
        self.add_primitive(8);
    }
    pub fn add_i64(&mut self) {
        self.add_primitive(8);
    }
    pub fn add_f64(&mut self) {
        self.add_primitive(8);
    }
    pub fn add_long_double(&mut self) {
        self.add_primitive(16);
    }

    /// Narrow string: `4 + payload_bytes + 1` (length prefix, payload, NUL).
    pub fn add_string(&mut self, s: &str) {
        self.add_u32();
        self.size += s.len() + 1;
        self.last_data_size = 1;
    }

    /// Wide string: `4 + 4 * code_units` (no terminator).
    pub fn add_wstring(&mut self, s: &str) {
        self.add_u32();
        let units = s.encode_utf16().count();
        for _ in 0..units {
            self.add_wchar();
        }
    }

    /// Fixed-size array of `count` elements, each accounted for by
    /// `add_elem`.
    pub fn add_array<F: FnMut(&mut SizeCalculator)>(&mut self, count: usize, mut add_elem: F) {
        for _ in 0..count {
            add_elem(self);
        }
    }

    /// `int32 count` followed by each element's contribution.
    pub fn add_sequence<F: FnMut(&mut SizeCalculator)>(&mut self, count: usize, mut add_elem: F) {
        self.add_i32();
        for _ in 0..count {
            add_elem(self);
        }
    }

    /// One octet per element, plus the `int32` count.
    pub fn add_bool_sequence(&mut self, count: usize) {
        self.add_i32();
        self.size += count;
        if count > 0 {
            self.last_data_size = 1;
        }
    }

    /// `int32 pair_count` followed by each pair's key/value contribution.
    pub fn add_map<F: FnMut(&mut SizeCalculator)>(&mut self, count: usize, mut add_pair: F) {
        self.add_i32();
        for _ in 0..count {
            add_pair(self);
        }
    }

    // ------------------------------------------------------------------
    // Member framing (§4.5 mirror)
    // ------------------------------------------------------------------

    /// Enter an aggregate, accounting for whatever type-level framing
    /// `encoding` requires (a DHEADER for the XCDRv2 delimited forms).
    pub fn begin_aggregate(&mut self, encoding: EncodingAlgorithm) {
        self.encoding = encoding;
        if encoding.is_delimited() {
            self.align_to(4);
            self.size += 4;
            self.origin = self.size;
            self.last_data_size = 0;
        }
    }

    /// Leave an aggregate, accounting for the XCDRv1 PL_CDR terminator
    /// sentinel (the XCDRv2 delimited forms need no trailer: their DHEADER
    /// was already sized at `begin_aggregate`).
    pub fn end_aggregate(&mut self) {
        if self.encoding == EncodingAlgorithm::PlCdr {
            self.align_to(4);
            self.size += 4;
        }
    }

    /// Account for one member, calling `add_body` only when the member is
    /// actually present on the wire. Mirrors [`crate::cdr::Cdr::serialize_member`]:
    /// - PLAIN_CDR: no framing at all.
    /// - PLAIN_CDR2/DELIMIT_CDR2: a 1-byte presence flag when `is_optional`,
    ///   regardless of `is_present`; the body only when present.
    /// - PL_CDR: an absent optional contributes nothing; otherwise the long
    ///   XCDRv1 header (12 bytes, body aligned to 8) — this crate's
    ///   calculator always assumes the long form since it cannot know the
    ///   eventual body size up front.
    /// - PL_CDR2: an absent optional contributes nothing; otherwise an
    ///   EMHEADER plus NEXTINT (8 bytes), matching the encoder's
    ///   AutoLongDefault/Long selections.
    pub fn add_member<F: FnOnce(&mut SizeCalculator)>(
        &mut self,
        is_optional: bool,
        is_present: bool,
        add_body: F,
    ) {
        match self.encoding {
            EncodingAlgorithm::PlainCdr => add_body(self),
            EncodingAlgorithm::PlainCdr2 | EncodingAlgorithm::DelimitCdr2 => {
                if is_optional {
                    self.add_bool();
                    if !is_present {
                        return;
                    }
                }
                add_body(self);
            }
            EncodingAlgorithm::PlCdr => {
                if is_optional && !is_present {
                    return;
                }
                self.align_to(4);
                self.size += 12;
                self.align_to(8);
                let outer_origin = self.origin;
                self.origin = self.size;
                self.last_data_size = 0;
                add_body(self);
                self.origin = outer_origin;
            }
            EncodingAlgorithm::PlCdr2 => {
                if is_optional && !is_present {
                    return;
                }
                self.align_to(4);
                self.size += 8;
                let outer_origin = self.origin;
                self.origin = self.size;
                self.last_data_size = 0;
                add_body(self);
                self.origin = outer_origin;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::cdr::Cdr;
    use crate::config::Endianness;

    #[test]
    fn test_primitive_sizes_match_alignment_rules() {
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.add_u8();
        calc.add_u32();
        assert_eq!(calc.size(), 8);
    }

    #[test]
    fn test_short_circuit_matches_live_codec() {
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.add_u32();
        calc.add_u16();
        assert_eq!(calc.size(), 6);

        let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
        cdr.serialize_u32(7).unwrap();
        cdr.serialize_u16(8).unwrap();
        assert_eq!(cdr.len(), calc.size());
    }

    #[test]
    fn test_string_size_matches_hola_scenario() {
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.add_string("HOLA");
        assert_eq!(calc.size(), 9);
    }

    #[test]
    fn test_bool_sequence_size_matches_live_codec() {
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.add_bool_sequence(3);
        assert_eq!(calc.size(), 7);

        let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
        cdr.serialize_bool_sequence(&[true, false, true]).unwrap();
        assert_eq!(cdr.len(), calc.size());
    }

    #[test]
    fn test_pl_cdr2_short_member_size_matches_scenario() {
        // Mirrors the live codec's scenario 2 (PL_CDR2, SHORT header): the
        // calculator assumes the long/NEXTINT form, so its prediction is an
        // upper bound, not a bit-exact match, for that one selection.
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.begin_aggregate(EncodingAlgorithm::PlCdr2);
        calc.add_member(false, true, |c| c.add_u8());
        calc.end_aggregate();
        assert_eq!(calc.size(), 4 /* DHEADER */ + 8 /* EMHEADER+NEXTINT */ + 1);
    }

    #[test]
    fn test_delimit_cdr2_member_sizes_match_live_codec() {
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.begin_aggregate(EncodingAlgorithm::DelimitCdr2);
        calc.add_member(false, true, |c| c.add_u32());
        calc.add_member(false, true, |c| c.add_u16());
        calc.end_aggregate();
        assert_eq!(calc.size(), 4 + 4 + 2);

        let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
        let saved = cdr.begin_serialize_type(EncodingAlgorithm::DelimitCdr2).unwrap();
        cdr.serialize_member(0, false, true, false, |c| c.serialize_u32(1)).unwrap();
        cdr.serialize_member(1, false, true, false, |c| c.serialize_u16(2)).unwrap();
        cdr.end_serialize_type(saved).unwrap();
        assert_eq!(cdr.len(), calc.size());
    }

    #[test]
    fn test_optional_absent_member_contributes_only_presence_flag() {
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        calc.begin_aggregate(EncodingAlgorithm::PlainCdr2);
        calc.add_member(true, false, |c| c.add_u32());
        assert_eq!(calc.size(), 1);
    }

    #[test]
    fn test_align_offset_and_padding_helpers() {
        assert_eq!(padding_for_alignment(1, 4), 3);
        assert_eq!(padding_for_alignment(4, 4), 0);
        assert_eq!(align_offset(5, 8), 8);
    }
}
