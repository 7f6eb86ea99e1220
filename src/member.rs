// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XCDR member-header state machine: PLAIN/DELIMIT/PL framing across
//! XCDRv1 and XCDRv2, including short/long header promotion and DHEADER
//! back-patching.

use crate::cdr::{cdr_trace, Cdr};
use crate::config::{EncodingAlgorithm, HeaderSelection};
use crate::error::{CdrError, Result};
use crate::state::{HeaderFrame, SavedState};

/// Reserved XCDRv1 parameter ids. Values above `SHORT_PID_MAX` cannot be
/// carried by a short header.
const SHORT_PID_MAX: u32 = 0x3F00;
const PID_SENTINEL: u16 = 0x3F02;
const PID_EXTENDED_MARKER: u16 = 0x3F01;

/// Outcome of [`Cdr::begin_serialize_member`]: either proceed with the
/// member body (carrying the header bookkeeping to finalize later, if
/// any), or the member is an absent optional and must be skipped entirely.
pub(crate) enum MemberBegin {
    Proceed(Option<HeaderFrame>),
    Absent,
}

impl<'b> Cdr<'b> {
    // ------------------------------------------------------------------
    // Type-level bracketing
    // ------------------------------------------------------------------

    /// Enter an aggregate encoded with `encoding`, writing (or reserving)
    /// whatever type-level framing that encoding requires. Returns a
    /// snapshot to pass to [`Cdr::end_serialize_type`].
    pub fn begin_serialize_type(&mut self, encoding: EncodingAlgorithm) -> Result<SavedState> {
        let saved = self.save_state();
        self.encoding = encoding;
        self.next_member_id = None;
        self.serialized_dheader = false;
        self.dheader_slot = None;
        if encoding.is_delimited() {
            self.align_to(4)?;
            let slot = self.offset;
            self.serialize_u32(0)?;
            self.dheader_slot = Some(slot);
            self.serialized_dheader = true;
            self.origin = self.offset;
            self.last_data_size = 0;
            cdr_trace!("begin_serialize_type: reserved DHEADER at {slot}");
        }
        Ok(saved)
    }

    /// Leave an aggregate: write the terminator sentinel (XCDRv1 PL_CDR) or
    /// back-patch the DHEADER (XCDRv2 delimited/PL), then restore the
    /// outer `origin`/encoding captured by `begin_serialize_type`.
    pub fn end_serialize_type(&mut self, saved: SavedState) -> Result<()> {
        match self.encoding {
            EncodingAlgorithm::PlCdr => {
                self.align_to(4)?;
                self.serialize_u16(PID_SENTINEL)?;
                self.serialize_u16(0)?;
            }
            other if other.is_delimited() => {
                if let Some(slot) = self.dheader_slot {
                    let length = (self.offset - slot - 4) as u32;
                    let mut bytes = length.to_le_bytes();
                    self.to_wire_bytes(4, &mut bytes);
                    self.patch_at(slot, &bytes)?;
                    cdr_trace!("end_serialize_type: DHEADER at {slot} = {length}");
                }
            }
            _ => {}
        }
        self.origin = saved.origin;
        self.encoding = saved.encoding;
        self.next_member_id = saved.next_member_id;
        self.serialized_dheader = saved.serialized_dheader;
        self.dheader_slot = saved.dheader_slot;
        self.last_data_size = 0;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Member-level bracketing
    // ------------------------------------------------------------------

    pub(crate) fn begin_serialize_member(
        &mut self,
        id: u32,
        is_optional: bool,
        is_present: bool,
        must_understand: bool,
    ) -> Result<MemberBegin> {
        match self.encoding {
            EncodingAlgorithm::PlainCdr => Ok(MemberBegin::Proceed(None)),
            EncodingAlgorithm::PlainCdr2 | EncodingAlgorithm::DelimitCdr2 => {
                if !is_optional {
                    return Ok(MemberBegin::Proceed(None));
                }
                self.serialize_bool(is_present)?;
                if is_present {
                    Ok(MemberBegin::Proceed(None))
                } else {
                    Ok(MemberBegin::Absent)
                }
            }
            EncodingAlgorithm::PlCdr => {
                if is_optional && !is_present {
                    return Ok(MemberBegin::Absent);
                }
                self.begin_pl_v1_member(id)
            }
            EncodingAlgorithm::PlCdr2 => {
                if is_optional && !is_present {
                    return Ok(MemberBegin::Absent);
                }
                self.begin_pl_v2_member(id, must_understand)
            }
        }
    }

    pub(crate) fn end_serialize_member(
        &mut self,
        frame: Option<HeaderFrame>,
        saved_origin: usize,
    ) -> Result<()> {
        let Some(frame) = frame else {
            return Ok(());
        };
        match self.encoding {
            EncodingAlgorithm::PlCdr => self.end_pl_v1_member(frame, saved_origin),
            EncodingAlgorithm::PlCdr2 => self.end_pl_v2_member(frame, saved_origin),
            _ => {
                self.origin = saved_origin;
                Ok(())
            }
        }
    }

    /// Ergonomic wrapper driving `begin`/body/`end` with full rollback on
    /// any error, mirroring the "save on entry, restore on Err" contract.
    /// `is_optional` gates whether a presence marker is written at all
    /// (PLAIN_CDR2/DELIMIT_CDR2) or whether an absent member is simply
    /// omitted from the stream (PL_CDR/PL_CDR2); a mandatory member should
    /// always pass `is_optional: false, is_present: true`.
    pub fn serialize_member<F>(
        &mut self,
        id: u32,
        is_optional: bool,
        is_present: bool,
        must_understand: bool,
        mut body: F,
    ) -> Result<()>
    where
        F: FnMut(&mut Cdr<'b>) -> Result<()>,
    {
        let saved = self.save_state();
        let action = match self.begin_serialize_member(id, is_optional, is_present, must_understand) {
            Ok(a) => a,
            Err(e) => {
                self.restore_state(saved);
                return Err(e);
            }
        };
        let frame = match action {
            MemberBegin::Absent => return Ok(()),
            MemberBegin::Proceed(frame) => frame,
        };
        if let Err(e) = body(self) {
            self.restore_state(saved);
            return Err(e);
        }
        if let Err(e) = self.end_serialize_member(frame, saved.origin) {
            self.restore_state(saved);
            return Err(e);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // XCDRv1 PL_CDR
    // ------------------------------------------------------------------

    fn begin_pl_v1_member(&mut self, id: u32) -> Result<MemberBegin> {
        let selection = self.header_selection;
        let must_use_long = id > SHORT_PID_MAX;
        let use_short_provisional = match selection {
            HeaderSelection::Short => {
                if must_use_long {
                    return Err(CdrError::bad_param(format!(
                        "member id {id:#x} exceeds {SHORT_PID_MAX:#x} and cannot use a SHORT PL_CDR header"
                    )));
                }
                true
            }
            HeaderSelection::Long | HeaderSelection::AutoLongDefault => false,
            HeaderSelection::AutoShortDefault => !must_use_long,
        };

        self.align_to(4)?;
        let header_offset = self.offset;
        if use_short_provisional {
            self.serialize_u16(id as u16)?;
            self.serialize_u16(0)?;
            let body_start = self.offset;
            self.origin = body_start;
            self.last_data_size = 0;
            Ok(MemberBegin::Proceed(Some(HeaderFrame {
                header_offset,
                body_start,
                selection,
                wrote_short: true,
                member_id: id,
                must_understand: false,
            })))
        } else {
            self.serialize_u16(PID_EXTENDED_MARKER)?;
            self.serialize_u16(8)?;
            self.serialize_u32(id)?;
            self.serialize_u32(0)?;
            self.align_to(8)?;
            let body_start = self.offset;
            self.origin = body_start;
            self.last_data_size = 0;
            Ok(MemberBegin::Proceed(Some(HeaderFrame {
                header_offset,
                body_start,
                selection,
                wrote_short: false,
                member_id: id,
                must_understand: false,
            })))
        }
    }

    fn end_pl_v1_member(&mut self, frame: HeaderFrame, saved_origin: usize) -> Result<()> {
        let member_size = self.offset - self.origin;
        if frame.wrote_short {
            match frame.selection {
                HeaderSelection::Short => {
                    if member_size > 0xFFFF {
                        return Err(CdrError::bad_param(format!(
                            "member body of {member_size} bytes overflows a SHORT PL_CDR header"
                        )));
                    }
                    self.patch_u16(frame.header_offset + 2, member_size as u16)?;
                }
                HeaderSelection::AutoShortDefault => {
                    if member_size <= 0xFFFF {
                        self.patch_u16(frame.header_offset + 2, member_size as u16)?;
                    } else {
                        cdr_trace!(
                            "end_pl_v1_member: promoting member {} ({} bytes) to LONG header",
                            frame.member_id,
                            member_size
                        );
                        self.shift_body(frame.body_start, 8)?;
                        self.patch_u16(frame.header_offset, PID_EXTENDED_MARKER)?;
                        self.patch_u16(frame.header_offset + 2, 8)?;
                        self.patch_u32(frame.header_offset + 4, frame.member_id)?;
                        self.patch_u32(frame.header_offset + 8, member_size as u32)?;
                    }
                }
                _ => unreachable!("wrote_short implies SHORT or AUTO_SHORT_DEFAULT"),
            }
        } else {
            self.patch_u32(frame.header_offset + 8, member_size as u32)?;
        }
        self.origin = saved_origin;
        Ok(())
    }

    // ------------------------------------------------------------------
    // XCDRv2 PL_CDR2
    // ------------------------------------------------------------------

    fn write_emheader(&mut self, length_code: u8, id: u32, must_understand: bool) -> Result<()> {
        let word = ((must_understand as u32) << 31)
            | (u32::from(length_code & 0x7) << 28)
            | (id & 0x0FFF_FFFF);
        self.serialize_u32(word)
    }

    fn begin_pl_v2_member(&mut self, id: u32, must_understand: bool) -> Result<MemberBegin> {
        if id > 0x0FFF_FFFF {
            return Err(CdrError::bad_param(format!(
                "member id {id:#x} does not fit in the 28-bit EMHEADER member-id field"
            )));
        }
        let selection = self.header_selection;
        self.align_to(4)?;
        let header_offset = self.offset;
        match selection {
            HeaderSelection::Short | HeaderSelection::AutoShortDefault => {
                self.write_emheader(0, id, must_understand)?;
                let body_start = self.offset;
                self.origin = body_start;
                self.last_data_size = 0;
                Ok(MemberBegin::Proceed(Some(HeaderFrame {
                    header_offset,
                    body_start,
                    selection,
                    wrote_short: true,
                    member_id: id,
                    must_understand,
                })))
            }
            HeaderSelection::Long | HeaderSelection::AutoLongDefault => {
                self.write_emheader(4, id, must_understand)?;
                self.serialize_u32(0)?;
                let body_start = self.offset;
                self.origin = body_start;
                self.last_data_size = 0;
                Ok(MemberBegin::Proceed(Some(HeaderFrame {
                    header_offset,
                    body_start,
                    selection,
                    wrote_short: false,
                    member_id: id,
                    must_understand,
                })))
            }
        }
    }

    fn end_pl_v2_member(&mut self, frame: HeaderFrame, saved_origin: usize) -> Result<()> {
        let member_size = self.offset - self.origin;
        if frame.wrote_short {
            let length_code = match member_size {
                1 => Some(0u8),
                2 => Some(1u8),
                4 => Some(2u8),
                8 => Some(3u8),
                _ => None,
            };
            match (frame.selection, length_code) {
                (_, Some(code)) => {
                    self.write_emheader_at(frame.header_offset, code, frame.member_id, frame.must_understand)?;
                }
                (HeaderSelection::Short, None) => {
                    return Err(CdrError::bad_param(format!(
                        "member body of {member_size} bytes does not fit a SHORT EMHEADER (must be 1, 2, 4 or 8 bytes)"
                    )));
                }
                (HeaderSelection::AutoShortDefault, None) => {
                    cdr_trace!(
                        "end_pl_v2_member: promoting member {} ({} bytes) to LONG EMHEADER",
                        frame.member_id,
                        member_size
                    );
                    self.shift_body(frame.body_start, 4)?;
                    self.write_emheader_at(frame.header_offset, 4, frame.member_id, frame.must_understand)?;
                    self.patch_u32(frame.header_offset + 4, member_size as u32)?;
                }
                _ => unreachable!("wrote_short implies SHORT or AUTO_SHORT_DEFAULT"),
            }
        } else {
            self.patch_u32(frame.header_offset + 4, member_size as u32)?;
        }
        self.origin = saved_origin;
        Ok(())
    }

    fn write_emheader_at(
        &mut self,
        offset: usize,
        length_code: u8,
        id: u32,
        must_understand: bool,
    ) -> Result<()> {
        let word = ((must_understand as u32) << 31)
            | (u32::from(length_code & 0x7) << 28)
            | (id & 0x0FFF_FFFF);
        self.patch_u32(offset, word)
    }

    fn patch_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        let mut bytes = value.to_le_bytes();
        self.to_wire_bytes(2, &mut bytes);
        self.patch_at(offset, &bytes)
    }

    fn patch_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let mut bytes = value.to_le_bytes();
        self.to_wire_bytes(4, &mut bytes);
        self.patch_at(offset, &bytes)
    }

    /// Decode a single member inside a PLAIN_CDR2/DELIMIT_CDR2 aggregate
    /// that may carry a leading presence flag, mirroring
    /// [`Cdr::serialize_member`]'s inline-presence path. Under the PL
    /// encodings presence is implied by the member's absence from the
    /// stream, so `is_optional` should be ignored there — callers drive
    /// those via [`Cdr::deserialize_type`]'s per-member functor instead.
    pub fn deserialize_member<T, F>(&mut self, is_optional: bool, mut decode: F) -> Result<Option<T>>
    where
        F: FnMut(&mut Cdr<'b>) -> Result<T>,
    {
        let inline_presence = matches!(
            self.encoding,
            EncodingAlgorithm::PlainCdr2 | EncodingAlgorithm::DelimitCdr2
        );
        if is_optional && inline_presence {
            if !self.deserialize_bool()? {
                return Ok(None);
            }
        }
        Ok(Some(decode(self)?))
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    /// Drive the inverse state machine: enter an aggregate encoded with
    /// `encoding`, repeatedly invoking `on_member(cdr, member_id)` for
    /// every member present on the wire until the aggregate's bound (or,
    /// for XCDRv1 PL_CDR, the terminator sentinel) is reached.
    ///
    /// `on_member` may decode the member fully, partially, or not at all;
    /// on return the cursor is unconditionally resynchronized to the start
    /// of the next member, so an `on_member` that does not recognize the
    /// id need not (and should not) advance the cursor itself.
    pub fn deserialize_type<F>(&mut self, encoding: EncodingAlgorithm, mut on_member: F) -> Result<()>
    where
        F: FnMut(&mut Cdr<'b>, u32) -> Result<()>,
    {
        let saved = self.save_state();
        self.encoding = encoding;
        let result = (|| -> Result<()> {
            match encoding {
                EncodingAlgorithm::PlainCdr | EncodingAlgorithm::PlainCdr2 => on_member(self, 0),
                EncodingAlgorithm::DelimitCdr2 => {
                    self.align_to(4)?;
                    let dheader = self.deserialize_u32()?;
                    let bound = self.offset + dheader as usize;
                    if bound > self.len {
                        return Err(CdrError::not_enough_memory(
                            self.offset,
                            dheader as usize,
                            self.len - self.offset,
                        ));
                    }
                    self.origin = self.offset;
                    let mut id = 0u32;
                    while self.offset < bound {
                        on_member(self, id)?;
                        id += 1;
                    }
                    self.offset = bound;
                    Ok(())
                }
                EncodingAlgorithm::PlCdr => self.deserialize_pl_v1(&mut on_member),
                EncodingAlgorithm::PlCdr2 => self.deserialize_pl_v2(&mut on_member),
            }
        })();
        match result {
            Ok(()) => {
                let end_offset = self.offset;
                self.origin = saved.origin;
                self.encoding = saved.encoding;
                self.offset = end_offset;
                Ok(())
            }
            Err(e) => {
                self.restore_state(saved);
                Err(e)
            }
        }
    }

    fn deserialize_pl_v1(&mut self, on_member: &mut dyn FnMut(&mut Cdr<'b>, u32) -> Result<()>) -> Result<()> {
        let outer_origin = self.origin;
        loop {
            self.align_to(4)?;
            let pid = self.deserialize_u16()?;
            if pid == PID_SENTINEL {
                let _ = self.deserialize_u16()?;
                break;
            }
            if pid == PID_EXTENDED_MARKER {
                let _marker_size = self.deserialize_u16()?;
                let real_pid = self.deserialize_u32()?;
                let real_size = self.deserialize_u32()? as usize;
                self.align_to(8)?;
                let body_start = self.offset;
                self.origin = body_start;
                self.last_data_size = 0;
                on_member(self, real_pid)?;
                self.origin = outer_origin;
                self.offset = body_start + real_size;
            } else {
                let size = self.deserialize_u16()? as usize;
                let body_start = self.offset;
                self.origin = body_start;
                self.last_data_size = 0;
                on_member(self, u32::from(pid))?;
                self.origin = outer_origin;
                self.offset = body_start + size;
            }
            if self.offset >= self.len {
                break;
            }
        }
        Ok(())
    }

    fn deserialize_pl_v2(&mut self, on_member: &mut dyn FnMut(&mut Cdr<'b>, u32) -> Result<()>) -> Result<()> {
        self.align_to(4)?;
        let dheader = self.deserialize_u32()?;
        let bound = self.offset + dheader as usize;
        if bound > self.len {
            return Err(CdrError::not_enough_memory(self.offset, dheader as usize, self.len - self.offset));
        }
        self.origin = self.offset;
        while self.offset < bound {
            self.align_to(4)?;
            let word = self.deserialize_u32()?;
            let must_understand = (word >> 31) & 1 != 0;
            let _ = must_understand;
            let length_code = ((word >> 28) & 0x7) as u8;
            let id = word & 0x0FFF_FFFF;
            let body_start;
            let member_size;
            match length_code {
                0 => {
                    body_start = self.offset;
                    member_size = 1;
                }
                1 => {
                    body_start = self.offset;
                    member_size = 2;
                }
                2 => {
                    body_start = self.offset;
                    member_size = 4;
                }
                3 => {
                    body_start = self.offset;
                    member_size = 8;
                }
                4 => {
                    member_size = self.deserialize_u32()? as usize;
                    body_start = self.offset;
                }
                5 => {
                    body_start = self.offset;
                    let _ = self.deserialize_u32()?;
                    member_size = 0;
                }
                6 => {
                    let count = self.deserialize_u32()? as usize;
                    member_size = count * 4;
                    body_start = self.offset;
                }
                7 => {
                    let count = self.deserialize_u32()? as usize;
                    member_size = count * 8;
                    body_start = self.offset;
                }
                _ => unreachable!("length_code is masked to 3 bits"),
            }
            let outer_origin = self.origin;
            self.origin = body_start;
            self.last_data_size = 0;
            on_member(self, id)?;
            self.origin = outer_origin;
            self.offset = body_start + member_size;
        }
        self.offset = bound;
        Ok(())
    }
}
