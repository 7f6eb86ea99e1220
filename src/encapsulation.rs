// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The 4-octet encapsulation header that opens a CDR/XCDR stream: a
//! representation id (variant + endianness) and 16-bit option flags.

use crate::cdr::{cdr_trace, Cdr};
use crate::config::{CdrVersion, EncodingAlgorithm, Endianness};
use crate::error::{CdrError, Result};

/// Representation id assigned to each (CDR version, encoding, endianness)
/// combination that can open a stream. All three XCDRv2 sub-modes share a
/// single id: the per-member framing (PLAIN/DELIMIT/PL) is a property of
/// the aggregate being encoded, not of the stream as a whole, so the OMG
/// assignment does not distinguish them at the encapsulation level.
const REP_ID_CDR_BE: u16 = 0x0000;
const REP_ID_CDR_LE: u16 = 0x0001;
const REP_ID_PL_CDR_BE: u16 = 0x0002;
const REP_ID_PL_CDR_LE: u16 = 0x0003;
const REP_ID_XCDR2_BE: u16 = 0x000A;
const REP_ID_XCDR2_LE: u16 = 0x000B;

fn representation_id(cdr_version: CdrVersion, encoding: EncodingAlgorithm, endianness: Endianness) -> Result<u16> {
    let little = endianness == Endianness::Little;
    match (cdr_version, encoding) {
        (CdrVersion::CorbaCdr | CdrVersion::DdsCdr, EncodingAlgorithm::PlainCdr) => {
            Ok(if little { REP_ID_CDR_LE } else { REP_ID_CDR_BE })
        }
        (CdrVersion::Xcdr1, EncodingAlgorithm::PlainCdr) => Ok(if little { REP_ID_CDR_LE } else { REP_ID_CDR_BE }),
        (CdrVersion::Xcdr1, EncodingAlgorithm::PlCdr) => Ok(if little { REP_ID_PL_CDR_LE } else { REP_ID_PL_CDR_BE }),
        (CdrVersion::Xcdr2, e) if e.is_xcdr2() => Ok(if little { REP_ID_XCDR2_LE } else { REP_ID_XCDR2_BE }),
        _ => Err(CdrError::bad_param(format!(
            "encoding {encoding:?} is not valid under CDR version {cdr_version:?}"
        ))),
    }
}

fn decode_representation_id(rep_id: u16) -> Result<(CdrVersion, EncodingAlgorithm, Endianness)> {
    let endianness = if rep_id & 1 == 1 { Endianness::Little } else { Endianness::Big };
    match rep_id & !1 {
        REP_ID_CDR_BE => Ok((CdrVersion::CorbaCdr, EncodingAlgorithm::PlainCdr, endianness)),
        REP_ID_PL_CDR_BE => Ok((CdrVersion::Xcdr1, EncodingAlgorithm::PlCdr, endianness)),
        REP_ID_XCDR2_BE => Ok((CdrVersion::Xcdr2, EncodingAlgorithm::PlainCdr2, endianness)),
        other => Err(CdrError::invalid_encoding(format!(
            "unknown representation id {other:#06x}"
        ))),
    }
}

impl<'b> Cdr<'b> {
    /// Write the 4-octet encapsulation header for this codec's current
    /// `cdr_version`/`endianness`/`encoding`, resetting `origin` to just
    /// after it. `options` is written big-endian regardless of payload
    /// endianness, per §4.4.
    pub fn write_encapsulation(&mut self) -> Result<()> {
        let rep_id = representation_id(self.cdr_version, self.encoding, self.endianness)?;
        // The representation id itself is written big-endian-on-the-wire
        // logically, but its low bit (the endianness selector) is defined
        // independent of byte order, so we write it through the plain byte
        // sequence rather than the swap-aware primitive path.
        let rep_bytes = rep_id.to_be_bytes();
        self.buffer.write_at(self.offset, &rep_bytes)?;
        self.offset += 2;
        let opt_bytes = self.options.to_be_bytes();
        self.buffer.write_at(self.offset, &opt_bytes)?;
        self.offset += 2;
        self.len = self.len.max(self.offset);
        self.origin = self.offset;
        self.last_data_size = 0;
        cdr_trace!("write_encapsulation: rep_id={rep_id:#06x} options={:#06x}", self.options);
        Ok(())
    }

    /// Parse the 4-octet encapsulation header, set `swap_bytes`/`encoding`
    /// from it, and reset `origin` to just after it.
    pub fn read_encapsulation(&mut self) -> Result<()> {
        let rep_bytes = self.buffer.read_at(self.offset, 2, self.len)?;
        let rep_id = u16::from_be_bytes([rep_bytes[0], rep_bytes[1]]);
        self.offset += 2;
        let opt_bytes = self.buffer.read_at(self.offset, 2, self.len)?;
        self.options = u16::from_be_bytes([opt_bytes[0], opt_bytes[1]]);
        self.offset += 2;

        let (cdr_version, encoding, endianness) = decode_representation_id(rep_id)?;
        self.cdr_version = cdr_version;
        self.align64 = cdr_version.align64();
        self.encoding = encoding;
        self.endianness = endianness;
        self.swap_bytes = endianness != Endianness::HOST;
        self.origin = self.offset;
        self.last_data_size = 0;
        cdr_trace!("read_encapsulation: rep_id={rep_id:#06x} options={:#06x}", self.options);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;

    #[test]
    fn test_plain_cdr2_little_endian_scenario() {
        let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
        cdr.write_encapsulation().unwrap();
        cdr.serialize_u32(0x01FC_1FCD).unwrap();
        assert_eq!(
            cdr.as_slice(),
            &[0x00, 0x0b, 0x00, 0x00, 0xCD, 0x1F, 0xFC, 0x01]
        );

        let bytes = cdr.as_slice().to_vec();
        let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2);
        dec.read_encapsulation().unwrap();
        assert_eq!(dec.deserialize_u32().unwrap(), 0x01FC_1FCD);
    }

    #[test]
    fn test_read_encapsulation_infers_endianness_and_version() {
        let bytes = vec![0x00, 0x01, 0x00, 0x00];
        let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Big, CdrVersion::CorbaCdr);
        dec.read_encapsulation().unwrap();
        assert_eq!(dec.endianness(), Endianness::Little);
        assert_eq!(dec.cdr_version(), CdrVersion::CorbaCdr);
    }

    #[test]
    fn test_read_encapsulation_rejects_unknown_representation_id() {
        let bytes = vec![0xFF, 0xFE, 0x00, 0x00];
        let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Big, CdrVersion::CorbaCdr);
        let err = dec.read_encapsulation().unwrap_err();
        assert!(matches!(err, CdrError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_write_encapsulation_rejects_mismatched_version_encoding() {
        let mut cdr = Cdr::for_serialization(Buffer::new(8), Endianness::Little, CdrVersion::CorbaCdr);
        cdr.set_encoding(EncodingAlgorithm::PlCdr2);
        let err = cdr.write_encapsulation().unwrap_err();
        assert!(matches!(err, CdrError::BadParam { .. }));
    }
}
