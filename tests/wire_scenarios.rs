// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The six concrete byte-exact wire-format scenarios.

use xcdr::{Buffer, Cdr, CdrVersion, EncodingAlgorithm, Endianness, HeaderSelection};

#[test]
fn scenario_1_primitive_roundtrip_little_endian() {
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
fn scenario_2_pl_cdr2_optional_present_short_emheader() {
    let mut cdr = Cdr::for_serialization(Buffer::new(32), Endianness::Little, CdrVersion::Xcdr2);
    cdr.write_encapsulation().unwrap();
    let saved = cdr.begin_serialize_type(EncodingAlgorithm::PlCdr2).unwrap();
    cdr.set_header_selection(HeaderSelection::Short);
    cdr.serialize_member(1, false, true, false, |c| c.serialize_u8(0xCD)).unwrap();
    cdr.end_serialize_type(saved).unwrap();

    assert_eq!(
        cdr.as_slice(),
        &[
            0x00, 0x0b, 0x00, 0x00, // encapsulation
            0x05, 0x00, 0x00, 0x00, // DHEADER = 5
            0x01, 0x00, 0x00, 0x00, // EMHEADER: id=1, length_code=0, must_understand=0
            0xCD,
        ]
    );
}

#[test]
fn scenario_3_pl_cdr2_optional_present_long_emheader() {
    let mut cdr = Cdr::for_serialization(Buffer::new(32), Endianness::Little, CdrVersion::Xcdr2);
    cdr.write_encapsulation().unwrap();
    let saved = cdr.begin_serialize_type(EncodingAlgorithm::PlCdr2).unwrap();
    cdr.set_header_selection(HeaderSelection::Long);
    cdr.serialize_member(1, false, true, false, |c| c.serialize_u8(0xCD)).unwrap();
    cdr.end_serialize_type(saved).unwrap();

    assert_eq!(
        cdr.as_slice(),
        &[
            0x00, 0x0b, 0x00, 0x00, // encapsulation
            0x09, 0x00, 0x00, 0x00, // DHEADER = 9
            0x01, 0x00, 0x00, 0x40, // EMHEADER: id=1, length_code=4
            0x01, 0x00, 0x00, 0x00, // NEXTINT = 1
            0xCD,
        ]
    );
}

#[test]
fn scenario_4_string_roundtrip() {
    let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
    cdr.serialize_string("HOLA", None).unwrap();
    assert_eq!(
        cdr.as_slice(),
        &[0x05, 0x00, 0x00, 0x00, b'H', b'O', b'L', b'A', 0x00]
    );

    let bytes = cdr.as_slice().to_vec();
    let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2);
    assert_eq!(dec.deserialize_string(None).unwrap(), "HOLA");
}

#[test]
fn scenario_5_bool_sequence_roundtrip() {
    let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
    cdr.serialize_bool_sequence(&[true, false, true]).unwrap();
    assert_eq!(cdr.as_slice(), &[0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]);

    let bytes = cdr.as_slice().to_vec();
    let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2);
    assert_eq!(dec.deserialize_bool_sequence().unwrap(), vec![true, false, true]);
}

#[test]
fn scenario_6_alignment_short_circuit() {
    let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
    cdr.serialize_u16(1).unwrap();
    assert_eq!(cdr.position(), 2);
    cdr.serialize_u16(2).unwrap();
    assert_eq!(cdr.position(), 4);

    let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
    cdr.serialize_u8(1).unwrap();
    assert_eq!(cdr.position(), 1);
    cdr.serialize_u32(2).unwrap();
    assert_eq!(cdr.position(), 8);

    let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
    cdr.serialize_u32(1).unwrap();
    assert_eq!(cdr.position(), 4);
    cdr.serialize_u16(2).unwrap();
    assert_eq!(cdr.position(), 6);
}
