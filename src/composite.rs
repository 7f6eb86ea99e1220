// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Strings, fixed arrays, variable sequences, and maps (§4.3).

use crate::cdr::Cdr;
use crate::config::Endianness;
use crate::error::{CdrError, Result};

/// RAII guard that overrides `swap_bytes` for the duration of one composite
/// operation and restores it on drop, even on an error return (the
/// idiomatic Rust substitute for the original's try/finally-shaped
/// restoration, §4.3 "Endianness override").
struct EndiannessGuard<'a, 'b> {
    cdr: &'a mut Cdr<'b>,
    prev: bool,
}

impl<'a, 'b> EndiannessGuard<'a, 'b> {
    fn new(cdr: &'a mut Cdr<'b>, override_endianness: Option<Endianness>) -> Self {
        let prev = match override_endianness {
            Some(e) => cdr.set_effective_endianness(e),
            None => cdr.swap_bytes,
        };
        EndiannessGuard { cdr, prev }
    }
}

impl Drop for EndiannessGuard<'_, '_> {
    fn drop(&mut self) {
        self.cdr.restore_swap_bytes(self.prev);
    }
}

impl<'b> Cdr<'b> {
    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Narrow string: `uint32 length_including_nul` + payload + `\0`.
    pub fn serialize_string(&mut self, s: &str, endian: Option<Endianness>) -> Result<()> {
        let _guard = EndiannessGuard::new(self, endian);
        let guard_cdr: &mut Cdr = &mut *_guard.cdr;
        let total_len = u32::try_from(s.len() + 1)
            .map_err(|_| CdrError::bad_param("string too long for a 32-bit length prefix"))?;
        guard_cdr.serialize_u32(total_len)?;
        for byte in s.as_bytes() {
            guard_cdr.serialize_u8(*byte)?;
        }
        guard_cdr.serialize_u8(0)
    }

    /// Narrow string decode. A declared length of zero is tolerated (see
    /// §4.3) and decodes to an empty string even though the strict wire
    /// contract requires length >= 1.
    pub fn deserialize_string(&mut self, endian: Option<Endianness>) -> Result<String> {
        self.deserialize_bounded_string(usize::MAX, endian)
    }

    /// Narrow string decode enforcing a maximum length (the "fixed-capacity
    /// string" carrier from §4.3).
    pub fn deserialize_bounded_string(
        &mut self,
        max_len: usize,
        endian: Option<Endianness>,
    ) -> Result<String> {
        let _guard = EndiannessGuard::new(self, endian);
        let guard_cdr: &mut Cdr = &mut *_guard.cdr;
        let len = guard_cdr.deserialize_u32()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        if len - 1 > max_len {
            return Err(CdrError::bad_param(format!(
                "string length {} exceeds bound {}",
                len - 1,
                max_len
            )));
        }
        let mut bytes = Vec::with_capacity(len - 1);
        for _ in 0..len - 1 {
            bytes.push(guard_cdr.deserialize_u8()?);
        }
        let terminator = guard_cdr.deserialize_u8()?;
        if terminator != 0 {
            return Err(CdrError::bad_param("narrow string missing NUL terminator"));
        }
        String::from_utf8(bytes).map_err(|_| CdrError::bad_param("string is not valid UTF-8"))
    }

    /// Wide string: `uint32 length_in_code_units` + that many 32-bit code
    /// units; no terminator.
    pub fn serialize_wstring(&mut self, s: &str, endian: Option<Endianness>) -> Result<()> {
        let _guard = EndiannessGuard::new(self, endian);
        let guard_cdr: &mut Cdr = &mut *_guard.cdr;
        let units: Vec<u16> = s.encode_utf16().collect();
        let count = u32::try_from(units.len())
            .map_err(|_| CdrError::bad_param("wstring too long for a 32-bit length prefix"))?;
        guard_cdr.serialize_u32(count)?;
        for unit in units {
            guard_cdr.serialize_wchar(u32::from(unit))?;
        }
        Ok(())
    }

    pub fn deserialize_wstring(&mut self, endian: Option<Endianness>) -> Result<String> {
        let _guard = EndiannessGuard::new(self, endian);
        let guard_cdr: &mut Cdr = &mut *_guard.cdr;
        let count = guard_cdr.deserialize_u32()? as usize;
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            let unit = guard_cdr.deserialize_wchar()?;
            units.push(u16::try_from(unit).map_err(|_| {
                CdrError::bad_param("wide string code unit does not fit in 16 bits")
            })?);
        }
        String::from_utf16(&units).map_err(|_| CdrError::bad_param("wstring is not valid UTF-16"))
    }

    // ------------------------------------------------------------------
    // Fixed-size arrays
    // ------------------------------------------------------------------

    /// Serialize `count` consecutive elements via `encode_elem`.
    pub fn serialize_array<T, F>(&mut self, elements: &[T], count: usize, mut encode_elem: F) -> Result<()>
    where
        F: FnMut(&mut Cdr<'b>, &T) -> Result<()>,
    {
        if elements.len() != count {
            return Err(CdrError::bad_param(format!(
                "array length mismatch: expected {count}, got {}",
                elements.len()
            )));
        }
        for elem in elements {
            encode_elem(self, elem)?;
        }
        Ok(())
    }

    /// Deserialize exactly `count` elements via `decode_elem`.
    pub fn deserialize_array<T, F>(&mut self, count: usize, mut decode_elem: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Cdr<'b>) -> Result<T>,
    {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(decode_elem(self)?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Variable sequences
    // ------------------------------------------------------------------

    /// `int32 count` followed by `count` encoded elements.
    pub fn serialize_sequence<T, F>(&mut self, elements: &[T], mut encode_elem: F) -> Result<()>
    where
        F: FnMut(&mut Cdr<'b>, &T) -> Result<()>,
    {
        let count = i32::try_from(elements.len())
            .map_err(|_| CdrError::bad_param("sequence too long for a 32-bit count"))?;
        self.serialize_i32(count)?;
        for elem in elements {
            encode_elem(self, elem)?;
        }
        Ok(())
    }

    /// Decode a sequence. `min_element_bytes` is the smallest possible
    /// wire size of one element; the declared count is validated against
    /// remaining bytes before any element decode is attempted, and on a
    /// mid-way decode failure the pre-count cursor state is restored
    /// (§4.3 "Variable sequences").
    pub fn deserialize_sequence<T, F>(
        &mut self,
        min_element_bytes: usize,
        mut decode_elem: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&mut Cdr<'b>) -> Result<T>,
    {
        let saved = self.save_state();
        let count = self.deserialize_i32()?;
        if count < 0 {
            self.restore_state(saved);
            return Err(CdrError::bad_param(format!("negative sequence count {count}")));
        }
        let count = count as usize;
        let remaining = self.len.saturating_sub(self.offset);
        if count.saturating_mul(min_element_bytes) > remaining {
            self.restore_state(saved);
            return Err(CdrError::bad_param(format!(
                "sequence count {count} exceeds remaining bytes ({remaining})"
            )));
        }
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            match decode_elem(self) {
                Ok(v) => out.push(v),
                Err(e) => {
                    self.restore_state(saved);
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    /// Sequence of bool: one octet per element (no per-element alignment).
    pub fn serialize_bool_sequence(&mut self, elements: &[bool]) -> Result<()> {
        self.serialize_sequence(elements, |cdr, v| cdr.serialize_bool(*v))
    }

    pub fn deserialize_bool_sequence(&mut self) -> Result<Vec<bool>> {
        self.deserialize_sequence(1, |cdr| cdr.deserialize_bool())
    }

    // ------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------

    /// `int32 pair_count` followed by pair_count (key, value) pairs.
    /// Iteration order is caller-controlled and not semantically
    /// significant (§4.3 "Maps").
    pub fn serialize_map<'m, K, V, I, FK, FV>(
        &mut self,
        pairs: I,
        mut encode_key: FK,
        mut encode_value: FV,
    ) -> Result<()>
    where
        I: ExactSizeIterator<Item = (&'m K, &'m V)>,
        K: 'm,
        V: 'm,
        FK: FnMut(&mut Cdr<'b>, &K) -> Result<()>,
        FV: FnMut(&mut Cdr<'b>, &V) -> Result<()>,
    {
        let count = i32::try_from(pairs.len())
            .map_err(|_| CdrError::bad_param("map too long for a 32-bit count"))?;
        self.serialize_i32(count)?;
        for (k, v) in pairs {
            encode_key(self, k)?;
            encode_value(self, v)?;
        }
        Ok(())
    }

    /// Decode a map as a flat vector of pairs; callers fold it into
    /// whichever map type they use.
    pub fn deserialize_map<K, V, FK, FV>(
        &mut self,
        mut decode_key: FK,
        mut decode_value: FV,
    ) -> Result<Vec<(K, V)>>
    where
        FK: FnMut(&mut Cdr<'b>) -> Result<K>,
        FV: FnMut(&mut Cdr<'b>) -> Result<V>,
    {
        let saved = self.save_state();
        let count = self.deserialize_i32()?;
        if count < 0 {
            self.restore_state(saved);
            return Err(CdrError::bad_param(format!("negative map pair count {count}")));
        }
        let mut out = Vec::with_capacity((count as usize).min(4096));
        for _ in 0..count {
            let key = match decode_key(self) {
                Ok(k) => k,
                Err(e) => {
                    self.restore_state(saved);
                    return Err(e);
                }
            };
            let value = match decode_value(self) {
                Ok(v) => v,
                Err(e) => {
                    self.restore_state(saved);
                    return Err(e);
                }
            };
            out.push((key, value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::config::CdrVersion;

    fn cdr_le() -> Cdr<'static> {
        Cdr::for_serialization(Buffer::new(64), Endianness::Little, CdrVersion::Xcdr2)
    }

    fn decoder(bytes: Vec<u8>) -> Cdr<'static> {
        Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2)
    }

    #[test]
    fn test_string_roundtrip_hola() {
        let mut cdr = cdr_le();
        cdr.serialize_string("HOLA", None).unwrap();
        assert_eq!(
            cdr.as_slice(),
            &[0x05, 0x00, 0x00, 0x00, b'H', b'O', b'L', b'A', 0x00]
        );
        let mut dec = decoder(cdr.as_slice().to_vec());
        assert_eq!(dec.deserialize_string(None).unwrap(), "HOLA");
    }

    #[test]
    fn test_empty_narrow_string() {
        let mut cdr = cdr_le();
        cdr.serialize_string("", None).unwrap();
        assert_eq!(cdr.as_slice(), &[0x01, 0x00, 0x00, 0x00, 0x00]);
        let mut dec = decoder(cdr.as_slice().to_vec());
        assert_eq!(dec.deserialize_string(None).unwrap(), "");
    }

    #[test]
    fn test_zero_length_string_tolerated() {
        let mut dec = decoder(vec![0x00, 0x00, 0x00, 0x00]);
        assert_eq!(dec.deserialize_string(None).unwrap(), "");
    }

    #[test]
    fn test_empty_wide_string() {
        let mut cdr = cdr_le();
        cdr.serialize_wstring("", None).unwrap();
        assert_eq!(cdr.as_slice(), &[0x00, 0x00, 0x00, 0x00]);
        let mut dec = decoder(cdr.as_slice().to_vec());
        assert_eq!(dec.deserialize_wstring(None).unwrap(), "");
    }

    #[test]
    fn test_bounded_string_rejects_overflow() {
        let mut cdr = cdr_le();
        cdr.serialize_string("toolong", None).unwrap();
        let mut dec = decoder(cdr.as_slice().to_vec());
        assert!(dec.deserialize_bounded_string(3, None).is_err());
    }

    #[test]
    fn test_bool_sequence_roundtrip() {
        let mut cdr = cdr_le();
        cdr.serialize_bool_sequence(&[true, false, true]).unwrap();
        assert_eq!(
            cdr.as_slice(),
            &[0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]
        );
        let mut dec = decoder(cdr.as_slice().to_vec());
        assert_eq!(dec.deserialize_bool_sequence().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_sequence_count_overflow_is_rejected_and_rolls_back() {
        let mut dec = decoder(vec![0xFF, 0xFF, 0xFF, 0x7F]); // count = 2^31-1
        let before = dec.save_state();
        let err = dec.deserialize_sequence(4, |c| c.deserialize_u32()).unwrap_err();
        assert!(matches!(err, CdrError::BadParam { .. }));
        assert_eq!(dec.save_state(), before);
    }

    #[test]
    fn test_sequence_mid_decode_failure_restores_state() {
        // count = 2, but only one well-formed u32 follows. min_element_bytes
        // is 0 here (variable-size elements) so the upfront bound check
        // can't catch this; the failure must come from the element decode.
        let mut dec = decoder(vec![0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]);
        let before = dec.save_state();
        let err = dec.deserialize_sequence(0, |c| c.deserialize_u32()).unwrap_err();
        assert!(matches!(err, CdrError::NotEnoughMemory { .. }));
        assert_eq!(dec.save_state(), before);
    }

    #[test]
    fn test_map_roundtrip_as_pairs() {
        let mut cdr = cdr_le();
        let pairs: Vec<(u32, u16)> = vec![(1, 10), (2, 20)];
        cdr.serialize_map(
            pairs.iter().map(|(k, v)| (k, v)),
            |c, k| c.serialize_u32(*k),
            |c, v| c.serialize_u16(*v),
        )
        .unwrap();
        let mut dec = decoder(cdr.as_slice().to_vec());
        let decoded = dec
            .deserialize_map(|c| c.deserialize_u32(), |c| c.deserialize_u16())
            .unwrap();
        assert_eq!(decoded, pairs);
    }

    #[test]
    fn test_array_length_mismatch_rejected() {
        let mut cdr = cdr_le();
        let err = cdr
            .serialize_array(&[1u32, 2, 3], 4, |c, v| c.serialize_u32(*v))
            .unwrap_err();
        assert!(matches!(err, CdrError::BadParam { .. }));
    }

    #[test]
    fn test_cross_endian_string_override() {
        // Encode a buffer declared little-endian, but serialize this one
        // string as if big-endian, then restore afterward.
        let mut cdr = cdr_le();
        cdr.serialize_string("AB", Some(Endianness::Big)).unwrap();
        cdr.serialize_u16(0x0102).unwrap(); // back to declared little-endian
        let bytes = cdr.as_slice().to_vec();
        // length prefix 3 is BE-encoded: 00 00 00 03
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x00, 0x03]);
        // trailing u16 is LE-encoded again
        assert_eq!(&bytes[bytes.len() - 2..], &[0x02, 0x01]);
    }
}
