// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The seams user-defined types hook into the codec through (§6, §9).
//!
//! These are plain traits, not a dyn-dispatched vtable: generic code that
//! takes `T: CdrSerialize` monomorphizes per concrete `T`, the same way the
//! original's template-based "user type knows how to serialize itself"
//! contract does.

use crate::cdr::Cdr;
use crate::error::Result;
use crate::size_calc::SizeCalculator;

/// A type that knows how to write itself onto a [`Cdr`] stream.
pub trait CdrSerialize {
    fn serialize(&self, cdr: &mut Cdr) -> Result<()>;
}

/// A type that knows how to read itself back from a [`Cdr`] stream.
pub trait CdrDeserialize: Sized {
    fn deserialize(cdr: &mut Cdr) -> Result<Self>;
}

/// A type that can report its own serialized size without being encoded.
/// Optional: only types participating in the Size Calculator need it.
pub trait CdrSize {
    fn serialized_size(&self, calc: &mut SizeCalculator);
}

macro_rules! impl_primitive_traits {
    ($ty:ty, $ser:ident, $de:ident, $add:ident) => {
        impl CdrSerialize for $ty {
            fn serialize(&self, cdr: &mut Cdr) -> Result<()> {
                cdr.$ser(*self)
            }
        }
        impl CdrDeserialize for $ty {
            fn deserialize(cdr: &mut Cdr) -> Result<Self> {
                cdr.$de()
            }
        }
        impl CdrSize for $ty {
            fn serialized_size(&self, calc: &mut SizeCalculator) {
                calc.$add();
            }
        }
    };
}

impl_primitive_traits!(u8, serialize_u8, deserialize_u8, add_u8);
impl_primitive_traits!(i8, serialize_i8, deserialize_i8, add_i8);
impl_primitive_traits!(u16, serialize_u16, deserialize_u16, add_u16);
impl_primitive_traits!(i16, serialize_i16, deserialize_i16, add_i16);
impl_primitive_traits!(u32, serialize_u32, deserialize_u32, add_u32);
impl_primitive_traits!(i32, serialize_i32, deserialize_i32, add_i32);
impl_primitive_traits!(u64, serialize_u64, deserialize_u64, add_u64);
impl_primitive_traits!(i64, serialize_i64, deserialize_i64, add_i64);
impl_primitive_traits!(f32, serialize_f32, deserialize_f32, add_f32);
impl_primitive_traits!(f64, serialize_f64, deserialize_f64, add_f64);

impl CdrSerialize for bool {
    fn serialize(&self, cdr: &mut Cdr) -> Result<()> {
        cdr.serialize_bool(*self)
    }
}
impl CdrDeserialize for bool {
    fn deserialize(cdr: &mut Cdr) -> Result<Self> {
        cdr.deserialize_bool()
    }
}
impl CdrSize for bool {
    fn serialized_size(&self, calc: &mut SizeCalculator) {
        calc.add_bool();
    }
}

impl CdrSerialize for String {
    fn serialize(&self, cdr: &mut Cdr) -> Result<()> {
        cdr.serialize_string(self, None)
    }
}
impl CdrDeserialize for String {
    fn deserialize(cdr: &mut Cdr) -> Result<Self> {
        cdr.deserialize_string(None)
    }
}
impl CdrSize for String {
    fn serialized_size(&self, calc: &mut SizeCalculator) {
        calc.add_string(self);
    }
}

impl<T: CdrSerialize> CdrSerialize for Vec<T> {
    fn serialize(&self, cdr: &mut Cdr) -> Result<()> {
        cdr.serialize_sequence(self, |c, elem| elem.serialize(c))
    }
}
impl<T: CdrDeserialize> CdrDeserialize for Vec<T> {
    fn deserialize(cdr: &mut Cdr) -> Result<Self> {
        cdr.deserialize_sequence(0, |c| T::deserialize(c))
    }
}
impl<T: CdrSize> CdrSize for Vec<T> {
    fn serialized_size(&self, calc: &mut SizeCalculator) {
        calc.add_i32();
        for elem in self {
            elem.serialized_size(calc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::config::{CdrVersion, Endianness};

    #[test]
    fn test_u32_roundtrip_via_trait() {
        let mut cdr = Cdr::for_serialization(Buffer::new(8), Endianness::Little, CdrVersion::Xcdr2);
        42u32.serialize(&mut cdr).unwrap();
        let bytes = cdr.as_slice().to_vec();
        let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2);
        assert_eq!(u32::deserialize(&mut dec).unwrap(), 42);
    }

    #[test]
    fn test_vec_u32_roundtrip_via_trait() {
        let mut cdr = Cdr::for_serialization(Buffer::new(32), Endianness::Little, CdrVersion::Xcdr2);
        let v = vec![1u32, 2, 3];
        v.serialize(&mut cdr).unwrap();
        let bytes = cdr.as_slice().to_vec();
        let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2);
        assert_eq!(Vec::<u32>::deserialize(&mut dec).unwrap(), v);
    }

    #[test]
    fn test_size_calculator_matches_live_encode_for_vec() {
        let v = vec![1u32, 2, 3];
        let mut calc = SizeCalculator::new(CdrVersion::Xcdr2);
        v.serialized_size(&mut calc);

        let mut cdr = Cdr::for_serialization(Buffer::new(32), Endianness::Little, CdrVersion::Xcdr2);
        v.serialize(&mut cdr).unwrap();
        assert_eq!(cdr.len(), calc.size());
    }
}
