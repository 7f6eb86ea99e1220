// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bit-exact CDR/XCDR codec for CORBA CDR, DDS CDR, and Extended CDR v1/v2
//! (Plain, Parameter List, Delimited) wire formats.
//!
//! The single stateful type is [`Cdr`]: a buffer plus the cursor,
//! alignment, and member-framing state needed to serialize or deserialize
//! any of these wire formats. [`SizeCalculator`] mirrors the same
//! alignment/framing arithmetic to compute a value's serialized size
//! without producing bytes.
//!
//! ```
//! use xcdr::{Buffer, Cdr, CdrVersion, Endianness};
//!
//! let mut cdr = Cdr::for_serialization(Buffer::new(16), Endianness::Little, CdrVersion::Xcdr2);
//! cdr.write_encapsulation().unwrap();
//! cdr.serialize_u32(42).unwrap();
//!
//! let bytes = cdr.as_slice().to_vec();
//! let mut dec = Cdr::for_deserialization(Buffer::Owned(bytes), Endianness::Little, CdrVersion::Xcdr2);
//! dec.read_encapsulation().unwrap();
//! assert_eq!(dec.deserialize_u32().unwrap(), 42);
//! ```

mod buffer;
mod cdr;
mod composite;
mod config;
mod encapsulation;
mod error;
mod member;
mod size_calc;
mod state;
mod traits;

pub use buffer::Buffer;
pub use cdr::{Cdr, MEMBER_ID_INVALID};
pub use config::{CdrVersion, EncodingAlgorithm, Endianness, HeaderSelection};
pub use error::{CdrError, Result};
pub use size_calc::SizeCalculator;
pub use state::SavedState;
pub use traits::{CdrDeserialize, CdrSerialize, CdrSize};
