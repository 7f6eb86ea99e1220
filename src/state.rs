// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot of a [`crate::Cdr`] cursor, used to implement rollback on error
//! and PUSH/POP of `origin` at type/member boundaries.

use crate::config::{EncodingAlgorithm, HeaderSelection};

/// Bookkeeping captured for an in-flight member header so
/// `end_serialize_member` can decide whether to rewrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderFrame {
    /// Offset of the first byte of the member header (already aligned).
    pub header_offset: usize,
    /// Offset of the first byte of the member body, i.e. the new `origin`
    /// pushed for the duration of the member.
    pub body_start: usize,
    /// Selection in effect for this member.
    pub selection: HeaderSelection,
    /// Whether the provisional header written was the "short" form (no
    /// extended/NEXTINT slot reserved).
    pub wrote_short: bool,
    /// Member id carried by this header.
    pub member_id: u32,
    /// Must-understand bit for XCDRv2 EMHEADER (unused by XCDRv1).
    pub must_understand: bool,
}

/// A restorable snapshot of cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub(crate) offset: usize,
    pub(crate) origin: usize,
    pub(crate) swap_bytes: bool,
    pub(crate) last_data_size: usize,
    pub(crate) next_member_id: Option<u32>,
    pub(crate) encoding: EncodingAlgorithm,
    pub(crate) serialized_dheader: bool,
    pub(crate) dheader_slot: Option<usize>,
}
