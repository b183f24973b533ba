// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::protocol::SharingId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An immutable set of sharing ids, stored as a bitset.
///
/// Party `i` is bit `i - 1`. Sets are ordered by their bitset value, which is
/// the order every table in the crate is indexed by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SharingIdSet(u64);

impl SharingIdSet {
    /// The largest number of parties a set can describe.
    pub const MAX_PARTIES: usize = 64;

    /// The empty set.
    pub const EMPTY: SharingIdSet = SharingIdSet(0);

    /// Build a set from its raw bitset.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Build a set from a list of ids.
    pub fn from_ids(ids: impl IntoIterator<Item = SharingId>) -> Self {
        ids.into_iter().fold(Self::EMPTY, |set, id| set.with(id))
    }

    /// The set `{1, ..., k}`.
    pub fn first(k: usize) -> Self {
        match k {
            0 => Self::EMPTY,
            k if k >= Self::MAX_PARTIES => Self(u64::MAX),
            k => Self((1u64 << k) - 1),
        }
    }

    /// The raw bitset.
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Returns a copy of this set that also contains `id`.
    pub fn with(self, id: SharingId) -> Self {
        Self(self.0 | Self::bit(id))
    }

    /// Membership test.
    pub fn contains(&self, id: SharingId) -> bool {
        self.0 & Self::bit(id) != 0
    }

    /// Number of ids in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns `true` for the empty set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Set union.
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The ids in the set, ascending.
    pub fn iter(&self) -> impl Iterator<Item = SharingId> {
        let bits = self.0;
        (0..Self::MAX_PARTIES)
            .filter(move |i| bits & (1u64 << i) != 0)
            .filter_map(|i| SharingId::new(i + 1).ok())
    }

    fn bit(id: SharingId) -> u64 {
        1u64 << (id.as_usize() - 1)
    }
}

impl Display for SharingIdSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ids = self
            .iter()
            .map(|id| id.as_usize().to_string())
            .collect::<Vec<_>>();
        write!(f, "{{{}}}", ids.join(","))
    }
}
