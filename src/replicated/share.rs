// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::value::ShareValue;
use crate::{
    access_structure::{AccessStructure, SharingIdSet},
    errors::{CallerError, Result},
    protocol::SharingId,
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug};
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One party's share of a replicated secret.
///
/// It holds one sub-share for every maximal unqualified set that does not
/// contain the owner. The secret is the sum of the sub-shares of all sets.
///
/// All operations here are local: parties apply the same operation to their
/// own shares and the results are shares of the combined secret.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Share<V: ShareValue> {
    owner: SharingId,
    threshold: usize,
    total: usize,
    sub_shares: BTreeMap<SharingIdSet, V>,
}

impl<V: ShareValue> Share<V> {
    pub(crate) fn new(
        owner: SharingId,
        threshold: usize,
        total: usize,
        sub_shares: BTreeMap<SharingIdSet, V>,
    ) -> Self {
        Self {
            owner,
            threshold,
            total,
            sub_shares,
        }
    }

    /// The party holding this share.
    pub fn sharing_id(&self) -> SharingId {
        self.owner
    }

    /// The `(t, n)` pair this share was produced for.
    pub fn threshold_access_structure(&self) -> (usize, usize) {
        (self.threshold, self.total)
    }

    /// The sub-share for `set`, if this share holds one.
    pub fn sub_share(&self, set: &SharingIdSet) -> Option<&V> {
        self.sub_shares.get(set)
    }

    /// Iterate over `(set, sub-share)` pairs in set order.
    pub fn sub_shares(&self) -> impl Iterator<Item = (&SharingIdSet, &V)> {
        self.sub_shares.iter()
    }

    /// Number of sub-shares held.
    pub fn len(&self) -> usize {
        self.sub_shares.len()
    }

    /// Returns `true` if the share holds no sub-shares.
    pub fn is_empty(&self) -> bool {
        self.sub_shares.is_empty()
    }

    /// Check that this share is a well-formed share for `access_structure`:
    /// the `(t, n)` pair matches and every sub-share belongs to an unqualified
    /// set that excludes the owner.
    ///
    /// A complete share also holds every such set; pass `complete = false`
    /// to accept partial shares, e.g. when revealing.
    pub fn validate(&self, access_structure: &AccessStructure, complete: bool) -> Result<()> {
        if self.threshold_access_structure()
            != (access_structure.threshold(), access_structure.total())
        {
            error!(
                "Share of {} is for ({}, {}), expected ({}, {})",
                self.owner,
                self.threshold,
                self.total,
                access_structure.threshold(),
                access_structure.total()
            );
            Err(CallerError::BadInput)?
        }
        if self.owner.as_usize() > self.total {
            error!("Share owner {} is outside of the structure", self.owner);
            Err(CallerError::BadInput)?
        }
        for set in self.sub_shares.keys() {
            if set.contains(self.owner) || access_structure.index_of(set).is_none() {
                error!("Share of {} carries a sub-share for {}", self.owner, set);
                Err(CallerError::BadInput)?
            }
        }
        if complete && self.len() != access_structure.sets_excluding(self.owner).count() {
            error!(
                "Share of {} holds {} sub-shares, expected {}",
                self.owner,
                self.len(),
                access_structure.sets_excluding(self.owner).count()
            );
            Err(CallerError::BadInput)?
        }
        Ok(())
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.owner != other.owner
            || self.threshold_access_structure() != other.threshold_access_structure()
            || !self.sub_shares.keys().eq(other.sub_shares.keys())
        {
            error!(
                "Cannot combine a share of {} for ({}, {}) with a share of {} for ({}, {})",
                self.owner,
                self.threshold,
                self.total,
                other.owner,
                other.threshold,
                other.total
            );
            Err(CallerError::BadInput)?
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, op: impl Fn(&V, &V) -> V) -> Result<Self> {
        self.check_compatible(other)?;
        let sub_shares = self
            .sub_shares
            .iter()
            .zip(other.sub_shares.values())
            .map(|((set, a), b)| (*set, op(a, b)))
            .collect();
        Ok(Self::new(self.owner, self.threshold, self.total, sub_shares))
    }

    fn map(&self, op: impl Fn(&V) -> V) -> Self {
        let sub_shares = self
            .sub_shares
            .iter()
            .map(|(set, value)| (*set, op(value)))
            .collect();
        Self::new(self.owner, self.threshold, self.total, sub_shares)
    }

    // Only the smallest set absorbs public constants, so every party touches
    // the same component. Parties inside that set have nothing to change.
    fn map_smallest(&self, op: impl Fn(&V) -> V) -> Result<Self> {
        let Some(size) = self.threshold.checked_sub(1) else {
            error!("Share of {} has a threshold of zero", self.owner);
            return Err(CallerError::BadInput.into());
        };
        let smallest = SharingIdSet::first(size);
        let mut result = self.clone();
        if let Some(value) = result.sub_shares.get_mut(&smallest) {
            let updated = op(value);
            *value = updated;
        }
        Ok(result)
    }

    /// A share of the sum of both secrets.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, V::plus)
    }

    /// A share of the difference of both secrets.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, V::minus)
    }

    /// A share of the secret times a public constant.
    pub fn mul_value(&self, constant: &V) -> Self {
        self.map(|value| value.times(constant))
    }

    /// A share of the negated secret.
    pub fn neg(&self) -> Self {
        self.map(V::negate)
    }

    /// A share of the secret plus a public constant.
    ///
    /// Fails if the share does not carry a valid threshold, which can only
    /// happen for deserialized shares.
    pub fn add_value(&self, constant: &V) -> Result<Self> {
        self.map_smallest(|value| value.plus(constant))
    }

    /// A share of the secret minus a public constant.
    pub fn sub_value(&self, constant: &V) -> Result<Self> {
        self.map_smallest(|value| value.minus(constant))
    }

    /// Replace every sub-share with its residue modulo `modulus`.
    pub fn reduce(&self, modulus: &BigNumber) -> Self {
        self.map(|value| value.reduce(modulus))
    }
}

impl<V: ShareValue> Zeroize for Share<V> {
    fn zeroize(&mut self) {
        self.sub_shares
            .values_mut()
            .for_each(|value| value.zeroize());
    }
}

impl<V: ShareValue> Drop for Share<V> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<V: ShareValue> ZeroizeOnDrop for Share<V> {}

impl<V: ShareValue> Debug for Share<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("owner", &self.owner)
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .field("sets", &self.sub_shares.keys().collect::<Vec<_>>())
            .field("sub_shares", &"[redacted]")
            .finish()
    }
}
