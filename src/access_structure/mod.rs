// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Combinatorics of `(t, n)`-threshold access structures.
//!
//! A `(t, n)` structure is described by its maximal unqualified sets: every
//! coalition of `t - 1` parties. A replicated sharing attaches one sub-share
//! to each such set and hands it to every party outside the set, so any `t`
//! parties together hold every sub-share while `t - 1` parties always miss
//! the one attached to their own coalition.
//!
//! The multiplication protocol additionally needs two load-balancing tables,
//! [`Rho`] and [`Chi`], which are derived here as well. They only exist for
//! ramp structures, i.e. when `2(t - 1) < n`.

mod combinations;
mod sharing_id_set;
mod tables;

pub use combinations::Combinations;
pub use sharing_id_set::SharingIdSet;
pub use tables::{build_chi, build_max_unqualified_sets, build_rho, Chi, Rho};

use crate::{
    errors::{CallerError, Result},
    protocol::SharingId,
};
use std::{collections::HashMap, fmt::Debug, sync::Arc};
use tracing::error;

/// The tables used by the multiplication protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulTables {
    rho: Rho,
    chi: Chi,
}

impl MulTables {
    /// The cross-term assignment.
    pub fn rho(&self) -> &Rho {
        &self.rho
    }

    /// The exclusive output slot of each party.
    pub fn chi(&self) -> &Chi {
        &self.chi
    }
}

struct Inner {
    threshold: usize,
    total: usize,
    sets: Vec<SharingIdSet>,
    positions: HashMap<SharingIdSet, usize>,
    mul_tables: Option<MulTables>,
}

/// A `(t, n)` threshold access structure together with everything derived
/// from it.
///
/// Construction enumerates the maximal unqualified sets once; the value is
/// cheap to clone and immutable afterwards.
#[derive(Clone)]
pub struct AccessStructure {
    inner: Arc<Inner>,
}

impl AccessStructure {
    /// Build the structure in which any `threshold` of `total` parties can
    /// reconstruct.
    pub fn new(threshold: usize, total: usize) -> Result<Self> {
        let sets = build_max_unqualified_sets(threshold, total)?;
        let positions = sets
            .iter()
            .enumerate()
            .map(|(index, set)| (*set, index))
            .collect();

        let mul_tables = if Self::satisfies_ramp(threshold, total) {
            Some(MulTables {
                rho: build_rho(&sets, total)?,
                chi: build_chi(&sets, total)?,
            })
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(Inner {
                threshold,
                total,
                sets,
                positions,
                mul_tables,
            }),
        })
    }

    fn satisfies_ramp(threshold: usize, total: usize) -> bool {
        (threshold - 1) * 2 < total
    }

    /// Number of parties needed to reconstruct.
    pub fn threshold(&self) -> usize {
        self.inner.threshold
    }

    /// Number of parties.
    pub fn total(&self) -> usize {
        self.inner.total
    }

    /// Returns `true` if two unqualified coalitions can never cover every
    /// party.
    pub fn is_ramp(&self) -> bool {
        self.inner.mul_tables.is_some()
    }

    /// The maximal unqualified sets, sorted.
    pub fn unqualified_sets(&self) -> &[SharingIdSet] {
        &self.inner.sets
    }

    /// Number of maximal unqualified sets, `C(n, t - 1)`.
    pub fn set_count(&self) -> usize {
        self.inner.sets.len()
    }

    /// Position of `set` in the sorted order.
    pub fn index_of(&self, set: &SharingIdSet) -> Option<usize> {
        self.inner.positions.get(set).copied()
    }

    /// The set at `index` in the sorted order.
    pub fn set_at(&self, index: usize) -> Option<SharingIdSet> {
        self.inner.sets.get(index).copied()
    }

    /// The globally agreed set `{1, ..., t - 1}` that absorbs public
    /// constants. It is always first in the sorted order.
    pub fn smallest_set(&self) -> SharingIdSet {
        self.inner.sets[0]
    }

    /// Indexed sets that do not contain `pid`, i.e. the sub-shares `pid`
    /// holds.
    pub fn sets_excluding(
        &self,
        pid: SharingId,
    ) -> impl Iterator<Item = (usize, SharingIdSet)> + '_ {
        self.inner
            .sets
            .iter()
            .copied()
            .enumerate()
            .filter(move |(_, set)| !set.contains(pid))
    }

    /// Parties outside `set`, ascending.
    pub fn parties_outside(&self, set: SharingIdSet) -> impl Iterator<Item = SharingId> {
        SharingId::all(self.total()).filter(move |pid| !set.contains(*pid))
    }

    /// The multiplication tables. Fails for structures that are not a ramp.
    pub fn mul_tables(&self) -> Result<&MulTables> {
        self.inner.mul_tables.as_ref().ok_or_else(|| {
            error!(
                "({}, {}) violates 2(t-1) < n, multiplication is not available",
                self.threshold(),
                self.total()
            );
            CallerError::RampRestrictionViolated.into()
        })
    }
}

impl PartialEq for AccessStructure {
    fn eq(&self, other: &Self) -> bool {
        self.threshold() == other.threshold() && self.total() == other.total()
    }
}

impl Eq for AccessStructure {}

impl Debug for AccessStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessStructure")
            .field("threshold", &self.threshold())
            .field("total", &self.total())
            .field("sets", &self.set_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InternalError;

    #[test]
    fn two_of_three_has_three_singletons() -> Result<()> {
        let access = AccessStructure::new(2, 3)?;
        assert_eq!(access.set_count(), 3);
        assert_eq!(access.smallest_set().to_string(), "{1}");
        assert!(access.is_ramp());

        let holder = SharingId::new(2)?;
        let held = access
            .sets_excluding(holder)
            .map(|(_, set)| set.to_string())
            .collect::<Vec<_>>();
        assert_eq!(held, vec!["{1}", "{3}"]);
        Ok(())
    }

    #[test]
    fn any_t_parties_cover_every_set() -> Result<()> {
        let access = AccessStructure::new(3, 5)?;
        for coalition in Combinations::new(5, 3)? {
            let covered = access
                .unqualified_sets()
                .iter()
                .filter(|set| coalition.iter().any(|pid| !set.contains(pid)))
                .count();
            assert_eq!(covered, access.set_count());
        }
        for coalition in Combinations::new(5, 2)? {
            let missed = access
                .unqualified_sets()
                .iter()
                .filter(|set| coalition.iter().all(|pid| set.contains(pid)))
                .count();
            assert_eq!(missed, 1);
        }
        Ok(())
    }

    #[test]
    fn non_ramp_structures_have_no_mul_tables() -> Result<()> {
        let access = AccessStructure::new(3, 4)?;
        assert!(!access.is_ramp());
        assert_eq!(
            access.mul_tables().unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::RampRestrictionViolated)
        );
        Ok(())
    }

    #[test]
    fn index_lookup_matches_order() -> Result<()> {
        let access = AccessStructure::new(3, 6)?;
        for (index, set) in access.unqualified_sets().iter().enumerate() {
            assert_eq!(access.index_of(set), Some(index));
            assert_eq!(access.set_at(index), Some(*set));
        }
        assert_eq!(access.index_of(&SharingIdSet::first(3)), None);
        Ok(())
    }
}
