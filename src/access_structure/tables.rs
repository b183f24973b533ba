// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Deterministic tables derived from the maximal unqualified sets.
//!
//! Every party computes these locally from `(t, n)` and gets the same result,
//! so no agreement round is needed.

use super::{combinations::Combinations, SharingIdSet};
use crate::{
    errors::{CallerError, InternalError, Result},
    protocol::SharingId,
};
use tracing::{debug, error};

/// Enumerate the maximal unqualified sets of a `(t, n)` structure: every
/// subset of size `t - 1`, sorted by bitset value.
pub fn build_max_unqualified_sets(threshold: usize, total: usize) -> Result<Vec<SharingIdSet>> {
    if threshold < 2 || total < 2 || threshold - 1 >= total || total > SharingIdSet::MAX_PARTIES {
        error!(
            "Cannot build unqualified sets for threshold {} of {} parties",
            threshold, total
        );
        Err(CallerError::InvalidAccessStructure)?
    }

    let mut sets = Combinations::new(total, threshold - 1)?.collect::<Vec<_>>();
    sets.sort();
    debug!(
        "Built {} maximal unqualified sets for ({}, {})",
        sets.len(),
        threshold,
        total
    );
    Ok(sets)
}

/// Assigns every ordered pair of unqualified sets `(L, R)` to a party outside
/// `L ∪ R`. That party computes the cross term `x_L * y_R` during
/// multiplication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rho {
    // `assignee[l][r]` for set indices `l`, `r`.
    assignee: Vec<Vec<SharingId>>,
}

impl Rho {
    /// The party responsible for the pair of set indices `(l, r)`.
    pub fn get(&self, l: usize, r: usize) -> Option<SharingId> {
        self.assignee.get(l).and_then(|row| row.get(r)).copied()
    }

    /// All index pairs assigned to `pid`, in ascending `(l, r)` order.
    pub fn pairs_for(&self, pid: SharingId) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.assignee.iter().enumerate().flat_map(move |(l, row)| {
            row.iter()
                .enumerate()
                .filter(move |(_, assignee)| **assignee == pid)
                .map(move |(r, _)| (l, r))
        })
    }

    /// Number of sets on each side.
    pub fn len(&self) -> usize {
        self.assignee.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.assignee.is_empty()
    }
}

/// Build the [`Rho`] table.
///
/// Pairs are visited from the largest set index downward; each picks the
/// least-loaded party outside `L ∪ R`, breaking ties by ascending id. This
/// spreads the `|sets|^2` cross terms over the parties.
pub fn build_rho(sets: &[SharingIdSet], total: usize) -> Result<Rho> {
    let m = sets.len();
    let mut usage = vec![0usize; total];
    let placeholder = SharingId::new(1)?;
    let mut assignee = vec![vec![placeholder; m]; m];

    for l in (0..m).rev() {
        for r in (0..m).rev() {
            let covered = sets[l].union(&sets[r]);
            let chosen = SharingId::all(total)
                .filter(|pid| !covered.contains(*pid))
                .min_by_key(|pid| (usage[pid.as_usize() - 1], *pid))
                .ok_or_else(|| {
                    error!(
                        "No party outside of {} and {}; the access structure is not a ramp",
                        sets[l], sets[r]
                    );
                    InternalError::CallingApplicationMistake(CallerError::RampRestrictionViolated)
                })?;
            usage[chosen.as_usize() - 1] += 1;
            assignee[l][r] = chosen;
        }
    }

    debug!("Rho load per party: {:?}", usage);
    Ok(Rho { assignee })
}

/// Assigns every party one unqualified set it is not part of. The map is
/// injective: during multiplication the assigned set is the one output slot
/// that party alone fills.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chi {
    // `assigned[i]` is the set index for sharing id `i + 1`.
    assigned: Vec<usize>,
}

impl Chi {
    /// The set index assigned to `pid`.
    pub fn get(&self, pid: SharingId) -> Option<usize> {
        self.assigned.get(pid.as_usize() - 1).copied()
    }

    /// The party a set index is assigned to, if any.
    pub fn owner_of(&self, set_index: usize) -> Option<SharingId> {
        self.assigned
            .iter()
            .position(|&assigned| assigned == set_index)
            .and_then(|i| SharingId::new(i + 1).ok())
    }

    /// Number of entries; equal to the number of parties.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Build the [`Chi`] table.
///
/// Ids are visited from `n` down to `1`; each takes the first set left in the
/// pool that does not contain it.
pub fn build_chi(sets: &[SharingIdSet], total: usize) -> Result<Chi> {
    let mut pool = (0..sets.len()).collect::<Vec<_>>();
    let mut assigned = vec![0usize; total];

    for pid in SharingId::all(total).collect::<Vec<_>>().into_iter().rev() {
        let position = pool
            .iter()
            .position(|&index| !sets[index].contains(pid))
            .ok_or_else(|| {
                error!("Ran out of unqualified sets while assigning {}", pid);
                InternalError::CallingApplicationMistake(CallerError::InvalidAccessStructure)
            })?;
        assigned[pid.as_usize() - 1] = pool.remove(position);
    }

    Ok(Chi { assigned })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const RAMP_STRUCTURES: [(usize, usize); 5] = [(2, 3), (2, 5), (3, 5), (3, 6), (4, 7)];

    #[test]
    fn unqualified_sets_are_sorted_and_sized() -> Result<()> {
        let sets = build_max_unqualified_sets(3, 5)?;
        assert_eq!(sets.len(), 10);
        assert!(sets.windows(2).all(|w| w[0] < w[1]));
        assert!(sets.iter().all(|s| s.len() == 2));
        assert_eq!(sets[0], SharingIdSet::first(2));
        Ok(())
    }

    #[test]
    fn invalid_structures_are_rejected() {
        for (t, n) in [(1, 3), (2, 1), (5, 4), (4, 3), (2, 65)] {
            assert_eq!(
                build_max_unqualified_sets(t, n).unwrap_err(),
                InternalError::CallingApplicationMistake(CallerError::InvalidAccessStructure)
            );
        }
    }

    #[test]
    fn rho_covers_every_pair_outside_both_sets() -> Result<()> {
        for (t, n) in RAMP_STRUCTURES {
            let sets = build_max_unqualified_sets(t, n)?;
            let rho = build_rho(&sets, n)?;
            assert_eq!(rho.len(), sets.len());
            for l in 0..sets.len() {
                for r in 0..sets.len() {
                    let pid = rho.get(l, r).unwrap();
                    assert!(!sets[l].contains(pid));
                    assert!(!sets[r].contains(pid));
                }
            }
            let assigned_pairs: usize = SharingId::all(n).map(|pid| rho.pairs_for(pid).count()).sum();
            assert_eq!(assigned_pairs, sets.len() * sets.len());
        }
        Ok(())
    }

    #[test]
    fn rho_spreads_load() -> Result<()> {
        let sets = build_max_unqualified_sets(2, 3)?;
        let rho = build_rho(&sets, 3)?;
        let loads = SharingId::all(3)
            .map(|pid| rho.pairs_for(pid).count())
            .collect::<Vec<_>>();
        assert_eq!(loads.iter().sum::<usize>(), 9);
        assert!(loads.iter().all(|&load| load == 3));
        Ok(())
    }

    #[test]
    fn rho_needs_the_ramp_restriction() -> Result<()> {
        // (3, 4): {1,2} and {3,4} cover everyone.
        let sets = build_max_unqualified_sets(3, 4)?;
        assert_eq!(
            build_rho(&sets, 4).unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::RampRestrictionViolated)
        );
        Ok(())
    }

    #[test]
    fn chi_is_injective_and_excludes_its_party() -> Result<()> {
        for (t, n) in RAMP_STRUCTURES {
            let sets = build_max_unqualified_sets(t, n)?;
            let chi = build_chi(&sets, n)?;
            assert_eq!(chi.len(), n);
            let mut seen = HashSet::new();
            for pid in SharingId::all(n) {
                let index = chi.get(pid).unwrap();
                assert!(!sets[index].contains(pid));
                assert!(seen.insert(index));
                assert_eq!(chi.owner_of(index), Some(pid));
            }
        }
        Ok(())
    }

    #[test]
    fn tables_are_deterministic() -> Result<()> {
        let sets = build_max_unqualified_sets(3, 6)?;
        assert_eq!(build_rho(&sets, 6)?, build_rho(&sets, 6)?);
        assert_eq!(build_chi(&sets, 6)?, build_chi(&sets, 6)?);
        Ok(())
    }
}
