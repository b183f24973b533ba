// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::SharingIdSet;
use crate::{
    errors::{CallerError, Result},
    protocol::SharingId,
};
use tracing::error;

/// Enumerates the `k`-subsets of `{1, ..., n}` in lexicographic order.
///
/// The iterator is finite and can be restarted with [`Combinations::reset`].
#[derive(Clone, Debug)]
pub struct Combinations {
    n: usize,
    k: usize,
    // Current subset as ascending 1-based ids; `None` once exhausted.
    cursor: Option<Vec<usize>>,
}

impl Combinations {
    /// Creates the enumerator. When `k > n` it yields nothing.
    ///
    /// Fails if `n` exceeds [`SharingIdSet::MAX_PARTIES`], since the subsets
    /// could not be represented.
    pub fn new(n: usize, k: usize) -> Result<Self> {
        if n > SharingIdSet::MAX_PARTIES {
            error!(
                "Cannot enumerate subsets of {} parties, at most {} are supported",
                n,
                SharingIdSet::MAX_PARTIES
            );
            Err(CallerError::BadInput)?
        }
        let mut combinations = Self { n, k, cursor: None };
        combinations.reset();
        Ok(combinations)
    }

    /// Restart the enumeration from the first subset.
    pub fn reset(&mut self) {
        self.cursor = (self.k <= self.n).then(|| (1..=self.k).collect());
    }

    /// Total number of subsets, `C(n, k)`.
    pub fn count_total(&self) -> usize {
        binomial(self.n, self.k)
    }

    fn advance(&mut self) {
        let Some(current) = self.cursor.as_mut() else {
            return;
        };
        let (n, k) = (self.n, self.k);
        // Rightmost position that can still move right.
        match (0..k).rev().find(|&i| current[i] < n - k + i + 1) {
            Some(i) => {
                current[i] += 1;
                for j in i + 1..k {
                    current[j] = current[j - 1] + 1;
                }
            }
            None => self.cursor = None,
        }
    }
}

impl Iterator for Combinations {
    type Item = SharingIdSet;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor.as_ref()?;
        let set = SharingIdSet::from_ids(current.iter().filter_map(|&i| SharingId::new(i).ok()));
        self.advance();
        Some(set)
    }
}

/// `C(n, k)`, computed without overflow for the sizes a [`SharingIdSet`] can
/// hold.
pub(crate) fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u128, |acc, i| acc * (n - i) as u128 / (i + 1) as u128) as usize
}
