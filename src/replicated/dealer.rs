// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{opts::SharingOpts, share::Share, value::ShareValue};
use crate::{
    access_structure::{AccessStructure, SharingIdSet},
    errors::{CallerError, InternalError, Result},
    protocol::SharingId,
};
use rand::{CryptoRng, RngCore};
use std::{collections::BTreeMap, marker::PhantomData};
use tracing::{error, instrument};
use zeroize::{Zeroize, Zeroizing};

/// Splits secrets into replicated shares and puts them back together.
///
/// A dealer only carries `(t, n)` and the sampling options, so the same
/// instance can share any number of secrets.
#[derive(Clone, Debug)]
pub struct Dealer<V> {
    access_structure: AccessStructure,
    opts: SharingOpts,
    _value: PhantomData<V>,
}

impl<V: ShareValue> Dealer<V> {
    /// Creates a dealer for a `(t, n)` structure.
    ///
    /// Fails unless `t >= 2`, `n >= 2` and `2(t - 1) < n`, or if `V` cannot
    /// be sampled under `opts`.
    pub fn new(threshold: usize, total: usize, opts: SharingOpts) -> Result<Self> {
        let access_structure = AccessStructure::new(threshold, total)?;
        Self::from_access_structure(access_structure, opts)
    }

    /// Like [`Dealer::new`], reusing an existing access structure.
    pub fn from_access_structure(
        access_structure: AccessStructure,
        opts: SharingOpts,
    ) -> Result<Self> {
        if !access_structure.is_ramp() {
            error!(
                "Dealer needs 2(t-1) < n, got ({}, {})",
                access_structure.threshold(),
                access_structure.total()
            );
            Err(CallerError::RampRestrictionViolated)?
        }
        V::check_opts(&opts)?;
        Ok(Self {
            access_structure,
            opts,
            _value: PhantomData,
        })
    }

    /// The access structure shares are produced for.
    pub fn access_structure(&self) -> &AccessStructure {
        &self.access_structure
    }

    /// The sampling options.
    pub fn opts(&self) -> &SharingOpts {
        &self.opts
    }

    fn normalize(&self, value: V) -> V {
        match self.opts.modulus() {
            Some(modulus) => value.reduce(modulus),
            None => value,
        }
    }

    /// Split `secret` into one share per party.
    ///
    /// Every unqualified set except the smallest gets a random sub-share;
    /// the smallest set gets `secret` minus their sum.
    #[instrument(skip_all, err(Debug))]
    pub fn share<R: RngCore + CryptoRng>(
        &self,
        secret: &V,
        rng: &mut R,
    ) -> Result<BTreeMap<SharingId, Share<V>>> {
        let sets = self.access_structure.unqualified_sets();

        let mut sub_shares = Vec::with_capacity(sets.len());
        let mut sum = Zeroizing::new(V::zero());
        for _ in 1..sets.len() {
            let sub_share = V::sample(&self.opts, rng)?;
            *sum = sum.plus(&sub_share);
            sub_shares.push(sub_share);
        }
        let first = self.normalize(secret.minus(&sum));
        sub_shares.insert(0, first);

        let total = self.access_structure.total();
        let threshold = self.access_structure.threshold();
        let shares = SharingId::all(total)
            .map(|pid| {
                let held = self
                    .access_structure
                    .sets_excluding(pid)
                    .map(|(index, set)| (set, sub_shares[index].clone()))
                    .collect();
                (pid, Share::new(pid, threshold, total, held))
            })
            .collect();

        sub_shares.iter_mut().for_each(|value| value.zeroize());
        Ok(shares)
    }

    /// Recover the secret from a qualified collection of shares.
    ///
    /// Sub-shares that appear in more than one share must agree. The merged
    /// sub-shares must cover every unqualified set.
    #[instrument(skip_all, err(Debug))]
    pub fn reveal(&self, shares: &[Share<V>]) -> Result<V> {
        let mut merged: BTreeMap<SharingIdSet, &V> = BTreeMap::new();
        for share in shares {
            share.validate(&self.access_structure, false)?;
            for (set, value) in share.sub_shares() {
                match merged.get(set) {
                    Some(existing) if *existing != value => {
                        error!(
                            "Share of {} disagrees with an earlier share on {}",
                            share.sharing_id(),
                            set
                        );
                        Err(InternalError::InconsistentSubShare(*set))?
                    }
                    Some(_) => {}
                    None => {
                        let _ = merged.insert(*set, value);
                    }
                }
            }
        }

        let required = self.access_structure.set_count();
        if merged.len() < required {
            error!(
                "Cannot reveal from {} shares covering {} of {} sets",
                shares.len(),
                merged.len(),
                required
            );
            Err(InternalError::ThresholdNotMet {
                required,
                found: merged.len(),
            })?
        }

        let sum = merged
            .values()
            .fold(V::zero(), |sum, value| sum.plus(value));
        Ok(self.normalize(sum))
    }
}
