// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Two-round multiplication of replicated shares.
//!
//! # High-level protocol description
//! Both variants start the same way. Every cross term `x_L * y_R` of the
//! product is owned by the party `rho[L][R]`, which is outside both `L` and
//! `R` and therefore holds both factors. Party `p` sums its cross terms into
//! `v_p`, and `Σ_p v_p = x * y`.
//!
//! - [`MulParticipant`] produces a fresh sharing of `x * y`. Each party is
//!   the sole aggregator of one output slot, its `chi` set. It blinds `v_p`
//!   with PRSS values for every other set it is outside of and sends the
//!   result to the holders of its `chi` slot. The parties outside each set
//!   add the matching PRSS values back into that set's sub-share, so every
//!   blinding value is added exactly once and subtracted exactly once.
//! - [`PublicMulParticipant`] opens `x * y`. For each set, the parties
//!   outside it derive a ring of PRSS values and add the difference of two
//!   consecutive ones to their `v_p`. The masks telescope to zero, so the sum
//!   of all broadcast values is the product.
//!
//! Both participants accept a batch of factor pairs and run all products in
//! the same two rounds. Each run needs a fresh session id; the PRSS streams
//! are keyed by it.

mod messages;
mod private;
mod public;

pub use messages::{MulMessage, PublicMulMessage};
pub use private::MulParticipant;
pub use public::PublicMulParticipant;

use crate::{
    access_structure::{AccessStructure, MulTables, SharingIdSet},
    errors::{CallerError, InternalError, Result},
    protocol::{Identifier, SharingConfig, SharingId},
    prss::{PrssStream, PseudoRandomSeed},
    replicated::{Share, ShareValue, SharingOpts},
};
use tracing::error;

/// `⌈log2(x)⌉`, with `0` for `x <= 1`.
fn ceil_log2(x: u128) -> usize {
    match x {
        0 | 1 => 0,
        x => (u128::BITS - (x - 1).leading_zeros()) as usize,
    }
}

/// Inputs common to both multiplication variants, validated once.
struct MulContext<V: ShareValue> {
    sid: Identifier,
    config: SharingConfig,
    seed: PseudoRandomSeed,
    opts: SharingOpts,
    // Over the integers `v_p` sums up to `m^2` cross terms, and the first
    // sub-share of a factor can grow to `m` times the bound of the others,
    // so masks are widened by `log2(m^4)` bits.
    mask_opts: SharingOpts,
    pairs: Vec<(Share<V>, Share<V>)>,
}

impl<V: ShareValue> MulContext<V> {
    fn new(
        sid: Identifier,
        config: SharingConfig,
        seed: PseudoRandomSeed,
        opts: SharingOpts,
        pairs: Vec<(Share<V>, Share<V>)>,
    ) -> Result<Self> {
        let access_structure = config.access_structure();
        let me = config.id();
        let _ = access_structure.mul_tables()?;
        V::check_opts(&opts)?;

        if pairs.is_empty() {
            error!("Multiplication needs at least one pair of factors");
            Err(CallerError::BadInput)?
        }
        if seed.sharing_id() != me
            || seed.threshold_access_structure()
                != (access_structure.threshold(), access_structure.total())
        {
            error!("PRSS seed of {} does not fit {}", seed.sharing_id(), me);
            Err(CallerError::BadInput)?
        }
        for share in pairs.iter().flat_map(|(x, y)| [x, y]) {
            if share.sharing_id() != me {
                error!("{} was given a share of {}", me, share.sharing_id());
                Err(CallerError::BadInput)?
            }
            share.validate(access_structure, true)?;
        }

        let set_count = access_structure.set_count() as u128;
        let mask_opts = opts.widened_by(2 * ceil_log2(set_count * set_count));

        Ok(Self {
            sid,
            config,
            seed,
            opts,
            mask_opts,
            pairs,
        })
    }

    fn me(&self) -> SharingId {
        self.config.id()
    }

    fn access_structure(&self) -> &AccessStructure {
        self.config.access_structure()
    }

    fn tables(&self) -> Result<&MulTables> {
        self.access_structure().mul_tables()
    }

    fn batch_len(&self) -> usize {
        self.pairs.len()
    }

    fn normalize(&self, value: V) -> V {
        match self.opts.modulus() {
            Some(modulus) => value.reduce(modulus),
            None => value,
        }
    }

    fn stream(&self, set: &SharingIdSet) -> Result<PrssStream> {
        self.seed.stream(set, &self.sid)
    }

    /// Draw one mask. Masks exceed any `v_p` by the statistical security
    /// parameter.
    fn draw(&self, stream: &mut PrssStream) -> Result<V> {
        V::sample(&self.mask_opts, stream)
    }

    /// `v_p` for every pair: the sum of the cross terms assigned to this
    /// party by `rho`.
    fn cross_terms(&self) -> Result<Vec<V>> {
        let me = self.me();
        let sets = self.access_structure().unqualified_sets();
        let assigned = self.tables()?.rho().pairs_for(me).collect::<Vec<_>>();

        self.pairs
            .iter()
            .map(|(x, y)| {
                assigned.iter().try_fold(V::zero(), |sum, &(l, r)| {
                    let (Some(x_l), Some(y_r)) = (x.sub_share(&sets[l]), y.sub_share(&sets[r]))
                    else {
                        error!("{} lacks a factor of a cross term it owns", me);
                        return Err(InternalError::InternalInvariantFailed);
                    };
                    Ok(sum.plus(&x_l.times(y_r)))
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::{
        access_structure::AccessStructure,
        errors::Result,
        protocol::SharingId,
        prss::simulate_prss,
        replicated::{Dealer, Share, ShareValue, STATISTICAL_SECURITY_BITS},
    };
    use libpaillier::unknown_order::BigNumber;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn abs(value: &BigNumber) -> BigNumber {
        match value < &BigNumber::zero() {
            true => -value.clone(),
            false => value.clone(),
        }
    }

    /// Whether `masked - plain` is larger than `plain` by close to the
    /// statistical security parameter. 32 bits of slack keep the check
    /// from failing on an unlucky small mask.
    pub(crate) fn mask_dominates(masked: &BigNumber, plain: &BigNumber) -> bool {
        let mask = abs(&(masked - plain));
        mask >= (abs(plain) + BigNumber::one()) << (STATISTICAL_SECURITY_BITS - 32)
    }

    /// Everything a quorum needs to multiply: PRSS seeds plus shares of
    /// `batch` random factor pairs.
    pub(crate) struct Fixture<V: ShareValue> {
        pub(crate) dealer: Dealer<V>,
        pub(crate) seeds: BTreeMap<SharingId, crate::prss::PseudoRandomSeed>,
        pub(crate) factors: Vec<(V, V)>,
        pub(crate) shares: BTreeMap<SharingId, Vec<(Share<V>, Share<V>)>>,
    }

    impl<V: ShareValue> Fixture<V> {
        pub(crate) fn new(
            dealer: Dealer<V>,
            batch: usize,
            mut random_value: impl FnMut(&mut StdRng) -> V,
            rng: &mut StdRng,
        ) -> Result<Self> {
            let access: AccessStructure = dealer.access_structure().clone();
            let seeds = simulate_prss(&access, rng)?;
            let mut shares: BTreeMap<SharingId, Vec<_>> = BTreeMap::new();
            let mut factors = Vec::new();
            for _ in 0..batch {
                let (x, y) = (random_value(rng), random_value(rng));
                let xs = dealer.share(&x, rng)?;
                let mut ys = dealer.share(&y, rng)?;
                for (pid, x_share) in xs {
                    if let Some(y_share) = ys.remove(&pid) {
                        shares.entry(pid).or_default().push((x_share, y_share));
                    }
                }
                factors.push((x, y));
            }
            Ok(Self {
                dealer,
                seeds,
                factors,
                shares,
            })
        }
    }
}
