// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    access_structure::SharingIdSet,
    errors::{CallerError, Result},
    protocol::{Identifier, SharingId},
    replicated::{SharingOpts, ShareValue},
};
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug};
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a seed contribution and of a combined key.
pub const SEED_BYTES: usize = 32;

pub(crate) type SeedBytes = [u8; SEED_BYTES];

pub(crate) fn xor_into(acc: &mut SeedBytes, other: &SeedBytes) {
    acc.iter_mut().zip(other).for_each(|(a, b)| *a ^= b);
}

/// A party's output of the PRSS setup: one combined key per maximal
/// unqualified set the party is not part of.
///
/// Every party outside a set holds the same key for it, so all of them can
/// draw identical pseudorandom values without talking to each other. Parties
/// inside the set never see any of its contributions.
#[derive(Clone, Serialize, Deserialize)]
pub struct PseudoRandomSeed {
    owner: SharingId,
    threshold: usize,
    total: usize,
    keys: BTreeMap<SharingIdSet, SeedBytes>,
}

impl PseudoRandomSeed {
    pub(crate) fn new(
        owner: SharingId,
        threshold: usize,
        total: usize,
        keys: BTreeMap<SharingIdSet, SeedBytes>,
    ) -> Self {
        Self {
            owner,
            threshold,
            total,
            keys,
        }
    }

    /// The party holding this seed.
    pub fn sharing_id(&self) -> SharingId {
        self.owner
    }

    /// The `(t, n)` pair the seed was set up for.
    ///
    /// `t - 1` is the size of every covered set; `n` is carried along since
    /// the owner's own id never appears in them.
    pub fn threshold_access_structure(&self) -> (usize, usize) {
        (self.threshold, self.total)
    }

    /// Sets this party holds a key for, ascending.
    pub fn sets(&self) -> impl Iterator<Item = SharingIdSet> + '_ {
        self.keys.keys().copied()
    }

    /// Returns `true` if the seed can produce a stream for `set`.
    pub fn holds(&self, set: &SharingIdSet) -> bool {
        self.keys.contains_key(set)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no key is held.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The deterministic stream for `set` within `domain`.
    ///
    /// Every party outside `set` gets the same stream for the same domain.
    /// Use a fresh domain, typically the session id, for every run.
    pub fn stream(&self, set: &SharingIdSet, domain: &Identifier) -> Result<PrssStream> {
        let key = self.keys.get(set).ok_or_else(|| {
            error!("{} holds no PRSS key for {}", self.owner, set);
            CallerError::BadInput
        })?;

        let mut transcript = Transcript::new(b"replicated PRSS stream");
        transcript.append_message(b"key", key);
        transcript.append_message(b"set", &serialize!(set)?);
        transcript.append_message(b"domain", &serialize!(domain)?);
        Ok(PrssStream { transcript })
    }

    /// Draw one value for `set` the same way [`Dealer`](crate::Dealer)
    /// draws a random sub-share.
    pub fn sample<V: ShareValue>(
        &self,
        set: &SharingIdSet,
        domain: &Identifier,
        opts: &SharingOpts,
    ) -> Result<V> {
        let mut stream = self.stream(set, domain)?;
        V::sample(opts, &mut stream)
    }
}

impl Zeroize for PseudoRandomSeed {
    fn zeroize(&mut self) {
        self.keys.values_mut().for_each(|key| key.zeroize());
    }
}

impl Drop for PseudoRandomSeed {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for PseudoRandomSeed {}

impl Debug for PseudoRandomSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudoRandomSeed")
            .field("owner", &self.owner)
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .field("sets", &self.keys.keys().collect::<Vec<_>>())
            .field("keys", &"[redacted]")
            .finish()
    }
}

/// A keyed pseudorandom stream, usable anywhere a [`CryptoRng`] is.
pub struct PrssStream {
    transcript: Transcript,
}

impl RngCore for PrssStream {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.transcript.challenge_bytes(b"prss output", dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for PrssStream {}

impl Debug for PrssStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrssStream([redacted])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;
    use libpaillier::unknown_order::BigNumber;
    use rand::Rng;

    fn seed_with(owner: usize, key: SeedBytes) -> PseudoRandomSeed {
        let set = SharingIdSet::from_ids([SharingId::new(3).unwrap()]);
        PseudoRandomSeed::new(
            SharingId::new(owner).unwrap(),
            2,
            3,
            BTreeMap::from([(set, key)]),
        )
    }

    #[test]
    fn equal_keys_give_equal_streams() -> Result<()> {
        let mut rng = init_testing();
        let key: SeedBytes = rng.gen();
        let (a, b) = (seed_with(1, key), seed_with(2, key));
        let set = a.sets().next().unwrap();
        let sid = Identifier::random(&mut rng);

        let mut left = [0u8; 64];
        let mut right = [0u8; 64];
        a.stream(&set, &sid)?.fill_bytes(&mut left);
        b.stream(&set, &sid)?.fill_bytes(&mut right);
        assert_eq!(left, right);

        let opts = SharingOpts::with_bit_length(64)?;
        let x: BigNumber = a.sample(&set, &sid, &opts)?;
        let y: BigNumber = b.sample(&set, &sid, &opts)?;
        assert_eq!(x, y);
        Ok(())
    }

    #[test]
    fn domains_separate_streams() -> Result<()> {
        let mut rng = init_testing();
        let seed = seed_with(1, rng.gen());
        let set = seed.sets().next().unwrap();
        let first = seed.stream(&set, &Identifier::random(&mut rng))?.next_u64();
        let second = seed.stream(&set, &Identifier::random(&mut rng))?.next_u64();
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn unknown_sets_have_no_stream() {
        let mut rng = init_testing();
        let seed = seed_with(1, rng.gen());
        let inside = SharingIdSet::from_ids([SharingId::new(1).unwrap()]);
        assert!(!seed.holds(&inside));
        assert!(seed.stream(&inside, &Identifier::random(&mut rng)).is_err());
        assert!(format!("{seed:?}").contains("[redacted]"));
    }
}
