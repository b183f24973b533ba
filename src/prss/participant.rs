// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::seed::{xor_into, PseudoRandomSeed, SeedBytes};
use crate::{
    access_structure::{AccessStructure, SharingIdSet},
    errors::{InternalError, Result},
    protocol::{Identifier, ProtocolParticipant, RoundMessages, SharingConfig, SharingId, Status},
};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug};
use tracing::{error, info, instrument};
use zeroize::Zeroize;

/// Seed contributions sent from one party to another.
///
/// It carries the sender's fresh seed for every set that excludes both the
/// sender and the recipient.
#[derive(Clone, Serialize, Deserialize)]
pub struct PrssSeedsMessage {
    sid: Identifier,
    seeds: BTreeMap<SharingIdSet, SeedBytes>,
}

impl PrssSeedsMessage {
    /// Check that the message belongs to this run and covers exactly the
    /// expected sets.
    pub fn validate(
        &self,
        sid: Identifier,
        sender: SharingId,
        receiver: SharingId,
        access_structure: &AccessStructure,
    ) -> Result<()> {
        if self.sid != sid {
            error!("PRSS message from {} belongs to session {}", sender, self.sid);
            Err(InternalError::ProtocolError(Some(sender)))?
        }
        let expected = access_structure
            .sets_excluding(sender)
            .map(|(_, set)| set)
            .filter(|set| !set.contains(receiver));
        if !self.seeds.keys().copied().eq(expected) {
            error!(
                "PRSS message from {} to {} covers the wrong sets",
                sender, receiver
            );
            Err(InternalError::ProtocolError(Some(sender)))?
        }
        Ok(())
    }

    fn seed(&self, set: &SharingIdSet, sender: SharingId) -> Result<&SeedBytes> {
        self.seeds.get(set).ok_or_else(|| {
            error!("PRSS message from {} has no seed for {}", sender, set);
            InternalError::ProtocolError(Some(sender))
        })
    }
}

impl Drop for PrssSeedsMessage {
    fn drop(&mut self) {
        self.seeds.values_mut().for_each(|seed| seed.zeroize());
    }
}

impl Debug for PrssSeedsMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrssSeedsMessage")
            .field("sid", &self.sid)
            .field("sets", &self.seeds.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One party of the one-round PRSS setup.
///
/// # High-level protocol description
/// - In the first round, the party samples a fresh seed for every maximal
///   unqualified set it is not part of. Each peer receives the seeds for
///   the sets that exclude both of them.
/// - Once every peer's seeds have arrived, the party combines, for each set
///   it is outside of, its own seed with the seeds of every other party
///   outside that set. The result is the key of a [`PseudoRandomSeed`].
///
/// Parties outside a set exchange exactly the seeds for it, so they agree on
/// the key; parties inside it never receive any of them.
pub struct PrssParticipant {
    sid: Identifier,
    config: SharingConfig,
    own_seeds: BTreeMap<SharingIdSet, SeedBytes>,
    status: Status,
}

impl PrssParticipant {
    /// Creates a participant for session `sid`.
    pub fn new(sid: Identifier, config: SharingConfig) -> Self {
        Self {
            sid,
            config,
            own_seeds: BTreeMap::new(),
            status: Status::NotStarted,
        }
    }

    /// Sample seeds and produce one message per peer, keyed by recipient.
    #[instrument(skip_all, err(Debug))]
    pub fn round_one<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<RoundMessages<PrssSeedsMessage>> {
        info!("Generating round one PRSS messages.");
        self.status.ensure(Status::NotStarted)?;

        let me = self.id();
        let access_structure = self.config.access_structure();
        self.own_seeds = access_structure
            .sets_excluding(me)
            .map(|(_, set)| (set, rng.gen()))
            .collect();

        let messages = self
            .config
            .other_ids()
            .map(|peer| {
                let seeds = self
                    .own_seeds
                    .iter()
                    .filter(|(set, _)| !set.contains(peer))
                    .map(|(set, seed)| (*set, *seed))
                    .collect();
                (
                    peer,
                    PrssSeedsMessage {
                        sid: self.sid,
                        seeds,
                    },
                )
            })
            .collect();

        self.status = Status::RoundOneDone;
        Ok(messages)
    }

    /// Combine the received seeds, keyed by sender, into the final
    /// [`PseudoRandomSeed`].
    #[instrument(skip_all, err(Debug))]
    pub fn round_two(
        &mut self,
        messages: &RoundMessages<PrssSeedsMessage>,
    ) -> Result<PseudoRandomSeed> {
        info!("Handling round two PRSS messages.");
        self.status.ensure(Status::RoundOneDone)?;

        let me = self.id();
        let access_structure = self.config.access_structure();
        let total = access_structure.total();
        if let Some(stranger) = messages
            .ids()
            .find(|pid| *pid == me || pid.as_usize() > total)
        {
            error!("Unexpected PRSS message from {}", stranger);
            Err(InternalError::ProtocolError(Some(stranger)))?
        }
        for peer in self.config.other_ids() {
            messages
                .require(peer)?
                .validate(self.sid, peer, me, access_structure)?;
        }

        let mut keys = BTreeMap::new();
        for (_, set) in access_structure.sets_excluding(me) {
            let mut key = *self.own_seeds.get(&set).ok_or_else(|| {
                error!("Own PRSS seed for {} is missing", set);
                InternalError::InternalInvariantFailed
            })?;
            for peer in access_structure
                .parties_outside(set)
                .filter(|peer| *peer != me)
            {
                xor_into(&mut key, messages.require(peer)?.seed(&set, peer)?);
            }
            let _ = keys.insert(set, key);
            key.zeroize();
        }

        self.own_seeds.values_mut().for_each(|seed| seed.zeroize());
        self.own_seeds.clear();
        self.status = Status::TerminatedSuccessfully;
        Ok(PseudoRandomSeed::new(
            me,
            access_structure.threshold(),
            total,
            keys,
        ))
    }
}

impl Drop for PrssParticipant {
    fn drop(&mut self) {
        self.own_seeds.values_mut().for_each(|seed| seed.zeroize());
    }
}

impl ProtocolParticipant for PrssParticipant {
    fn id(&self) -> SharingId {
        self.config.id()
    }

    fn sid(&self) -> Identifier {
        self.sid
    }

    fn status(&self) -> &Status {
        &self.status
    }
}

impl Debug for PrssParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrssParticipant")
            .field("sid", &self.sid)
            .field("id", &self.id())
            .field("status", &self.status)
            .finish()
    }
}

/// Run the setup for every party of `access_structure` in memory.
#[cfg(test)]
pub(crate) fn simulate_prss<R: RngCore + CryptoRng>(
    access_structure: &AccessStructure,
    rng: &mut R,
) -> Result<BTreeMap<SharingId, PseudoRandomSeed>> {
    use crate::protocol::deliver_all;

    let sid = Identifier::random(rng);
    let mut quorum = SharingId::all(access_structure.total())
        .map(|pid| {
            SharingConfig::new(pid, access_structure.clone())
                .map(|config| PrssParticipant::new(sid, config))
        })
        .collect::<Result<Vec<_>>>()?;

    let outgoing = quorum
        .iter_mut()
        .map(|participant| Ok((participant.id(), participant.round_one(rng)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;
    let mut inboxes = deliver_all(outgoing);

    quorum
        .iter_mut()
        .map(|participant| {
            let inbox = inboxes.remove(&participant.id()).unwrap_or_default();
            Ok((participant.id(), participant.round_two(&inbox)?))
        })
        .collect()
}
