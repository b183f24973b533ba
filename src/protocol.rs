// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Identifiers and round plumbing shared by every protocol in the crate.

use crate::{
    access_structure::{AccessStructure, SharingIdSet},
    errors::{CallerError, InternalError, Result},
};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{
    collections::{btree_map, BTreeMap},
    fmt::{Debug, Display, Formatter},
};
use tracing::error;

/// The position of a party inside an access structure.
///
/// Sharing ids run from `1` to `n` and index the bits of a
/// [`SharingIdSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SharingId(u8);

impl SharingId {
    /// Wrap a raw id. Fails if the id is `0` or does not fit a
    /// [`SharingIdSet`].
    pub fn new(id: usize) -> Result<Self> {
        if id == 0 || id > SharingIdSet::MAX_PARTIES {
            error!("Sharing id {} is outside of [1, {}]", id, SharingIdSet::MAX_PARTIES);
            Err(CallerError::BadInput)?
        }
        Ok(Self(id as u8))
    }

    /// All sharing ids `1..=n`, in ascending order.
    pub(crate) fn all(n: usize) -> impl Iterator<Item = SharingId> {
        (1..=n as u8).map(SharingId)
    }

    /// The raw id.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl Display for SharingId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A session identifier.
///
/// Every protocol run must use a fresh identifier; it separates the
/// pseudorandom streams drawn by different runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(u128);

impl Identifier {
    /// Produces a random [`Identifier`].
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    /// Build an identifier from a known value, e.g. one agreed on by the
    /// calling application.
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({:032x})", self.0)
    }
}

/// A party's view of the access structure: its own id plus the structure.
#[derive(Clone, Debug)]
pub struct SharingConfig {
    id: SharingId,
    access_structure: AccessStructure,
}

impl SharingConfig {
    /// Creates a config for party `id`. Fails if `id` is not one of the
    /// `n` parties of the structure.
    pub fn new(id: SharingId, access_structure: AccessStructure) -> Result<Self> {
        if id.as_usize() > access_structure.total() {
            error!(
                "Sharing id {} is not part of a structure with {} parties",
                id,
                access_structure.total()
            );
            Err(CallerError::BadInput)?
        }
        Ok(Self {
            id,
            access_structure,
        })
    }

    /// Returns this party's id.
    pub fn id(&self) -> SharingId {
        self.id
    }

    /// Returns the access structure.
    pub fn access_structure(&self) -> &AccessStructure {
        &self.access_structure
    }

    /// Ids of every other party, ascending.
    pub fn other_ids(&self) -> impl Iterator<Item = SharingId> + '_ {
        SharingId::all(self.access_structure.total()).filter(move |pid| *pid != self.id)
    }
}

/// One round's worth of messages, keyed by peer.
///
/// On the sending side the key is the recipient; on the receiving side it is
/// the sender.
#[derive(Clone, Serialize, Deserialize)]
pub struct RoundMessages<M> {
    messages: BTreeMap<SharingId, M>,
}

impl<M> Default for RoundMessages<M> {
    fn default() -> Self {
        Self {
            messages: BTreeMap::new(),
        }
    }
}

impl<M> RoundMessages<M> {
    /// An empty set of messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the message for `pid`, replacing any previous one.
    pub fn put(&mut self, pid: SharingId, message: M) {
        let _ = self.messages.insert(pid, message);
    }

    /// Look up the message for `pid`.
    pub fn get(&self, pid: SharingId) -> Option<&M> {
        self.messages.get(&pid)
    }

    /// Look up the message for `pid`, treating its absence as fatal for the
    /// run.
    pub(crate) fn require(&self, pid: SharingId) -> Result<&M> {
        self.get(pid).ok_or_else(|| {
            error!("No round message from {}", pid);
            InternalError::MissingMessage(pid)
        })
    }

    /// Remove and return the message for `pid`.
    pub fn remove(&mut self, pid: SharingId) -> Option<M> {
        self.messages.remove(&pid)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Peers that have a message, ascending.
    pub fn ids(&self) -> impl Iterator<Item = SharingId> + '_ {
        self.messages.keys().copied()
    }

    /// Iterate over `(peer, message)` pairs, ascending by peer.
    pub fn iter(&self) -> btree_map::Iter<'_, SharingId, M> {
        self.messages.iter()
    }
}

impl<M> IntoIterator for RoundMessages<M> {
    type Item = (SharingId, M);
    type IntoIter = btree_map::IntoIter<SharingId, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<M> FromIterator<(SharingId, M)> for RoundMessages<M> {
    fn from_iter<I: IntoIterator<Item = (SharingId, M)>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

// Round messages usually carry secret material, so only the peers are shown.
impl<M> Debug for RoundMessages<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundMessages")
            .field("peers", &self.messages.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Turns each sender's outgoing messages, keyed by recipient, into each
/// recipient's inbox, keyed by sender.
#[cfg(test)]
pub(crate) fn deliver_all<M>(
    outgoing: BTreeMap<SharingId, RoundMessages<M>>,
) -> BTreeMap<SharingId, RoundMessages<M>> {
    let mut inboxes: BTreeMap<SharingId, RoundMessages<M>> = BTreeMap::new();
    for (sender, messages) in outgoing {
        for (recipient, message) in messages {
            inboxes.entry(recipient).or_default().put(sender, message);
        }
    }
    inboxes
}

/// Accessors shared by every protocol participant.
///
/// Round one differs between protocols, so the rounds themselves stay on the
/// participant types.
pub trait ProtocolParticipant {
    /// This party's id.
    fn id(&self) -> SharingId;

    /// The session id.
    fn sid(&self) -> Identifier;

    /// Progress of the run.
    fn status(&self) -> &Status;

    /// Returns `true` once the participant produced its output.
    fn is_done(&self) -> bool {
        *self.status() == Status::TerminatedSuccessfully
    }
}

/// Progress of a protocol participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// No round has been run yet.
    NotStarted,
    /// Round one messages were produced; waiting for peers.
    RoundOneDone,
    /// The participant produced its output.
    TerminatedSuccessfully,
}

impl Status {
    /// Fails unless the participant is in `expected`.
    pub(crate) fn ensure(&self, expected: Status) -> Result<()> {
        if *self == Status::TerminatedSuccessfully {
            error!("Protocol round called after termination");
            Err(CallerError::ProtocolAlreadyTerminated)?
        }
        if *self != expected {
            error!("Expected status {:?}, but participant is {:?}", expected, self);
            Err(CallerError::ProtocolOutOfOrder)?
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn sharing_id_range_is_enforced() {
        assert!(SharingId::new(0).is_err());
        assert!(SharingId::new(65).is_err());
        assert_eq!(SharingId::new(64).unwrap().as_usize(), 64);
    }

    #[test]
    fn config_rejects_foreign_ids() -> Result<()> {
        let access = AccessStructure::new(2, 3)?;
        assert!(SharingConfig::new(SharingId::new(4)?, access.clone()).is_err());
        let config = SharingConfig::new(SharingId::new(2)?, access)?;
        let others = config.other_ids().map(|pid| pid.as_usize()).collect::<Vec<_>>();
        assert_eq!(others, vec![1, 3]);
        Ok(())
    }

    #[test]
    fn missing_message_is_reported_with_sender() {
        let messages: RoundMessages<u8> = RoundMessages::new();
        let pid = SharingId::new(3).unwrap();
        assert_eq!(
            messages.require(pid).unwrap_err(),
            InternalError::MissingMessage(pid)
        );
    }

    #[test]
    fn status_rejects_out_of_order_rounds() {
        assert_eq!(
            Status::NotStarted.ensure(Status::RoundOneDone).unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::ProtocolOutOfOrder)
        );
        assert_eq!(
            Status::TerminatedSuccessfully
                .ensure(Status::RoundOneDone)
                .unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::ProtocolAlreadyTerminated)
        );
    }

    #[test]
    fn identifiers_are_fresh() {
        let rng = &mut init_testing();
        assert_ne!(Identifier::random(rng), Identifier::random(rng));
    }
}
