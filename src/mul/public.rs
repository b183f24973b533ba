// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{messages::PublicMulMessage, MulContext};
use crate::{
    errors::{InternalError, Result},
    protocol::{Identifier, ProtocolParticipant, RoundMessages, SharingConfig, SharingId, Status},
    prss::PseudoRandomSeed,
    replicated::{Share, ShareValue, SharingOpts},
};
use std::fmt::Debug;
use tracing::{error, info, instrument};

/// One party of the multiplication protocol with public output.
///
/// # High-level protocol description
/// - In the first round, party `p` computes its cross terms `v_p`. For
///   every set `T` it is outside of, the `k = n - t + 1` parties outside `T`
///   draw `r_0, ..., r_{k-1}` from the PRSS stream of `T`. The party at
///   position `j` adds `r_j - r_{(j + 1) mod k}` to `v_p`. It broadcasts the
///   masked value `w_p`.
/// - In the second round, every party sums all `w_p`. Each ring of masks
///   sums to zero, so the result is `x * y`, reduced if a modulus is set.
pub struct PublicMulParticipant<V: ShareValue> {
    context: MulContext<V>,
    status: Status,
    own_message: Option<PublicMulMessage<V>>,
}

impl<V: ShareValue> PublicMulParticipant<V> {
    /// Creates a participant opening the product of the secrets behind `x`
    /// and `y`.
    pub fn new(
        sid: Identifier,
        config: SharingConfig,
        seed: PseudoRandomSeed,
        opts: SharingOpts,
        x: Share<V>,
        y: Share<V>,
    ) -> Result<Self> {
        Self::new_batch(sid, config, seed, opts, vec![(x, y)])
    }

    /// Creates a participant opening one product per pair, all in the same
    /// two rounds.
    pub fn new_batch(
        sid: Identifier,
        config: SharingConfig,
        seed: PseudoRandomSeed,
        opts: SharingOpts,
        pairs: Vec<(Share<V>, Share<V>)>,
    ) -> Result<Self> {
        Ok(Self {
            context: MulContext::new(sid, config, seed, opts, pairs)?,
            status: Status::NotStarted,
            own_message: None,
        })
    }

    /// Number of products computed.
    pub fn batch_len(&self) -> usize {
        self.context.batch_len()
    }

    /// Compute the masked cross terms. The returned message goes to every
    /// other party.
    #[instrument(skip_all, err(Debug))]
    pub fn round_one(&mut self) -> Result<PublicMulMessage<V>> {
        info!("Generating round one public multiplication message.");
        self.status.ensure(Status::NotStarted)?;

        let me = self.id();
        let mut masked = self.context.cross_terms()?;

        let access_structure = self.context.access_structure();
        for (_, set) in access_structure.sets_excluding(me) {
            let ring = access_structure.parties_outside(set).collect::<Vec<_>>();
            let k = ring.len();
            let position = ring.iter().position(|pid| *pid == me).ok_or_else(|| {
                error!("{} is missing from the parties outside {}", me, set);
                InternalError::InternalInvariantFailed
            })?;

            let mut stream = self.context.stream(&set)?;
            for value in masked.iter_mut() {
                let draws = (0..k)
                    .map(|_| self.context.draw(&mut stream))
                    .collect::<Result<Vec<_>>>()?;
                *value = value
                    .plus(&draws[position])
                    .minus(&draws[(position + 1) % k]);
            }
        }

        let masked = masked
            .into_iter()
            .map(|value| self.context.normalize(value))
            .collect();
        let message = PublicMulMessage::new(self.context.sid, masked);

        self.own_message = Some(message.clone());
        self.status = Status::RoundOneDone;
        Ok(message)
    }

    /// Sum every party's broadcast, keyed by sender, into the products.
    #[instrument(skip_all, err(Debug))]
    pub fn round_two(
        &mut self,
        messages: &RoundMessages<PublicMulMessage<V>>,
    ) -> Result<Vec<V>> {
        info!("Handling round two public multiplication messages.");
        self.status.ensure(Status::RoundOneDone)?;

        let me = self.id();
        let total = self.context.access_structure().total();
        if let Some(stranger) = messages
            .ids()
            .find(|pid| *pid == me || pid.as_usize() > total)
        {
            error!("Unexpected public multiplication message from {}", stranger);
            Err(InternalError::ProtocolError(Some(stranger)))?
        }

        let own = self.own_message.as_ref().ok_or_else(|| {
            error!("Own round one message is missing");
            InternalError::InternalInvariantFailed
        })?;
        let mut products = own.values().to_vec();
        for peer in self.context.config.other_ids() {
            let message = messages.require(peer)?;
            message.validate(self.context.sid, peer, self.batch_len())?;
            for (product, value) in products.iter_mut().zip(message.values()) {
                *product = product.plus(value);
            }
        }

        let products = products
            .into_iter()
            .map(|value| self.context.normalize(value))
            .collect();
        self.own_message = None;
        self.status = Status::TerminatedSuccessfully;
        Ok(products)
    }
}

impl<V: ShareValue> ProtocolParticipant for PublicMulParticipant<V> {
    fn id(&self) -> SharingId {
        self.context.me()
    }

    fn sid(&self) -> Identifier {
        self.context.sid
    }

    fn status(&self) -> &Status {
        &self.status
    }
}

impl<V: ShareValue> Debug for PublicMulParticipant<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicMulParticipant")
            .field("sid", &self.context.sid)
            .field("id", &self.id())
            .field("batch_len", &self.batch_len())
            .field("status", &self.status)
            .finish()
    }
}
