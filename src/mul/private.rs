// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{messages::MulMessage, MulContext};
use crate::{
    access_structure::SharingIdSet,
    errors::{InternalError, Result},
    protocol::{Identifier, ProtocolParticipant, RoundMessages, SharingConfig, SharingId, Status},
    prss::PseudoRandomSeed,
    replicated::{Share, ShareValue, SharingOpts},
};
use std::{collections::BTreeMap, fmt::Debug};
use tracing::{error, info, instrument};
use zeroize::Zeroize;

/// What round one leaves for round two.
struct RoundOneState<V: ShareValue> {
    /// Per set this party is outside of: the blinding values of that set,
    /// summed over all producers, one entry per product.
    blinds: BTreeMap<SharingIdSet, Vec<V>>,
    /// This party's own blinded contribution.
    contribution: Vec<V>,
}

impl<V: ShareValue> Drop for RoundOneState<V> {
    fn drop(&mut self) {
        self.blinds
            .values_mut()
            .flat_map(|values| values.iter_mut())
            .chain(self.contribution.iter_mut())
            .for_each(|value| value.zeroize());
    }
}

/// One party of the multiplication protocol with shared output.
///
/// # High-level protocol description
/// - In the first round, party `p` computes its cross terms `v_p`. For
///   every set `T` it is outside of, it draws from the PRSS stream of `T`
///   one blinding value `ρ_T^(q)` per producer `q` outside `T` whose `chi`
///   slot is not `T`. It subtracts its own values `ρ_T^(p)` from `v_p`,
///   except for its own slot `chi[p]`, and sends the result `c_p` to every
///   party outside `chi[p]`.
/// - In the second round, the sub-share of `T` becomes the sum of all
///   `ρ_T^(q)` plus `c_o`, where `o` is the party whose slot is `T`.
///
/// Each `ρ_T^(q)` is added into `T` once and subtracted inside `c_q` once,
/// so the sub-shares add up to `Σ_p v_p = x * y`.
pub struct MulParticipant<V: ShareValue> {
    context: MulContext<V>,
    status: Status,
    state: Option<RoundOneState<V>>,
}

impl<V: ShareValue> MulParticipant<V> {
    /// Creates a participant multiplying the secrets behind `x` and `y`.
    ///
    /// `opts` describes the product, typically with twice the bit length of
    /// the factors.
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

    /// Creates a participant computing one product per pair, all in the same
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
            state: None,
        })
    }

    /// Number of products computed.
    pub fn batch_len(&self) -> usize {
        self.context.batch_len()
    }

    /// Parties whose `chi` slot is not `set`, among those outside `set`.
    fn producers(&self, set: SharingIdSet, set_index: usize) -> Result<Vec<SharingId>> {
        let chi = self.context.tables()?.chi();
        Ok(self
            .context
            .access_structure()
            .parties_outside(set)
            .filter(|q| chi.get(*q) != Some(set_index))
            .collect())
    }

    /// The blinding values of `set`, per product and producer.
    fn blinding_values(
        &self,
        set: SharingIdSet,
        producers: &[SharingId],
    ) -> Result<Vec<BTreeMap<SharingId, V>>> {
        let mut stream = self.context.stream(&set)?;
        (0..self.batch_len())
            .map(|_| {
                producers
                    .iter()
                    .map(|q| Ok((*q, self.context.draw(&mut stream)?)))
                    .collect::<Result<BTreeMap<_, _>>>()
            })
            .collect()
    }

    fn chi_slot(&self, pid: SharingId) -> Result<usize> {
        self.context.tables()?.chi().get(pid).ok_or_else(|| {
            error!("{} has no chi slot", pid);
            InternalError::InternalInvariantFailed
        })
    }

    /// Compute the blinded contribution and address it to the holders of
    /// this party's slot. Messages are keyed by recipient.
    #[instrument(skip_all, err(Debug))]
    pub fn round_one(&mut self) -> Result<RoundMessages<MulMessage<V>>> {
        info!("Generating round one multiplication messages.");
        self.status.ensure(Status::NotStarted)?;

        let me = self.id();
        let my_slot = self.chi_slot(me)?;
        let mut contribution = self.context.cross_terms()?;
        let mut blinds = BTreeMap::new();

        for (set_index, set) in self
            .context
            .access_structure()
            .sets_excluding(me)
            .collect::<Vec<_>>()
        {
            let producers = self.producers(set, set_index)?;
            let values = self.blinding_values(set, &producers)?;

            let mut summed = Vec::with_capacity(values.len());
            for (element, per_producer) in values.iter().enumerate() {
                summed.push(
                    per_producer
                        .values()
                        .fold(V::zero(), |sum, value| sum.plus(value)),
                );
                if set_index != my_slot {
                    let own = per_producer.get(&me).ok_or_else(|| {
                        error!("{} is not a producer for {}", me, set);
                        InternalError::InternalInvariantFailed
                    })?;
                    contribution[element] = contribution[element].minus(own);
                }
            }
            let _ = blinds.insert(set, summed);
        }

        let contribution = contribution
            .into_iter()
            .map(|value| self.context.normalize(value))
            .collect::<Vec<_>>();

        let slot = self
            .context
            .access_structure()
            .set_at(my_slot)
            .ok_or(InternalError::InternalInvariantFailed)?;
        let messages = self
            .context
            .access_structure()
            .parties_outside(slot)
            .filter(|peer| *peer != me)
            .map(|peer| {
                (
                    peer,
                    MulMessage::new(self.context.sid, contribution.clone()),
                )
            })
            .collect();

        self.state = Some(RoundOneState {
            blinds,
            contribution,
        });
        self.status = Status::RoundOneDone;
        Ok(messages)
    }

    /// Fold the received contributions, keyed by sender, into this party's
    /// shares of the products.
    #[instrument(skip_all, err(Debug))]
    pub fn round_two(
        &mut self,
        messages: &RoundMessages<MulMessage<V>>,
    ) -> Result<Vec<Share<V>>> {
        info!("Handling round two multiplication messages.");
        self.status.ensure(Status::RoundOneDone)?;

        let me = self.id();
        let access_structure = self.context.access_structure();
        let chi = self.context.tables()?.chi();

        // Only the owners of slots this party holds write to it.
        for sender in messages.ids() {
            let expected = sender != me
                && chi
                    .get(sender)
                    .and_then(|slot| access_structure.set_at(slot))
                    .is_some_and(|slot| !slot.contains(me));
            if !expected {
                error!("Unexpected multiplication message from {}", sender);
                Err(InternalError::ProtocolError(Some(sender)))?
            }
        }

        let state = self.state.as_ref().ok_or_else(|| {
            error!("Round one state is missing");
            InternalError::InternalInvariantFailed
        })?;

        let mut outputs = vec![BTreeMap::new(); self.batch_len()];
        for (set_index, set) in access_structure.sets_excluding(me) {
            let blinds = state.blinds.get(&set).ok_or_else(|| {
                error!("No blinding values for {}", set);
                InternalError::InternalInvariantFailed
            })?;
            let owner_contribution = match chi.owner_of(set_index) {
                Some(owner) if owner == me => Some(state.contribution.as_slice()),
                Some(owner) => {
                    let message = messages.require(owner)?;
                    message.validate(self.context.sid, owner, self.batch_len())?;
                    Some(message.values())
                }
                None => None,
            };

            for (element, output) in outputs.iter_mut().enumerate() {
                let mut value = blinds[element].clone();
                if let Some(contribution) = owner_contribution {
                    value = value.plus(&contribution[element]);
                }
                let _ = output.insert(set, self.context.normalize(value));
            }
        }

        let (threshold, total) = (access_structure.threshold(), access_structure.total());
        let shares = outputs
            .into_iter()
            .map(|sub_shares| Share::new(me, threshold, total, sub_shares))
            .collect();

        self.state = None;
        self.status = Status::TerminatedSuccessfully;
        Ok(shares)
    }
}

impl<V: ShareValue> ProtocolParticipant for MulParticipant<V> {
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

impl<V: ShareValue> Debug for MulParticipant<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulParticipant")
            .field("sid", &self.context.sid)
            .field("id", &self.id())
            .field("batch_len", &self.batch_len())
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access_structure::AccessStructure,
        errors::CallerError,
        mul::testing::{mask_dominates, Fixture},
        protocol::deliver_all,
        replicated::{k256_order, Dealer},
        utils::testing::init_testing,
    };
    use itertools::Itertools;
    use k256::{elliptic_curve::Field, Scalar};
    use libpaillier::unknown_order::BigNumber;
    use rand::rngs::StdRng;

    fn quorum<V: ShareValue>(
        fixture: &Fixture<V>,
        product_opts: &SharingOpts,
        rng: &mut StdRng,
    ) -> Result<Vec<MulParticipant<V>>> {
        let access = fixture.dealer.access_structure();
        let sid = Identifier::random(rng);
        fixture
            .shares
            .iter()
            .map(|(pid, pairs)| {
                MulParticipant::new_batch(
                    sid,
                    SharingConfig::new(*pid, access.clone())?,
                    fixture.seeds[pid].clone(),
                    product_opts.clone(),
                    pairs.clone(),
                )
            })
            .collect()
    }

    /// Runs both rounds and returns every party's product shares.
    fn run<V: ShareValue>(
        quorum: &mut [MulParticipant<V>],
    ) -> Result<BTreeMap<SharingId, Vec<Share<V>>>> {
        let outgoing = quorum
            .iter_mut()
            .map(|p| Ok((p.id(), p.round_one()?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let mut inboxes = deliver_all(outgoing);
        quorum
            .iter_mut()
            .map(|p| {
                let inbox = inboxes.remove(&p.id()).unwrap_or_default();
                Ok((p.id(), p.round_two(&inbox)?))
            })
            .collect()
    }

    /// Reveals product `element` from every qualified subset of the outputs.
    fn check_products<V: ShareValue>(
        product_dealer: &Dealer<V>,
        outputs: &BTreeMap<SharingId, Vec<Share<V>>>,
        expected: &[V],
    ) -> Result<()> {
        let access = product_dealer.access_structure();
        for (element, expected) in expected.iter().enumerate() {
            let shares = outputs
                .values()
                .map(|batch| batch[element].clone())
                .collect::<Vec<_>>();
            for share in &shares {
                share.validate(access, true)?;
            }
            for subset in (0..shares.len()).combinations(access.threshold()) {
                let picked = subset.iter().map(|&i| shares[i].clone()).collect::<Vec<_>>();
                assert_eq!(&product_dealer.reveal(&picked)?, expected);
            }
        }
        Ok(())
    }

    #[test]
    fn products_over_a_modulus() -> Result<()> {
        let mut rng = init_testing();
        let modulus = BigNumber::prime(256);
        let opts = SharingOpts::with_modulus(modulus.clone())?;
        for (t, n) in [(2, 3), (2, 5), (3, 5), (3, 6), (4, 7)] {
            let dealer = Dealer::new(t, n, opts.clone())?;
            let m = modulus.clone();
            let fixture = Fixture::new(
                dealer.clone(),
                1,
                move |rng| BigNumber::from_rng(&m, rng),
                &mut rng,
            )?;
            let mut quorum = quorum(&fixture, &opts.for_product()?, &mut rng)?;
            let outputs = run(&mut quorum)?;

            let expected = fixture
                .factors
                .iter()
                .map(|(x, y)| (x * y).nmod(&modulus))
                .collect::<Vec<_>>();
            check_products(&dealer, &outputs, &expected)?;
            assert!(quorum.iter().all(ProtocolParticipant::is_done));
        }
        Ok(())
    }

    #[test]
    fn batched_products_over_the_integers() -> Result<()> {
        let mut rng = init_testing();
        let bits = 128;
        let opts = SharingOpts::with_bit_length(bits)?;
        let bound = BigNumber::one() << bits;
        let half = BigNumber::one() << (bits - 1);
        for (t, n) in [(2, 3), (3, 5), (3, 6)] {
            let dealer = Dealer::new(t, n, opts.clone())?;
            let (b, h) = (bound.clone(), half.clone());
            // Signed factors in [-2^(bits-1), 2^(bits-1)).
            let fixture = Fixture::new(
                dealer,
                4,
                move |rng| BigNumber::from_rng(&b, rng) - h.clone(),
                &mut rng,
            )?;
            let product_opts = opts.for_product()?;
            let mut quorum = quorum(&fixture, &product_opts, &mut rng)?;
            assert!(quorum.iter().all(|p| p.batch_len() == 4));
            let outputs = run(&mut quorum)?;

            let expected = fixture
                .factors
                .iter()
                .map(|(x, y)| x * y)
                .collect::<Vec<_>>();
            let product_dealer = Dealer::new(t, n, product_opts)?;
            check_products(&product_dealer, &outputs, &expected)?;
        }
        Ok(())
    }

    #[test]
    fn products_of_scalars() -> Result<()> {
        let mut rng = init_testing();
        let opts = SharingOpts::with_modulus(k256_order())?;
        let dealer = Dealer::<Scalar>::new(2, 5, opts.clone())?;
        let fixture = Fixture::new(dealer.clone(), 2, |rng| Scalar::random(rng), &mut rng)?;
        let mut quorum = quorum(&fixture, &opts, &mut rng)?;
        let outputs = run(&mut quorum)?;
        let expected = fixture
            .factors
            .iter()
            .map(|(x, y)| x * y)
            .collect::<Vec<_>>();
        check_products(&dealer, &outputs, &expected)
    }

    #[test]
    fn products_compose_with_linear_operations() -> Result<()> {
        let mut rng = init_testing();
        let modulus = BigNumber::prime(128);
        let opts = SharingOpts::with_modulus(modulus.clone())?;
        let dealer = Dealer::new(2, 3, opts.clone())?;
        let m = modulus.clone();
        let fixture = Fixture::new(
            dealer.clone(),
            1,
            move |rng| BigNumber::from_rng(&m, rng),
            &mut rng,
        )?;
        let mut quorum = quorum(&fixture, &opts, &mut rng)?;
        let outputs = run(&mut quorum)?;

        // x * y + x
        let combined = outputs
            .iter()
            .map(|(pid, products)| products[0].add(&fixture.shares[pid][0].0))
            .collect::<Result<Vec<_>>>()?;
        let (x, y) = &fixture.factors[0];
        assert_eq!(dealer.reveal(&combined)?, (x * y + x).nmod(&modulus));
        Ok(())
    }

    #[test]
    fn missing_contribution_is_fatal() -> Result<()> {
        let mut rng = init_testing();
        let opts = SharingOpts::with_bit_length(64)?;
        let dealer = Dealer::new(2, 3, opts.clone())?;
        let fixture = Fixture::new(dealer, 1, |_| BigNumber::from(3u64), &mut rng)?;
        let mut quorum = quorum(&fixture, &opts.for_product()?, &mut rng)?;

        let outgoing = quorum
            .iter_mut()
            .map(|p| Ok((p.id(), p.round_one()?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let mut inboxes = deliver_all(outgoing);

        let (participant, inbox) = quorum
            .iter_mut()
            .find_map(|p| {
                let inbox = inboxes.remove(&p.id()).unwrap_or_default();
                (!inbox.is_empty()).then_some((p, inbox))
            })
            .unwrap();
        let mut inbox = inbox;
        let sender = inbox.ids().next().unwrap();
        let _ = inbox.remove(sender);
        assert_eq!(
            participant.round_two(&inbox).unwrap_err(),
            InternalError::MissingMessage(sender)
        );
        Ok(())
    }

    #[test]
    fn integer_contributions_statistically_hide_cross_terms() -> Result<()> {
        let mut rng = init_testing();
        let opts = SharingOpts::with_bit_length(64)?;
        for (t, n) in [(2, 3), (3, 5)] {
            let dealer = Dealer::new(t, n, opts.clone())?;
            let bound = BigNumber::one() << 64;
            let fixture =
                Fixture::new(dealer, 2, move |rng| BigNumber::from_rng(&bound, rng), &mut rng)?;
            let mut quorum = quorum(&fixture, &opts.for_product()?, &mut rng)?;
            for participant in quorum.iter_mut() {
                let cross_terms = participant.context.cross_terms()?;
                let outgoing = participant.round_one()?;
                let (_, message) = outgoing.iter().next().unwrap();
                for (blinded, plain) in message.values().iter().zip(&cross_terms) {
                    assert!(mask_dominates(blinded, plain));
                }
            }
        }
        Ok(())
    }

    #[test]
    fn contribution_to_a_slot_the_receiver_is_in() -> Result<()> {
        let mut rng = init_testing();
        let opts = SharingOpts::with_bit_length(64)?;
        let dealer = Dealer::new(2, 3, opts.clone())?;
        let fixture = Fixture::new(dealer, 1, |_| BigNumber::from(7u64), &mut rng)?;
        let access = fixture.dealer.access_structure().clone();
        let mut quorum = quorum(&fixture, &opts.for_product()?, &mut rng)?;

        let outgoing = quorum
            .iter_mut()
            .map(|p| Ok((p.id(), p.round_one()?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let mut inboxes = deliver_all(outgoing.clone());

        // P1's slot is held by the parties outside it, so a member of the
        // slot never hears from P1.
        let sender = SharingId::new(1)?;
        let slot = access.mul_tables()?.chi().get(sender).unwrap();
        let receiver = access.set_at(slot).unwrap().iter().next().unwrap();
        assert_ne!(receiver, sender);

        let (_, message) = outgoing[&sender].iter().next().unwrap();
        let mut inbox = inboxes.remove(&receiver).unwrap_or_default();
        assert!(inbox.get(sender).is_none());
        inbox.put(sender, message.clone());

        let participant = quorum.iter_mut().find(|p| p.id() == receiver).unwrap();
        assert_eq!(
            participant.round_two(&inbox).unwrap_err(),
            InternalError::ProtocolError(Some(sender))
        );
        Ok(())
    }

    #[test]
    fn invalid_inputs_are_rejected() -> Result<()> {
        let mut rng = init_testing();
        let opts = SharingOpts::with_bit_length(64)?;
        let dealer = Dealer::new(2, 3, opts.clone())?;
        let fixture = Fixture::new(dealer, 2, |_| BigNumber::from(5u64), &mut rng)?;
        let access = fixture.dealer.access_structure().clone();
        let sid = Identifier::random(&mut rng);
        let p1 = SharingId::new(1)?;
        let p2 = SharingId::new(2)?;
        let config = SharingConfig::new(p1, access.clone())?;

        // Another party's shares.
        let (x, y) = fixture.shares[&p2][0].clone();
        assert_eq!(
            MulParticipant::new(sid, config.clone(), fixture.seeds[&p1].clone(), opts.clone(), x, y)
                .unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::BadInput)
        );

        // Another party's seed.
        let (x, y) = fixture.shares[&p1][0].clone();
        assert!(MulParticipant::new(
            sid,
            config.clone(),
            fixture.seeds[&p2].clone(),
            opts.clone(),
            x,
            y
        )
        .is_err());

        // An empty batch.
        assert!(MulParticipant::<BigNumber>::new_batch(
            sid,
            config,
            fixture.seeds[&p1].clone(),
            opts,
            vec![]
        )
        .is_err());

        // No multiplication without the ramp restriction.
        let non_ramp = AccessStructure::new(3, 4)?;
        let config = SharingConfig::new(p1, non_ramp)?;
        let (x, y) = fixture.shares[&p1][0].clone();
        assert_eq!(
            MulParticipant::new(
                sid,
                config,
                fixture.seeds[&p1].clone(),
                SharingOpts::with_bit_length(64)?,
                x,
                y
            )
            .unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::RampRestrictionViolated)
        );
        Ok(())
    }

    #[test]
    fn rounds_must_run_in_order() -> Result<()> {
        let mut rng = init_testing();
        let opts = SharingOpts::with_bit_length(64)?;
        let dealer = Dealer::new(2, 3, opts.clone())?;
        let fixture = Fixture::new(dealer, 1, |_| BigNumber::one(), &mut rng)?;
        let mut quorum = quorum(&fixture, &opts, &mut rng)?;
        assert_eq!(
            quorum[0].round_two(&RoundMessages::new()).unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::ProtocolOutOfOrder)
        );
        let _ = run(&mut quorum)?;
        assert_eq!(
            quorum[0].round_one().unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::ProtocolAlreadyTerminated)
        );
        Ok(())
    }
}
