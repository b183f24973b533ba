// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The ring-like values a sharing is defined over.

use super::opts::{SharingOpts, SizeBound, STATISTICAL_SECURITY_BITS};
use crate::{
    errors::{CallerError, InternalError, Result},
    utils::{
        clear_low_two_bits, random_bn_in_range, random_plusminus_by_size, random_positive_bn,
        CRYPTOGRAPHIC_RETRY_MAX,
    },
};
use generic_array::GenericArray;
use k256::{
    elliptic_curve::{bigint::Encoding, Curve, Field, PrimeField},
    Scalar,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::error;
use zeroize::{Zeroize, Zeroizing};

/// A value that can be split into sub-shares.
///
/// Arithmetic is exact for integers and modular for field elements; a
/// sharing over the integers is reduced explicitly through
/// [`ShareValue::reduce`] when a modulus is configured.
pub trait ShareValue:
    Clone + Debug + PartialEq + Send + Sync + Zeroize + Serialize + DeserializeOwned
{
    /// The additive identity.
    fn zero() -> Self;

    /// `self + other`.
    fn plus(&self, other: &Self) -> Self;

    /// `self - other`.
    fn minus(&self, other: &Self) -> Self;

    /// `self * other`.
    fn times(&self, other: &Self) -> Self;

    /// `-self`.
    fn negate(&self) -> Self;

    /// The canonical residue of `self` modulo `modulus`.
    fn reduce(&self, modulus: &BigNumber) -> Self;

    /// Fails if this value type cannot be sampled under `opts`.
    fn check_opts(opts: &SharingOpts) -> Result<()>;

    /// Draw a random sub-share as described by `opts`.
    fn sample<R: RngCore + CryptoRng>(opts: &SharingOpts, rng: &mut R) -> Result<Self>;
}

impl ShareValue for BigNumber {
    fn zero() -> Self {
        BigNumber::zero()
    }

    fn plus(&self, other: &Self) -> Self {
        self + other
    }

    fn minus(&self, other: &Self) -> Self {
        self - other
    }

    fn times(&self, other: &Self) -> Self {
        self * other
    }

    fn negate(&self) -> Self {
        -self.clone()
    }

    fn reduce(&self, modulus: &BigNumber) -> Self {
        self.nmod(modulus)
    }

    fn check_opts(_opts: &SharingOpts) -> Result<()> {
        Ok(())
    }

    fn sample<R: RngCore + CryptoRng>(opts: &SharingOpts, rng: &mut R) -> Result<Self> {
        match opts.bound() {
            SizeBound::BitLength(bits) => {
                let value = random_plusminus_by_size(rng, bits + STATISTICAL_SECURITY_BITS);
                Ok(match opts.special_form() {
                    true => clear_low_two_bits(&value),
                    false => value,
                })
            }
            SizeBound::Modulus(modulus) => Ok(random_positive_bn(rng, modulus)),
            SizeBound::Range { low, high } if opts.special_form() => {
                // Rounding down can leave the range, so resample.
                std::iter::repeat_with(|| random_bn_in_range(rng, low, high))
                    .take(CRYPTOGRAPHIC_RETRY_MAX)
                    .map(|value| value.map(|value| clear_low_two_bits(&value)))
                    .find(|value| !matches!(value, Ok(value) if value < low))
                    .unwrap_or_else(|| {
                        error!("No multiple of four found in [{}, {})", low, high);
                        Err(CallerError::RetryFailed.into())
                    })
            }
            SizeBound::Range { low, high } => random_bn_in_range(rng, low, high),
        }
    }
}

/// The order of the secp256k1 group.
pub fn k256_order() -> BigNumber {
    let order_bytes: [u8; 32] = k256::Secp256k1::ORDER.to_be_bytes();
    BigNumber::from_slice(order_bytes)
}

/// Convert a [`BigNumber`] into a scalar, reducing modulo the group order.
pub fn bn_to_scalar(x: &BigNumber) -> Result<Scalar> {
    let x_modded = Zeroizing::new(x.nmod(&k256_order()));

    let bytes = Zeroizing::new(x_modded.to_bytes());
    let mut slice = Zeroizing::new(vec![0u8; 32 - bytes.len()]);
    slice.extend_from_slice(&bytes);

    Option::from(Scalar::from_repr(GenericArray::clone_from_slice(&slice))).ok_or_else(|| {
        error!("Failed to convert BigNumber into k256::Scalar");
        InternalError::InternalInvariantFailed
    })
}

/// Convert a scalar into its canonical [`BigNumber`] in `[0, q)`.
pub fn scalar_to_bn(x: &Scalar) -> BigNumber {
    let bytes = x.to_repr();
    BigNumber::from_slice(bytes)
}

impl ShareValue for Scalar {
    fn zero() -> Self {
        Scalar::ZERO
    }

    fn plus(&self, other: &Self) -> Self {
        self + other
    }

    fn minus(&self, other: &Self) -> Self {
        self - other
    }

    fn times(&self, other: &Self) -> Self {
        self * other
    }

    fn negate(&self) -> Self {
        -*self
    }

    fn reduce(&self, modulus: &BigNumber) -> Self {
        if modulus == &k256_order() {
            return *self;
        }
        let reduced = Zeroizing::new(scalar_to_bn(self).nmod(modulus));
        match bn_to_scalar(&reduced) {
            Ok(scalar) => scalar,
            // `bn_to_scalar` reduces by the group order first.
            Err(e) => {
                error!("Could not reduce a scalar modulo {}: {:?}", modulus, e);
                *self
            }
        }
    }

    fn check_opts(opts: &SharingOpts) -> Result<()> {
        if opts.special_form() {
            error!("Scalars do not support special form sharing");
            Err(CallerError::BadInput)?
        }
        match opts.modulus() {
            Some(modulus) if modulus == &k256_order() => Ok(()),
            _ => {
                error!("Scalar sharings must use the secp256k1 group order as modulus");
                Err(CallerError::BadInput)?
            }
        }
    }

    fn sample<R: RngCore + CryptoRng>(opts: &SharingOpts, rng: &mut R) -> Result<Self> {
        Self::check_opts(opts)?;
        Ok(<Scalar as Field>::random(rng))
    }
}
