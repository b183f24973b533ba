// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{CallerError, Result};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Extra bits added to a bit-length bound so that random sub-shares
/// statistically hide the secret.
pub const STATISTICAL_SECURITY_BITS: usize = 128;

/// How large the sub-shares of a sharing are.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SizeBound {
    /// Secrets fit in `[-2^b, 2^b]`; random sub-shares are drawn from
    /// `[-2^(b + σ), 2^(b + σ)]` and nothing is reduced.
    BitLength(usize),
    /// All values live in `Z_m`; sub-shares are uniform in `[0, m)`.
    Modulus(BigNumber),
    /// Random sub-shares are uniform in `[low, high)`.
    Range {
        /// Inclusive lower bound.
        low: BigNumber,
        /// Exclusive upper bound.
        high: BigNumber,
    },
}

/// Validated options for sampling sub-shares.
///
/// Exactly one [`SizeBound`] is set. Build with [`SharingOpts::builder`] or
/// one of the shortcuts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharingOpts {
    bound: SizeBound,
    special_form: bool,
}

impl SharingOpts {
    /// Start building options.
    pub fn builder() -> SharingOptsBuilder {
        SharingOptsBuilder::default()
    }

    /// Options for secrets bounded by `2^bits` in absolute value.
    pub fn with_bit_length(bits: usize) -> Result<Self> {
        Self::builder().bit_length(bits).build()
    }

    /// Options for secrets in `Z_modulus`.
    pub fn with_modulus(modulus: BigNumber) -> Result<Self> {
        Self::builder().modulus(modulus).build()
    }

    /// The size bound.
    pub fn bound(&self) -> &SizeBound {
        &self.bound
    }

    /// The modulus, if values are reduced.
    pub fn modulus(&self) -> Option<&BigNumber> {
        match &self.bound {
            SizeBound::Modulus(modulus) => Some(modulus),
            _ => None,
        }
    }

    /// The declared bit length, if any.
    pub fn bit_length(&self) -> Option<usize> {
        match self.bound {
            SizeBound::BitLength(bits) => Some(bits),
            _ => None,
        }
    }

    /// Whether random sub-shares are multiples of four.
    pub fn special_form(&self) -> bool {
        self.special_form
    }

    /// Options sized for the product of two values shared under `self`.
    ///
    /// Random sub-shares are bounded by `2^(b + σ)`, so a bit length `b`
    /// becomes `2(b + σ)`, which bounds the product of any two sub-shares. A
    /// modulus is kept. Ranges have no natural product and are rejected.
    pub fn for_product(&self) -> Result<Self> {
        let bound = match &self.bound {
            SizeBound::BitLength(bits) => {
                SizeBound::BitLength(2 * (bits + STATISTICAL_SECURITY_BITS))
            }
            SizeBound::Modulus(modulus) => SizeBound::Modulus(modulus.clone()),
            SizeBound::Range { .. } => {
                error!("Cannot derive product options from a range bound");
                Err(CallerError::BadInput)?
            }
        };
        Ok(Self {
            bound,
            special_form: false,
        })
    }

    /// The same options with a bit length grown by `extra_bits`. Other
    /// bounds are returned unchanged.
    pub(crate) fn widened_by(&self, extra_bits: usize) -> Self {
        let bound = match &self.bound {
            SizeBound::BitLength(bits) => SizeBound::BitLength(bits + extra_bits),
            other => other.clone(),
        };
        Self {
            bound,
            special_form: self.special_form,
        }
    }
}

/// Builder for [`SharingOpts`]. [`build`](SharingOptsBuilder::build) checks
/// that exactly one size option is present.
#[derive(Clone, Debug, Default)]
pub struct SharingOptsBuilder {
    bit_length: Option<usize>,
    modulus: Option<BigNumber>,
    range: Option<(BigNumber, BigNumber)>,
    special_form: bool,
}

impl SharingOptsBuilder {
    /// Bound secrets by `2^bits` in absolute value.
    pub fn bit_length(mut self, bits: usize) -> Self {
        self.bit_length = Some(bits);
        self
    }

    /// Reduce every value modulo `modulus`.
    pub fn modulus(mut self, modulus: BigNumber) -> Self {
        self.modulus = Some(modulus);
        self
    }

    /// Draw random sub-shares uniformly from `[low, high)`.
    pub fn range(mut self, low: BigNumber, high: BigNumber) -> Self {
        self.range = Some((low, high));
        self
    }

    /// Clear the two low bits of every random sub-share.
    pub fn special_form(mut self, special_form: bool) -> Self {
        self.special_form = special_form;
        self
    }

    /// Validate and produce the options.
    pub fn build(self) -> Result<SharingOpts> {
        let given = [
            self.bit_length.is_some(),
            self.modulus.is_some(),
            self.range.is_some(),
        ]
        .into_iter()
        .filter(|given| *given)
        .count();
        match given {
            0 => {
                error!("Sharing options need a bit length, a modulus or a range");
                Err(CallerError::MissingSizeOption)?
            }
            1 => {}
            _ => {
                error!("Sharing options got {} size options, expected one", given);
                Err(CallerError::ConflictingSizeOptions)?
            }
        }

        let bound = if let Some(bits) = self.bit_length {
            if bits == 0 {
                error!("Bit length must be positive");
                Err(CallerError::BadInput)?
            }
            SizeBound::BitLength(bits)
        } else if let Some(modulus) = self.modulus {
            if modulus <= BigNumber::one() {
                error!("Modulus must be larger than one");
                Err(CallerError::BadInput)?
            }
            if self.special_form {
                // Reducing would destroy the cleared bits.
                error!("Special form cannot be combined with a modulus");
                Err(CallerError::BadInput)?
            }
            SizeBound::Modulus(modulus)
        } else if let Some((low, high)) = self.range {
            if high <= low {
                error!("Range [{}, {}) is empty", low, high);
                Err(CallerError::BadInput)?
            }
            SizeBound::Range { low, high }
        } else {
            error!("Sharing options lost their size option");
            Err(crate::errors::InternalError::InternalInvariantFailed)?
        };

        Ok(SharingOpts {
            bound,
            special_form: self.special_form,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InternalError;

    #[test]
    fn exactly_one_size_option_is_required() {
        assert_eq!(
            SharingOpts::builder().build().unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::MissingSizeOption)
        );
        assert_eq!(
            SharingOpts::builder()
                .bit_length(64)
                .modulus(BigNumber::from(7u64))
                .build()
                .unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::ConflictingSizeOptions)
        );
        assert_eq!(
            SharingOpts::builder()
                .bit_length(64)
                .modulus(BigNumber::from(7u64))
                .range(BigNumber::zero(), BigNumber::from(8u64))
                .build()
                .unwrap_err(),
            InternalError::CallingApplicationMistake(CallerError::ConflictingSizeOptions)
        );
    }

    #[test]
    fn degenerate_bounds_are_rejected() {
        assert!(SharingOpts::with_bit_length(0).is_err());
        assert!(SharingOpts::with_modulus(BigNumber::one()).is_err());
        assert!(SharingOpts::builder()
            .range(BigNumber::from(3u64), BigNumber::from(3u64))
            .build()
            .is_err());
        assert!(SharingOpts::builder()
            .modulus(BigNumber::from(11u64))
            .special_form(true)
            .build()
            .is_err());
    }

    #[test]
    fn accessors_follow_the_bound() -> Result<()> {
        let opts = SharingOpts::with_bit_length(100)?;
        assert_eq!(opts.bit_length(), Some(100));
        assert!(opts.modulus().is_none());
        assert_eq!(
            opts.for_product()?.bit_length(),
            Some(2 * (100 + STATISTICAL_SECURITY_BITS))
        );
        assert_eq!(opts.widened_by(7).bit_length(), Some(107));

        let modulus = BigNumber::from(101u64);
        let opts = SharingOpts::with_modulus(modulus.clone())?;
        assert_eq!(opts.modulus(), Some(&modulus));
        assert_eq!(opts.for_product()?.modulus(), Some(&modulus));
        assert_eq!(opts.widened_by(7), opts);

        let opts = SharingOpts::builder()
            .range(BigNumber::zero(), BigNumber::from(16u64))
            .special_form(true)
            .build()?;
        assert!(opts.special_form());
        assert!(opts.for_product().is_err());
        Ok(())
    }
}
