// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{CallerError, Result};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, Rng, RngCore};
use tracing::error;

pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500usize;

/// Returns `true` if `value ∊ [-2^n, 2^n]`.
#[cfg(test)]
pub(crate) fn within_bound_by_size(value: &BigNumber, n: usize) -> bool {
    let bound = BigNumber::one() << n;
    value <= &bound && value >= &-bound
}

/// Sample a number uniformly at random from the range [0, n). This can be used
/// for sampling from a prime field `F_p` or the integers modulo `n` (for any
/// `n`).
pub(crate) fn random_positive_bn<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Sample a number uniformly at random from the range [-n, n].
pub(crate) fn random_plusminus<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    // `from_rng()` samples the _open_ interval, so add 1 to get the closed interval
    // for `n`
    let open_interval_max: BigNumber = n + 1;
    let val = BigNumber::from_rng(&open_interval_max, rng);
    let is_positive: bool = rng.gen();
    match is_positive {
        true => val,
        false => -val,
    }
}

/// Sample a number uniformly at random from the range `[-2^n, 2^n]`.
pub(crate) fn random_plusminus_by_size<R: RngCore + CryptoRng>(rng: &mut R, n: usize) -> BigNumber {
    let range = BigNumber::one() << n;
    random_plusminus(rng, &range)
}

/// Sample a number uniformly at random from the range `[low, high)`.
pub(crate) fn random_bn_in_range<R: RngCore + CryptoRng>(
    rng: &mut R,
    low: &BigNumber,
    high: &BigNumber,
) -> Result<BigNumber> {
    if high <= low {
        error!("Cannot sample from the empty range [{}, {})", low, high);
        Err(CallerError::BadInput)?
    }
    let width = high - low;
    Ok(low + BigNumber::from_rng(&width, rng))
}

/// Round `value` down to the nearest multiple of four.
///
/// Works for negative values as well: `nmod` always returns the non-negative
/// residue, so the result is never larger than `value`.
pub(crate) fn clear_low_two_bits(value: &BigNumber) -> BigNumber {
    let four = BigNumber::from(4u64);
    value - value.nmod(&four)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn test_random_bn_in_range() {
        let mut rng = init_testing();
        // Statistical tests -- should generate random numbers that are long enough
        let mut max_len = 0;
        let num_bytes = 100;

        for _ in 0..1000 {
            let bn = random_plusminus_by_size(&mut rng, num_bytes * 8);
            assert!(within_bound_by_size(&bn, num_bytes * 8));
            let len = bn.to_bytes().len();
            if max_len < len {
                max_len = len;
            }
        }

        assert!(max_len > num_bytes - 2);
    }

    #[test]
    fn range_sampling_respects_bounds() {
        let mut rng = init_testing();
        let low = -BigNumber::from(17u64);
        let high = BigNumber::from(5u64);
        for _ in 0..200 {
            let value = random_bn_in_range(&mut rng, &low, &high).unwrap();
            assert!(value >= low && value < high);
        }
        assert!(random_bn_in_range(&mut rng, &high, &low).is_err());
        assert!(random_bn_in_range(&mut rng, &low, &low).is_err());
    }

    #[test]
    fn clearing_low_bits_rounds_down() {
        let four = BigNumber::from(4u64);
        let cases = [
            (9u64, true),
            (4, true),
            (1, true),
            (0, false),
            (3, false),
            (7, false),
            (12, false),
        ];
        for (magnitude, negative) in cases {
            let value = match negative {
                true => -BigNumber::from(magnitude),
                false => BigNumber::from(magnitude),
            };
            let cleared = clear_low_two_bits(&value);
            assert_eq!(cleared.nmod(&four), BigNumber::zero());
            assert!(cleared <= value);
            assert!(value.clone() - cleared < four);
        }
    }
}

////////////////////////////
// Test Utility Functions //
////////////////////////////
