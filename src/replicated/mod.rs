// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Replicated secret sharing over the maximal unqualified sets of a `(t, n)`
//! structure.
//!
//! A secret `s` is written as `s = Σ_S s_S`, one summand per maximal
//! unqualified set `S`, and `s_S` is given to every party outside `S`.
//!
//! - [`Dealer`] produces and reconstructs such sharings.
//! - [`Share`] supports the linear operations, which need no interaction.
//! - [`ShareValue`] abstracts over what is being shared: integers
//!   ([`BigNumber`](libpaillier::unknown_order::BigNumber)), optionally
//!   reduced by a modulus, or secp256k1 scalars.

mod dealer;
mod opts;
mod share;
mod value;

pub use dealer::Dealer;
pub use opts::{SharingOpts, SharingOptsBuilder, SizeBound, STATISTICAL_SECURITY_BITS};
pub use share::Share;
pub use value::{bn_to_scalar, k256_order, scalar_to_bn, ShareValue};
