// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Replicated threshold secret sharing.
//!
//! This crate implements replicated (also called CNF) secret sharing for a
//! `(t, n)` threshold access structure: any `t` of the `n` parties can
//! reconstruct a secret, any `t - 1` learn nothing about it. On top of the
//! sharing it provides the machinery for multiplying shared values:
//!
//! - [`AccessStructure`] enumerates the maximal unqualified sets and derives
//!   the tables that assign the cross terms of a product to parties.
//! - [`Dealer`] splits a secret into [`Share`]s and reconstructs it. Shares
//!   support addition, subtraction and multiplication by public values
//!   locally.
//! - [`PrssParticipant`] runs the one-round setup of pseudorandom secret
//!   sharing. The resulting [`PseudoRandomSeed`] lets the parties outside a
//!   set derive common randomness for it without interaction.
//! - [`MulParticipant`] and [`PublicMulParticipant`] multiply two shared
//!   values in two rounds, producing either a fresh sharing of the product
//!   or the product itself.
//!
//! Values are either integers ([`BigNumber`](libpaillier::unknown_order::BigNumber)),
//! bounded by a bit length or reduced by a modulus, or secp256k1
//! [`Scalar`](k256::Scalar)s. See [`SharingOpts`].
//!
//! # Communication
//! This crate does not do any networking. Each protocol round takes the
//! messages of the previous round as a [`RoundMessages`] keyed by sender, and
//! returns its outgoing messages. The calling application is responsible for
//! delivering them over authenticated channels, and messages carrying PRSS
//! seeds or private multiplication values additionally need confidential
//! ones. Messages implement [`serde::Serialize`].
//!
//! # Requirements for multiplication
//! Multiplication requires `2(t - 1) < n`, so that every product of two
//! sub-shares is known to some party. Each run needs a fresh session
//! [`Identifier`], since PRSS streams are derived from it.
//!
//! # Zeroization
//! Secrets held in [`BigNumber`](libpaillier::unknown_order::BigNumber)s live
//! in GMP buffers. Call [`enable_zeroize`] once on startup so that these are
//! erased when released.

#![warn(missing_docs)]

/// Serialize a value to bytes with bincode, or fail with
/// [`CallerError::SerializationFailed`].
macro_rules! serialize {
    ($x:expr) => {{
        bincode::serialize($x).map_err(|_| $crate::errors::CallerError::SerializationFailed)
    }};
}

mod access_structure;
pub mod errors;
mod gmp_zeroize;
mod mul;
mod protocol;
mod prss;
mod replicated;
mod utils;

pub use access_structure::{
    build_chi, build_max_unqualified_sets, build_rho, AccessStructure, Chi, Combinations, MulTables,
    Rho, SharingIdSet,
};
pub use errors::{CallerError, InternalError};
pub use gmp_zeroize::{enable_zeroize, zeroize_enabled};
pub use mul::{MulMessage, MulParticipant, PublicMulMessage, PublicMulParticipant};
pub use protocol::{
    Identifier, ProtocolParticipant, RoundMessages, SharingConfig, SharingId, Status,
};
pub use prss::{PrssParticipant, PrssSeedsMessage, PrssStream, PseudoRandomSeed, SEED_BYTES};
pub use replicated::{
    bn_to_scalar, k256_order, scalar_to_bn, Dealer, Share, ShareValue, SharingOpts,
    SharingOptsBuilder, SizeBound, STATISTICAL_SECURITY_BITS,
};
