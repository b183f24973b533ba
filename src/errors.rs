// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error types for the sharing layer and the protocols built on top of it.
//!
//! [`InternalError`] is the only error type returned by public functions.
//! Mistakes made by the calling application (a bad `(t, n)`, a missing size
//! option, calling a round twice) are reported as
//! [`InternalError::CallingApplicationMistake`] wrapping a [`CallerError`].
//! Everything else signals either a faulty peer or a bug.

use crate::{access_structure::SharingIdSet, protocol::SharingId};
use thiserror::Error;

/// Default result type for this crate.
pub type Result<T> = std::result::Result<T, InternalError>;

/// Errors that can occur while sharing, revealing or running a protocol.
#[derive(Clone, Eq, PartialEq, Error, Debug)]
pub enum InternalError {
    /// The calling application used the API incorrectly.
    #[error("Error originating from the calling application: {0}")]
    CallingApplicationMistake(#[from] CallerError),
    /// A peer sent a message that does not fit the protocol context. The
    /// offending party is named when it is known.
    #[error("Protocol error, faulty participant: {0:?}")]
    ProtocolError(Option<SharingId>),
    /// A round was consumed without a contribution that was owed by this
    /// party.
    #[error("Missing round message from participant {0}")]
    MissingMessage(SharingId),
    /// Two shares disagree on the value of the same sub-share.
    #[error("Conflicting values for the sub-share of unqualified set {0}")]
    InconsistentSubShare(SharingIdSet),
    /// Not enough distinct sub-shares to cover every unqualified set.
    #[error("Threshold not met: needed {required} distinct sub-shares, found {found}")]
    ThresholdNotMet {
        /// Number of maximal unqualified sets of the access structure.
        required: usize,
        /// Number of distinct sub-shares that were supplied.
        found: usize,
    },
    /// Sampling from the randomness source did not produce a usable value.
    #[error("Randomness source failed to produce a value")]
    RandomnessFailure,
    /// An invariant that should be upheld by this crate was broken.
    #[error("Internal invariant failed")]
    InternalInvariantFailed,
}

/// Errors that are caused by incorrect behavior by the calling application.
#[derive(Clone, Copy, Eq, PartialEq, Error, Debug)]
pub enum CallerError {
    /// `t` or `n` are out of range.
    #[error("Invalid access structure: threshold must be in [2, n] and 2 <= n <= 64")]
    InvalidAccessStructure,
    /// The access structure does not satisfy `2 * (t - 1) < n`.
    #[error("Access structure violates the ramp restriction 2(t-1) < n")]
    RampRestrictionViolated,
    /// None of bit length, modulus or range was given.
    #[error("Sharing options need a bit length, a modulus or a range")]
    MissingSizeOption,
    /// More than one of bit length, modulus or range was given.
    #[error("Sharing options accept exactly one of bit length, modulus or range")]
    ConflictingSizeOptions,
    /// An argument was malformed or does not belong to this context.
    #[error("Bad input")]
    BadInput,
    /// A protocol round was called before the previous one completed.
    #[error("Protocol round called out of order")]
    ProtocolOutOfOrder,
    /// A protocol round was called after the protocol terminated.
    #[error("Protocol already terminated")]
    ProtocolAlreadyTerminated,
    /// Bounded rejection sampling did not terminate.
    #[error("Sampling retry limit exceeded")]
    RetryFailed,
    /// Serializing a value failed.
    #[error("Serialization failed")]
    SerializationFailed,
}
