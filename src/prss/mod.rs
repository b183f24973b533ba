// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Pseudorandom secret sharing (PRSS).
//!
//! A one-round setup leaves every party with a key for each maximal
//! unqualified set it is not part of. Afterwards, the parties outside a set
//! can derive the same fresh randomness for it without any communication,
//! which is what the multiplication protocol uses to blind its messages.

mod participant;
mod seed;

pub use participant::{PrssParticipant, PrssSeedsMessage};
pub use seed::{PrssStream, PseudoRandomSeed, SEED_BYTES};

#[cfg(test)]
pub(crate) use participant::simulate_prss;
