// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    errors::{InternalError, Result},
    protocol::{Identifier, SharingId},
    replicated::ShareValue,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::error;

fn check_batch(
    kind: &str,
    sid: Identifier,
    sender: SharingId,
    message_sid: Identifier,
    batch_len: usize,
    values: usize,
) -> Result<()> {
    if message_sid != sid {
        error!("{} from {} belongs to session {}", kind, sender, message_sid);
        Err(InternalError::ProtocolError(Some(sender)))?
    }
    if values != batch_len {
        error!(
            "{} from {} carries {} values, expected {}",
            kind, sender, values, batch_len
        );
        Err(InternalError::ProtocolError(Some(sender)))?
    }
    Ok(())
}

/// A blinded partial product, sent by a party to the holders of its
/// exclusive output slot.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MulMessage<V: ShareValue> {
    sid: Identifier,
    values: Vec<V>,
}

impl<V: ShareValue> MulMessage<V> {
    pub(crate) fn new(sid: Identifier, values: Vec<V>) -> Self {
        Self { sid, values }
    }

    pub(crate) fn values(&self) -> &[V] {
        &self.values
    }

    /// Check that the message belongs to session `sid` and has one value per
    /// product.
    pub fn validate(&self, sid: Identifier, sender: SharingId, batch_len: usize) -> Result<()> {
        check_batch(
            "Multiplication message",
            sid,
            sender,
            self.sid,
            batch_len,
            self.values.len(),
        )
    }
}

impl<V: ShareValue> Debug for MulMessage<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulMessage")
            .field("sid", &self.sid)
            .field("values", &self.values.len())
            .finish()
    }
}

/// A masked partial product, broadcast to every party.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublicMulMessage<V: ShareValue> {
    sid: Identifier,
    values: Vec<V>,
}

impl<V: ShareValue> PublicMulMessage<V> {
    pub(crate) fn new(sid: Identifier, values: Vec<V>) -> Self {
        Self { sid, values }
    }

    pub(crate) fn values(&self) -> &[V] {
        &self.values
    }

    /// Check that the message belongs to session `sid` and has one value per
    /// product.
    pub fn validate(&self, sid: Identifier, sender: SharingId, batch_len: usize) -> Result<()> {
        check_batch(
            "Public multiplication message",
            sid,
            sender,
            self.sid,
            batch_len,
            self.values.len(),
        )
    }
}

impl<V: ShareValue> Debug for PublicMulMessage<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicMulMessage")
            .field("sid", &self.sid)
            .field("values", &self.values.len())
            .finish()
    }
}
