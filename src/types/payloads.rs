/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition of the [Payload] type, the signed proposal a participant submits for the round in progress.
//!
//! ## Canonical contents
//!
//! Payloads are grouped by content when votes are counted, so two participants that observed the same
//! thing must produce byte-identical contents. [`Payload::new`] guarantees this for structured
//! contents by serializing them as JSON with object keys in sorted order.
//!
//! ## Signatures
//!
//! The sender signs the [round count](RoundCount) the payload was proposed for, the transaction type,
//! and the content. A collection only accepts a payload whose signature [verifies](Payload::is_correct)
//! against its claimed sender, so no participant can cast a vote in another participant's name.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;
use thiserror::Error;

use super::data_types::{CryptoHash, RoundCount};

/// Enumerates the kinds of payloads, one per non-degenerate round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub enum TransactionType {
    NewTokens,
    LeaderboardObservation,
    ImageCodeCalculation,
    ImageGeneration,
    DbUpdate,
}

impl TransactionType {
    pub const fn name(&self) -> &'static str {
        match self {
            TransactionType::NewTokens => "new_tokens",
            TransactionType::LeaderboardObservation => "leaderboard_observation",
            TransactionType::ImageCodeCalculation => "image_code_calculation",
            TransactionType::ImageGeneration => "image_generation",
            TransactionType::DbUpdate => "db_update",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable, signed proposal of one participant for one round.
///
/// Equality is by value. Use [`content_hash`](Payload::content_hash) to compare the proposals of
/// different senders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    sender: VerifyingKey,
    round_count: RoundCount,
    transaction_type: TransactionType,
    content: String,
    signature: Signature,
}

impl Payload {
    /// Create a payload for the round numbered `round_count`, whose content is the canonical JSON
    /// encoding of `content`, signed by `keypair`.
    pub fn new<T: Serialize + ?Sized>(
        keypair: &SigningKey,
        round_count: RoundCount,
        transaction_type: TransactionType,
        content: &T,
    ) -> Result<Payload, serde_json::Error> {
        // Going through `Value` sorts the keys of every object.
        let content = serde_json::to_value(content)?.to_string();
        Ok(Self::from_raw(keypair, round_count, transaction_type, content))
    }

    /// Create a payload with an opaque, already encoded content, signed by `keypair`.
    pub fn from_raw(
        keypair: &SigningKey,
        round_count: RoundCount,
        transaction_type: TransactionType,
        content: String,
    ) -> Payload {
        let signature = keypair.sign(&message_bytes(round_count, transaction_type, &content));
        Payload {
            sender: keypair.verifying_key(),
            round_count,
            transaction_type,
            content,
            signature,
        }
    }

    pub fn sender(&self) -> &VerifyingKey {
        &self.sender
    }

    pub fn round_count(&self) -> RoundCount {
        self.round_count
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Verify that the signature was created by the sender over this payload's round count,
    /// transaction type, and content.
    pub fn is_correct(&self) -> bool {
        self.sender
            .verify(
                &message_bytes(self.round_count, self.transaction_type, &self.content),
                &self.signature,
            )
            .is_ok()
    }

    /// SHA256 hash of the content. Identical contents from different senders have the same hash.
    pub fn content_hash(&self) -> CryptoHash {
        CryptoHash::digest(self.content.as_bytes())
    }

    /// Serialize this payload for submission to the ordering engine.
    pub fn to_bytes(&self) -> Vec<u8> {
        PayloadBytes::from(self)
            .try_to_vec()
            .expect("serializing into a Vec cannot fail")
    }

    /// Deserialize a payload delivered by the ordering engine. The signature is not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Payload, PayloadError> {
        let payload_bytes = PayloadBytes::try_from_slice(bytes).map_err(PayloadError::Decode)?;
        Payload::try_from(payload_bytes)
    }
}

/// Get the bytes that are signed by the sender of a payload.
fn message_bytes(round_count: RoundCount, transaction_type: TransactionType, content: &str) -> Vec<u8> {
    (round_count, transaction_type, content)
        .try_to_vec()
        .expect("serializing into a Vec cannot fail")
}

/// Intermediate representation of [Payload] for safe serialization and deserialization.
///
/// ## Rationale
///
/// `VerifyingKey` and `Signature` do not implement the borsh traits, and not every 32-byte array is a
/// valid verifying key, so the conversion back into a `Payload` is fallible.
#[derive(BorshSerialize, BorshDeserialize)]
struct PayloadBytes {
    sender: [u8; 32],
    round_count: RoundCount,
    transaction_type: TransactionType,
    content: String,
    signature: [u8; 64],
}

impl From<&Payload> for PayloadBytes {
    fn from(payload: &Payload) -> Self {
        PayloadBytes {
            sender: payload.sender.to_bytes(),
            round_count: payload.round_count,
            transaction_type: payload.transaction_type,
            content: payload.content.clone(),
            signature: payload.signature.to_bytes(),
        }
    }
}

impl TryFrom<PayloadBytes> for Payload {
    type Error = PayloadError;

    fn try_from(payload_bytes: PayloadBytes) -> Result<Self, Self::Error> {
        Ok(Payload {
            sender: VerifyingKey::from_bytes(&payload_bytes.sender)
                .map_err(PayloadError::InvalidSender)?,
            round_count: payload_bytes.round_count,
            transaction_type: payload_bytes.transaction_type,
            content: payload_bytes.content,
            signature: Signature::from_bytes(&payload_bytes.signature),
        })
    }
}

/// Reasons why a payload is not accepted into a round's collection.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("sender is not a participant")]
    NotAParticipant,

    #[error("payload of type {actual} sent to a round that expects {expected}")]
    WrongRound {
        expected: TransactionType,
        actual: TransactionType,
    },

    #[error("signature does not verify against the sender")]
    InvalidSignature,

    #[error("payload for round count {actual} sent to round count {expected}")]
    StaleRoundCount {
        expected: RoundCount,
        actual: RoundCount,
    },

    #[error("sender bytes are not a valid verifying key")]
    InvalidSender(#[source] SignatureError),

    #[error("payload bytes could not be decoded")]
    Decode(#[source] std::io::Error),
}
