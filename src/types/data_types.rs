/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to carry data between rounds, and do not have any major "active" behavior.
//!
//! Every type in this module that is stored in [synchronized data](crate::synchronized_data) is
//! (de)serialized as JSON, so the field names below are part of the persisted layout.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display, Formatter},
};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a minted token, as emitted by the contract's `Transfer` events.
pub type TokenId = u64;

/// Leaderboard score of a token holder. Negative scores are rejected by the
/// [image code engine](crate::image_code).
pub type Points = i64;

/// Content identifier of an image pushed to content-addressed storage.
pub type ImageHash = String;

/// 32-byte SHA256 hash.
///
/// Within this crate, `CryptoHash`-es are only computed over payload contents. Payloads with equal
/// hashes are counted as votes for the same value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the SHA256 hash of `bytes`.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0[0..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}

/// Row of the token table (`token_to_data`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    /// Address of the wallet that minted the token.
    pub address: String,

    /// Points the token had the last time the token table was updated.
    pub points: Points,

    /// Image code the token currently displays. `None` until the first update after minting.
    #[serde(default)]
    pub image_code: Option<String>,

    /// Hash of the image the token currently displays.
    #[serde(default)]
    pub image_hash: Option<ImageHash>,
}

/// Agreed change to a single row of the token table, pending until the DB update round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub points: Points,
    pub image_code: String,

    /// Always `None` when proposed. The hash is resolved from `image_code_to_hash` when the update is
    /// applied.
    #[serde(default)]
    pub image_hash: Option<ImageHash>,
}

/// One visual layer of a token image, with the point thresholds at which each of its variants is
/// unlocked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,

    /// Must be non-empty and strictly increasing. See [`validate_layers`](crate::image_code::validate_layers).
    pub thresholds: Vec<u64>,
}

impl Layer {
    pub fn new(name: impl Into<String>, thresholds: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            thresholds,
        }
    }
}

/// Agreed observation of the external leaderboard (`most_voted_api_data`).
///
/// `layers` is ordered: the position of a layer in this list is the position of its two digits in
/// every image code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    /// Wallet address to points.
    pub leaderboard: BTreeMap<String, Points>,
    pub layers: Vec<Layer>,
}

/// Token table, keyed by token id.
pub type TokenTable = BTreeMap<TokenId, TokenData>;

/// Agreed set of per-token changes for the current period.
pub type TokenUpdates = BTreeMap<TokenId, TokenUpdate>;

/// Image code to image hash (the redirect table).
pub type ImageCodeToHash = BTreeMap<String, ImageHash>;

/// Number of completed periods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct PeriodCount(u64);

impl PeriodCount {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for PeriodCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Number of rounds opened since the first round of the first period. Every payload is stamped with
/// the round count of the round it was proposed for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct RoundCount(u64);

impl RoundCount {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for RoundCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
