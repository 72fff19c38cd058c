/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The versioned key-value store that rounds read and produce.
//!
//! [SynchronizedData] maps every key to the list of values it held over the current period, oldest
//! first. Reads return the latest value. Writes never happen in place: [`update`](SynchronizedData::update)
//! and [`reset_period`](SynchronizedData::reset_period) return a new snapshot and leave the receiver
//! untouched, so any snapshot that has been handed out stays consistent forever.
//!
//! ## Persisted layout
//!
//! Values are stored as canonical JSON strings. The whole store (period count, round count, and the
//! per-key histories) is borsh-encoded by [`to_bytes`](SynchronizedData::to_bytes), and restored with exactly
//! the same histories by [`from_bytes`](SynchronizedData::from_bytes).

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::types::data_types::{
    ImageCodeToHash, LeaderboardSnapshot, PeriodCount, RoundCount, TokenTable, TokenUpdates,
};

/* ↓↓↓ Keys ↓↓↓ */

pub const TOKEN_TO_DATA: &str = "token_to_data";
pub const IMAGE_CODE_TO_HASH: &str = "image_code_to_hash";
pub const MOST_VOTED_API_DATA: &str = "most_voted_api_data";
pub const MOST_VOTED_TOKEN_UPDATES: &str = "most_voted_token_updates";
pub const LAST_UPDATE_TIME: &str = "last_update_time";
pub const LAST_PARSED_BLOCK: &str = "last_parsed_block";

/// Immutable snapshot of the data shared by all rounds of one period.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SynchronizedData {
    period_count: PeriodCount,
    round_count: RoundCount,
    db: BTreeMap<String, Vec<String>>,
}

/// Set of writes to apply in a single [`update`](SynchronizedData::update).
#[derive(Clone, Debug, Default)]
pub struct DataUpdates(Vec<(String, String)>);

impl DataUpdates {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Schedule `value` to be appended to the history of `key`.
    ///
    /// If `key` is inserted twice into the same `DataUpdates`, the last value wins.
    pub fn insert<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, DataError> {
        let encoded = serde_json::to_value(value)
            .map_err(|source| DataError::Serialize {
                key: key.to_string(),
                source,
            })?
            .to_string();
        self.0.retain(|(k, _)| k != key);
        self.0.push((key.to_string(), encoded));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SynchronizedData {
    /// Create an empty store for the first period.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period_count(&self) -> PeriodCount {
        self.period_count
    }

    /// Round count of the round this snapshot was handed to. It survives period resets.
    pub fn round_count(&self) -> RoundCount {
        self.round_count
    }

    /// Return this snapshot with the round count incremented, for the next round to open.
    pub(crate) fn next_round(&self) -> SynchronizedData {
        SynchronizedData {
            round_count: self.round_count.next(),
            ..self.clone()
        }
    }

    /// Get the latest value of `key`, or `None` if it was never written in this period.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DataError> {
        match self.latest(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|source| DataError::Deserialize {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Get the latest value of `key`, or `default` if it was never written in this period.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, DataError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Get the latest value of `key`, failing with [`DataError::KeyNotSet`] if it was never written in
    /// this period.
    pub fn get_strict<T: DeserializeOwned>(&self, key: &str) -> Result<T, DataError> {
        self.get(key)?.ok_or_else(|| DataError::KeyNotSet {
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.latest(key).is_some()
    }

    /// Every value `key` held during this period, oldest first, as raw JSON.
    pub fn history(&self, key: &str) -> &[String] {
        self.db.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Return a new snapshot in which the history of every key in `updates` is extended by one entry.
    pub fn update(&self, updates: DataUpdates) -> SynchronizedData {
        let mut db = self.db.clone();
        for (key, value) in updates.0 {
            db.entry(key).or_default().push(value);
        }
        SynchronizedData {
            period_count: self.period_count,
            round_count: self.round_count,
            db,
        }
    }

    /// Return the snapshot that starts the next period: only the latest values of `carry_over_keys`
    /// survive, and the period count is incremented.
    pub fn reset_period(&self, carry_over_keys: &[&str]) -> SynchronizedData {
        let db = carry_over_keys
            .iter()
            .filter_map(|key| {
                self.latest(key)
                    .map(|value| (key.to_string(), vec![value.to_string()]))
            })
            .collect();
        SynchronizedData {
            period_count: self.period_count.next(),
            round_count: self.round_count,
            db,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.try_to_vec()
            .expect("serializing into a Vec cannot fail")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<SynchronizedData, DataError> {
        SynchronizedData::try_from_slice(bytes).map_err(DataError::Decode)
    }

    fn latest(&self, key: &str) -> Option<&str> {
        self.db
            .get(key)
            .and_then(|history| history.last())
            .map(String::as_str)
    }

    /* ↓↓↓ Typed accessors ↓↓↓ */

    /// The token table. Empty until the first tokens are discovered.
    pub fn token_to_data(&self) -> Result<TokenTable, DataError> {
        self.get_or(TOKEN_TO_DATA, TokenTable::new())
    }

    /// The redirect table from image codes to image hashes. Empty until the first images are pushed.
    pub fn image_code_to_hash(&self) -> Result<ImageCodeToHash, DataError> {
        self.get_or(IMAGE_CODE_TO_HASH, ImageCodeToHash::new())
    }

    pub fn most_voted_api_data(&self) -> Result<LeaderboardSnapshot, DataError> {
        self.get_strict(MOST_VOTED_API_DATA)
    }

    pub fn most_voted_token_updates(&self) -> Result<TokenUpdates, DataError> {
        self.get_strict(MOST_VOTED_TOKEN_UPDATES)
    }

    /// Seconds since the Unix Epoch at which the token table was last updated.
    pub fn last_update_time(&self) -> Result<Option<u64>, DataError> {
        self.get(LAST_UPDATE_TIME)
    }

    pub fn last_parsed_block(&self) -> Result<Option<u64>, DataError> {
        self.get(LAST_PARSED_BLOCK)
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("key `{key}` has not been set in this period")]
    KeyNotSet { key: String },

    #[error("value of key `{key}` could not be serialized")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value of key `{key}` could not be deserialized")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("synchronized data bytes could not be decoded")]
    Decode(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_types::TokenData;

    fn token(points: i64) -> TokenData {
        TokenData {
            address: "0xabc".into(),
            points,
            image_code: None,
            image_hash: None,
        }
    }

    #[test]
    fn update_appends_without_mutating_the_receiver() {
        let empty = SynchronizedData::new();
        let first = empty
            .update(DataUpdates::new().insert(LAST_PARSED_BLOCK, &10u64).unwrap());
        let second = first
            .update(DataUpdates::new().insert(LAST_PARSED_BLOCK, &20u64).unwrap());

        assert_eq!(empty.last_parsed_block().unwrap(), None);
        assert_eq!(first.last_parsed_block().unwrap(), Some(10));
        assert_eq!(second.last_parsed_block().unwrap(), Some(20));
        assert_eq!(second.history(LAST_PARSED_BLOCK), ["10", "20"]);
    }

    #[test]
    fn strict_getter_fails_on_unset_key() {
        let data = SynchronizedData::new();
        assert!(matches!(
            data.most_voted_token_updates(),
            Err(DataError::KeyNotSet { key }) if key == MOST_VOTED_TOKEN_UPDATES
        ));
        assert_eq!(data.get_or(LAST_UPDATE_TIME, 7u64).unwrap(), 7);
    }

    #[test]
    fn wrongly_typed_value_is_a_deserialize_error() {
        let data = SynchronizedData::new()
            .update(DataUpdates::new().insert(LAST_UPDATE_TIME, "yesterday").unwrap());
        assert!(matches!(
            data.last_update_time(),
            Err(DataError::Deserialize { .. })
        ));
    }

    #[test]
    fn reset_period_keeps_only_carried_keys() {
        let mut table = TokenTable::new();
        table.insert(1, token(100));
        let data = SynchronizedData::new()
            .update(
                DataUpdates::new()
                    .insert(TOKEN_TO_DATA, &TokenTable::new())
                    .unwrap()
                    .insert(LAST_PARSED_BLOCK, &5u64)
                    .unwrap(),
            )
            .update(
                DataUpdates::new()
                    .insert(TOKEN_TO_DATA, &table)
                    .unwrap()
                    .insert(MOST_VOTED_TOKEN_UPDATES, &TokenUpdates::new())
                    .unwrap(),
            );

        let next = data.reset_period(&[TOKEN_TO_DATA, LAST_PARSED_BLOCK, LAST_UPDATE_TIME]);

        assert_eq!(next.period_count(), PeriodCount::new(1));
        assert_eq!(next.token_to_data().unwrap(), table);
        assert_eq!(next.history(TOKEN_TO_DATA).len(), 1);
        assert_eq!(next.last_parsed_block().unwrap(), Some(5));
        assert!(!next.contains(MOST_VOTED_TOKEN_UPDATES));
        assert!(!next.contains(LAST_UPDATE_TIME));
    }

    #[test]
    fn token_table_keys_are_numeric() {
        let mut table = TokenTable::new();
        table.insert(10, token(1));
        table.insert(9, token(2));
        let data =
            SynchronizedData::new().update(DataUpdates::new().insert(TOKEN_TO_DATA, &table).unwrap());

        let ids: Vec<u64> = data.token_to_data().unwrap().into_keys().collect();
        assert_eq!(ids, vec![9, 10]);
    }

    #[test]
    fn bytes_restore_the_exact_histories() {
        let data = SynchronizedData::new()
            .update(DataUpdates::new().insert(LAST_UPDATE_TIME, &1u64).unwrap())
            .next_round()
            .update(DataUpdates::new().insert(LAST_UPDATE_TIME, &2u64).unwrap())
            .reset_period(&[LAST_UPDATE_TIME])
            .next_round()
            .update(DataUpdates::new().insert(LAST_UPDATE_TIME, &3u64).unwrap());

        let restored = SynchronizedData::from_bytes(&data.to_bytes()).unwrap();
        assert_eq!(restored, data);
        assert_eq!(restored.round_count(), RoundCount::new(2));
        assert_eq!(restored.history(LAST_UPDATE_TIME), ["2", "3"]);
        assert!(SynchronizedData::from_bytes(&[1, 2, 3]).is_err());
    }
}
