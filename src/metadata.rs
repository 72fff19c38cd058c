/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Read-only views of [synchronized data](crate::synchronized_data) served to the outside world: the
//! metadata of each token, and the health of the service.
//!
//! Both are plain serde types. Serving them over HTTP is left to the embedding process.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::synchronized_data::{DataError, SynchronizedData};
use crate::types::data_types::TokenId;

pub const COLLECTION_TITLE: &str = "Autonolas Contribute Badges";
pub const COLLECTION_DESCRIPTION: &str =
    "This NFT recognizes the contributions made by the holder to the Autonolas Community.";

/// Metadata of a single token, in the format NFT marketplaces expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub title: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<Value>,
}

impl TokenMetadata {
    /// Metadata of `token_id`, or `None` if the token is not in the token table.
    pub fn for_token(data: &SynchronizedData, token_id: TokenId) -> Result<Option<TokenMetadata>, DataError> {
        let token_to_data = data.token_to_data()?;
        Ok(token_to_data.get(&token_id).map(|token| TokenMetadata {
            title: COLLECTION_TITLE.to_string(),
            name: format!("Badge {}", token_id),
            description: COLLECTION_DESCRIPTION.to_string(),
            image: format!("ipfs://{}", token.image_hash.as_deref().unwrap_or_default()),
            attributes: Vec::new(),
        }))
    }
}

/// Time elapsed since the token table was last updated.
///
/// Every field is `None` until the first update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub seconds_since_last_reset: Option<i64>,
    pub healthy: Option<bool>,
    /// Negative once the expected update time has passed without an update.
    pub seconds_until_next_update: Option<i64>,
}

impl HealthReport {
    /// Report the health of the service at consensus time `now` (seconds since the Unix Epoch), given that
    /// the token table should be updated every `observation_interval`.
    ///
    /// The service is healthy if the last update is less than two intervals old.
    pub fn new(data: &SynchronizedData, now: u64, observation_interval: Duration) -> Result<HealthReport, DataError> {
        let last_update_time = match data.last_update_time()? {
            Some(last_update_time) => last_update_time,
            None => return Ok(HealthReport::default()),
        };

        // Both operands fit in an i128, so none of these can overflow.
        let since = i128::from(now) - i128::from(last_update_time);
        let interval = i128::from(observation_interval.as_secs());
        Ok(HealthReport {
            seconds_since_last_reset: Some(saturate(since)),
            healthy: Some(since < 2 * interval),
            seconds_until_next_update: Some(saturate(interval - since)),
        })
    }
}

fn saturate(seconds: i128) -> i64 {
    seconds.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
