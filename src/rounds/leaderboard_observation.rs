/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Observation of the external leaderboard and layer configuration.
//!
//! A participant that could not reach the leaderboard API proposes the empty object `{}`.

use serde_json::{Map, Value};

use crate::synchronized_data::{DataUpdates, SynchronizedData, MOST_VOTED_API_DATA};
use crate::types::data_types::LeaderboardSnapshot;

use super::{decode, Event, RoundError, RoundId};

/// Content proposed when the leaderboard could not be fetched.
pub fn api_error_sentinel() -> Value {
    Value::Object(Map::new())
}

pub(super) fn end_block(content: &str, data: &SynchronizedData) -> Result<(SynchronizedData, Event), RoundError> {
    let value: Value = decode(RoundId::LeaderboardObservation, content)?;
    if value == api_error_sentinel() {
        return Ok((data.clone(), Event::ApiError));
    }

    let snapshot: LeaderboardSnapshot = decode(RoundId::LeaderboardObservation, content)?;
    let updates = DataUpdates::new().insert(MOST_VOTED_API_DATA, &snapshot)?;
    Ok((data.update(updates), Event::Done))
}
