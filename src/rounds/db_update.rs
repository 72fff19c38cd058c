/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Application of the agreed token updates to the token table.
//!
//! The image hash of every updated token is resolved from the redirect table, so the image generation
//! round must have produced a hash for every code in the pending updates.

use serde::{Deserialize, Serialize};

use crate::synchronized_data::{DataUpdates, SynchronizedData, LAST_UPDATE_TIME, TOKEN_TO_DATA};

use super::{decode, Event, RoundError, RoundId};

/// Content of a [`TransactionType::DbUpdate`](crate::types::payloads::TransactionType::DbUpdate) payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbUpdatePayload {
    /// Seconds since the Unix Epoch.
    pub last_update_time: u64,
}

pub(super) fn end_block(content: &str, data: &SynchronizedData) -> Result<(SynchronizedData, Event), RoundError> {
    let payload: DbUpdatePayload = decode(RoundId::DbUpdate, content)?;

    let mut token_to_data = data.token_to_data()?;
    let image_code_to_hash = data.image_code_to_hash()?;
    for (token_id, update) in data.most_voted_token_updates()? {
        let token = token_to_data
            .get_mut(&token_id)
            .ok_or(RoundError::UnknownToken { token: token_id })?;
        let image_hash = image_code_to_hash
            .get(&update.image_code)
            .ok_or_else(|| RoundError::ImageHashNotFound {
                image_code: update.image_code.clone(),
            })?;

        token.points = update.points;
        token.image_hash = Some(image_hash.clone());
        token.image_code = Some(update.image_code);
    }

    let updates = DataUpdates::new()
        .insert(TOKEN_TO_DATA, &token_to_data)?
        .insert(LAST_UPDATE_TIME, &payload.last_update_time)?;
    Ok((data.update(updates), Event::Done))
}
