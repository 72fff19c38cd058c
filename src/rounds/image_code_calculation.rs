/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Agreement on the per-token updates of this period. Participants compute them with
//! [`token_updates`](crate::image_code::token_updates), so this round has no failure event of its own.

use crate::synchronized_data::{DataUpdates, SynchronizedData, MOST_VOTED_TOKEN_UPDATES};
use crate::types::data_types::TokenUpdates;

use super::{decode, Event, RoundError, RoundId};

pub(super) fn end_block(content: &str, data: &SynchronizedData) -> Result<(SynchronizedData, Event), RoundError> {
    let token_updates: TokenUpdates = decode(RoundId::ImageCodeCalculation, content)?;
    let updates = DataUpdates::new().insert(MOST_VOTED_TOKEN_UPDATES, &token_updates)?;
    Ok((data.update(updates), Event::Done))
}
