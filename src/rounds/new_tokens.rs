/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Discovery of newly minted tokens.
//!
//! Participants scan the contract's `Transfer` events from the last parsed block onwards and propose
//! the tokens they found. A participant whose query failed proposes the [contract error
//! sentinel](NewTokensPayload::contract_error) instead, and the round ends with
//! [`Event::ContractError`] only if enough participants agree that the query failed.

use serde::{Deserialize, Serialize};

use crate::synchronized_data::{DataUpdates, SynchronizedData, LAST_PARSED_BLOCK, TOKEN_TO_DATA};
use crate::types::data_types::TokenTable;

use super::{decode, Event, RoundError, RoundId};

/// Content of a [`TransactionType::NewTokens`](crate::types::payloads::TransactionType::NewTokens)
/// payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTokensPayload {
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,

    #[serde(default, skip_serializing_if = "TokenTable::is_empty")]
    pub new_token_to_data: TokenTable,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_parsed_block: Option<u64>,
}

impl NewTokensPayload {
    pub fn found(new_token_to_data: TokenTable, last_parsed_block: u64) -> Self {
        Self {
            error: false,
            new_token_to_data,
            last_parsed_block: Some(last_parsed_block),
        }
    }

    /// `{"error":true}`.
    pub fn contract_error() -> Self {
        Self {
            error: true,
            ..Default::default()
        }
    }
}

fn is_false(value: &bool) -> bool {
    !value
}

pub(super) fn end_block(content: &str, data: &SynchronizedData) -> Result<(SynchronizedData, Event), RoundError> {
    let payload: NewTokensPayload = decode(RoundId::NewTokens, content)?;
    if payload.error {
        return Ok((data.clone(), Event::ContractError));
    }

    // Tokens that are already known keep their data.
    let mut token_to_data = data.token_to_data()?;
    for (token_id, token) in payload.new_token_to_data {
        token_to_data.entry(token_id).or_insert(token);
    }

    let mut updates = DataUpdates::new().insert(TOKEN_TO_DATA, &token_to_data)?;
    if let Some(last_parsed_block) = payload.last_parsed_block {
        updates = updates.insert(LAST_PARSED_BLOCK, &last_parsed_block)?;
    }

    Ok((data.update(updates), Event::Done))
}
