/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The states of the workflow state machine, and the events that move it between them.
//!
//! A [Round] is created each time the state machine enters a state. It collects the payloads the
//! ordering engine delivers for it through a [PayloadCollector], and once the collector reports an
//! outcome, [`end_block`](Round::end_block) turns the agreed content into the next
//! [SynchronizedData] snapshot plus the [Event] to transition on.
//!
//! The business rule of each round lives in its own submodule:
//! 1. [new_tokens]: merges newly minted tokens into the token table.
//! 2. [leaderboard_observation]: stores the agreed leaderboard snapshot.
//! 3. [image_code_calculation]: stores the agreed per-token updates.
//! 4. [image_generation]: merges the hashes of newly pushed images into the redirect table.
//! 5. [db_update]: applies the pending updates to the token table.
//!
//! The last state, [`RoundId::FinishedDbUpdate`], is degenerate: it accepts no payloads and reaching
//! it ends the period.

use std::fmt::{self, Display, Formatter};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::synchronized_data::{DataError, SynchronizedData};
use crate::types::{
    data_types::{RoundCount, TokenId},
    participants::ParticipantSet,
    payloads::{Payload, PayloadError, TransactionType},
};

use self::collectors::{
    CollectionOutcome, PayloadCollection, PayloadCollector, ThresholdCollector, UnanimousCollector,
};

pub mod collectors;

pub mod db_update;

pub mod image_code_calculation;

pub mod image_generation;

pub mod leaderboard_observation;

pub mod new_tokens;

/// Identifies a state of the workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoundId {
    NewTokens,
    LeaderboardObservation,
    ImageCodeCalculation,
    ImageGeneration,
    DbUpdate,
    FinishedDbUpdate,
}

impl RoundId {
    pub const ALL: [RoundId; 6] = [
        RoundId::NewTokens,
        RoundId::LeaderboardObservation,
        RoundId::ImageCodeCalculation,
        RoundId::ImageGeneration,
        RoundId::DbUpdate,
        RoundId::FinishedDbUpdate,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            RoundId::NewTokens => "new_tokens",
            RoundId::LeaderboardObservation => "leaderboard_observation",
            RoundId::ImageCodeCalculation => "image_code_calculation",
            RoundId::ImageGeneration => "image_generation",
            RoundId::DbUpdate => "db_update",
            RoundId::FinishedDbUpdate => "finished_db_update",
        }
    }

    /// The type of payload this round accepts, or `None` if the round is degenerate.
    pub const fn transaction_type(&self) -> Option<TransactionType> {
        match self {
            RoundId::NewTokens => Some(TransactionType::NewTokens),
            RoundId::LeaderboardObservation => Some(TransactionType::LeaderboardObservation),
            RoundId::ImageCodeCalculation => Some(TransactionType::ImageCodeCalculation),
            RoundId::ImageGeneration => Some(TransactionType::ImageGeneration),
            RoundId::DbUpdate => Some(TransactionType::DbUpdate),
            RoundId::FinishedDbUpdate => None,
        }
    }

    pub const fn is_degenerate(&self) -> bool {
        self.transaction_type().is_none()
    }

    fn end_block_rule(&self) -> Option<EndBlockRule> {
        let rule: EndBlockRule = match self {
            RoundId::NewTokens => new_tokens::end_block,
            RoundId::LeaderboardObservation => leaderboard_observation::end_block,
            RoundId::ImageCodeCalculation => image_code_calculation::end_block,
            RoundId::ImageGeneration => image_generation::end_block,
            RoundId::DbUpdate => db_update::end_block,
            RoundId::FinishedDbUpdate => return None,
        };
        Some(rule)
    }
}

impl Display for RoundId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events that trigger transitions between rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    Done,
    NoMajority,
    RoundTimeout,
    ContractError,
    ApiError,
    ImageError,
}

impl Event {
    pub const fn name(&self) -> &'static str {
        match self {
            Event::Done => "done",
            Event::NoMajority => "no_majority",
            Event::RoundTimeout => "round_timeout",
            Event::ContractError => "contract_error",
            Event::ApiError => "api_error",
            Event::ImageError => "image_error",
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a round decides that a content value has been agreed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgreementKind {
    /// Agreed once [`threshold`](ParticipantSet::threshold) participants sent the same content.
    #[default]
    Threshold,

    /// Agreed once every participant sent the same content.
    Unanimous,
}

/// Business rule of a round: given the agreed content and the data at the start of the round, compute
/// the data at the end of the round and the event to transition on.
pub type EndBlockRule = fn(&str, &SynchronizedData) -> Result<(SynchronizedData, Event), RoundError>;

/// One state of the workflow, open for payloads.
pub struct Round {
    id: RoundId,
    collector: Box<dyn PayloadCollector>,
    end_block_rule: EndBlockRule,
}

impl Round {
    /// Open round `id` for `participants`, as the round numbered `round_count`. Returns `None` if `id`
    /// is degenerate.
    pub fn new(
        id: RoundId,
        participants: ParticipantSet,
        round_count: RoundCount,
        agreement: AgreementKind,
    ) -> Option<Round> {
        let transaction_type = id.transaction_type()?;
        let end_block_rule = id.end_block_rule()?;
        let collector: Box<dyn PayloadCollector> = match agreement {
            AgreementKind::Threshold => {
                Box::new(ThresholdCollector::new(participants, round_count, transaction_type))
            }
            AgreementKind::Unanimous => {
                Box::new(UnanimousCollector::new(participants, round_count, transaction_type))
            }
        };

        Some(Round {
            id,
            collector,
            end_block_rule,
        })
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn round_count(&self) -> RoundCount {
        self.collector.collection().round_count()
    }

    pub fn collection(&self) -> &PayloadCollection {
        self.collector.collection()
    }

    /// Add `payload` to this round's collection.
    pub fn process_payload(&mut self, payload: Payload) -> Result<(), PayloadError> {
        self.collector.collect(payload)
    }

    /// Decide this round, if its collection allows it.
    ///
    /// Returns:
    /// - `Some((new_data, event))` computed by the round's business rule if a content value was agreed,
    /// - `Some((data, Event::NoMajority))` if no content value can be agreed anymore, and
    /// - `None` if the round must stay open.
    ///
    /// This is a pure function of the collection and `data`, and never modifies `data`.
    pub fn end_block(&self, data: &SynchronizedData) -> Result<Option<(SynchronizedData, Event)>, RoundError> {
        match self.collector.outcome() {
            CollectionOutcome::Agreed(payload) => {
                (self.end_block_rule)(payload.content(), data).map(Some)
            }
            CollectionOutcome::NoMajority => Ok(Some((data.clone(), Event::NoMajority))),
            CollectionOutcome::Pending => Ok(None),
        }
    }
}

/// Decode the agreed `content` of `round`.
pub(crate) fn decode<T: DeserializeOwned>(round: RoundId, content: &str) -> Result<T, RoundError> {
    serde_json::from_str(content).map_err(|source| RoundError::MalformedContent { round, source })
}

/// Errors in the data an agreed payload is applied to. These never occur in a correctly wired
/// deployment.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("agreed content of round {round} is malformed")]
    MalformedContent {
        round: RoundId,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("token {token} is not in the token table")]
    UnknownToken { token: TokenId },

    #[error("no image hash is known for image code `{image_code}`")]
    ImageHashNotFound { image_code: String },
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn degenerate_rounds_cannot_be_opened() {
        let participants = participant_set(&keypairs(4));
        let round_count = RoundCount::new(0);
        assert!(
            Round::new(RoundId::FinishedDbUpdate, participants.clone(), round_count, AgreementKind::Threshold)
                .is_none()
        );
        assert!(Round::new(RoundId::DbUpdate, participants, round_count, AgreementKind::Unanimous).is_some());
        assert!(RoundId::FinishedDbUpdate.is_degenerate());
    }

    #[test]
    fn pending_round_does_not_decide() {
        let keypairs = keypairs(4);
        let mut round = Round::new(
            RoundId::DbUpdate,
            participant_set(&keypairs),
            RoundCount::new(3),
            AgreementKind::Threshold,
        )
        .unwrap();
        assert_eq!(round.round_count(), RoundCount::new(3));
        let payload = Payload::from_raw(&keypairs[0], RoundCount::new(3), TransactionType::DbUpdate, "{}".into());
        round.process_payload(payload).unwrap();
        assert!(round.end_block(&SynchronizedData::new()).unwrap().is_none());
    }

    #[test]
    fn no_majority_leaves_data_unchanged() {
        let keypairs = keypairs(4);
        let mut round = Round::new(
            RoundId::DbUpdate,
            participant_set(&keypairs),
            RoundCount::new(0),
            AgreementKind::Threshold,
        )
        .unwrap();
        for (i, keypair) in keypairs.iter().enumerate() {
            let content = format!("{{\"last_update_time\":{}}}", i % 2);
            let payload = Payload::from_raw(keypair, RoundCount::new(0), TransactionType::DbUpdate, content);
            round.process_payload(payload).unwrap();
        }

        let data = SynchronizedData::new();
        let (new_data, event) = round.end_block(&data).unwrap().unwrap();
        assert_eq!(event, Event::NoMajority);
        assert_eq!(new_data, data);
    }

    #[test]
    fn malformed_agreed_content_is_an_error() {
        let round = agreed_round(RoundId::LeaderboardObservation, "not json");
        assert!(matches!(
            round.end_block(&SynchronizedData::new()),
            Err(RoundError::MalformedContent {
                round: RoundId::LeaderboardObservation,
                ..
            })
        ));
    }
}
