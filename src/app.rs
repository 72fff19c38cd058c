/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The transition table of the workflow state machine.
//!
//! An [AbciApp] is static configuration: the round every period starts in, the round that follows each
//! `(round, event)` pair, the rounds that end a period, the timeout of each timed event, and the keys
//! of [synchronized data](crate::synchronized_data) that survive the end of a period.
//!
//! ## Liveness
//!
//! [`AbciApp::new`] refuses tables in which a round could wait forever. Every non-final round must have
//! an outgoing edge for [`Event::Done`], for [`Event::NoMajority`], and for [`Event::RoundTimeout`],
//! and `RoundTimeout` must have a timeout.
//!
//! ## The dynamic NFT workflow
//!
//! [`AbciApp::dynamic_nft`] builds the table of this crate's workflow. On the happy path, a period goes
//! through:
//!
//! ```text
//! NewTokens -> LeaderboardObservation -> ImageCodeCalculation -> ImageGeneration -> DbUpdate -> FinishedDbUpdate
//! ```
//!
//! Failures in `NewTokens` retry `NewTokens`. Every other failure restarts from
//! `LeaderboardObservation` with a fresh leaderboard snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use thiserror::Error;

use crate::rounds::{Event, RoundError, RoundId};
use crate::synchronized_data::{IMAGE_CODE_TO_HASH, LAST_PARSED_BLOCK, LAST_UPDATE_TIME, TOKEN_TO_DATA};

/// Keys of synchronized data that the dynamic NFT workflow carries from one period to the next.
pub const DYNAMIC_NFT_PERSISTED_KEYS: [&str; 4] =
    [TOKEN_TO_DATA, IMAGE_CODE_TO_HASH, LAST_UPDATE_TIME, LAST_PARSED_BLOCK];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbciApp {
    initial_round: RoundId,
    transition_function: BTreeMap<(RoundId, Event), RoundId>,
    final_rounds: BTreeSet<RoundId>,
    event_to_timeout: BTreeMap<Event, Duration>,
    cross_period_persisted_keys: Vec<&'static str>,
}

impl AbciApp {
    /// Create a transition table, checking that it is well formed and live.
    pub fn new(
        initial_round: RoundId,
        transition_function: BTreeMap<(RoundId, Event), RoundId>,
        final_rounds: BTreeSet<RoundId>,
        event_to_timeout: BTreeMap<Event, Duration>,
        cross_period_persisted_keys: Vec<&'static str>,
    ) -> Result<AbciApp, AbciAppError> {
        let abci_app = AbciApp {
            initial_round,
            transition_function,
            final_rounds,
            event_to_timeout,
            cross_period_persisted_keys,
        };
        abci_app.validate()?;
        Ok(abci_app)
    }

    /// The transition table of the dynamic NFT workflow, with `round_timeout` as the timeout of
    /// [`Event::RoundTimeout`].
    pub fn dynamic_nft(round_timeout: Duration) -> AbciApp {
        use Event::*;
        use RoundId::*;

        let transition_function = BTreeMap::from([
            ((NewTokens, Done), LeaderboardObservation),
            ((NewTokens, ContractError), NewTokens),
            ((NewTokens, NoMajority), NewTokens),
            ((NewTokens, RoundTimeout), NewTokens),
            ((LeaderboardObservation, Done), ImageCodeCalculation),
            ((LeaderboardObservation, ApiError), LeaderboardObservation),
            ((LeaderboardObservation, NoMajority), LeaderboardObservation),
            ((LeaderboardObservation, RoundTimeout), LeaderboardObservation),
            ((ImageCodeCalculation, Done), ImageGeneration),
            ((ImageCodeCalculation, NoMajority), LeaderboardObservation),
            ((ImageCodeCalculation, RoundTimeout), LeaderboardObservation),
            ((ImageGeneration, Done), DbUpdate),
            ((ImageGeneration, ImageError), LeaderboardObservation),
            ((ImageGeneration, NoMajority), LeaderboardObservation),
            ((ImageGeneration, RoundTimeout), LeaderboardObservation),
            ((DbUpdate, Done), FinishedDbUpdate),
            ((DbUpdate, NoMajority), LeaderboardObservation),
            ((DbUpdate, RoundTimeout), LeaderboardObservation),
        ]);

        AbciApp {
            initial_round: NewTokens,
            transition_function,
            final_rounds: BTreeSet::from([FinishedDbUpdate]),
            event_to_timeout: BTreeMap::from([(RoundTimeout, round_timeout)]),
            cross_period_persisted_keys: DYNAMIC_NFT_PERSISTED_KEYS.to_vec(),
        }
    }

    /// Check the invariants listed in the [module documentation](self).
    pub fn validate(&self) -> Result<(), AbciAppError> {
        if self.is_final(self.initial_round) {
            return Err(AbciAppError::InitialRoundIsFinal {
                round: self.initial_round,
            });
        }
        if !self.event_to_timeout.contains_key(&Event::RoundTimeout) {
            return Err(AbciAppError::MissingTimeout {
                event: Event::RoundTimeout,
            });
        }

        for round in self.rounds() {
            if self.is_final(round) {
                if !round.is_degenerate() {
                    return Err(AbciAppError::FinalRoundNotDegenerate { round });
                }
                continue;
            }
            if round.is_degenerate() {
                return Err(AbciAppError::UnknownRound { round });
            }
            for event in [Event::Done, Event::NoMajority, Event::RoundTimeout] {
                if !self.transition_function.contains_key(&(round, event)) {
                    return Err(AbciAppError::MissingTransition { round, event });
                }
            }
        }

        Ok(())
    }

    pub fn initial_round(&self) -> RoundId {
        self.initial_round
    }

    /// The round that follows `round` when `event` happens in it.
    pub fn next_round(&self, round: RoundId, event: Event) -> Result<RoundId, AbciAppError> {
        self.transition_function
            .get(&(round, event))
            .copied()
            .ok_or(AbciAppError::MissingTransition { round, event })
    }

    pub fn is_final(&self, round: RoundId) -> bool {
        self.final_rounds.contains(&round)
    }

    pub fn timeout(&self, event: Event) -> Option<Duration> {
        self.event_to_timeout.get(&event).copied()
    }

    pub fn cross_period_persisted_keys(&self) -> &[&'static str] {
        &self.cross_period_persisted_keys
    }

    /// Every round that appears in the table, in ascending order.
    pub fn rounds(&self) -> BTreeSet<RoundId> {
        let mut rounds = BTreeSet::from([self.initial_round]);
        rounds.extend(self.final_rounds.iter().copied());
        for ((from, _), to) in &self.transition_function {
            rounds.insert(*from);
            rounds.insert(*to);
        }
        rounds
    }

    /// Every `(from, event, to)` edge of the table.
    pub fn transitions(&self) -> impl Iterator<Item = (RoundId, Event, RoundId)> + '_ {
        self.transition_function
            .iter()
            .map(|((from, event), to)| (*from, *event, *to))
    }
}

#[derive(Debug, Error)]
pub enum AbciAppError {
    #[error("round {round} has no transition for event {event}")]
    MissingTransition { round: RoundId, event: Event },

    #[error("round {round} accepts no payloads but is not final")]
    UnknownRound { round: RoundId },

    #[error("final round {round} accepts payloads")]
    FinalRoundNotDegenerate { round: RoundId },

    #[error("initial round {round} is final")]
    InitialRoundIsFinal { round: RoundId },

    #[error("event {event} has no timeout")]
    MissingTimeout { event: Event },

    #[error(transparent)]
    Round(#[from] RoundError),
}
