/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The driver of the workflow state machine.
//!
//! A [RoundSequence] owns the current [SynchronizedData] snapshot and the open [Round]. The ordering
//! engine drives it through two inputs:
//! 1. [`deliver_block`](RoundSequence::deliver_block): the payloads finalized in a block are added to
//!    the open round, which is then asked to [decide](Round::end_block).
//! 2. [`update_time`](RoundSequence::update_time): the consensus time advanced without a block. If the
//!    deadline of the open round has passed, [`Event::RoundTimeout`] fires.
//!
//! Both inputs are processed synchronously, one at a time, so at most one round is ever open.
//!
//! ## Periods
//!
//! When a transition leads to a final round of the [AbciApp], the period ends: the data is
//! [reset](SynchronizedData::reset_period) to the cross-period keys and the initial round is opened
//! again.
//!
//! ## Round counts
//!
//! Every transition increments the [round count](SynchronizedData::round_count), including the
//! transitions that reopen the same round after an error or a timeout. A payload proposed for an
//! earlier round count is skipped, so a vote cast in one attempt of a round never counts in the next.
//!
//! ## Determinism
//!
//! Every decision depends only on the delivered blocks, in the order they were delivered. Feeding the
//! same blocks to two sequences built from the same [AbciApp] and participants therefore produces the
//! same data, which is what makes [`replay`](RoundSequence::replay) a valid recovery path.

use std::time::SystemTime;

use crate::app::{AbciApp, AbciAppError};
use crate::event_bus::EventHandlers;
use crate::events::*;
use crate::rounds::{collectors::PayloadCollection, AgreementKind, Event, Round, RoundId};
use crate::synchronized_data::SynchronizedData;
use crate::types::{
    data_types::{PeriodCount, RoundCount},
    participants::ParticipantSet,
    payloads::Payload,
};

/// The payloads the ordering engine finalized for `round`, at consensus time `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub round: RoundId,
    /// Seconds since the Unix Epoch.
    pub timestamp: u64,
    pub payloads: Vec<Payload>,
}

/// A move of the state machine from round `from` to round `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: RoundId,
    pub event: Event,
    pub to: RoundId,
    /// Data at the end of `from`. If `to` is final, this is the last snapshot of the period that just
    /// ended.
    pub data: SynchronizedData,
}

pub struct RoundSequence {
    abci_app: AbciApp,
    participants: ParticipantSet,
    agreement: AgreementKind,
    data: SynchronizedData,
    current_round: Round,
    round_started_at: Option<u64>,
    last_timestamp: Option<u64>,
    event_handlers: EventHandlers,
}

impl RoundSequence {
    /// Open the initial round of `abci_app` with empty data.
    pub fn new(
        abci_app: AbciApp,
        participants: ParticipantSet,
        agreement: AgreementKind,
        event_handlers: EventHandlers,
    ) -> Result<RoundSequence, AbciAppError> {
        Self::with_data(abci_app, participants, agreement, SynchronizedData::new(), event_handlers)
    }

    /// Open the initial round of `abci_app`, starting from `data`.
    pub fn with_data(
        abci_app: AbciApp,
        participants: ParticipantSet,
        agreement: AgreementKind,
        data: SynchronizedData,
        event_handlers: EventHandlers,
    ) -> Result<RoundSequence, AbciAppError> {
        abci_app.validate()?;
        let initial_round = abci_app.initial_round();
        let current_round = Round::new(initial_round, participants.clone(), data.round_count(), agreement)
            .ok_or(AbciAppError::UnknownRound { round: initial_round })?;

        let round_sequence = RoundSequence {
            abci_app,
            participants,
            agreement,
            data,
            current_round,
            round_started_at: None,
            last_timestamp: None,
            event_handlers,
        };
        round_sequence.fire_start_round();
        Ok(round_sequence)
    }

    /// Re-drive `blocks` from the initial round of `abci_app`, with empty data.
    pub fn replay(
        abci_app: AbciApp,
        participants: ParticipantSet,
        agreement: AgreementKind,
        blocks: impl IntoIterator<Item = Block>,
    ) -> Result<RoundSequence, AbciAppError> {
        let mut round_sequence = Self::new(abci_app, participants, agreement, EventHandlers::new())?;
        for block in blocks {
            round_sequence.deliver_block(block)?;
        }
        Ok(round_sequence)
    }

    pub(crate) fn event_handlers(&self) -> &EventHandlers {
        &self.event_handlers
    }

    pub fn abci_app(&self) -> &AbciApp {
        &self.abci_app
    }

    pub fn participants(&self) -> &ParticipantSet {
        &self.participants
    }

    pub fn data(&self) -> &SynchronizedData {
        &self.data
    }

    pub fn period_count(&self) -> PeriodCount {
        self.data.period_count()
    }

    /// Round count of the open round. Payloads proposed for it must carry this count.
    pub fn round_count(&self) -> RoundCount {
        self.current_round.round_count()
    }

    pub fn current_round(&self) -> RoundId {
        self.current_round.id()
    }

    /// Payloads collected so far by the open round.
    pub fn collection(&self) -> &PayloadCollection {
        self.current_round.collection()
    }

    /// Latest consensus time seen, in seconds since the Unix Epoch.
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Consensus time at which the open round times out, if the round has seen a timestamp yet.
    pub fn deadline(&self) -> Option<u64> {
        let timeout = self.abci_app.timeout(Event::RoundTimeout)?;
        self.round_started_at
            .map(|started_at| started_at.saturating_add(timeout.as_secs()))
    }

    /// Add the payloads of `block` to the open round, and decide the round if possible.
    ///
    /// Invalid payloads, and every payload of a block meant for another round, are skipped. Returns the
    /// transition the block caused, if any.
    pub fn deliver_block(&mut self, block: Block) -> Result<Option<Transition>, AbciAppError> {
        self.observe_time(block.timestamp);
        let round = self.current_round.id();

        if block.round != round {
            for payload in &block.payloads {
                self.event_handlers
                    .fire_handlers(AppEvent::RejectPayload(RejectPayloadEvent {
                        timestamp: SystemTime::now(),
                        round,
                        origin: *payload.sender(),
                        reason: RejectReason::StaleRound {
                            delivered: block.round,
                        },
                    }));
            }
            return self.check_timeout();
        }

        for payload in block.payloads {
            let origin = *payload.sender();
            let content_hash = payload.content_hash();
            let event = match self.current_round.process_payload(payload) {
                Ok(()) => AppEvent::ReceivePayload(ReceivePayloadEvent {
                    timestamp: SystemTime::now(),
                    round,
                    origin,
                    content_hash,
                }),
                Err(payload_error) => AppEvent::RejectPayload(RejectPayloadEvent {
                    timestamp: SystemTime::now(),
                    round,
                    origin,
                    reason: RejectReason::Invalid(payload_error),
                }),
            };
            self.event_handlers.fire_handlers(event);
        }

        if let Some((new_data, event)) = self.current_round.end_block(&self.data)? {
            return self.transition(event, new_data).map(Some);
        }
        self.check_timeout()
    }

    /// Advance consensus time to `timestamp`, firing [`Event::RoundTimeout`] if the open round's
    /// deadline has passed.
    pub fn update_time(&mut self, timestamp: u64) -> Result<Option<Transition>, AbciAppError> {
        self.observe_time(timestamp);
        self.check_timeout()
    }

    /// Transition on `event` without changing the data.
    pub(crate) fn process_event(&mut self, event: Event) -> Result<Transition, AbciAppError> {
        let data = self.data.clone();
        self.transition(event, data)
    }

    fn observe_time(&mut self, timestamp: u64) {
        // Consensus time never goes backwards.
        let now = self.last_timestamp.map_or(timestamp, |last| last.max(timestamp));
        self.last_timestamp = Some(now);
        if self.round_started_at.is_none() {
            self.round_started_at = Some(now);
        }
    }

    fn check_timeout(&mut self) -> Result<Option<Transition>, AbciAppError> {
        match (self.deadline(), self.last_timestamp) {
            (Some(deadline), Some(now)) if now >= deadline => {
                self.event_handlers
                    .fire_handlers(AppEvent::RoundTimeout(RoundTimeoutEvent {
                        timestamp: SystemTime::now(),
                        round: self.current_round.id(),
                        deadline,
                    }));
                self.process_event(Event::RoundTimeout).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn transition(&mut self, event: Event, new_data: SynchronizedData) -> Result<Transition, AbciAppError> {
        let from = self.current_round.id();
        let to = self.abci_app.next_round(from, event)?;
        self.event_handlers.fire_handlers(AppEvent::EndRound(EndRoundEvent {
            timestamp: SystemTime::now(),
            period: self.data.period_count(),
            round: from,
            event,
            to,
        }));

        let (next_round, next_data) = if self.abci_app.is_final(to) {
            let persisted_keys = self.abci_app.cross_period_persisted_keys();
            let reset_data = new_data.reset_period(persisted_keys);
            self.event_handlers.fire_handlers(AppEvent::ResetPeriod(ResetPeriodEvent {
                timestamp: SystemTime::now(),
                period: reset_data.period_count(),
                persisted_keys: persisted_keys.to_vec(),
            }));
            (self.abci_app.initial_round(), reset_data)
        } else {
            (to, new_data.clone())
        };
        let next_data = next_data.next_round();

        self.current_round = Round::new(
            next_round,
            self.participants.clone(),
            next_data.round_count(),
            self.agreement,
        )
        .ok_or(AbciAppError::UnknownRound { round: next_round })?;
        self.data = next_data;
        self.round_started_at = self.last_timestamp;
        self.fire_start_round();

        Ok(Transition {
            from,
            event,
            to,
            data: new_data,
        })
    }

    fn fire_start_round(&self) {
        self.event_handlers
            .fire_handlers(AppEvent::StartRound(StartRoundEvent {
                timestamp: SystemTime::now(),
                period: self.data.period_count(),
                round: self.current_round.id(),
            }));
    }
}
