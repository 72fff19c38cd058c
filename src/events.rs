/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events a [round sequence](crate::round_sequence::RoundSequence) emits, for event
//! handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are observations
//! only: handlers registered for them cannot influence the state machine.

use std::time::SystemTime;

use ed25519_dalek::VerifyingKey;

use crate::rounds::{Event, RoundId};
use crate::types::{
    data_types::{CryptoHash, PeriodCount},
    payloads::{PayloadError, TransactionType},
};

pub enum AppEvent {
    // Events that change the current round or period.
    StartRound(StartRoundEvent),
    EndRound(EndRoundEvent),
    RoundTimeout(RoundTimeoutEvent),
    ResetPeriod(ResetPeriodEvent),
    // Events that involve payloads.
    SubmitPayload(SubmitPayloadEvent),
    ReceivePayload(ReceivePayloadEvent),
    RejectPayload(RejectPayloadEvent),
}

/// A round was opened.
pub struct StartRoundEvent {
    pub timestamp: SystemTime,
    pub period: PeriodCount,
    pub round: RoundId,
}

/// A round was decided, and the state machine moved on to `to`.
pub struct EndRoundEvent {
    pub timestamp: SystemTime,
    pub period: PeriodCount,
    pub round: RoundId,
    pub event: Event,
    pub to: RoundId,
}

/// A round was abandoned because its deadline passed.
pub struct RoundTimeoutEvent {
    pub timestamp: SystemTime,
    pub round: RoundId,
    /// Seconds since the Unix Epoch, according to the ordering engine.
    pub deadline: u64,
}

/// A final round was reached. `period` is the period that just started.
pub struct ResetPeriodEvent {
    pub timestamp: SystemTime,
    pub period: PeriodCount,
    pub persisted_keys: Vec<&'static str>,
}

/// A payload was handed to the ordering engine.
pub struct SubmitPayloadEvent {
    pub timestamp: SystemTime,
    pub transaction_type: TransactionType,
    pub content_hash: CryptoHash,
}

/// A delivered payload was added to the collection of the current round.
pub struct ReceivePayloadEvent {
    pub timestamp: SystemTime,
    pub round: RoundId,
    pub origin: VerifyingKey,
    pub content_hash: CryptoHash,
}

/// A delivered payload was skipped.
pub struct RejectPayloadEvent {
    pub timestamp: SystemTime,
    pub round: RoundId,
    pub origin: VerifyingKey,
    pub reason: RejectReason,
}

pub enum RejectReason {
    /// The current round does not accept the payload.
    Invalid(PayloadError),

    /// The payload was delivered in a block meant for another round.
    StaleRound { delivered: RoundId },
}
