/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica of the dynamic NFT service.
//!
//! The service runs as a set of agents, each hosting one 'replica' of the workflow state machine. Each
//! replica is uniquely identified by an [Ed25519 verifying key](ed25519_dalek::VerifyingKey). Replicas do
//! not talk to each other: they submit payloads to an external [ordering engine](OrderingEngine), and
//! the engine delivers the same blocks of payloads to every replica.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [ReplicaSpec],
//! - The function to [start](ReplicaSpec::start) a [Replica] given its specification,
//! - [The type](Replica) through which the ordering engine and the behaviours interact with the state
//!   machine.
//!
//! ## Starting a replica
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .engine(engine)
//!     .configuration(configuration)
//!     .on_end_round(end_round_handler)
//!     .build()
//!     .start()?;
//! ```
//!
//! ### Required setters
//! - `.engine(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from [crate::events]:
//! - `.on_start_round(...)`
//! - `.on_end_round(...)`
//! - `.on_round_timeout(...)`
//! - `.on_reset_period(...)`
//! - `.on_submit_payload(...)`
//! - `.on_receive_payload(...)`
//! - `.on_reject_payload(...)`

use std::time::SystemTime;

use ed25519_dalek::VerifyingKey;
use serde::Serialize;
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::app::AbciAppError;
use crate::config::Configuration;
use crate::event_bus::{EventHandlers, HandlerPtr};
use crate::events::*;
use crate::metadata::{HealthReport, TokenMetadata};
use crate::round_sequence::{Block, RoundSequence, Transition};
use crate::rounds::RoundId;
use crate::synchronized_data::{DataError, SynchronizedData};
use crate::types::{
    data_types::TokenId,
    participants::ParticipantSetError,
    payloads::Payload,
};

/// The external Byzantine fault tolerant engine that orders payloads into blocks.
///
/// Implementations deliver the blocks they finalize back to every replica, in the same order, through
/// [`Replica::deliver_block`].
pub trait OrderingEngine {
    /// Hand the serialized `payload` to the engine for inclusion in a future block. Fire and forget.
    fn submit(&mut self, payload: Vec<u8>);
}

#[derive(TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.engine(...)`
    - `.configuration(...)`

    Optional:
    - `.on_start_round(...)`
    - `.on_end_round(...)`
    - `.on_round_timeout(...)`
    - `.on_reset_period(...)`
    - `.on_submit_payload(...)`
    - `.on_receive_payload(...)`
    - `.on_reject_payload(...)`
"
))]
pub struct ReplicaSpec<E: OrderingEngine> {
    // Required parameters
    #[builder(setter(doc = "Set the ordering engine payloads are submitted to. The argument must implement the [OrderingEngine] trait. Required."))]
    engine: E,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&StartRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartRoundEvent>),
    doc = "Register a handler closure to be invoked after a round is opened. Optional."))]
    on_start_round: Option<HandlerPtr<StartRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EndRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EndRoundEvent>),
    doc = "Register a handler closure to be invoked after a round is decided. Optional."))]
    on_end_round: Option<HandlerPtr<EndRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RoundTimeoutEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RoundTimeoutEvent>),
    doc = "Register a handler closure to be invoked after a round times out. Optional."))]
    on_round_timeout: Option<HandlerPtr<RoundTimeoutEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ResetPeriodEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ResetPeriodEvent>),
    doc = "Register a handler closure to be invoked after a new period starts. Optional."))]
    on_reset_period: Option<HandlerPtr<ResetPeriodEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SubmitPayloadEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SubmitPayloadEvent>),
    doc = "Register a handler closure to be invoked after the replica submits a payload. Optional."))]
    on_submit_payload: Option<HandlerPtr<SubmitPayloadEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePayloadEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePayloadEvent>),
    doc = "Register a handler closure to be invoked after a delivered payload is collected. Optional."))]
    on_receive_payload: Option<HandlerPtr<ReceivePayloadEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectPayloadEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectPayloadEvent>),
    doc = "Register a handler closure to be invoked after a delivered payload is skipped. Optional."))]
    on_reject_payload: Option<HandlerPtr<RejectPayloadEvent>>,
}

impl<E: OrderingEngine> ReplicaSpec<E> {
    /// Opens the initial round of the workflow and returns the running [Replica].
    pub fn start(self) -> Result<Replica<E>, StartReplicaError> {
        let participants = self.configuration.participant_set()?;

        let mut event_handlers = EventHandlers::new();
        if self.configuration.log_events {
            event_handlers = event_handlers.with_default_loggers();
        }
        event_handlers.start_round_handlers.extend(self.on_start_round);
        event_handlers.end_round_handlers.extend(self.on_end_round);
        event_handlers.round_timeout_handlers.extend(self.on_round_timeout);
        event_handlers.reset_period_handlers.extend(self.on_reset_period);
        event_handlers.submit_payload_handlers.extend(self.on_submit_payload);
        event_handlers.receive_payload_handlers.extend(self.on_receive_payload);
        event_handlers.reject_payload_handlers.extend(self.on_reject_payload);

        let round_sequence = RoundSequence::new(
            self.configuration.abci_app(),
            participants,
            self.configuration.agreement,
            event_handlers,
        )?;

        Ok(Replica {
            engine: self.engine,
            configuration: self.configuration,
            round_sequence,
        })
    }
}

/// A running replica of the workflow state machine.
pub struct Replica<E: OrderingEngine> {
    engine: E,
    configuration: Configuration,
    round_sequence: RoundSequence,
}

impl<E: OrderingEngine> Replica<E> {
    pub fn me(&self) -> VerifyingKey {
        self.configuration.me.verifying_key()
    }

    /// Hand `payload` to the ordering engine.
    pub fn submit(&mut self, payload: Payload) {
        let event = SubmitPayloadEvent {
            timestamp: SystemTime::now(),
            transaction_type: payload.transaction_type(),
            content_hash: payload.content_hash(),
        };
        self.engine.submit(payload.to_bytes());
        self.round_sequence.event_handlers().fire_handlers(AppEvent::SubmitPayload(event));
    }

    /// Sign `content` and submit it as this replica's payload for the current round.
    pub fn propose<T: Serialize + ?Sized>(&mut self, content: &T) -> Result<(), ProposeError> {
        let round = self.round_sequence.current_round();
        let transaction_type = round
            .transaction_type()
            .ok_or(ProposeError::DegenerateRound { round })?;
        let payload = Payload::new(
            &self.configuration.me,
            self.round_sequence.round_count(),
            transaction_type,
            content,
        )?;
        self.submit(payload);
        Ok(())
    }

    /// Feed a block finalized by the ordering engine to the state machine.
    pub fn deliver_block(&mut self, block: Block) -> Result<Option<Transition>, AbciAppError> {
        self.round_sequence.deliver_block(block)
    }

    /// Advance consensus time to `timestamp` (seconds since the Unix Epoch).
    pub fn update_time(&mut self, timestamp: u64) -> Result<Option<Transition>, AbciAppError> {
        self.round_sequence.update_time(timestamp)
    }

    pub fn current_round(&self) -> RoundId {
        self.round_sequence.current_round()
    }

    /// The latest synchronized data snapshot. Behaviours read it to decide what to propose next.
    pub fn data(&self) -> &SynchronizedData {
        self.round_sequence.data()
    }

    pub fn round_sequence(&self) -> &RoundSequence {
        &self.round_sequence
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn token_metadata(&self, token_id: TokenId) -> Result<Option<TokenMetadata>, DataError> {
        TokenMetadata::for_token(self.data(), token_id)
    }

    /// Health of the service at the latest consensus time seen.
    pub fn health(&self) -> Result<HealthReport, DataError> {
        match self.round_sequence.last_timestamp() {
            Some(now) => HealthReport::new(self.data(), now, self.configuration.observation_interval),
            None => Ok(HealthReport::default()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartReplicaError {
    #[error(transparent)]
    ParticipantSet(#[from] ParticipantSetError),

    #[error(transparent)]
    AbciApp(#[from] AbciAppError),
}

#[derive(Debug, Error)]
pub enum ProposeError {
    #[error("round {round} accepts no payloads")]
    DegenerateRound { round: RoundId },

    #[error("content could not be serialized")]
    Serialize(#[from] serde_json::Error),
}
