/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The replicated workflow state machine of a dynamic NFT service. It offers:
//! 1. A round-based state machine ([app], [rounds], [round_sequence]) that turns the independently
//!    computed proposals of every agent into one agreed value per round, on top of an external Byzantine
//!    fault tolerant [ordering engine](replica::OrderingEngine),
//! 2. A versioned, append-only [key-value store](synchronized_data) shared by the rounds of a period,
//! 3. The deterministic [image code engine](image_code) that maps a token's points to the layers of
//!    its image,
//! 4. Read-only [metadata and health views](metadata) of the agreed data.
//!
//! Every replica that is delivered the same blocks computes the same data.

pub mod app;

pub mod config;

pub mod event_bus;

pub mod events;

pub mod image_code;

pub mod logging;

pub mod metadata;

pub mod replica;

pub mod round_sequence;

pub mod rounds;

pub mod synchronized_data;

pub mod types;
