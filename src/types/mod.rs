/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types used across the crate: plain data types, the participant set, and payloads.

pub mod data_types;

pub mod participants;

pub mod payloads;
