/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the replica's
//! [config](crate::config::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [ReceivePayload](crate::events::ReceivePayloadEvent) is printed:
//!
//! ```text
//! ReceivePayload, 1701329264, image_code_calculation, Id5u7f6, fNGCJyk
//! ```
//!
//! In the snippet:
//! - The third value is the round the payload was collected in.
//! - The fourth value is the first seven characters of the Base64 encoding of the verifying key of the
//!   sender.
//! - The fifth value is the first seven characters of the Base64 encoding of the hash of the content.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const START_ROUND: &str = "StartRound";
pub const END_ROUND: &str = "EndRound";
pub const ROUND_TIMEOUT: &str = "RoundTimeout";
pub const RESET_PERIOD: &str = "ResetPeriod";

pub const SUBMIT_PAYLOAD: &str = "SubmitPayload";
pub const RECEIVE_PAYLOAD: &str = "ReceivePayload";
pub const REJECT_PAYLOAD: &str = "RejectPayload";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StartRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_round_event: &StartRoundEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_ROUND,
                secs_since_unix_epoch(start_round_event.timestamp),
                start_round_event.period,
                start_round_event.round
            )
        };
        Box::new(logger)
    }
}

impl Logger for EndRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |end_round_event: &EndRoundEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                END_ROUND,
                secs_since_unix_epoch(end_round_event.timestamp),
                end_round_event.period,
                end_round_event.round,
                end_round_event.event,
                end_round_event.to
            )
        };
        Box::new(logger)
    }
}

impl Logger for RoundTimeoutEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |round_timeout_event: &RoundTimeoutEvent| {
            log::warn!(
                "{}, {}, {}, {}",
                ROUND_TIMEOUT,
                secs_since_unix_epoch(round_timeout_event.timestamp),
                round_timeout_event.round,
                round_timeout_event.deadline
            )
        };
        Box::new(logger)
    }
}

impl Logger for ResetPeriodEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reset_period_event: &ResetPeriodEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RESET_PERIOD,
                secs_since_unix_epoch(reset_period_event.timestamp),
                reset_period_event.period,
                reset_period_event.persisted_keys.join(" ")
            )
        };
        Box::new(logger)
    }
}

impl Logger for SubmitPayloadEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |submit_payload_event: &SubmitPayloadEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SUBMIT_PAYLOAD,
                secs_since_unix_epoch(submit_payload_event.timestamp),
                submit_payload_event.transaction_type,
                first_seven_base64_chars(&submit_payload_event.content_hash.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePayloadEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_payload_event: &ReceivePayloadEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PAYLOAD,
                secs_since_unix_epoch(receive_payload_event.timestamp),
                receive_payload_event.round,
                first_seven_base64_chars(&receive_payload_event.origin.to_bytes()),
                first_seven_base64_chars(&receive_payload_event.content_hash.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectPayloadEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_payload_event: &RejectPayloadEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                REJECT_PAYLOAD,
                secs_since_unix_epoch(reject_payload_event.timestamp),
                reject_payload_event.round,
                first_seven_base64_chars(&reject_payload_event.origin.to_bytes()),
                reject_reason_info(&reject_payload_event.reason)
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}

fn reject_reason_info(reason: &RejectReason) -> String {
    match reason {
        RejectReason::Invalid(payload_error) => payload_error.to_string(),
        RejectReason::StaleRound { delivered } => format!("block delivered for round {}", delivered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_are_seven_characters() {
        assert_eq!(first_seven_base64_chars(&[0u8; 32]), "AAAAAAA");
        assert_eq!(first_seven_base64_chars(&[0u8; 2]), "AAA");
    }
}
