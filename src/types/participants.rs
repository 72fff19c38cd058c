/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [ParticipantSet] type and its associated methods.

use std::slice;

use thiserror::Error;

pub use ed25519_dalek::{SigningKey, VerifyingKey};

/// Identities of the agents that take part in every round.
///
/// ## Ordering of participants
///
/// `ParticipantSet` internally maintains the list of participants in ascending order of their
/// `VerifyingKey`s, so that every replica iterates through them in the same order.
///
/// ## Threshold
///
/// By default, a content value is agreed once [`quorum`](ParticipantSet::quorum) participants have
/// sent it. A deployment can override this with [`with_threshold`](ParticipantSet::with_threshold),
/// but only with a value for which two different contents can never both reach the threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantSet {
    // The verifying keys of participants are included here in ascending order.
    participants: Vec<VerifyingKey>,
    threshold: usize,
}

impl ParticipantSet {
    /// Create a participant set from `participants`, using the Byzantine quorum as its threshold.
    ///
    /// Duplicate keys are only counted once.
    pub fn new(
        participants: impl IntoIterator<Item = VerifyingKey>,
    ) -> Result<ParticipantSet, ParticipantSetError> {
        let mut sorted: Vec<VerifyingKey> = Vec::new();
        for participant in participants {
            let participant_bytes = participant.to_bytes();
            if let Err(insert_pos) =
                sorted.binary_search_by(|p| p.to_bytes().cmp(&participant_bytes))
            {
                sorted.insert(insert_pos, participant);
            }
        }

        if sorted.is_empty() {
            return Err(ParticipantSetError::Empty);
        }

        let threshold = Self::byzantine_quorum(sorted.len());
        Ok(Self {
            participants: sorted,
            threshold,
        })
    }

    /// Replace the threshold of this participant set.
    ///
    /// Fails if `threshold` is zero, larger than the number of participants, or small enough that two
    /// distinct contents could reach it at the same time (`2 * threshold <= n`).
    pub fn with_threshold(mut self, threshold: usize) -> Result<ParticipantSet, ParticipantSetError> {
        let participants = self.len();
        if threshold == 0 || threshold > participants || 2 * threshold <= participants {
            return Err(ParticipantSetError::AmbiguousThreshold {
                threshold,
                participants,
            });
        }
        self.threshold = threshold;
        Ok(self)
    }

    /// `⌊2n/3⌋ + 1`.
    pub const fn byzantine_quorum(n: usize) -> usize {
        n * 2 / 3 + 1
    }

    /// The Byzantine quorum for the size of this participant set.
    pub fn quorum(&self) -> usize {
        Self::byzantine_quorum(self.len())
    }

    /// Number of identical payloads needed for a content value to be agreed.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn contains(&self, participant: &VerifyingKey) -> bool {
        self.position(participant).is_some()
    }

    pub fn position(&self, participant: &VerifyingKey) -> Option<usize> {
        let participant_bytes = participant.to_bytes();
        self.participants
            .binary_search_by(|p| p.to_bytes().cmp(&participant_bytes))
            .ok()
    }

    /// Get an iterator through participants' verifying keys which walks through them in ascending order.
    pub fn participants(&self) -> slice::Iter<'_, VerifyingKey> {
        self.participants.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParticipantSetError {
    #[error("a participant set must contain at least one participant")]
    Empty,

    #[error("threshold {threshold} is ambiguous or unreachable for {participants} participants")]
    AmbiguousThreshold { threshold: usize, participants: usize },
}
