/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [PayloadCollector] trait and its two implementations.
//!
//! A collector accumulates at most one [Payload] per participant for a single round, and decides from
//! the accumulated payloads alone whether a content value has been agreed. Since the decision only
//! depends on the payloads and the order in which the ordering engine delivered them, every replica
//! that was delivered the same payloads reaches the same [CollectionOutcome].
//!
//! A payload is only collected if it is correctly signed by its sender and was proposed for the
//! [round count](RoundCount) of the collection. Payloads proposed for an earlier attempt of the same
//! round are therefore never counted as votes in a later one.

use crate::types::{
    data_types::{CryptoHash, RoundCount},
    participants::ParticipantSet,
    payloads::{Payload, PayloadError, TransactionType},
};

/// What a collector has concluded from the payloads collected so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionOutcome<'a> {
    /// A content value has been agreed. The payload is the first collected payload with that content.
    Agreed(&'a Payload),

    /// No content value can be agreed anymore, however the outstanding participants vote.
    NoMajority,

    /// Not decided yet.
    Pending,
}

/// Accumulates the payloads of a round and decides when a content value is agreed.
pub trait PayloadCollector: Send {
    /// Add `payload` to the collection. A payload from a participant that already sent one replaces
    /// its previous payload.
    fn collect(&mut self, payload: Payload) -> Result<(), PayloadError>;

    fn outcome(&self) -> CollectionOutcome<'_>;

    fn collection(&self) -> &PayloadCollection;
}

/// Payloads received for one round, in the order they were collected.
#[derive(Clone, Debug)]
pub struct PayloadCollection {
    participants: ParticipantSet,
    round_count: RoundCount,
    transaction_type: TransactionType,
    payloads: Vec<Payload>,
}

impl PayloadCollection {
    pub fn new(participants: ParticipantSet, round_count: RoundCount, transaction_type: TransactionType) -> Self {
        Self {
            participants,
            round_count,
            transaction_type,
            payloads: Vec::new(),
        }
    }

    fn insert(&mut self, payload: Payload) -> Result<(), PayloadError> {
        if !self.participants.contains(payload.sender()) {
            return Err(PayloadError::NotAParticipant);
        }
        if !payload.is_correct() {
            return Err(PayloadError::InvalidSignature);
        }
        if payload.round_count() != self.round_count {
            return Err(PayloadError::StaleRoundCount {
                expected: self.round_count,
                actual: payload.round_count(),
            });
        }
        if payload.transaction_type() != self.transaction_type {
            return Err(PayloadError::WrongRound {
                expected: self.transaction_type,
                actual: payload.transaction_type(),
            });
        }

        // A resubmission moves the sender to the back of the collection.
        self.payloads.retain(|p| p.sender() != payload.sender());
        self.payloads.push(payload);
        Ok(())
    }

    pub fn participants(&self) -> &ParticipantSet {
        &self.participants
    }

    pub fn round_count(&self) -> RoundCount {
        self.round_count
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Number of participants that have not sent a payload yet.
    pub fn outstanding(&self) -> usize {
        self.participants.len() - self.payloads.len()
    }

    /// Group the collected payloads by content, in order of first occurrence.
    ///
    /// Each group is the first payload carrying the content, and the number of payloads carrying it.
    pub fn groups(&self) -> Vec<(&Payload, usize)> {
        let mut groups: Vec<(CryptoHash, &Payload, usize)> = Vec::new();
        for payload in &self.payloads {
            let hash = payload.content_hash();
            match groups.iter_mut().find(|(h, _, _)| *h == hash) {
                Some((_, _, count)) => *count += 1,
                None => groups.push((hash, payload, 1)),
            }
        }
        groups
            .into_iter()
            .map(|(_, payload, count)| (payload, count))
            .collect()
    }
}

/// Agrees on a content value once [`threshold`](ParticipantSet::threshold) participants have sent it.
#[derive(Clone, Debug)]
pub struct ThresholdCollector {
    collection: PayloadCollection,
}

impl ThresholdCollector {
    pub fn new(participants: ParticipantSet, round_count: RoundCount, transaction_type: TransactionType) -> Self {
        Self {
            collection: PayloadCollection::new(participants, round_count, transaction_type),
        }
    }
}

impl PayloadCollector for ThresholdCollector {
    fn collect(&mut self, payload: Payload) -> Result<(), PayloadError> {
        self.collection.insert(payload)
    }

    fn outcome(&self) -> CollectionOutcome<'_> {
        let threshold = self.collection.participants.threshold();
        let groups = self.collection.groups();

        // Groups are in order of first occurrence, so on a tie the content seen first wins.
        if let Some(payload) = groups
            .iter()
            .find(|(_, count)| *count >= threshold)
            .map(|(payload, _)| *payload)
        {
            return CollectionOutcome::Agreed(payload);
        }

        let largest = groups.iter().map(|(_, count)| *count).max().unwrap_or(0);
        if largest + self.collection.outstanding() < threshold {
            CollectionOutcome::NoMajority
        } else {
            CollectionOutcome::Pending
        }
    }

    fn collection(&self) -> &PayloadCollection {
        &self.collection
    }
}

/// Agrees on a content value only if every participant sent it.
#[derive(Clone, Debug)]
pub struct UnanimousCollector {
    collection: PayloadCollection,
}

impl UnanimousCollector {
    pub fn new(participants: ParticipantSet, round_count: RoundCount, transaction_type: TransactionType) -> Self {
        Self {
            collection: PayloadCollection::new(participants, round_count, transaction_type),
        }
    }
}

impl PayloadCollector for UnanimousCollector {
    fn collect(&mut self, payload: Payload) -> Result<(), PayloadError> {
        self.collection.insert(payload)
    }

    fn outcome(&self) -> CollectionOutcome<'_> {
        let groups = self.collection.groups();
        match groups.as_slice() {
            [(payload, count)] if *count == self.collection.participants.len() => {
                CollectionOutcome::Agreed(*payload)
            }
            [] | [_] => CollectionOutcome::Pending,
            _ => CollectionOutcome::NoMajority,
        }
    }

    fn collection(&self) -> &PayloadCollection {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use super::*;

    fn keypairs(n: u8) -> Vec<SigningKey> {
        (0..n).map(|i| SigningKey::from_bytes(&[i + 1; 32])).collect()
    }

    fn payload(sender: &SigningKey, content: &str) -> Payload {
        Payload::from_raw(sender, RoundCount::new(0), TransactionType::DbUpdate, content.to_string())
    }

    fn participant_set(keypairs: &[SigningKey]) -> ParticipantSet {
        ParticipantSet::new(keypairs.iter().map(|kp| kp.verifying_key())).unwrap()
    }

    fn threshold_collector(keypairs: &[SigningKey]) -> ThresholdCollector {
        ThresholdCollector::new(participant_set(keypairs), RoundCount::new(0), TransactionType::DbUpdate)
    }

    #[test]
    fn three_of_four_agree() {
        let keypairs = keypairs(4);
        let mut collector = threshold_collector(&keypairs);

        collector.collect(payload(&keypairs[0], "a")).unwrap();
        collector.collect(payload(&keypairs[1], "b")).unwrap();
        collector.collect(payload(&keypairs[2], "a")).unwrap();
        assert_eq!(collector.outcome(), CollectionOutcome::Pending);

        collector.collect(payload(&keypairs[3], "a")).unwrap();
        match collector.outcome() {
            CollectionOutcome::Agreed(agreed) => {
                assert_eq!(agreed.content(), "a");
                assert_eq!(agreed.sender(), &keypairs[0].verifying_key());
            }
            outcome => panic!("expected agreement, got {:?}", outcome),
        }
    }

    #[test]
    fn split_stays_open_until_unreachable() {
        let keypairs = keypairs(4);
        let mut collector = threshold_collector(&keypairs);

        collector.collect(payload(&keypairs[0], "a")).unwrap();
        collector.collect(payload(&keypairs[1], "a")).unwrap();
        collector.collect(payload(&keypairs[2], "b")).unwrap();
        // "a" can still reach 3 with the last vote.
        assert_eq!(collector.outcome(), CollectionOutcome::Pending);

        collector.collect(payload(&keypairs[3], "b")).unwrap();
        assert_eq!(collector.outcome(), CollectionOutcome::NoMajority);
    }

    #[test]
    fn only_the_latest_payload_of_a_sender_counts() {
        let keypairs = keypairs(4);
        let mut collector = threshold_collector(&keypairs);

        collector.collect(payload(&keypairs[0], "a")).unwrap();
        collector.collect(payload(&keypairs[0], "b")).unwrap();
        collector.collect(payload(&keypairs[1], "a")).unwrap();
        collector.collect(payload(&keypairs[2], "a")).unwrap();
        assert_eq!(collector.collection().len(), 3);
        assert_eq!(collector.outcome(), CollectionOutcome::Pending);

        collector.collect(payload(&keypairs[0], "a")).unwrap();
        assert!(matches!(collector.outcome(), CollectionOutcome::Agreed(p) if p.content() == "a"));
    }

    #[test]
    fn invalid_payloads_are_rejected() {
        let keypairs = keypairs(5);
        let mut collector = threshold_collector(&keypairs[..4]);

        assert!(matches!(
            collector.collect(payload(&keypairs[4], "a")),
            Err(PayloadError::NotAParticipant)
        ));
        assert!(matches!(
            collector.collect(Payload::from_raw(
                &keypairs[0],
                RoundCount::new(0),
                TransactionType::NewTokens,
                "a".into()
            )),
            Err(PayloadError::WrongRound {
                expected: TransactionType::DbUpdate,
                actual: TransactionType::NewTokens
            })
        ));
        assert!(matches!(
            collector.collect(Payload::from_raw(
                &keypairs[0],
                RoundCount::new(1),
                TransactionType::DbUpdate,
                "a".into()
            )),
            Err(PayloadError::StaleRoundCount { .. })
        ));
        assert!(collector.collection().is_empty());
    }

    #[test]
    fn forged_payloads_cannot_replace_honest_votes() {
        let keypairs = keypairs(4);
        let mut collector = threshold_collector(&keypairs);
        collector.collect(payload(&keypairs[0], "success")).unwrap();
        collector.collect(payload(&keypairs[1], "success")).unwrap();

        // The last participant signs its own payload, then rewrites the sender to each honest key.
        let own = payload(&keypairs[3], "error");
        collector.collect(own.clone()).unwrap();
        for victim in &keypairs[..2] {
            let mut bytes = own.to_bytes();
            bytes[..32].copy_from_slice(&victim.verifying_key().to_bytes());
            let forged = Payload::from_bytes(&bytes).unwrap();
            assert_eq!(forged.sender(), &victim.verifying_key());
            assert!(matches!(collector.collect(forged), Err(PayloadError::InvalidSignature)));
        }

        collector.collect(payload(&keypairs[2], "success")).unwrap();
        assert!(matches!(collector.outcome(), CollectionOutcome::Agreed(p) if p.content() == "success"));
    }

    #[test]
    fn unanimity_requires_everyone() {
        let keypairs = keypairs(3);
        let participants = participant_set(&keypairs);

        let round_count = RoundCount::new(0);
        let mut agreeing = UnanimousCollector::new(participants.clone(), round_count, TransactionType::DbUpdate);
        agreeing.collect(payload(&keypairs[0], "a")).unwrap();
        agreeing.collect(payload(&keypairs[1], "a")).unwrap();
        assert_eq!(agreeing.outcome(), CollectionOutcome::Pending);
        agreeing.collect(payload(&keypairs[2], "a")).unwrap();
        assert!(matches!(agreeing.outcome(), CollectionOutcome::Agreed(_)));

        let mut diverging = UnanimousCollector::new(participants, round_count, TransactionType::DbUpdate);
        diverging.collect(payload(&keypairs[0], "a")).unwrap();
        diverging.collect(payload(&keypairs[1], "b")).unwrap();
        assert_eq!(diverging.outcome(), CollectionOutcome::NoMajority);
    }
}
