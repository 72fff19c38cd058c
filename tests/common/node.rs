use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use dynamic_nft_rs::{
    config::Configuration,
    events::{EndRoundEvent, RejectPayloadEvent, ResetPeriodEvent},
    replica::{Replica, ReplicaSpec},
    round_sequence::{Block, Transition},
    rounds::{Event, RoundId},
    synchronized_data::SynchronizedData,
    types::participants::{ParticipantSet, SigningKey, VerifyingKey},
};
use serde::Serialize;

use super::{logging::log_with_context, ordering::EngineStub};

pub(crate) const ROUND_TIMEOUT_SECS: u64 = 30;
pub(crate) const OBSERVATION_INTERVAL_SECS: u64 = 3600;

/// Things the Nodes will have in common:
/// - Participant set.
/// - Configuration, apart from `me`.
///
/// Things that they will differ in:
/// - Engine stub.
/// - Keypair.
pub(crate) struct Node {
    verifying_key: VerifyingKey,
    replica: Replica<EngineStub>,
    transitions: Arc<Mutex<Vec<(RoundId, Event, RoundId)>>>,
    rejections: Arc<Mutex<usize>>,
}

impl Node {
    pub(crate) fn new(keypair: SigningKey, participants: ParticipantSet, engine: EngineStub) -> Node {
        let verifying_key = keypair.verifying_key();
        let configuration = Configuration::builder()
            .me(keypair)
            .participants(participants)
            .round_timeout(Duration::from_secs(ROUND_TIMEOUT_SECS))
            .observation_interval(Duration::from_secs(OBSERVATION_INTERVAL_SECS))
            .log_events(true)
            .build();

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let rejections = Arc::new(Mutex::new(0));

        let replica = ReplicaSpec::builder()
            .engine(engine)
            .configuration(configuration)
            .on_end_round(end_round_handler(verifying_key, transitions.clone()))
            .on_reset_period(reset_period_handler(verifying_key))
            .on_reject_payload(reject_payload_handler(rejections.clone()))
            .build()
            .start()
            .unwrap();

        Node {
            verifying_key,
            replica,
            transitions,
            rejections,
        }
    }

    pub(crate) fn verifying_key(&self) -> VerifyingKey {
        self.verifying_key
    }

    pub(crate) fn propose<T: Serialize + ?Sized>(&mut self, content: &T) {
        self.replica.propose(content).unwrap()
    }

    pub(crate) fn deliver(&mut self, block: Block) -> Option<Transition> {
        self.replica.deliver_block(block).unwrap()
    }

    pub(crate) fn update_time(&mut self, timestamp: u64) -> Option<Transition> {
        self.replica.update_time(timestamp).unwrap()
    }

    pub(crate) fn current_round(&self) -> RoundId {
        self.replica.current_round()
    }

    pub(crate) fn data(&self) -> &SynchronizedData {
        self.replica.data()
    }

    pub(crate) fn replica(&self) -> &Replica<EngineStub> {
        &self.replica
    }

    pub(crate) fn transitions(&self) -> Vec<(RoundId, Event, RoundId)> {
        self.transitions.lock().unwrap().clone()
    }

    pub(crate) fn rejections(&self) -> usize {
        *self.rejections.lock().unwrap()
    }
}

fn end_round_handler(
    verifying_key: VerifyingKey,
    transitions: Arc<Mutex<Vec<(RoundId, Event, RoundId)>>>,
) -> impl Fn(&EndRoundEvent) + Send + 'static {
    move |end_round_event| {
        log_with_context(
            Some(&verifying_key),
            &format!(
                "Ended round, round: {}, event: {}, next round: {}",
                end_round_event.round, end_round_event.event, end_round_event.to
            ),
        );
        transitions
            .lock()
            .unwrap()
            .push((end_round_event.round, end_round_event.event, end_round_event.to));
    }
}

fn reset_period_handler(verifying_key: VerifyingKey) -> impl Fn(&ResetPeriodEvent) + Send + 'static {
    move |reset_period_event| {
        log_with_context(
            Some(&verifying_key),
            &format!("Started period {}", reset_period_event.period),
        )
    }
}

fn reject_payload_handler(rejections: Arc<Mutex<usize>>) -> impl Fn(&RejectPayloadEvent) + Send + 'static {
    move |_| *rejections.lock().unwrap() += 1
}

/// Deliver `block` to every node, and check that they all make the same move.
pub(crate) fn deliver_to_all(nodes: &mut [Node], block: &Block) -> Option<Transition> {
    let transitions: Vec<Option<Transition>> = nodes.iter_mut().map(|node| node.deliver(block.clone())).collect();
    for transition in &transitions[1..] {
        assert_eq!(transition, &transitions[0]);
    }
    transitions.into_iter().next().flatten()
}

/// Advance the consensus time of every node to `timestamp`, and check that they all make the same move.
pub(crate) fn update_time_of_all(nodes: &mut [Node], timestamp: u64) -> Option<Transition> {
    let transitions: Vec<Option<Transition>> = nodes.iter_mut().map(|node| node.update_time(timestamp)).collect();
    for transition in &transitions[1..] {
        assert_eq!(transition, &transitions[0]);
    }
    transitions.into_iter().next().flatten()
}
