use std::sync::mpsc::{self, Receiver, Sender};

use dynamic_nft_rs::{
    replica::OrderingEngine,
    round_sequence::Block,
    rounds::RoundId,
    types::payloads::Payload,
};

/// A mock ordering engine stub which passes submitted payloads to the [Sequencer] through a channel.
#[derive(Clone)]
pub(crate) struct EngineStub {
    submissions: Sender<Vec<u8>>,
}

impl OrderingEngine for EngineStub {
    fn submit(&mut self, payload: Vec<u8>) {
        let _ = self.submissions.send(payload);
    }
}

/// Orders submitted payloads into blocks, in the order they were submitted, and keeps the log of every
/// block it finalized.
pub(crate) struct Sequencer {
    submissions: Receiver<Vec<u8>>,
    log: Vec<Block>,
}

impl Sequencer {
    /// Finalize every payload submitted since the last block into a block for `round`.
    pub(crate) fn finalize(&mut self, round: RoundId, timestamp: u64) -> Block {
        let payloads = self
            .submissions
            .try_iter()
            .map(|bytes| Payload::from_bytes(&bytes).unwrap())
            .collect();
        let block = Block {
            round,
            timestamp,
            payloads,
        };
        self.log.push(block.clone());
        block
    }

    pub(crate) fn log(&self) -> &[Block] {
        &self.log
    }
}

pub(crate) fn mock_ordering(replicas: usize) -> (Vec<EngineStub>, Sequencer) {
    let (sender, receiver) = mpsc::channel();
    let stubs = (0..replicas)
        .map(|_| EngineStub {
            submissions: sender.clone(),
        })
        .collect();

    (
        stubs,
        Sequencer {
            submissions: receiver,
            log: Vec::new(),
        },
    )
}
