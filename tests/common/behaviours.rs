use dynamic_nft_rs::{
    image_code::{missing_image_codes, token_updates},
    round_sequence::Transition,
    rounds::{
        db_update::DbUpdatePayload,
        image_generation::ImageGenerationPayload,
        leaderboard_observation::api_error_sentinel,
        new_tokens::NewTokensPayload,
        RoundId,
    },
    synchronized_data::SynchronizedData,
    types::data_types::{ImageCodeToHash, Layer, LeaderboardSnapshot, TokenData, TokenTable},
};
use serde_json::Value;

use super::{
    node::{deliver_to_all, Node},
    ordering::Sequencer,
};

/// What the outside world looks like to the agents at a given moment: the tokens minted on chain, the
/// leaderboard, and the clock.
#[derive(Clone)]
pub(crate) struct World {
    pub(crate) minted: TokenTable,
    pub(crate) last_block: u64,
    /// `None` while the leaderboard API is unreachable.
    pub(crate) leaderboard: Option<LeaderboardSnapshot>,
    pub(crate) now: u64,
}

impl World {
    pub(crate) fn new(now: u64) -> World {
        World {
            minted: TokenTable::new(),
            last_block: 0,
            leaderboard: Some(LeaderboardSnapshot {
                leaderboard: Default::default(),
                layers: layers(),
            }),
            now,
        }
    }

    pub(crate) fn mint(&mut self, token_id: u64, address: &str, block: u64) {
        self.minted.insert(
            token_id,
            TokenData {
                address: address.to_string(),
                points: 0,
                image_code: None,
                image_hash: None,
            },
        );
        self.last_block = block;
    }

    pub(crate) fn set_points(&mut self, address: &str, points: i64) {
        if let Some(snapshot) = self.leaderboard.as_mut() {
            snapshot.leaderboard.insert(address.to_string(), points);
        }
    }
}

pub(crate) fn layers() -> Vec<Layer> {
    vec![
        Layer::new("classes", vec![0, 50000, 100000]),
        Layer::new("frames", vec![0, 1000, 2000]),
        Layer::new("bars", vec![0, 500, 4000]),
    ]
}

/// The content-addressed hash the image storage assigns to the image of `image_code`.
pub(crate) fn image_hash(image_code: &str) -> String {
    format!("bafybei{}", image_code)
}

/// What an honest agent proposes in `round`, given the latest agreed `data`.
pub(crate) fn honest_proposal(round: RoundId, data: &SynchronizedData, world: &World) -> Value {
    match round {
        RoundId::NewTokens => {
            serde_json::to_value(NewTokensPayload::found(world.minted.clone(), world.last_block)).unwrap()
        }

        RoundId::LeaderboardObservation => match &world.leaderboard {
            Some(snapshot) => serde_json::to_value(snapshot).unwrap(),
            None => api_error_sentinel(),
        },

        RoundId::ImageCodeCalculation => {
            let snapshot = data.most_voted_api_data().unwrap();
            let updates = token_updates(&data.token_to_data().unwrap(), &snapshot).unwrap();
            serde_json::to_value(updates).unwrap()
        }

        RoundId::ImageGeneration => {
            let updates = data.most_voted_token_updates().unwrap();
            let known = data.image_code_to_hash().unwrap();
            let new_images: ImageCodeToHash = missing_image_codes(&updates, &known)
                .into_iter()
                .map(|image_code| {
                    let hash = image_hash(&image_code);
                    (image_code, hash)
                })
                .collect();
            serde_json::to_value(ImageGenerationPayload::success(new_images, ImageCodeToHash::new())).unwrap()
        }

        RoundId::DbUpdate => serde_json::to_value(DbUpdatePayload {
            last_update_time: world.now,
        })
        .unwrap(),

        RoundId::FinishedDbUpdate => panic!("no payload is proposed in a degenerate round"),
    }
}

/// Have every node propose honestly for its open round, then finalize and deliver the block at `timestamp`.
pub(crate) fn run_honest_round(
    nodes: &mut [Node],
    sequencer: &mut Sequencer,
    world: &World,
    timestamp: u64,
) -> Option<Transition> {
    let round = nodes[0].current_round();
    for node in nodes.iter_mut() {
        let proposal = honest_proposal(round, node.data(), world);
        node.propose(&proposal);
    }
    let block = sequencer.finalize(round, timestamp);
    deliver_to_all(nodes, &block)
}
