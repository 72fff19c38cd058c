/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Agreement on the images that were generated and pushed to content-addressed storage.

use serde::{Deserialize, Serialize};

use crate::synchronized_data::{DataUpdates, SynchronizedData, IMAGE_CODE_TO_HASH};
use crate::types::data_types::ImageCodeToHash;

use super::{decode, Event, RoundError, RoundId};

/// Value of [`ImageGenerationPayload::status`] when every missing image was pushed.
pub const SUCCESS: &str = "success";

/// Content of an [`TransactionType::ImageGeneration`](crate::types::payloads::TransactionType::ImageGeneration)
/// payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGenerationPayload {
    pub status: String,

    /// Images generated and pushed during this period.
    #[serde(default)]
    pub new_image_code_to_hash: ImageCodeToHash,

    /// Images found already present in storage.
    #[serde(default)]
    pub images_in_ipfs: ImageCodeToHash,
}

impl ImageGenerationPayload {
    pub fn success(new_image_code_to_hash: ImageCodeToHash, images_in_ipfs: ImageCodeToHash) -> Self {
        Self {
            status: SUCCESS.to_string(),
            new_image_code_to_hash,
            images_in_ipfs,
        }
    }

    pub fn error() -> Self {
        Self {
            status: "error".to_string(),
            new_image_code_to_hash: ImageCodeToHash::new(),
            images_in_ipfs: ImageCodeToHash::new(),
        }
    }
}

pub(super) fn end_block(content: &str, data: &SynchronizedData) -> Result<(SynchronizedData, Event), RoundError> {
    let payload: ImageGenerationPayload = decode(RoundId::ImageGeneration, content)?;
    if payload.status != SUCCESS {
        return Ok((data.clone(), Event::ImageError));
    }

    let mut image_code_to_hash = data.image_code_to_hash()?;
    image_code_to_hash.extend(payload.images_in_ipfs);
    image_code_to_hash.extend(payload.new_image_code_to_hash);

    let updates = DataUpdates::new().insert(IMAGE_CODE_TO_HASH, &image_code_to_hash)?;
    Ok((data.update(updates), Event::Done))
}
