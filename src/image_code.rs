/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deterministic mapping from a token's points to the image code that selects its visual layers.
//!
//! ## Algorithm
//!
//! An image is a stack of [layers](Layer). Every layer has a ladder of point thresholds, one per
//! variant of the layer. Layers are processed in order, starting with all of the token's points:
//! 1. The selected variant is the one with the highest threshold not exceeding the remaining points.
//! 2. That threshold is subtracted from the remaining points, which carry over to the next layer.
//! 3. The index of the variant is written as two decimal digits.
//!
//! The code is the concatenation of every layer's two digits, so its length is always twice the
//! number of layers. With thresholds `[0, 1000, 2000, 3000]`, 999 points select `"00"`, 1000 points
//! select `"01"`, and 10000 points select `"03"` with 7000 points carried over.
//!
//! ## Validation
//!
//! Threshold ladders are configuration. [`image_code`] checks every ladder before processing the first
//! layer, so a broken configuration is reported the same way regardless of the points involved.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::types::data_types::{
    ImageCodeToHash, Layer, LeaderboardSnapshot, Points, TokenTable, TokenUpdate, TokenUpdates,
};

/// Number of digits each layer contributes to an image code.
pub const DIGITS_PER_LAYER: usize = 2;

/// Largest number of variants a layer can have and still fit in [`DIGITS_PER_LAYER`] digits.
pub const MAX_VARIANTS_PER_LAYER: usize = 100;

/// Check that every layer has a non-empty, strictly increasing ladder of at most
/// [`MAX_VARIANTS_PER_LAYER`] thresholds.
pub fn validate_layers(layers: &[Layer]) -> Result<(), ImageCodeError> {
    for layer in layers {
        if layer.thresholds.is_empty() {
            return Err(ImageCodeError::EmptyThresholds {
                layer: layer.name.clone(),
            });
        }
        if layer.thresholds.len() > MAX_VARIANTS_PER_LAYER {
            return Err(ImageCodeError::TooManyThresholds {
                layer: layer.name.clone(),
                count: layer.thresholds.len(),
            });
        }
        if layer.thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ImageCodeError::NonIncreasingThresholds {
                layer: layer.name.clone(),
            });
        }
    }
    Ok(())
}

/// Compute the image code of a token with `points`.
pub fn image_code(points: Points, layers: &[Layer]) -> Result<String, ImageCodeError> {
    if points < 0 {
        return Err(ImageCodeError::NegativePoints { points });
    }
    validate_layers(layers)?;

    let mut remaining = points as u64;
    let mut code = String::with_capacity(layers.len() * DIGITS_PER_LAYER);
    for layer in layers {
        let selected = layer
            .thresholds
            .iter()
            .take_while(|threshold| **threshold <= remaining)
            .count();
        if selected == 0 {
            return Err(ImageCodeError::PointsBelowFloor {
                layer: layer.name.clone(),
                points: remaining,
                floor: layer.thresholds[0],
            });
        }
        let index = selected - 1;
        remaining -= layer.thresholds[index];
        code.push_str(&format!("{:02}", index));
    }

    Ok(code)
}

/// An image code whose width has been checked against a number of layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageCode {
    code: String,
    layer_indices: Vec<usize>,
}

impl ImageCode {
    /// Decode `code`, rejecting it if it is not exactly [`DIGITS_PER_LAYER`] decimal digits per layer.
    pub fn parse(code: &str, layer_count: usize) -> Result<ImageCode, ImageCodeError> {
        let expected = layer_count * DIGITS_PER_LAYER;
        if code.len() != expected {
            return Err(ImageCodeError::InvalidCodeLength {
                expected,
                actual: code.len(),
            });
        }
        if !code.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ImageCodeError::InvalidCodeDigits {
                code: code.to_string(),
            });
        }

        let layer_indices = code
            .as_bytes()
            .chunks(DIGITS_PER_LAYER)
            .map(|digits| {
                digits
                    .iter()
                    .fold(0usize, |index, digit| index * 10 + (digit - b'0') as usize)
            })
            .collect();

        Ok(ImageCode {
            code: code.to_string(),
            layer_indices,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// The selected variant of each layer, in layer order.
    pub fn layer_indices(&self) -> &[usize] {
        &self.layer_indices
    }
}

/// Decode `code` into the variant to draw for each of `layers`, in drawing order.
///
/// This is what an image renderer needs to composite the image for `code`.
pub fn render_plan<'a>(code: &str, layers: &'a [Layer]) -> Result<Vec<(&'a str, usize)>, ImageCodeError> {
    let image_code = ImageCode::parse(code, layers.len())?;
    layers
        .iter()
        .zip(image_code.layer_indices())
        .map(|(layer, index)| {
            if *index < layer.thresholds.len() {
                Ok((layer.name.as_str(), *index))
            } else {
                Err(ImageCodeError::VariantOutOfRange {
                    layer: layer.name.clone(),
                    index: *index,
                })
            }
        })
        .collect()
}

/// Compute the updates to propose for the token table, given an agreed leaderboard snapshot.
///
/// A token whose minter does not appear in the leaderboard has 0 points. Only tokens whose points or
/// image code change are included.
pub fn token_updates(
    token_to_data: &TokenTable,
    snapshot: &LeaderboardSnapshot,
) -> Result<TokenUpdates, ImageCodeError> {
    validate_layers(&snapshot.layers)?;

    let mut updates = TokenUpdates::new();
    for (token_id, token) in token_to_data {
        let points = snapshot
            .leaderboard
            .get(&token.address)
            .copied()
            .unwrap_or(0);
        let code = image_code(points, &snapshot.layers)?;

        if token.points != points || token.image_code.as_deref() != Some(code.as_str()) {
            updates.insert(
                *token_id,
                TokenUpdate {
                    points,
                    image_code: code,
                    image_hash: None,
                },
            );
        }
    }

    Ok(updates)
}

/// Image codes in `updates` that have no image in `image_code_to_hash` yet, i.e., the images that
/// must be generated and pushed this period.
pub fn missing_image_codes(updates: &TokenUpdates, image_code_to_hash: &ImageCodeToHash) -> BTreeSet<String> {
    updates
        .values()
        .map(|update| &update.image_code)
        .filter(|code| !image_code_to_hash.contains_key(*code))
        .cloned()
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageCodeError {
    #[error("points must not be negative, got {points}")]
    NegativePoints { points: Points },

    #[error("layer `{layer}` has no thresholds")]
    EmptyThresholds { layer: String },

    #[error("thresholds of layer `{layer}` are not strictly increasing")]
    NonIncreasingThresholds { layer: String },

    #[error("layer `{layer}` has {count} thresholds, more than two digits can encode")]
    TooManyThresholds { layer: String, count: usize },

    #[error("{points} points are below the first threshold ({floor}) of layer `{layer}`")]
    PointsBelowFloor { layer: String, points: u64, floor: u64 },

    #[error("image code must be {expected} characters long, got {actual}")]
    InvalidCodeLength { expected: usize, actual: usize },

    #[error("image code `{code}` contains non-digit characters")]
    InvalidCodeDigits { code: String },

    #[error("layer `{layer}` has no variant {index}")]
    VariantOutOfRange { layer: String, index: usize },
}
