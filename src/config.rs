/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of a [replica](crate::replica), as specified by the operator.
//!
//! Build a [Configuration] with the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(keypair)
//!     .participants(participant_set)
//!     .round_timeout(Duration::from_secs(30))
//!     .observation_interval(Duration::from_secs(3600))
//!     .log_events(true)
//!     .build()
//! ```

use std::time::Duration;

use ed25519_dalek::SigningKey;
use typed_builder::TypedBuilder;

use crate::app::AbciApp;
use crate::rounds::AgreementKind;
use crate::types::participants::{ParticipantSet, ParticipantSetError};

/// Stores the user-defined parameters required to run a replica.
///
/// ## Logging
///
/// If `log_events` is true, logs will be printed using the [log](https://docs.rs/log/latest/log/)
/// crate. These logs are defined in [logging](crate::logging).
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.participants(...)`
    - `.round_timeout(...)`
    - `.observation_interval(...)`

    Optional:
    - `.threshold(...)`
    - `.agreement(...)`
    - `.log_events(...)`
"
))]
pub struct Configuration {
    #[builder(setter(doc = "Set the keypair the replica signs its payloads with. Required."))]
    pub me: SigningKey,
    #[builder(setter(doc = "Set the agents that take part in every round. Required."))]
    pub participants: ParticipantSet,
    #[builder(setter(doc = "Set the maximum duration of a round before it times out. Required."))]
    pub round_timeout: Duration,
    #[builder(setter(doc = "Set the interval between two updates of the token table. Required."))]
    pub observation_interval: Duration,
    #[builder(default, setter(strip_option, doc = "Override the number of identical payloads needed for agreement. Defaults to the Byzantine quorum."))]
    pub threshold: Option<usize>,
    #[builder(default, setter(doc = "Set how rounds decide that a content value is agreed. Defaults to threshold agreement."))]
    pub agreement: AgreementKind,
    #[builder(default, setter(doc = "Enable logging? Defaults to false."))]
    pub log_events: bool,
}

impl Configuration {
    /// The participant set, with the threshold override applied.
    pub fn participant_set(&self) -> Result<ParticipantSet, ParticipantSetError> {
        match self.threshold {
            Some(threshold) => self.participants.clone().with_threshold(threshold),
            None => Ok(self.participants.clone()),
        }
    }

    /// The transition table of the dynamic NFT workflow, timed by `round_timeout`.
    pub fn abci_app(&self) -> AbciApp {
        AbciApp::dynamic_nft(self.round_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounds::Event;

    fn participants() -> ParticipantSet {
        ParticipantSet::new((1..=4u8).map(|i| SigningKey::from_bytes(&[i; 32]).verifying_key())).unwrap()
    }

    #[test]
    fn defaults_use_the_byzantine_quorum() {
        let configuration = Configuration::builder()
            .me(SigningKey::from_bytes(&[1; 32]))
            .participants(participants())
            .round_timeout(Duration::from_secs(30))
            .observation_interval(Duration::from_secs(3600))
            .build();

        assert_eq!(configuration.participant_set().unwrap().threshold(), 3);
        assert_eq!(configuration.agreement, AgreementKind::Threshold);
        assert!(!configuration.log_events);
        assert_eq!(
            configuration.abci_app().timeout(Event::RoundTimeout),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn ambiguous_threshold_override_is_rejected() {
        let configuration = Configuration::builder()
            .me(SigningKey::from_bytes(&[1; 32]))
            .participants(participants())
            .round_timeout(Duration::from_secs(30))
            .observation_interval(Duration::from_secs(3600))
            .threshold(2)
            .build();

        assert!(matches!(
            configuration.participant_set(),
            Err(ParticipantSetError::AmbiguousThreshold { .. })
        ));
    }
}
