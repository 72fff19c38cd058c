/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Registry of the handlers that are called when an [event](crate::events) is emitted.
//!
//! Handlers are called synchronously, on the thread that drives the round sequence, right after the
//! state change the event describes.

use crate::events::*;
use crate::logging::Logger;

pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

#[derive(Default)]
pub struct EventHandlers {
    pub(crate) start_round_handlers: Vec<HandlerPtr<StartRoundEvent>>,
    pub(crate) end_round_handlers: Vec<HandlerPtr<EndRoundEvent>>,
    pub(crate) round_timeout_handlers: Vec<HandlerPtr<RoundTimeoutEvent>>,
    pub(crate) reset_period_handlers: Vec<HandlerPtr<ResetPeriodEvent>>,
    pub(crate) submit_payload_handlers: Vec<HandlerPtr<SubmitPayloadEvent>>,
    pub(crate) receive_payload_handlers: Vec<HandlerPtr<ReceivePayloadEvent>>,
    pub(crate) reject_payload_handlers: Vec<HandlerPtr<RejectPayloadEvent>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the default logger of every event type, in front of the handlers already registered.
    pub fn with_default_loggers(mut self) -> Self {
        self.start_round_handlers.insert(0, StartRoundEvent::get_logger());
        self.end_round_handlers.insert(0, EndRoundEvent::get_logger());
        self.round_timeout_handlers.insert(0, RoundTimeoutEvent::get_logger());
        self.reset_period_handlers.insert(0, ResetPeriodEvent::get_logger());
        self.submit_payload_handlers.insert(0, SubmitPayloadEvent::get_logger());
        self.receive_payload_handlers.insert(0, ReceivePayloadEvent::get_logger());
        self.reject_payload_handlers.insert(0, RejectPayloadEvent::get_logger());
        self
    }

    pub fn on_start_round(mut self, handler: impl Fn(&StartRoundEvent) + Send + 'static) -> Self {
        self.start_round_handlers.push(Box::new(handler));
        self
    }

    pub fn on_end_round(mut self, handler: impl Fn(&EndRoundEvent) + Send + 'static) -> Self {
        self.end_round_handlers.push(Box::new(handler));
        self
    }

    pub fn on_round_timeout(mut self, handler: impl Fn(&RoundTimeoutEvent) + Send + 'static) -> Self {
        self.round_timeout_handlers.push(Box::new(handler));
        self
    }

    pub fn on_reset_period(mut self, handler: impl Fn(&ResetPeriodEvent) + Send + 'static) -> Self {
        self.reset_period_handlers.push(Box::new(handler));
        self
    }

    pub fn on_submit_payload(mut self, handler: impl Fn(&SubmitPayloadEvent) + Send + 'static) -> Self {
        self.submit_payload_handlers.push(Box::new(handler));
        self
    }

    pub fn on_receive_payload(mut self, handler: impl Fn(&ReceivePayloadEvent) + Send + 'static) -> Self {
        self.receive_payload_handlers.push(Box::new(handler));
        self
    }

    pub fn on_reject_payload(mut self, handler: impl Fn(&RejectPayloadEvent) + Send + 'static) -> Self {
        self.reject_payload_handlers.push(Box::new(handler));
        self
    }

    pub fn fire_handlers(&self, event: AppEvent) {
        match event {
            AppEvent::StartRound(start_round_event) =>
                self.start_round_handlers.iter().for_each(|handler| handler(&start_round_event)),

            AppEvent::EndRound(end_round_event) =>
                self.end_round_handlers.iter().for_each(|handler| handler(&end_round_event)),

            AppEvent::RoundTimeout(round_timeout_event) =>
                self.round_timeout_handlers.iter().for_each(|handler| handler(&round_timeout_event)),

            AppEvent::ResetPeriod(reset_period_event) =>
                self.reset_period_handlers.iter().for_each(|handler| handler(&reset_period_event)),

            AppEvent::SubmitPayload(submit_payload_event) =>
                self.submit_payload_handlers.iter().for_each(|handler| handler(&submit_payload_event)),

            AppEvent::ReceivePayload(receive_payload_event) =>
                self.receive_payload_handlers.iter().for_each(|handler| handler(&receive_payload_event)),

            AppEvent::RejectPayload(reject_payload_event) =>
                self.reject_payload_handlers.iter().for_each(|handler| handler(&reject_payload_event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::SystemTime;

    use super::*;
    use crate::rounds::RoundId;
    use crate::types::data_types::PeriodCount;

    #[test]
    fn handlers_fire_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (seen.clone(), seen.clone());
        let handlers = EventHandlers::new()
            .on_start_round(move |event| first.lock().unwrap().push(("first", event.round)))
            .on_start_round(move |event| second.lock().unwrap().push(("second", event.round)));

        handlers.fire_handlers(AppEvent::StartRound(StartRoundEvent {
            timestamp: SystemTime::now(),
            period: PeriodCount::new(0),
            round: RoundId::DbUpdate,
        }));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", RoundId::DbUpdate), ("second", RoundId::DbUpdate)]
        );
    }
}
