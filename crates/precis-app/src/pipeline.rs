// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{FormEvent, RequestPhase, SummaryForm, validate_input};
use precis_llm::{GenerateRequest, Transport, TransportError, build_request, extract_summary};
use serde_json::Value;
use tracing::{info, warn};

pub const MALFORMED_RESPONSE_MESSAGE: &str =
    "Could not read a summary from the provider response.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStart {
    /// The form is pending; send this request and hand the result to `settle`.
    Ready(GenerateRequest),
    /// Validation failed; the error is already on the form.
    Rejected,
    /// An attempt is already outstanding; nothing changed.
    InFlight,
}

impl SummaryForm {
    /// Runs one attempt end to end against `transport`.
    pub fn run_summarization<T: Transport + ?Sized>(&mut self, transport: &T) -> Vec<FormEvent> {
        let (start, mut events) = self.begin_attempt();
        if let AttemptStart::Ready(request) = start {
            let response = transport.generate(&request);
            events.extend(self.settle(response));
        }
        events
    }

    /// Clears the previous outcome, validates, and builds the request.
    pub fn begin_attempt(&mut self) -> (AttemptStart, Vec<FormEvent>) {
        if self.is_loading() {
            return (AttemptStart::InFlight, Vec::new());
        }

        self.summary = None;
        self.error = None;
        let mut events = vec![FormEvent::Cleared];

        if let Err(error) = validate_input(&self.input) {
            self.phase = RequestPhase::Settled;
            events.push(self.show_error(error.to_string()));
            return (AttemptStart::Rejected, events);
        }

        self.phase = RequestPhase::Pending;
        events.push(FormEvent::LoadingStarted);
        (AttemptStart::Ready(build_request(&self.input)), events)
    }

    /// Projects the transport outcome onto the form. Always leaves the
    /// form settled when an attempt was pending.
    pub fn settle(&mut self, response: Result<Value, TransportError>) -> Vec<FormEvent> {
        if !self.is_loading() {
            warn!(phase = ?self.phase, "dropping transport result with no pending attempt");
            return Vec::new();
        }

        let mut events = Vec::with_capacity(2);
        match response {
            Err(error) => {
                warn!(%error, "summarization request failed");
                events.push(self.show_error(format!("Error: {}", error.message())));
            }
            Ok(body) => match extract_summary(&body) {
                Ok(summary) => {
                    info!(chars = summary.chars().count(), "summary received");
                    self.summary = Some(summary.clone());
                    events.push(FormEvent::SummaryReady(summary));
                }
                Err(_) => {
                    events.push(self.show_error(MALFORMED_RESPONSE_MESSAGE.to_owned()));
                }
            },
        }

        self.phase = RequestPhase::Settled;
        events.push(FormEvent::LoadingFinished);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::{AttemptStart, MALFORMED_RESPONSE_MESSAGE};
    use crate::{EMPTY_INPUT_MESSAGE, FormCommand, FormEvent, RequestPhase, SummaryForm};
    use precis_llm::{SUMMARY_INSTRUCTION, Transport};
    use precis_testkit::{StubTransport, empty_candidates_body, success_body};
    use serde_json::json;

    fn form_with(text: &str) -> SummaryForm {
        let mut form = SummaryForm::default();
        form.apply(FormCommand::SetInput(text.to_owned()));
        form
    }

    #[test]
    fn blank_input_short_circuits_before_transport() {
        for text in ["", "   "] {
            let stub = StubTransport::new().respond_with_summary("unused");
            let mut form = form_with(text);

            let events = form.run_summarization(&stub);
            assert_eq!(
                events,
                vec![
                    FormEvent::Cleared,
                    FormEvent::ErrorShown(EMPTY_INPUT_MESSAGE.to_owned()),
                ]
            );
            assert_eq!(stub.calls(), 0);
            assert_eq!(form.error(), Some(EMPTY_INPUT_MESSAGE));
            assert_eq!(form.summary(), None);
            assert!(!form.is_loading());
        }
    }

    #[test]
    fn success_sets_summary_and_no_error() {
        let stub = StubTransport::new()
            .respond_with(json!({"candidates":[{"content":{"parts":[{"text":"X"}]}}]}));
        let mut form = form_with("A long article about foxes.");

        let events = form.run_summarization(&stub);
        assert_eq!(
            events,
            vec![
                FormEvent::Cleared,
                FormEvent::LoadingStarted,
                FormEvent::SummaryReady("X".to_owned()),
                FormEvent::LoadingFinished,
            ]
        );
        assert_eq!(form.summary(), Some("X"));
        assert_eq!(form.error(), None);
        assert_eq!(form.phase(), RequestPhase::Settled);

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        let prompt = requests[0].prompt().expect("prompt should exist");
        assert!(prompt.starts_with(SUMMARY_INSTRUCTION));
        assert!(prompt.ends_with("A long article about foxes."));
    }

    #[test]
    fn transport_error_is_prefixed() {
        let stub = StubTransport::new().fail_with("bad request");
        let mut form = form_with("text");

        form.run_summarization(&stub);
        assert_eq!(form.error(), Some("Error: bad request"));
        assert_eq!(form.summary(), None);
        assert!(!form.is_loading());
    }

    #[test]
    fn malformed_response_uses_fixed_fallback() {
        let stub = StubTransport::new().respond_with(empty_candidates_body());
        let mut form = form_with("text");

        let events = form.run_summarization(&stub);
        assert_eq!(
            events,
            vec![
                FormEvent::Cleared,
                FormEvent::LoadingStarted,
                FormEvent::ErrorShown(MALFORMED_RESPONSE_MESSAGE.to_owned()),
                FormEvent::LoadingFinished,
            ]
        );
        assert_eq!(form.error(), Some(MALFORMED_RESPONSE_MESSAGE));
        assert_eq!(form.summary(), None);
    }

    #[test]
    fn each_attempt_clears_previous_outcome() {
        let stub = StubTransport::new()
            .respond_with(success_body("first"))
            .fail_with("quota exceeded")
            .respond_with(success_body("third"));
        let mut form = form_with("text");

        form.run_summarization(&stub);
        assert_eq!(form.summary(), Some("first"));

        let events = form.run_summarization(&stub);
        assert_eq!(events.first(), Some(&FormEvent::Cleared));
        assert_eq!(form.summary(), None);
        assert_eq!(form.error(), Some("Error: quota exceeded"));

        form.run_summarization(&stub);
        assert_eq!(form.summary(), Some("third"));
        assert_eq!(form.error(), None);
    }

    #[test]
    fn stale_state_is_cleared_before_validation_rejects() {
        let stub = StubTransport::new().respond_with(success_body("kept?"));
        let mut form = form_with("text");
        form.run_summarization(&stub);
        assert_eq!(form.summary(), Some("kept?"));

        form.apply(FormCommand::ClearInput);
        form.run_summarization(&stub);
        assert_eq!(form.summary(), None);
        assert_eq!(form.error(), Some(EMPTY_INPUT_MESSAGE));
    }

    #[test]
    fn loading_is_true_only_between_start_and_finish() {
        let stub = StubTransport::new().fail_with("probe");
        let mut form = form_with("text");
        assert!(!form.is_loading());

        let (start, events) = form.begin_attempt();
        assert_eq!(events, vec![FormEvent::Cleared, FormEvent::LoadingStarted]);
        let AttemptStart::Ready(request) = start else {
            panic!("attempt should be ready, got {start:?}");
        };
        assert!(form.is_loading());

        let response = stub.generate(&request);
        assert!(form.is_loading());

        let events = form.settle(response);
        assert_eq!(
            events,
            vec![
                FormEvent::ErrorShown("Error: probe".to_owned()),
                FormEvent::LoadingFinished,
            ]
        );
        assert!(!form.is_loading());
        assert_eq!(form.phase(), RequestPhase::Settled);
    }

    #[test]
    fn begin_attempt_while_pending_is_a_no_op() {
        let mut form = form_with("text");
        let (first, _) = form.begin_attempt();
        assert!(matches!(first, AttemptStart::Ready(_)));

        form.apply(FormCommand::Insert('!'));
        let (second, events) = form.begin_attempt();
        assert_eq!(second, AttemptStart::InFlight);
        assert!(events.is_empty());
        assert!(form.is_loading());
    }

    #[test]
    fn settle_without_pending_attempt_is_ignored() {
        let mut form = form_with("text");
        let events = form.settle(Ok(success_body("orphan")));
        assert!(events.is_empty());
        assert_eq!(form.summary(), None);
        assert_eq!(form.phase(), RequestPhase::Idle);
    }
}
