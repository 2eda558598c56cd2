// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

pub const EMPTY_INPUT_MESSAGE: &str = "Please enter some text to summarize.";

/// Where the form is in its request lifecycle.
///
/// `Pending` is the only state in which a request is outstanding; a new
/// attempt cannot start while in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    Pending,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", EMPTY_INPUT_MESSAGE)]
pub struct EmptyInputError;

pub fn validate_input(input: &str) -> Result<(), EmptyInputError> {
    if input.trim().is_empty() {
        return Err(EmptyInputError);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    Insert(char),
    InsertText(String),
    Newline,
    Backspace,
    ClearInput,
    SetInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    InputChanged,
    ErrorCleared,
    Cleared,
    LoadingStarted,
    SummaryReady(String),
    ErrorShown(String),
    LoadingFinished,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryForm {
    pub(crate) input: String,
    pub(crate) summary: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) phase: RequestPhase,
}

impl SummaryForm {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == RequestPhase::Pending
    }

    /// Whether the trigger should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.is_loading() && validate_input(&self.input).is_ok()
    }

    pub fn apply(&mut self, command: FormCommand) -> Vec<FormEvent> {
        let changed = match command {
            FormCommand::Insert(ch) => {
                self.input.push(ch);
                true
            }
            FormCommand::InsertText(text) => {
                self.input.push_str(&text);
                !text.is_empty()
            }
            FormCommand::Newline => {
                self.input.push('\n');
                true
            }
            FormCommand::Backspace => self.input.pop().is_some(),
            FormCommand::ClearInput => {
                let had_input = !self.input.is_empty();
                self.input.clear();
                had_input
            }
            FormCommand::SetInput(text) => {
                let changed = self.input != text;
                self.input = text;
                changed
            }
        };

        if !changed {
            return Vec::new();
        }

        let mut events = vec![FormEvent::InputChanged];
        if self.error.take().is_some() {
            events.push(FormEvent::ErrorCleared);
        }
        events
    }

    pub(crate) fn show_error(&mut self, message: String) -> FormEvent {
        self.error = Some(message.clone());
        FormEvent::ErrorShown(message)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EMPTY_INPUT_MESSAGE, EmptyInputError, FormCommand, FormEvent, RequestPhase, SummaryForm,
        validate_input,
    };

    #[test]
    fn validate_input_rejects_blank_text() {
        assert_eq!(validate_input(""), Err(EmptyInputError));
        assert_eq!(validate_input("   "), Err(EmptyInputError));
        assert_eq!(validate_input("\n\t "), Err(EmptyInputError));
        assert_eq!(validate_input(" a "), Ok(()));
        assert_eq!(EmptyInputError.to_string(), EMPTY_INPUT_MESSAGE);
    }

    #[test]
    fn editing_builds_multi_line_input() {
        let mut form = SummaryForm::default();
        for command in [
            FormCommand::Insert('h'),
            FormCommand::Insert('i'),
            FormCommand::InsertText(String::new()),
            FormCommand::Newline,
            FormCommand::InsertText("ab".to_owned()),
            FormCommand::Backspace,
            FormCommand::Insert('x'),
            FormCommand::Backspace,
        ] {
            form.apply(command);
        }
        assert_eq!(form.input(), "hi\na");
        assert_eq!(form.phase(), RequestPhase::Idle);
    }

    #[test]
    fn no_op_edits_emit_nothing() {
        let mut form = SummaryForm::default();
        assert!(form.apply(FormCommand::Backspace).is_empty());
        assert!(form.apply(FormCommand::ClearInput).is_empty());
        assert!(form.apply(FormCommand::SetInput(String::new())).is_empty());
    }

    #[test]
    fn editing_clears_error_but_keeps_summary() {
        let mut form = SummaryForm {
            summary: Some("old summary".to_owned()),
            error: Some("Error: boom".to_owned()),
            phase: RequestPhase::Settled,
            ..SummaryForm::default()
        };

        let events = form.apply(FormCommand::Insert('a'));
        assert_eq!(events, vec![FormEvent::InputChanged, FormEvent::ErrorCleared]);
        assert_eq!(form.error(), None);
        assert_eq!(form.summary(), Some("old summary"));

        let events = form.apply(FormCommand::Insert('b'));
        assert_eq!(events, vec![FormEvent::InputChanged]);
    }

    #[test]
    fn can_submit_requires_text_and_idle_request() {
        let mut form = SummaryForm::default();
        assert!(!form.can_submit());

        form.apply(FormCommand::SetInput("  \n ".to_owned()));
        assert!(!form.can_submit());

        form.apply(FormCommand::SetInput("article".to_owned()));
        assert!(form.can_submit());

        form.phase = RequestPhase::Pending;
        assert!(!form.can_submit());
        assert!(form.is_loading());
    }
}
