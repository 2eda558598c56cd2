// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use precis_app::{FormCommand, SummaryForm};
use precis_llm::{Client, GenerateRequest, Transport, TransportError};
use precis_tui::{AppRuntime, InternalEvent};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, error};

pub struct ClientRuntime {
    client: Client,
}

impl ClientRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for ClientRuntime {
    fn provider_label(&self) -> String {
        format!("{} @ {}", self.client.model(), self.client.origin())
    }

    fn generate(&mut self, request: &GenerateRequest) -> Result<Value, TransportError> {
        self.client.generate(request)
    }

    fn spawn_generate(
        &mut self,
        request_id: u64,
        request: GenerateRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("precis-generate".to_owned())
            .spawn(move || {
                debug!(request_id, "summary worker started");
                let response = panic::catch_unwind(AssertUnwindSafe(|| client.generate(&request)))
                    .unwrap_or_else(|_| {
                        error!(request_id, "summary worker panicked");
                        Err(TransportError::new("summary worker crashed"))
                    });
                let _ = tx.send(InternalEvent::Settled {
                    request_id,
                    response,
                });
            })
            .context("spawn summary worker")?;
        Ok(())
    }
}

/// Summarizes `text` once, outside the terminal UI.
pub fn summarize_text<T: Transport + ?Sized>(transport: &T, text: &str) -> Result<String> {
    let mut form = SummaryForm::default();
    form.apply(FormCommand::SetInput(text.to_owned()));
    form.run_summarization(transport);

    if let Some(message) = form.error() {
        bail!("{message}");
    }
    match form.summary() {
        Some(summary) => Ok(summary.to_owned()),
        None => bail!("summarization finished without a result"),
    }
}
