// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use precis_llm::{GenerateRequest, Transport, TransportError};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::io::Read;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

pub fn success_body(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": text }],
            },
            "finishReason": "STOP",
        }],
    })
}

pub fn error_body(message: &str) -> Value {
    json!({ "error": { "code": 400, "message": message, "status": "INVALID_ARGUMENT" } })
}

pub fn empty_candidates_body() -> Value {
    json!({ "candidates": [] })
}

/// A [`Transport`] that replays scripted outcomes in order and records every
/// request it was handed.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(self, body: Value) -> Self {
        self.push(Ok(body));
        self
    }

    pub fn respond_with_summary(self, text: &str) -> Self {
        self.respond_with(success_body(text))
    }

    pub fn fail_with(self, message: &str) -> Self {
        self.push(Err(TransportError::new(message)));
        self
    }

    pub fn push(&self, reply: Result<Value, TransportError>) {
        lock(&self.replies).push_back(reply);
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        lock(&self.requests).clone()
    }
}

impl Transport for StubTransport {
    fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError> {
        lock(&self.requests).push(request.clone());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("stub transport has no scripted reply")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
}

impl MockReply {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).context("decode recorded request body")
    }
}

/// An HTTP server speaking the provider wire format, answering one request
/// per scripted reply and then shutting down.
pub struct MockProvider {
    base_url: String,
    handle: JoinHandle<Result<Vec<RecordedRequest>>>,
}

impl MockProvider {
    pub fn start(replies: Vec<MockReply>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock provider: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());

        let handle = thread::spawn(move || -> Result<Vec<RecordedRequest>> {
            let mut recorded = Vec::with_capacity(replies.len());
            for reply in replies {
                let mut request = server.recv().context("receive mock provider request")?;
                let content_type = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Content-Type"))
                    .map(|header| header.value.as_str().to_owned());
                let mut body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut body)
                    .context("read mock provider request body")?;
                recorded.push(RecordedRequest {
                    method: request.method().as_str().to_owned(),
                    url: request.url().to_owned(),
                    content_type,
                    body,
                });

                let header = Header::from_bytes("Content-Type", "application/json")
                    .map_err(|()| anyhow!("build content type header"))?;
                let response = Response::from_string(reply.body)
                    .with_status_code(reply.status)
                    .with_header(header);
                request
                    .respond(response)
                    .context("send mock provider response")?;
            }
            Ok(recorded)
        });

        Ok(Self { base_url, handle })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for every scripted reply to be served and returns what was sent.
    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock provider thread panicked"))?
    }
}
