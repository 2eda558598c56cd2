// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const SUMMARY_INSTRUCTION: &str = "Summarize the following text concisely and accurately:";

const USER_ROLE: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Part {
    pub text: String,
}

impl GenerateRequest {
    /// Text of the first part of the first turn, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.contents
            .first()
            .and_then(|content| content.parts.first())
            .map(|part| part.text.as_str())
    }
}

/// Wraps `text` in a single user turn carrying the summary instruction.
pub fn build_request(text: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: USER_ROLE.to_owned(),
            parts: vec![Part {
                text: format!("{SUMMARY_INSTRUCTION}\n\n{text}"),
            }],
        }],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The link of `candidates[0].content.parts[0].text` that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedResponse {
    #[error("response body is not a JSON object")]
    NotAnObject,
    #[error("response body does not decode: {0}")]
    Undecodable(String),
    #[error("response has no `candidates` field")]
    MissingCandidates,
    #[error("response `candidates` list is empty")]
    NoCandidates,
    #[error("first candidate has no `content`")]
    MissingContent,
    #[error("candidate content has no `parts` field")]
    MissingParts,
    #[error("candidate content `parts` list is empty")]
    NoParts,
    #[error("first part has no `text`")]
    MissingText,
    #[error("first part `text` is an empty string")]
    EmptyText,
}

pub trait Transport {
    fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError> {
        (**self).generate(request)
    }
}

/// Pulls the first candidate's first text part out of a provider response.
///
/// Any broken link is reported as a [`MalformedResponse`] and the offending
/// body is logged at warn level for later inspection.
pub fn extract_summary(body: &Value) -> Result<String, MalformedResponse> {
    let extracted = navigate_response(body);
    if let Err(reason) = &extracted {
        warn!(%reason, body = %body, "provider response did not match the expected shape");
    }
    extracted
}

fn navigate_response(body: &Value) -> Result<String, MalformedResponse> {
    if !body.is_object() {
        return Err(MalformedResponse::NotAnObject);
    }

    let response = GenerateResponse::deserialize(body)
        .map_err(|error| MalformedResponse::Undecodable(error.to_string()))?;
    let candidate = response
        .candidates
        .ok_or(MalformedResponse::MissingCandidates)?
        .into_iter()
        .next()
        .ok_or(MalformedResponse::NoCandidates)?;
    let part = candidate
        .content
        .ok_or(MalformedResponse::MissingContent)?
        .parts
        .ok_or(MalformedResponse::MissingParts)?
        .into_iter()
        .next()
        .ok_or(MalformedResponse::NoParts)?;
    let text = part.text.ok_or(MalformedResponse::MissingText)?;
    if text.is_empty() {
        return Err(MalformedResponse::EmptyText);
    }
    Ok(text)
}

/// Builds `<base>/v1beta/models/<model>:generateContent?key=<api_key>`.
pub fn generate_content_url(base_url: &str, model: &str, api_key: &str) -> Result<Url> {
    let base_url = base_url.trim_end_matches('/');
    if base_url.is_empty() {
        bail!("provider.base_url must not be empty");
    }
    let model = model.trim();
    if model.is_empty() {
        bail!("provider.model must not be empty");
    }
    if model.contains(['/', '?', '#']) || model.contains(char::is_whitespace) {
        bail!("provider.model {model:?} must be a bare model id such as {DEFAULT_MODEL:?}");
    }

    let mut url = Url::parse(&format!("{base_url}/v1beta/models/{model}:generateContent"))
        .with_context(|| format!("parse provider.base_url {base_url:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "provider.base_url {base_url:?} must use http or https, got {:?}",
            url.scheme()
        );
    }
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Url,
    origin: String,
    model: String,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl Client {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("provider API key must not be empty");
        }
        let endpoint = generate_content_url(base_url, model, api_key)?;

        // reqwest's blocking client defaults to a 30s timeout; `None` disables it.
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            origin: endpoint.origin().ascii_serialization(),
            endpoint,
            model: model.trim().to_owned(),
            timeout,
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The endpoint with the query string (and so the API key) stripped.
    pub fn redacted_endpoint(&self) -> String {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.to_string()
    }
}

impl Transport for Client {
    fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError> {
        debug!(
            endpoint = %self.redacted_endpoint(),
            prompt_chars = request.prompt().map(|text| text.chars().count()).unwrap_or(0),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .map_err(|error| connection_error(&self.origin, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let error = provider_error(status, &body);
            warn!(status = status.as_u16(), %error, "provider rejected generateContent request");
            return Err(error);
        }

        response.json::<Value>().map_err(|error| {
            TransportError::new(format!(
                "decode provider response: {}",
                describe(&error.without_url())
            ))
        })
    }
}

fn connection_error(origin: &str, error: reqwest::Error) -> TransportError {
    // The request URL carries the API key; never let it reach the message.
    let error = error.without_url();
    warn!(%origin, error = %describe(&error), "generateContent request failed before a response");
    TransportError::new(format!("cannot reach {origin} ({})", describe(&error)))
}

fn describe(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn provider_error(status: StatusCode, body: &str) -> TransportError {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && let Some(message) = error.message
        && !message.trim().is_empty()
    {
        return TransportError::new(message);
    }

    TransportError::new(format!("provider returned status {}", status.as_u16()))
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
