// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ollama transport for the corner oracle — a local vision model reached over
// the Ollama chat API.
//
// # Feature Gate
//
// This module is only available when the `ollama` feature is enabled.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flatpage_core::config::OracleConfig;
use flatpage_core::error::{FlatpageError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::oracle::CornerOracle;

/// Blocking Ollama client. The configured timeout bounds every request.
pub struct OllamaCornerOracle {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaCornerOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FlatpageError::Oracle(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> FlatpageError {
        if e.is_timeout() {
            FlatpageError::OracleTimeout(self.timeout_secs)
        } else if e.is_connect() {
            FlatpageError::Oracle(format!("cannot reach {}", self.base_url))
        } else {
            FlatpageError::Oracle(e.to_string())
        }
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(FlatpageError::Oracle(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body
        )))
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagsModel>,
}

#[derive(Deserialize)]
struct TagsModel {
    name: String,
}

impl CornerOracle for OllamaCornerOracle {
    #[instrument(skip_all, fields(model = %self.model, image_len = image_png.len()))]
    fn ask(&self, prompt: &str, image_png: &[u8]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: vec![STANDARD.encode(image_png)],
            }],
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;
        let parsed: ChatResponse = Self::check_status(response)?
            .json()
            .map_err(|e| FlatpageError::Oracle(format!("unexpected response body: {e}")))?;

        debug!(reply_len = parsed.message.content.len(), "Ollama chat complete");
        Ok(parsed.message.content)
    }

    fn probe(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.transport_error(e))?;
        let parsed: TagsResponse = Self::check_status(response)?
            .json()
            .map_err(|e| FlatpageError::Oracle(format!("unexpected response body: {e}")))?;

        let available = parsed.models.iter().any(|m| m.name.starts_with(&self.model));
        if !available {
            return Err(FlatpageError::Oracle(format!(
                "model {} is not installed",
                self.model
            )));
        }
        info!(model = %self.model, "Ollama oracle ready");
        Ok(())
    }
}
