//! Chat completions client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Ollama,
//! vLLM, llama.cpp server). Transient failures are retried with
//! exponential backoff before the error reaches the workflow.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::services::Generator;
use crate::{Error, Result};

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

pub(crate) fn backoff_secs(retry_count: u32) -> u64 {
    let factor = BACKOFF_MULTIPLIER.pow(retry_count.saturating_sub(1));
    let ms = INITIAL_BACKOFF_MS.saturating_mul(factor);
    let secs = ms / 1000;
    if secs == 0 {
        1
    } else {
        secs
    }
}

pub(crate) fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    /// Null when the backend refuses or errors inside a 200 response
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible completions endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Send a completion request with automatic retry on transient failures
    ///
    /// Retries network errors, 429s, and 5xx responses with exponential
    /// backoff. Other statuses fail immediately.
    async fn send_with_retry(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = String::new();
        let mut retry_count = 0;

        while retry_count <= MAX_RETRIES {
            let response = match self.http.post(&url).json(request).send().await {
                Ok(response) => response,
                Err(err) => {
                    last_error = err.to_string();
                    if is_retryable_network_error(&err) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        let wait = backoff_secs(retry_count);
                        warn!(retry = retry_count, wait_secs = wait, "Completion request failed, retrying");
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    }
                    return Err(Error::Http(err));
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    last_error = err.to_string();
                    if is_retryable_network_error(&err) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_secs(backoff_secs(retry_count))).await;
                        continue;
                    }
                    return Err(Error::Http(err));
                }
            };

            if status.is_success() {
                return Ok(text);
            }

            last_error = text;

            // Rate limits and server errors are worth waiting out
            if (status.as_u16() == 429 || status.is_server_error()) && retry_count < MAX_RETRIES {
                retry_count += 1;
                let wait = backoff_secs(retry_count);
                warn!(status = status.as_u16(), retry = retry_count, wait_secs = wait, "Completion backend busy, retrying");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            return Err(Error::Generation(format!(
                "Completion API error {}: {}",
                status,
                truncate(&last_error, 200)
            )));
        }

        Err(Error::Generation(truncate(&last_error, 200).to_string()))
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            stream: false,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Sending completion request");

        let text = self.send_with_retry(&request).await?;

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            Error::Generation(format!(
                "Failed to parse completion response: {} (body: {})",
                e,
                truncate(&text, 200)
            ))
        })?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(Error::Generation(
                "Completion backend returned empty content".to_string(),
            ));
        }

        Ok(content)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pull the first well-formed JSON value out of model output
///
/// Tries the raw content first, then a fenced ```json block, then the
/// first balanced `{...}` or `[...]` span. Models wrap JSON in prose
/// often enough that going straight to serde loses usable output.
pub fn extract_json(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    if let Some(stripped) = strip_markdown_fences(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&stripped).is_ok() {
            return Some(stripped);
        }
    }

    for (idx, ch) in content.char_indices() {
        if ch == '{' || ch == '[' {
            if let Some(candidate) = extract_balanced_json_from(content, idx) {
                if serde_json::from_str::<serde_json::Value>(&candidate).is_ok() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

fn strip_markdown_fences(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    let without_open = trimmed.strip_prefix("```")?;
    let after_header = if let Some(newline_idx) = without_open.find('\n') {
        &without_open[newline_idx + 1..]
    } else {
        without_open
    };
    let end_idx = after_header.rfind("```")?;
    Some(after_header[..end_idx].trim().to_string())
}

fn extract_balanced_json_from(content: &str, start: usize) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
                continue;
            }
            if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    let end = start + offset + ch.len_utf8();
                    return Some(content[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
