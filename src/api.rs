use crate::{
    capture::Prompt,
    config::Config,
    constants::GEMINI_API_VERSION,
    errors::{IntellexError, IntellexResult},
    logging::log_api_call,
    models::{ApiCallLog, ModelId},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// The hosted model. One prompt in, generated text out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Returns the generated text verbatim. Every kind of failure surfaces as
    /// `IntellexError::Gateway`; nothing is retried.
    async fn generate(&self, model: &ModelId, prompt: &Prompt) -> IntellexResult<String>;
}

#[async_trait]
impl<T: ModelGateway + ?Sized> ModelGateway for Arc<T> {
    async fn generate(&self, model: &ModelId, prompt: &Prompt) -> IntellexResult<String> {
        (**self).generate(model, prompt).await
    }
}

/// Gateway backed by the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> IntellexResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| IntellexError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> IntellexResult<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Path of the generation endpoint for `model`. The key travels in a
    /// header so it never shows up in URLs, logs or error text.
    fn endpoint(&self, model: &ModelId) -> String {
        format!(
            "/{}/models/{}:generateContent",
            GEMINI_API_VERSION,
            model.as_str()
        )
    }
}

#[async_trait]
impl ModelGateway for GeminiClient {
    async fn generate(&self, model: &ModelId, prompt: &Prompt) -> IntellexResult<String> {
        let endpoint = self.endpoint(model);
        let payload = build_payload(prompt);
        let summary = if prompt.has_attachment() {
            "generate (text+image)"
        } else {
            "generate (text)"
        };

        debug!("Sending request to {} ({} chars)", endpoint, prompt.text.len());
        let start_time = Instant::now();

        let sent = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&payload)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                log_api_call(&ApiCallLog {
                    timestamp: Utc::now(),
                    endpoint,
                    request_summary: summary.to_string(),
                    response_status: 0,
                    response_time_ms: start_time.elapsed().as_millis(),
                });
                return Err(e.into());
            }
        };

        let status = response.status();
        log_api_call(&ApiCallLog {
            timestamp: Utc::now(),
            endpoint,
            request_summary: summary.to_string(),
            response_status: status.as_u16(),
            response_time_ms: start_time.elapsed().as_millis(),
        });

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, error_text);
            return Err(IntellexError::gateway_error(format!(
                "API returned error: {} - {}",
                status,
                remote_error_message(&error_text).unwrap_or(error_text)
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            IntellexError::gateway_error(format!("Failed to parse API response: {}", e))
        })?;

        extract_text(&body)
    }
}

/// Builds the `generateContent` request body. The image, when present, is
/// sent inline as base64 after the text part.
pub fn build_payload(prompt: &Prompt) -> Value {
    let mut parts = vec![json!({ "text": prompt.text })];
    if let Some(attachment) = &prompt.attachment {
        parts.push(json!({
            "inlineData": {
                "mimeType": attachment.mime_type,
                "data": STANDARD.encode(&attachment.data),
            }
        }));
    }

    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }]
    })
}

/// Pulls the generated text out of a response body.
pub fn extract_text(body: &Value) -> IntellexResult<String> {
    if let Some(error) = body["error"].as_object() {
        return Err(IntellexError::gateway_error(format!(
            "{}: {}",
            error
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message")
        )));
    }

    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(IntellexError::gateway_error(format!(
            "prompt was blocked: {}",
            reason
        )));
    }

    let candidate = &body["candidates"][0];
    let parts = candidate["content"]["parts"].as_array();
    let text: String = parts
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate["finishReason"].as_str().unwrap_or("no content");
        return Err(IntellexError::gateway_error(format!(
            "Response missing expected content ({})",
            reason
        )));
    }

    Ok(text)
}

fn remote_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}
