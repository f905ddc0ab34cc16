//! Client for a hosted vision-language model behind an OpenAI-compatible
//! chat-completions API, and parsing of its helmet verdict.

use crate::config::ModelSettings;
use crate::error::{Error, Result};
use crate::ingest::EncodedPayload;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// --- OpenAI-compatible serde structs ---

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub response_format: ResponseFormat,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// One outbound classification request: the inline image followed by the
/// instruction, with the reply constrained to a JSON object
#[derive(Debug)]
pub struct ClassificationRequest {
    pub data_url: String,
    pub instruction: String,
}

impl ClassificationRequest {
    pub fn new(payload: &EncodedPayload, instruction: &str) -> Self {
        ClassificationRequest {
            data_url: payload.data_url(),
            instruction: instruction.to_string(),
        }
    }

    /// The chat-completions body for `model`
    pub fn to_chat_request(&self, model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: self.data_url.clone(),
                        },
                    },
                    ContentPart::Text {
                        text: self.instruction.clone(),
                    },
                ],
            }],
        }
    }
}

/// The model's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub helmet: bool,
    /// Self-reported certainty, 0 to 100
    pub confidence: u8,
}

#[derive(Deserialize)]
struct RawVerdict {
    helmet: bool,
    confidence: i64,
}

/// Parse the model's reply text. Both fields are required: a missing or
/// mistyped `helmet` or `confidence`, or a confidence outside 0..=100, is an
/// `Error::ResponseParse`. Unknown fields are ignored.
pub fn parse_classification(content: &str) -> Result<ClassificationResult> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content.trim())?;
    let raw: RawVerdict = serde_json::from_value(serde_json::Value::Object(object))?;
    let confidence = u8::try_from(raw.confidence)
        .ok()
        .filter(|c| *c <= 100)
        .ok_or_else(|| {
            Error::ResponseParse(format!(
                "confidence must be an integer from 0 to 100, got {}",
                raw.confidence
            ))
        })?;

    Ok(ClassificationResult {
        helmet: raw.helmet,
        confidence,
    })
}

/// Pull the reply text out of a chat-completions response body
fn reply_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::ResponseParse("the model returned no content".into()))
}

/// Longest prefix of an error reply kept for logging
const MAX_ERROR_BODY_CHARS: usize = 200;

/// The first `max` characters of `s`
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// A hosted model that can answer a classification request
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationResult>;
}

/// Client for an OpenAI-compatible chat-completions service
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model_name: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OpenAiClient {{ endpoint: {:?}, model: {:?} }}",
            self.endpoint, self.model_name
        )
    }
}

impl OpenAiClient {
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        info!(
            "model client configured: endpoint={}, model={}",
            endpoint, settings.name
        );

        Ok(Self {
            client,
            endpoint,
            model_name: settings.name.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl VisionModel for OpenAiClient {
    async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationResult> {
        let start = std::time::Instant::now();
        let body = request.to_chat_request(&self.model_name);

        let url = self.completions_url();
        debug!("POST {} ({} byte data url)", url, request.data_url.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body = truncate(&text, MAX_ERROR_BODY_CHARS).to_string();
            debug!("model service returned {}: {}", status, body);
            return Err(Error::Service {
                status: status.as_u16(),
                body,
            });
        }

        let result = parse_classification(&reply_content(&text)?)?;
        info!(
            "model {} answered in {}ms: {:?}",
            self.model_name,
            start.elapsed().as_millis(),
            result
        );
        Ok(result)
    }
}
