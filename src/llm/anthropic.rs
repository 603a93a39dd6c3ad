//! Anthropic messages decision provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::prompt::PromptBuilder;
use super::schema::{decision_from_json, Decision};
use super::utils::extract_json_object;
use super::{DecisionInput, DecisionProvider};
use crate::config::ProviderSettings;
use crate::errors::DecisionError;

pub struct ClaudeDecisionProvider {
    client: Client,
    prompt: PromptBuilder,
    settings: ProviderSettings,
}

impl ClaudeDecisionProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, DecisionError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| {
                DecisionError::rejected(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            prompt: PromptBuilder::new(),
            settings,
        })
    }

    async fn invoke(&self, input: &DecisionInput<'_>) -> Result<Decision, DecisionError> {
        let body = ClaudeRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            system: self.prompt.system_prompt().to_string(),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: vec![
                    ClaudeContent {
                        _type: "image".to_string(),
                        source: Some(ClaudeImageSource {
                            _type: "base64".to_string(),
                            media_type: input.frame.media_type().to_string(),
                            data: input.frame.base64.clone(),
                        }),
                        text: None,
                    },
                    ClaudeContent {
                        _type: "text".to_string(),
                        source: None,
                        text: Some(self.prompt.build_user_prompt(input)),
                    },
                ],
            }],
        };

        let url = format!("{}/messages", self.settings.api_base.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|err| DecisionError::transport(format!("claude request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            let message = format!("claude returned {status}: {text}");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(DecisionError::transport(message))
            } else {
                Err(DecisionError::rejected(message))
            };
        }

        let response: ClaudeResponse = response
            .json()
            .await
            .map_err(|err| DecisionError::invalid(format!("claude response invalid: {err}")))?;

        let content = response
            .content
            .iter()
            .filter_map(|part| part.text.as_ref())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            return Err(DecisionError::invalid("claude response missing content"));
        }

        let json = extract_json_object(&content)
            .ok_or_else(|| DecisionError::invalid("claude response contains no JSON object"))?;
        decision_from_json(&json)
    }
}

#[async_trait]
impl DecisionProvider for ClaudeDecisionProvider {
    async fn decide(&self, input: &DecisionInput<'_>) -> Result<Decision, DecisionError> {
        self.invoke(input).await
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    system: String,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Serialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    _type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ClaudeImageSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClaudeImageSource {
    #[serde(rename = "type")]
    _type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponseContent {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default)]
    text: Option<String>,
}
