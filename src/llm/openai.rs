//! OpenAI chat-completions decision provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::prompt::PromptBuilder;
use super::schema::{decision_from_json, Decision};
use super::utils::extract_json_object;
use super::{DecisionInput, DecisionProvider};
use crate::config::ProviderSettings;
use crate::errors::DecisionError;

pub struct OpenAiDecisionProvider {
    client: Client,
    prompt: PromptBuilder,
    settings: ProviderSettings,
}

impl OpenAiDecisionProvider {
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
        let body = ChatRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat {
                _type: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: ChatContent::Text(self.prompt.system_prompt().to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: ChatContent::Parts(vec![
                        ChatPart {
                            _type: "image_url".to_string(),
                            text: None,
                            image_url: Some(ImageUrl {
                                url: input.frame.data_url(),
                                detail: "high".to_string(),
                            }),
                        },
                        ChatPart {
                            _type: "text".to_string(),
                            text: Some(self.prompt.build_user_prompt(input)),
                            image_url: None,
                        },
                    ]),
                },
            ],
        };

        let url = format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| DecisionError::transport(format!("openai request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            let message = format!("openai returned {status}: {text}");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(DecisionError::transport(message))
            } else {
                Err(DecisionError::rejected(message))
            };
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|err| DecisionError::invalid(format!("openai response invalid: {err}")))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(DecisionError::invalid("openai response missing content"));
        }

        let json = extract_json_object(&content)
            .ok_or_else(|| DecisionError::invalid("openai response contains no JSON object"))?;
        decision_from_json(&json)
    }
}

#[async_trait]
impl DecisionProvider for OpenAiDecisionProvider {
    async fn decide(&self, input: &DecisionInput<'_>) -> Result<Decision, DecisionError> {
        self.invoke(input).await
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    _type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

#[derive(Debug, Serialize)]
struct ChatPart {
    #[serde(rename = "type")]
    _type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<ImageUrl>,
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
