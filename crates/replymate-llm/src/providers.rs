//! External LLM completion clients.
//!
//! OpenAI and Groq share the chat-completions format. Anthropic and Gemini
//! each have their own request and response shapes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use replymate_core::{Error, Result};

use crate::types::LLMProvider;
use crate::LanguageModel;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Non-streaming completion client for one provider/model.
pub struct HttpLanguageModel {
    client: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    temperature: f64,
    max_tokens: usize,
}

impl HttpLanguageModel {
    pub fn new(
        provider: LLMProvider,
        model: String,
        api_key: String,
        temperature: f64,
        max_tokens: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            provider,
            model,
            api_key,
            temperature,
            max_tokens,
        })
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> serde_json::Value {
        match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => {
                let mut messages = Vec::with_capacity(2);
                if !system_prompt.is_empty() {
                    messages.push(json!({"role": "system", "content": system_prompt}));
                }
                messages.push(json!({"role": "user", "content": user_prompt}));
                json!({
                    "model": self.model,
                    "messages": messages,
                    "temperature": self.temperature,
                    "max_tokens": self.max_tokens,
                })
            }
            LLMProvider::Anthropic => {
                let mut body = json!({
                    "model": self.model,
                    "messages": [{"role": "user", "content": user_prompt}],
                    "temperature": self.temperature,
                    "max_tokens": self.max_tokens,
                });
                if !system_prompt.is_empty() {
                    body["system"] = json!(system_prompt);
                }
                body
            }
            LLMProvider::Gemini => {
                let mut body = json!({
                    "contents": [{"role": "user", "parts": [{"text": user_prompt}]}],
                    "generationConfig": {
                        "temperature": self.temperature,
                        "maxOutputTokens": self.max_tokens,
                    },
                });
                if !system_prompt.is_empty() {
                    body["systemInstruction"] = json!({"parts": [{"text": system_prompt}]});
                }
                body
            }
        }
    }

    fn gemini_url(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/{}:generateContent", GEMINI_BASE, model)
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let builder = match self.provider {
            LLMProvider::OpenAI => self.client.post(OPENAI_URL).bearer_auth(&self.api_key),
            LLMProvider::Groq => self.client.post(GROQ_URL).bearer_auth(&self.api_key),
            LLMProvider::Anthropic => self
                .client
                .post(ANTHROPIC_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            LLMProvider::Gemini => self
                .client
                .post(self.gemini_url())
                .header("x-goog-api-key", &self.api_key),
        };
        builder.json(body)
    }
}

/// Pull the completion text out of a provider response.
pub fn extract_completion(provider: LLMProvider, body: &serde_json::Value) -> Result<String> {
    let text = match provider {
        LLMProvider::OpenAI | LLMProvider::Groq => body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string),
        LLMProvider::Anthropic => body["content"].as_array().map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<String>()
        }),
        LLMProvider::Gemini => body["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<String>()),
    };

    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => {
            let reason = body["error"]["message"]
                .as_str()
                .or_else(|| body["candidates"][0]["finishReason"].as_str())
                .unwrap_or("empty completion");
            Err(Error::Llm(format!("{} returned no text: {}", provider, reason)))
        }
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = self.request_body(system_prompt, user_prompt);
        debug!("Completing with {} model {}", self.provider, self.model);

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("API error {}: {}", status, body)));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Invalid response: {}", e)))?;

        extract_completion(self.provider, &parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
