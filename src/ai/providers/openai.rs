use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;

use crate::ai::provider::{clean_report_text, read_json_reply, AiProvider};

const MAX_REPORT_TOKENS: u32 = 1500;
const REPORT_TEMPERATURE: f32 = 0.6;

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(endpoint: String, model: String, api_key: String) -> Self {
        Self {
            endpoint,
            model,
            api_key,
        }
    }
}

impl AiProvider for OpenAiProvider {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate_text<'a>(
        &'a self,
        client: &'a Client,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let endpoint = self.endpoint.trim_end_matches('/');
            let url = format!("{}/v1/chat/completions", endpoint);

            let response = client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": MAX_REPORT_TOKENS,
                    "temperature": REPORT_TEMPERATURE
                }))
                .send()
                .await
                .context("Failed to call OpenAI chat completions endpoint")?;

            let payload: serde_json::Value = read_json_reply(response, "OpenAI").await?;
            let text = payload
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("OpenAI response missing choices[0].message.content"))?;

            clean_report_text(text)
        })
    }
}
