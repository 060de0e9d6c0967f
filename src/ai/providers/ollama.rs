use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::ai::provider::{clean_report_text, read_json_reply, AiProvider};

/// Non-streaming `/api/generate` body
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
}

/// Local model served by an Ollama daemon
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl AiProvider for OllamaProvider {
    fn provider_id(&self) -> &'static str {
        "ollama"
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
            let request = GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            };
            let response = client
                .post(self.generate_url())
                .json(&request)
                .send()
                .await
                .context("Failed to reach the Ollama daemon")?;

            let reply: GenerateReply = read_json_reply(response, "Ollama").await?;
            clean_report_text(&reply.response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed_from_endpoint() {
        let provider = OllamaProvider::new("http://127.0.0.1:11434/".into(), "llama3".into());
        assert_eq!(provider.generate_url(), "http://127.0.0.1:11434/api/generate");
    }

    #[test]
    fn request_body_disables_streaming() {
        let body = serde_json::to_value(GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
        })
        .expect("request should serialize");
        assert_eq!(body["stream"], false);
        assert_eq!(body["model"], "llama3");
    }
}
