use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

pub(crate) trait AiProvider: Send + Sync {
    fn provider_id(&self) -> &'static str;
    fn model_name(&self) -> &str;
    fn generate_text<'a>(
        &'a self,
        client: &'a Client,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Decode a provider reply, turning non-2xx statuses into errors that carry the body.
pub(crate) async fn read_json_reply<T: DeserializeOwned>(
    response: Response,
    provider: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("{} request failed with {}: {}", provider, status, body));
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response JSON", provider))
}

/// Strip reasoning blocks and code fences from raw model output.
pub(crate) fn clean_report_text(raw: &str) -> Result<String> {
    let mut text = raw.trim();

    if let Some(end) = text.find("</think>") {
        if text.starts_with("<think>") {
            text = text[end + "</think>".len()..].trim();
        }
    }

    if text.starts_with("```") {
        let body = text.trim_start_matches('`');
        // drop the language tag line, if any
        let body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or(body);
        text = body.trim_end().trim_end_matches('`').trim();
    }

    if text.is_empty() {
        return Err(anyhow!("AI provider returned an empty report"));
    }
    Ok(text.to_string())
}
