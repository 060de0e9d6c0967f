use chrono::Utc;
use reqwest::Client;

use crate::ai::config::AiSettings;
use crate::ai::prompt::{build_report_prompt, ReportSnapshot};
use crate::ai::provider::AiProvider;
use crate::ai::providers::{ollama::OllamaProvider, openai::OpenAiProvider};
use crate::ai::types::{AiMode, NetworkReport, ReportOutcome};
use crate::error::EngineError;

/// Generate a credibility report for `snapshot` with the configured provider(s).
///
/// Never returns an error: every failure is folded into [`ReportOutcome::Failed`].
pub async fn generate_report(settings: &AiSettings, snapshot: &ReportSnapshot) -> ReportOutcome {
    if !settings.enabled || settings.mode == AiMode::Disabled {
        return ReportOutcome::failed("AI is disabled (set NETCERT_AI_ENABLED=1)");
    }

    let client = match Client::builder().timeout(settings.timeout()).build() {
        Ok(c) => c,
        Err(e) => {
            return ReportOutcome::failed(EngineError::UpstreamServiceFailure(format!(
                "AI client init failed: {}",
                e
            )))
        }
    };

    let prompt = build_report_prompt(snapshot);
    let local_provider = OllamaProvider::new(
        settings.ollama_endpoint.clone(),
        settings.ollama_model.clone(),
    );

    let result = match settings.mode {
        AiMode::Local => run_provider(&local_provider, &client, &prompt).await,
        AiMode::Cloud => match build_openai_provider(settings) {
            Ok(cloud_provider) => run_provider(&cloud_provider, &client, &prompt).await,
            Err(e) => Err(e),
        },
        AiMode::HybridAuto => match run_provider(&local_provider, &client, &prompt).await {
            Ok(report) => Ok(report),
            Err(local_err) => {
                crate::log_warn!(
                    "[REPORT] Local AI failed in hybrid mode, trying cloud: {}",
                    local_err
                );
                match build_openai_provider(settings) {
                    Ok(cloud_provider) => run_provider(&cloud_provider, &client, &prompt)
                        .await
                        .map_err(|cloud_err| {
                            anyhow::anyhow!("local={}, cloud={}", local_err, cloud_err)
                        }),
                    Err(cloud_cfg_err) => Err(anyhow::anyhow!(
                        "local={}, cloud-config={}",
                        local_err,
                        cloud_cfg_err
                    )),
                }
            }
        },
        AiMode::Disabled => Err(anyhow::anyhow!("AI is disabled")),
    };

    match result {
        Ok(report) => {
            crate::log_stderr!(
                "[REPORT] Generated {} chars with {}/{}",
                report.report_text.len(),
                report.provider,
                report.model
            );
            ReportOutcome::Generated(report)
        }
        Err(e) => {
            let failure = EngineError::UpstreamServiceFailure(format!("{:#}", e));
            crate::log_warn!("[REPORT] Generation failed: {}", failure);
            ReportOutcome::failed(failure)
        }
    }
}

/// First paragraph of a report.
pub fn summarize_report(report_text: &str) -> String {
    report_text
        .split("\n\n")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

async fn run_provider<P: AiProvider>(
    provider: &P,
    client: &Client,
    prompt: &str,
) -> anyhow::Result<NetworkReport> {
    let report_text = provider.generate_text(client, prompt).await?;
    Ok(NetworkReport {
        summary: summarize_report(&report_text),
        report_text,
        provider: provider.provider_id().to_string(),
        model: provider.model_name().to_string(),
        generated_at: Utc::now(),
    })
}

fn build_openai_provider(settings: &AiSettings) -> anyhow::Result<OpenAiProvider> {
    let api_key = settings.openai_api_key.clone().ok_or_else(|| {
        anyhow::anyhow!("NETCERT_AI_OPENAI_API_KEY or OPENAI_API_KEY is required for cloud reports")
    })?;

    Ok(OpenAiProvider::new(
        settings.openai_endpoint.clone(),
        settings.openai_model.clone(),
        api_key,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Read one full HTTP request (headers plus Content-Length body).
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answers every request with `body` as JSON; returns the base URL.
    async fn spawn_json_server(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let _ = read_request(&mut stream).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{}", addr)
    }

    async fn dead_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        format!("http://{}", addr)
    }

    fn settings(mode: AiMode) -> AiSettings {
        AiSettings {
            enabled: true,
            mode,
            timeout_ms: 2_000,
            ..AiSettings::disabled()
        }
    }

    #[test]
    fn summary_is_first_paragraph() {
        assert_eq!(
            summarize_report("Posture is good.\n\nRisk 1: telnet."),
            "Posture is good."
        );
        assert_eq!(summarize_report("single paragraph"), "single paragraph");
        assert_eq!(summarize_report(""), "");
    }

    #[tokio::test]
    async fn disabled_ai_fails_without_network() {
        let outcome = generate_report(&AiSettings::disabled(), &ReportSnapshot::default()).await;
        let error = outcome.error().expect("disabled AI should fail");
        assert!(error.starts_with("report generation failed: AI is disabled"));
    }

    #[tokio::test]
    async fn local_mode_uses_ollama_response() {
        let body = serde_json::json!({ "response": "Score 82, mostly fine.\n\nTelnet open on one host." })
            .to_string();
        let endpoint = spawn_json_server("200 OK", body).await;

        let mut s = settings(AiMode::Local);
        s.ollama_endpoint = endpoint;
        s.ollama_model = "test-model".to_string();

        let outcome = generate_report(&s, &ReportSnapshot::default()).await;
        let report = outcome.report().expect("report should be generated");
        assert_eq!(report.summary, "Score 82, mostly fine.");
        assert_eq!(report.provider, "ollama");
        assert_eq!(report.model, "test-model");
    }

    #[tokio::test]
    async fn cloud_mode_without_key_fails() {
        let outcome = generate_report(&settings(AiMode::Cloud), &ReportSnapshot::default()).await;
        let error = outcome.error().expect("missing key should fail");
        assert!(error.contains("upstream service failure"));
        assert!(error.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn hybrid_falls_back_to_cloud() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Cloud summary.\n\nMore." } }]
        })
        .to_string();
        let cloud = spawn_json_server("200 OK", body).await;

        let mut s = settings(AiMode::HybridAuto);
        s.ollama_endpoint = dead_endpoint().await;
        s.openai_endpoint = cloud;
        s.openai_api_key = Some("sk-test".to_string());

        let outcome = generate_report(&s, &ReportSnapshot::default()).await;
        let report = outcome.report().expect("cloud fallback should succeed");
        assert_eq!(report.provider, "openai");
        assert_eq!(report.summary, "Cloud summary.");
    }

    #[tokio::test]
    async fn upstream_error_status_becomes_failed_outcome() {
        let endpoint = spawn_json_server("500 Internal Server Error", "{}".to_string()).await;
        let mut s = settings(AiMode::Local);
        s.ollama_endpoint = endpoint;

        let outcome = generate_report(&s, &ReportSnapshot::default()).await;
        let error = outcome.error().expect("500 should fail");
        assert!(error.starts_with("report generation failed: upstream service failure: "));
        assert!(error.contains("500"));
    }
}
