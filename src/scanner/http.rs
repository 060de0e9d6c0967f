//! HTTP service identification
//!
//! Walks a fixed ordered port list and stops at the first port that returns any HTTP response;
//! its `Server` header is fed to the fingerprint classifier.

use reqwest::header::SERVER;
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::models::Identification;
use crate::scanner::fingerprint::classify_banner;

#[derive(Debug, Clone)]
pub struct HttpIdentifier {
    client: Client,
    ports: Vec<u16>,
}

impl HttpIdentifier {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, ports })
    }

    /// Probe order for a host, given the ports discovery found open.
    ///
    /// With no candidates the whole list is used; otherwise only listed ports that were seen
    /// open, still in list order.
    pub fn probe_order(&self, candidate_ports: &[u16]) -> Vec<u16> {
        if candidate_ports.is_empty() {
            return self.ports.clone();
        }
        self.ports
            .iter()
            .copied()
            .filter(|p| candidate_ports.contains(p))
            .collect()
    }

    /// `Server` header of the response on `port` (empty when the response had none).
    pub async fn probe_server_header(&self, ip: IpAddr, port: u16) -> EngineResult<String> {
        let url = probe_url(ip, port);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::ProbeTimeout { target: url.clone() }
            } else {
                EngineError::Io(std::io::Error::other(e))
            }
        })?;

        Ok(resp
            .headers()
            .get(SERVER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string())
    }

    /// Like [`Self::probe_server_header`], with failures logged and folded into `None`.
    pub async fn fetch_server_header(&self, ip: IpAddr, port: u16) -> Option<String> {
        match self.probe_server_header(ip, port).await {
            Ok(banner) => Some(banner),
            Err(e) => {
                crate::log_debug!("[SCAN] HTTP probe of {}:{} gave no signal: {}", ip, port, e);
                None
            }
        }
    }

    /// Identify a host from the first answering HTTP port. No answer at all is `no_signal`.
    pub async fn identify(&self, ip: IpAddr, candidate_ports: &[u16]) -> Identification {
        for port in self.probe_order(candidate_ports) {
            if let Some(banner) = self.fetch_server_header(ip, port).await {
                let classification = classify_banner(&banner);
                return Identification {
                    device_type: classification.device_type,
                    firmware: classification.vendor,
                    confidence: classification.confidence,
                    port: Some(port),
                };
            }
        }

        Identification::no_signal()
    }
}

fn probe_url(ip: IpAddr, port: u16) -> String {
    let scheme = if port == 443 || port == 8443 {
        "https"
    } else {
        "http"
    };
    match ip {
        IpAddr::V4(v4) => format!("{}://{}:{}/", scheme, v4, port),
        IpAddr::V6(v6) => format!("{}://[{}]:{}/", scheme, v6, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn identifier(ports: Vec<u16>) -> HttpIdentifier {
        HttpIdentifier::new(ports, Duration::from_millis(800)).expect("client should build")
    }

    /// Serves one canned HTTP response per connection.
    async fn spawn_http_server(server_header: Option<&'static str>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let port = listener.local_addr().expect("local addr").port();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let header = server_header
                    .map(|s| format!("Server: {}\r\n", s))
                    .unwrap_or_default();
                let response = format!(
                    "HTTP/1.1 200 OK\r\n{}Content-Length: 0\r\nConnection: close\r\n\r\n",
                    header
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        port
    }

    #[test]
    fn probe_order_keeps_list_order() {
        let id = identifier(vec![80, 443, 8080]);
        assert_eq!(id.probe_order(&[]), vec![80, 443, 8080]);
        assert_eq!(id.probe_order(&[8080, 22, 80]), vec![80, 8080]);
        assert!(id.probe_order(&[22, 3389]).is_empty());
    }

    #[test]
    fn https_only_for_tls_ports() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(probe_url(ip, 443), "https://10.0.0.1:443/");
        assert_eq!(probe_url(ip, 8080), "http://10.0.0.1:8080/");
    }

    #[tokio::test]
    async fn identify_classifies_server_header() {
        let port = spawn_http_server(Some("Canon HTTP Server")).await;
        let id = identifier(vec![port]);

        let result = id.identify(IpAddr::V4(Ipv4Addr::LOCALHOST), &[]).await;
        assert_eq!(result.device_type, "Printer");
        assert_eq!(result.firmware, "Canon");
        assert_eq!(result.port, Some(port));
    }

    #[tokio::test]
    async fn identify_short_circuits_on_first_response() {
        let first = spawn_http_server(Some("nginx")).await;
        let second = spawn_http_server(Some("cisco")).await;
        let id = identifier(vec![first, second]);

        let result = id.identify(IpAddr::V4(Ipv4Addr::LOCALHOST), &[]).await;
        assert_eq!(result.port, Some(first));
        assert_eq!(result.device_type, "Unknown");
        assert_eq!(result.firmware, "nginx");
        assert_eq!(result.confidence, 0.3);
    }

    #[tokio::test]
    async fn response_without_server_header_is_low_confidence_unknown() {
        let port = spawn_http_server(None).await;
        let id = identifier(vec![port]);

        let result = id.identify(IpAddr::V4(Ipv4Addr::LOCALHOST), &[]).await;
        assert_eq!(result.firmware, "Unknown");
        assert_eq!(result.confidence, 0.3);
    }

    #[tokio::test]
    async fn silent_host_is_no_signal() {
        let closed = {
            let tmp = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            tmp.local_addr().expect("addr").port()
        };
        let id = identifier(vec![closed]);

        let result = id.identify(IpAddr::V4(Ipv4Addr::LOCALHOST), &[]).await;
        assert_eq!(result, Identification::no_signal());
    }

    #[tokio::test]
    async fn unanswered_request_is_a_probe_timeout() {
        // accepts the connection but never writes a response
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let port = listener.local_addr().expect("addr").port();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let id = HttpIdentifier::new(vec![port], Duration::from_millis(200))
            .expect("client should build");
        let err = id
            .probe_server_header(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
            .await
            .expect_err("silent server should time out");
        assert!(matches!(err, EngineError::ProbeTimeout { ref target } if target.contains(&port.to_string())));

        hold.abort();
    }
}
