//! HTTP health check: `GET {scheme}://{address}/stat` must return 200.

use std::time::Duration;

use reqwest::StatusCode;

use crate::health::strategy::{CheckStrategy, ProbeFuture};

/// Longest response body kept as a failure diagnostic.
pub const MAX_DIAGNOSTIC_LEN: usize = 256;

/// Probes the `/stat` endpoint of each address.
#[derive(Debug, Clone)]
pub struct HttpStatusCheck {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpStatusCheck {
    pub fn new(enable_tls: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            scheme: if enable_tls { "https" } else { "http" },
        }
    }

    pub fn stat_url(&self, address: &str) -> String {
        format!("{}://{}/stat", self.scheme, address)
    }
}

impl CheckStrategy for HttpStatusCheck {
    fn name(&self) -> &'static str {
        "http"
    }

    fn probe(&self, address: &str, timeout: Duration) -> ProbeFuture {
        let request = self
            .client
            .get(self.stat_url(address))
            .header("user-agent", "detector-client-health-check")
            .timeout(timeout);

        Box::pin(async move {
            let mut response = request.send().await.map_err(|e| e.to_string())?;
            let status = response.status();
            if status == StatusCode::OK {
                return Ok(());
            }

            let mut body = Vec::new();
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        body.extend_from_slice(&chunk);
                        if body.len() >= MAX_DIAGNOSTIC_LEN {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        return Err(format!(
                            "response code is {} and cannot get result",
                            status.as_u16()
                        ))
                    }
                }
            }
            Err(diagnostic(status, &body))
        })
    }
}

fn diagnostic(status: StatusCode, body: &[u8]) -> String {
    let body = &body[..body.len().min(MAX_DIAGNOSTIC_LEN)];
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("unexpected status {}", status.as_u16())
    } else {
        text.to_string()
    }
}
