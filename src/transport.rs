// 🌐 Transport - the network collaborator the pipeline calls into
//
// Every call is blocking with an explicit timeout. No retries:
// a failed fetch fails the current fund only.

use crate::error::{HoldingsError, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Transport - fetch-bytes, fetch-text, existence-check
pub trait Transport {
    /// Download raw bytes (PDFs, page dumps)
    fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// Download and decode text (index pages, HTML reports)
    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String>;

    /// Check that a URL exists. Never fails: network errors map to `false`.
    fn exists(&self, url: &str, timeout: Duration) -> bool;
}

/// HTTP transport backed by a blocking reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| {
                HoldingsError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(HttpTransport { client })
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| HoldingsError::remote_fetch(url, e))?;

        response
            .error_for_status()
            .map_err(|e| HoldingsError::remote_fetch(url, e))
    }
}

impl Transport for HttpTransport {
    fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let bytes = self
            .get(url, timeout)?
            .bytes()
            .map_err(|e| HoldingsError::remote_fetch(url, e))?;

        debug!(url, bytes = bytes.len(), "fetched bytes");
        Ok(bytes.to_vec())
    }

    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        // Charset comes from the Content-Type header when present
        let text = self
            .get(url, timeout)?
            .text()
            .map_err(|e| HoldingsError::remote_fetch(url, e))?;

        debug!(url, chars = text.len(), "fetched text");
        Ok(text)
    }

    fn exists(&self, url: &str, timeout: Duration) -> bool {
        let status = match self.client.head(url).timeout(timeout).send() {
            Ok(resp) => resp.status(),
            Err(e) => {
                debug!(url, error = %e, "existence check failed");
                return false;
            }
        };

        // Some static hosts reject HEAD outright
        if status == StatusCode::METHOD_NOT_ALLOWED {
            return match self.client.get(url).timeout(timeout).send() {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    debug!(url, error = %e, "existence check (GET) failed");
                    false
                }
            };
        }

        status.is_success()
    }
}

// ============================================================================
// IN-MEMORY TRANSPORT (tests)
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new("holdings-scan/test").is_ok());
    }

    #[test]
    fn test_fake_transport_unknown_url_is_remote_fetch() {
        let transport = FakeTransport::new().with_text("https://a/", "ok");

        assert_eq!(
            transport.fetch_text("https://a/", Duration::from_secs(1)).unwrap(),
            "ok"
        );
        let err = transport
            .fetch_bytes("https://b/", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, HoldingsError::RemoteFetch { .. }));
        assert!(!transport.exists("https://b/", Duration::from_secs(1)));
    }
}
