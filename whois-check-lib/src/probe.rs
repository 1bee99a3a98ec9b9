//! DNS and website corroboration probes.
//!
//! A registered name usually resolves and often serves a website. These
//! probes report that next to the WHOIS verdict; they never change it.

use crate::error::WhoisCheckError;
use std::time::Duration;

/// Whether `domain` resolves to at least one address within `timeout`.
pub async fn resolves(domain: &str, timeout: Duration) -> bool {
    let lookup = tokio::net::lookup_host((domain, 80));
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(mut addrs)) => addrs.next().is_some(),
        Ok(Err(e)) => {
            tracing::debug!(domain, error = %e, "DNS probe failed");
            false
        }
        Err(_) => false,
    }
}

/// HEAD requests against `http://` then `https://`.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, WhoisCheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("whois-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WhoisCheckError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// True when either scheme answers with a status below 500.
    pub async fn reachable(&self, domain: &str) -> bool {
        for scheme in ["http", "https"] {
            let url = format!("{}://{}", scheme, domain);
            match self.client.head(&url).send().await {
                Ok(response) if response.status().as_u16() < 500 => return true,
                Ok(response) => {
                    tracing::debug!(%url, status = %response.status(), "website probe: server error");
                }
                Err(e) => {
                    tracing::debug!(%url, error = %e, "website probe failed");
                }
            }
        }
        false
    }
}
