//! Core data types for WHOIS lookups.
//!
//! This module defines the values that flow through the lookup pipeline:
//! normalized domain names, server addresses, raw responses, the final
//! per-domain result and the configuration that drives a batch.

use crate::error::{ErrorKind, WhoisCheckError};
use crate::utils::{normalize_domain, suffix_offset};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default WHOIS port (RFC 3912).
pub const WHOIS_PORT: u16 = 43;

/// Default root broker used to discover servers for unknown suffixes.
pub const DEFAULT_BROKER: &str = "whois.iana.org";

/// A normalized domain name with an identified suffix.
///
/// Always lowercase, trimmed, without a trailing root dot, and made of at
/// least two valid labels. The suffix is either a multi-part suffix known to
/// the resolver (e.g. "co.uk") or the last label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    name: String,
    suffix_start: usize,
}

impl DomainName {
    /// Normalize and validate `input` using the built-in suffix table.
    pub fn parse(input: &str) -> Result<Self, WhoisCheckError> {
        Self::parse_with(input, crate::protocols::registry::is_static_suffix)
    }

    /// Normalize and validate `input`, asking `is_known_suffix` which
    /// multi-part suffixes exist.
    pub fn parse_with<F>(input: &str, is_known_suffix: F) -> Result<Self, WhoisCheckError>
    where
        F: Fn(&str) -> bool,
    {
        let name = normalize_domain(input)?;
        let suffix_start = suffix_offset(&name, is_known_suffix);
        Ok(Self { name, suffix_start })
    }

    /// The full normalized name.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The suffix used to pick a WHOIS server ("com", "co.uk").
    pub fn suffix(&self) -> &str {
        &self.name[self.suffix_start..]
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Host and port of a WHOIS server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        Self {
            host: host.into().to_lowercase(),
            port,
        }
    }

    /// Parse `host` or `host:port`. The port defaults to 43.
    pub fn parse(value: &str) -> Result<Self, WhoisCheckError> {
        let value = value.trim().trim_end_matches('/');
        if value.is_empty() {
            return Err(WhoisCheckError::config("server address cannot be empty"));
        }

        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    WhoisCheckError::config(format!("invalid port in server address '{}'", value))
                })?;
                (host, port)
            }
            None => (value, WHOIS_PORT),
        };

        let valid_host = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        if !valid_host || port == 0 {
            return Err(WhoisCheckError::config(format!(
                "invalid server address '{}'",
                value
            )));
        }

        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The complete text one server returned for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub server: ServerAddress,
    pub text: String,
}

impl RawResponse {
    pub fn new(server: ServerAddress, text: String) -> Self {
        Self { server, text }
    }
}

/// Servers queried for one domain, in order. Diagnostics only.
pub type ReferralChain = Vec<ServerAddress>;

/// Registration status of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    /// The registry has no record: the name can be registered
    Available,
    /// The registry holds a record for the name
    Registered,
    /// The status could not be determined; see the error detail
    Unknown,
}

/// Outcome of the optional DNS / website corroboration probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProbeReport {
    /// The name resolves to at least one address
    pub has_dns: bool,

    /// An HTTP(S) HEAD answered below 500; `None` when not probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_website: Option<bool>,
}

/// Result of one domain lookup.
///
/// `status` is `Unknown` exactly when `error` is set. Build values through
/// [`LookupResult::available`], [`LookupResult::registered`] and
/// [`LookupResult::unknown`] to keep that true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupResult {
    /// The domain as checked (normalized when valid, as given otherwise)
    pub domain: String,

    pub status: LookupStatus,

    /// Registration expiry, date portion only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    /// Human-readable reason when the status could not be determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// How long the lookup took
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_duration: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeReport>,
}

impl LookupResult {
    pub fn available<D: Into<String>>(domain: D) -> Self {
        Self::classified(domain.into(), LookupStatus::Available, None, None)
    }

    pub fn registered<D: Into<String>>(
        domain: D,
        expiration_date: Option<NaiveDate>,
        registrar: Option<String>,
    ) -> Self {
        Self::classified(
            domain.into(),
            LookupStatus::Registered,
            expiration_date,
            registrar,
        )
    }

    pub fn unknown<D: Into<String>>(domain: D, error: &WhoisCheckError) -> Self {
        Self {
            domain: domain.into(),
            status: LookupStatus::Unknown,
            expiration_date: None,
            registrar: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            check_duration: None,
            probe: None,
        }
    }

    fn classified(
        domain: String,
        status: LookupStatus,
        expiration_date: Option<NaiveDate>,
        registrar: Option<String>,
    ) -> Self {
        Self {
            domain,
            status,
            expiration_date,
            registrar,
            error: None,
            error_kind: None,
            check_duration: None,
            probe: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == LookupStatus::Available
    }

    pub fn is_registered(&self) -> bool {
        self.status == LookupStatus::Registered
    }
}

/// Configuration options for a lookup batch.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum number of concurrent lookups
    /// Default: 10, Range: 1-100
    pub concurrency: usize,

    /// Budget for one complete query (connect, send, read to close)
    /// Default: 8 seconds
    pub whois_timeout: Duration,

    /// Budget for each referral hop; kept separate from `whois_timeout`
    /// Default: 4 seconds
    pub referral_timeout: Duration,

    /// Referral hops followed after the first answer
    /// Default: 1
    pub max_referral_hops: usize,

    /// Root broker asked about suffixes missing from the static table
    /// Default: whois.iana.org:43
    pub broker: ServerAddress,

    /// Wall-clock bound for a whole batch; pending domains become Unknown
    /// Default: none
    pub batch_deadline: Option<Duration>,

    /// Retry once when a server answers with a rate-limit notice
    /// Default: true
    pub retry_rate_limited: bool,

    /// Pause before that retry
    /// Default: 1 second
    pub rate_limit_backoff: Duration,

    /// Suffix -> server mappings that take precedence over the static table
    pub custom_servers: HashMap<String, ServerAddress>,

    /// Resolve the name in DNS for classified results
    /// Default: false
    pub probe_dns: bool,

    /// HEAD the website when the name resolves
    /// Default: false
    pub probe_http: bool,

    /// Timeout for each website probe request
    /// Default: 5 seconds
    pub http_timeout: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            whois_timeout: Duration::from_secs(8),
            referral_timeout: Duration::from_secs(4),
            max_referral_hops: 1,
            broker: ServerAddress::new(DEFAULT_BROKER, WHOIS_PORT),
            batch_deadline: None,
            retry_rate_limited: true,
            rate_limit_backoff: Duration::from_secs(1),
            custom_servers: HashMap::new(),
            probe_dns: false,
            probe_http: false,
            http_timeout: Duration::from_secs(5),
        }
    }
}

impl CheckConfig {
    /// Set concurrency, capped to 1-100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }

    /// Set the per-query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    /// Set the per-hop referral timeout.
    pub fn with_referral_timeout(mut self, timeout: Duration) -> Self {
        self.referral_timeout = timeout;
        self
    }

    pub fn with_max_referral_hops(mut self, hops: usize) -> Self {
        self.max_referral_hops = hops;
        self
    }

    pub fn with_broker(mut self, broker: ServerAddress) -> Self {
        self.broker = broker;
        self
    }

    pub fn with_batch_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.batch_deadline = deadline;
        self
    }

    pub fn with_rate_limit_retry(mut self, enabled: bool, backoff: Duration) -> Self {
        self.retry_rate_limited = enabled;
        self.rate_limit_backoff = backoff;
        self
    }

    /// Route a suffix to a specific server. The suffix is lowercased and
    /// stripped of a leading dot.
    pub fn with_server<S: AsRef<str>>(mut self, suffix: S, server: ServerAddress) -> Self {
        let suffix = suffix.as_ref().trim().trim_start_matches('.').to_lowercase();
        self.custom_servers.insert(suffix, server);
        self
    }

    /// Enable the DNS and website corroboration probes.
    pub fn with_probes(mut self, dns: bool, http: bool) -> Self {
        self.probe_dns = dns;
        self.probe_http = http;
        self
    }
}

impl fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupStatus::Available => write!(f, "Available"),
            LookupStatus::Registered => write!(f, "Registered"),
            LookupStatus::Unknown => write!(f, "Unknown"),
        }
    }
}
