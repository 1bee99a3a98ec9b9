//! Suffix to WHOIS server resolution.
//!
//! Servers come from three places, checked in order: caller overrides, the
//! built-in suffix table, and a root broker (IANA by default) queried with
//! the bare suffix. Broker answers are cached for the lifetime of the
//! resolver, which is one batch.

use crate::error::WhoisCheckError;
use crate::protocols::whois::WhoisClient;
use crate::types::{CheckConfig, DomainName, ServerAddress, WHOIS_PORT};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

lazy_static::lazy_static! {
    /// Built-in suffix -> WHOIS host table.
    static ref SUFFIX_SERVERS: HashMap<&'static str, &'static str> = HashMap::from([
        // Generic TLDs
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.nic.info"),
        ("biz", "whois.nic.biz"),
        ("name", "whois.nic.name"),
        ("mobi", "whois.nic.mobi"),
        ("edu", "whois.educause.edu"),
        ("gov", "whois.dotgov.gov"),
        ("int", "whois.iana.org"),
        // New gTLDs
        ("app", "whois.nic.google"),
        ("dev", "whois.nic.google"),
        ("page", "whois.nic.google"),
        ("xyz", "whois.nic.xyz"),
        ("online", "whois.nic.online"),
        ("site", "whois.nic.site"),
        ("tech", "whois.nic.tech"),
        ("store", "whois.nic.store"),
        ("shop", "whois.nic.shop"),
        ("blog", "whois.nic.blog"),
        ("cloud", "whois.nic.cloud"),
        // Country code TLDs
        ("io", "whois.nic.io"),
        ("ai", "whois.nic.ai"),
        ("co", "whois.nic.co"),
        ("me", "whois.nic.me"),
        ("tv", "whois.nic.tv"),
        ("cc", "ccwhois.verisign-grs.com"),
        ("us", "whois.nic.us"),
        ("ca", "whois.cira.ca"),
        ("uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("nl", "whois.domain-registry.nl"),
        ("eu", "whois.eu"),
        ("it", "whois.nic.it"),
        ("es", "whois.nic.es"),
        ("ch", "whois.nic.ch"),
        ("se", "whois.iis.se"),
        ("pl", "whois.dns.pl"),
        ("ru", "whois.tcinet.ru"),
        ("jp", "whois.jprs.jp"),
        ("cn", "whois.cnnic.cn"),
        ("in", "whois.registry.in"),
        ("au", "whois.auda.org.au"),
        ("nz", "whois.irs.net.nz"),
        ("br", "whois.registro.br"),
        ("za", "whois.registry.net.za"),
        // Multi-part suffixes
        ("co.uk", "whois.nic.uk"),
        ("org.uk", "whois.nic.uk"),
        ("me.uk", "whois.nic.uk"),
        ("ac.uk", "whois.ja.net"),
        ("com.au", "whois.auda.org.au"),
        ("net.au", "whois.auda.org.au"),
        ("org.au", "whois.auda.org.au"),
        ("co.nz", "whois.irs.net.nz"),
        ("co.jp", "whois.jprs.jp"),
        ("com.br", "whois.registro.br"),
        ("com.cn", "whois.cnnic.cn"),
        ("co.za", "whois.registry.net.za"),
    ]);
}

/// Whether `suffix` is in the built-in table.
pub fn is_static_suffix(suffix: &str) -> bool {
    SUFFIX_SERVERS.contains_key(suffix)
}

/// Get the built-in server for a suffix.
pub fn static_server(suffix: &str) -> Option<ServerAddress> {
    SUFFIX_SERVERS
        .get(suffix)
        .map(|host| ServerAddress::new(*host, WHOIS_PORT))
}

/// Query line to send to `server` for `domain`.
///
/// A few registries need flags to return the full record in English;
/// everyone else receives the bare name.
pub fn query_text(server: &ServerAddress, domain: &str) -> String {
    match server.host() {
        "whois.denic.de" => format!("-T dn,ace {}", domain),
        "whois.jprs.jp" => format!("{}/e", domain),
        _ => domain.to_string(),
    }
}

/// Resolves the authoritative WHOIS server for a domain.
///
/// Owns the per-batch broker cache. Share one resolver across the lookups
/// of a batch (behind an `Arc`); build a new one for the next batch.
#[derive(Debug)]
pub struct ServerResolver {
    #[cfg_attr(not(feature = "broker"), allow(dead_code))]
    client: WhoisClient,
    overrides: HashMap<String, ServerAddress>,
    #[cfg_attr(not(feature = "broker"), allow(dead_code))]
    broker: ServerAddress,
    #[cfg_attr(not(feature = "broker"), allow(dead_code))]
    timeout: Duration,
    /// suffix -> server; `None` records a definite "no server" answer
    cache: RwLock<HashMap<String, Option<ServerAddress>>>,
}

impl ServerResolver {
    pub fn new(client: WhoisClient, config: &CheckConfig) -> Self {
        Self {
            client,
            overrides: config.custom_servers.clone(),
            broker: config.broker.clone(),
            timeout: config.whois_timeout,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a multi-part suffix is known through overrides or the table.
    pub fn is_known_suffix(&self, suffix: &str) -> bool {
        self.overrides.contains_key(suffix) || is_static_suffix(suffix)
    }

    /// Normalize `input`, recognizing override suffixes as well as built-in ones.
    pub fn normalize(&self, input: &str) -> Result<DomainName, WhoisCheckError> {
        DomainName::parse_with(input, |suffix| self.is_known_suffix(suffix))
    }

    /// Find the server for `domain`.
    ///
    /// # Errors
    ///
    /// `ResolverError` when no table knows the suffix and the broker names no
    /// server, or when the broker cannot be reached.
    pub async fn resolve(&self, domain: &DomainName) -> Result<ServerAddress, WhoisCheckError> {
        let suffix = domain.suffix();

        if let Some(server) = self.overrides.get(suffix) {
            return Ok(server.clone());
        }

        if let Some(server) = static_server(suffix) {
            return Ok(server);
        }

        if let Some(cached) = self.cached(suffix) {
            tracing::debug!(suffix, "resolver cache hit");
            return cached.ok_or_else(|| unknown_suffix(suffix));
        }

        self.ask_broker(suffix).await
    }

    fn cached(&self, suffix: &str) -> Option<Option<ServerAddress>> {
        let cache = self.cache.read().ok()?;
        cache.get(suffix).cloned()
    }

    #[cfg(feature = "broker")]
    async fn ask_broker(&self, suffix: &str) -> Result<ServerAddress, WhoisCheckError> {
        tracing::debug!(suffix, broker = %self.broker, "asking broker");

        let response = self
            .client
            .query(&self.broker, suffix, self.timeout)
            .await
            .map_err(|e| {
                WhoisCheckError::resolver(suffix, format!("broker {} failed: {}", self.broker, e))
            })?;

        let found = crate::parser::broker_server(&response.text);

        // First writer wins; concurrent lookups may have queried in parallel
        let stored = match self.cache.write() {
            Ok(mut cache) => cache.entry(suffix.to_string()).or_insert(found).clone(),
            Err(_) => found,
        };

        tracing::debug!(suffix, server = ?stored, "broker answered");
        stored.ok_or_else(|| unknown_suffix(suffix))
    }

    #[cfg(not(feature = "broker"))]
    async fn ask_broker(&self, suffix: &str) -> Result<ServerAddress, WhoisCheckError> {
        Err(unknown_suffix(suffix))
    }
}

fn unknown_suffix(suffix: &str) -> WhoisCheckError {
    WhoisCheckError::resolver(suffix, "unknown suffix")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn resolver(config: &CheckConfig) -> ServerResolver {
        ServerResolver::new(WhoisClient::new(), config)
    }

    #[test]
    fn test_static_table_has_multi_part_suffixes() {
        assert!(is_static_suffix("co.uk"));
        assert!(is_static_suffix("com"));
        assert!(!is_static_suffix("example.com"));
    }

    #[test]
    fn test_query_templates() {
        let denic = ServerAddress::new("whois.denic.de", 43);
        let jprs = ServerAddress::new("whois.jprs.jp", 43);
        let verisign = ServerAddress::new("whois.verisign-grs.com", 43);

        assert_eq!(query_text(&denic, "example.de"), "-T dn,ace example.de");
        assert_eq!(query_text(&jprs, "example.jp"), "example.jp/e");
        assert_eq!(query_text(&verisign, "example.com"), "example.com");
    }

    #[tokio::test]
    async fn test_resolve_static() {
        let resolver = resolver(&CheckConfig::default());
        let domain = resolver.normalize("shop.example.co.uk").unwrap();
        assert_eq!(domain.suffix(), "co.uk");

        let server = assert_ok!(resolver.resolve(&domain).await);
        assert_eq!(server, ServerAddress::new("whois.nic.uk", 43));
    }

    #[tokio::test]
    async fn test_override_beats_static_table() {
        let config = CheckConfig::default().with_server("com", ServerAddress::new("127.0.0.1", 4343));
        let resolver = resolver(&config);
        let domain = resolver.normalize("example.com").unwrap();
        assert_eq!(
            resolver.resolve(&domain).await.unwrap(),
            ServerAddress::new("127.0.0.1", 4343)
        );
    }

    #[test]
    fn test_override_suffix_is_known() {
        let config = CheckConfig::default().with_server("test.local", ServerAddress::new("127.0.0.1", 43));
        let resolver = resolver(&config);
        let domain = resolver.normalize("shop.test.local").unwrap();
        assert_eq!(domain.suffix(), "test.local");
    }

    #[tokio::test]
    async fn test_negative_cache_entry() {
        let resolver = resolver(&CheckConfig::default());
        resolver
            .cache
            .write()
            .unwrap()
            .insert("invalid".to_string(), None);

        let domain = resolver.normalize("example.invalid").unwrap();
        let err = assert_err!(resolver.resolve(&domain).await);
        assert!(matches!(err, WhoisCheckError::ResolverError { ref suffix, .. } if suffix == "invalid"));
    }

    #[cfg(not(feature = "broker"))]
    #[tokio::test]
    async fn test_unlisted_suffix_without_broker() {
        let resolver = resolver(&CheckConfig::default());
        let domain = resolver.normalize("example.invalid").unwrap();
        let err = assert_err!(resolver.resolve(&domain).await);
        assert!(matches!(err, WhoisCheckError::ResolverError { ref suffix, .. } if suffix == "invalid"));
    }
}
