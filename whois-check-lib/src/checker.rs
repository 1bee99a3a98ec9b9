//! Main WHOIS checker implementation.
//!
//! `DomainChecker` drives the lookup pipeline for each domain:
//! normalize -> resolve server -> query -> follow referrals -> parse.
//! Every failure is folded into the result for the domain that caused it, so
//! a batch always returns one result per input.

use crate::concurrent::ConcurrentProcessor;
use crate::error::WhoisCheckError;
use crate::parser::{self, ParsedRecord};
use crate::probe::{self, HttpProber};
use crate::protocols::{query_text, ReferralFollower, ServerResolver, WhoisClient};
use crate::types::{CheckConfig, DomainName, LookupResult, LookupStatus, ProbeReport};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Message carried by results cut off by the batch deadline.
pub const DEADLINE_EXCEEDED: &str = "batch deadline exceeded";

/// Coordinates WHOIS lookups for single domains and batches.
///
/// # Example
///
/// ```rust,no_run
/// use whois_check_lib::{CheckConfig, DomainChecker};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let checker = DomainChecker::with_config(
///         CheckConfig::default().with_timeout(Duration::from_secs(5)),
///     );
///     let domains = vec!["example.com".to_string(), "rust-lang.org".to_string()];
///     for result in checker.check_domains(&domains).await {
///         println!("{}: {}", result.domain, result.status);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DomainChecker {
    config: CheckConfig,
    client: WhoisClient,
    http: Option<HttpProber>,
}

impl DomainChecker {
    /// Create a checker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CheckConfig::default())
    }

    /// Create a checker with custom configuration.
    pub fn with_config(config: CheckConfig) -> Self {
        let http = if config.probe_http {
            match HttpProber::new(config.http_timeout) {
                Ok(prober) => Some(prober),
                Err(e) => {
                    warn!(error = %e, "website probe disabled");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            client: WhoisClient::new(),
            http,
        }
    }

    /// Get the current configuration for this checker.
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Look up a single domain.
    ///
    /// Never fails: problems are reported as an `Unknown` result with the
    /// error detail set.
    pub async fn check_domain(&self, domain: &str) -> LookupResult {
        let resolver = self.resolver();
        self.lookup(&resolver, domain).await
    }

    /// Look up a batch of domains.
    ///
    /// Returns exactly one result per input, in input order. Lookups run
    /// concurrently up to `config.concurrency` and share one resolver cache.
    pub async fn check_domains(&self, domains: &[String]) -> Vec<LookupResult> {
        let mut slots: Vec<Option<LookupResult>> = vec![None; domains.len()];

        let mut results = self.check_domains_stream(domains);
        while let Some((index, result)) = results.next().await {
            slots[index] = Some(result);
        }

        let results: Vec<LookupResult> = slots
            .into_iter()
            .zip(domains)
            .map(|(slot, input)| slot.unwrap_or_else(|| deadline_result(input, self.config.batch_deadline)))
            .collect();

        info!(
            domains = results.len(),
            available = results.iter().filter(|r| r.is_available()).count(),
            registered = results.iter().filter(|r| r.is_registered()).count(),
            unknown = results.iter().filter(|r| r.status == LookupStatus::Unknown).count(),
            "batch complete"
        );
        results
    }

    /// Look up a batch of domains, yielding `(input index, result)` pairs as
    /// they complete.
    ///
    /// Every input produces exactly one pair. When a batch deadline is set,
    /// domains still pending when it elapses are yielded as `Unknown`.
    pub fn check_domains_stream(
        &self,
        domains: &[String],
    ) -> Pin<Box<dyn Stream<Item = (usize, LookupResult)> + Send + '_>> {
        let resolver = Arc::new(self.resolver());
        let inputs: Arc<Vec<String>> = Arc::new(domains.to_vec());
        let deadline = self.config.batch_deadline;

        info!(
            domains = inputs.len(),
            concurrency = self.config.concurrency,
            "starting batch"
        );

        let tasks: Vec<_> = (0..inputs.len())
            .map(|index| {
                let resolver = Arc::clone(&resolver);
                let inputs = Arc::clone(&inputs);
                async move { self.lookup(&resolver, &inputs[index]).await }
            })
            .collect();

        let processor = ConcurrentProcessor::new(self.config.concurrency).with_deadline(deadline);
        let stream = processor.stream(tasks).map(move |(index, output)| {
            let result = output.unwrap_or_else(|| {
                warn!(domain = %inputs[index], "batch deadline exceeded");
                deadline_result(&inputs[index], deadline)
            });
            (index, result)
        });

        Box::pin(stream)
    }

    fn resolver(&self) -> ServerResolver {
        ServerResolver::new(self.client.clone(), &self.config)
    }

    /// Full pipeline for one input string.
    async fn lookup(&self, resolver: &ServerResolver, input: &str) -> LookupResult {
        let start_time = Instant::now();

        let mut result = match resolver.normalize(input) {
            Ok(domain) => {
                info!(domain = %domain, suffix = domain.suffix(), "checking domain");
                let mut result = match self.query_and_parse(resolver, &domain).await {
                    Ok(record) => record.into_result(domain.as_str()),
                    Err(e) => LookupResult::unknown(domain.as_str(), &e),
                };
                if result.status != LookupStatus::Unknown {
                    result.probe = self.probe(&domain).await;
                }
                result
            }
            Err(e) => LookupResult::unknown(input.trim(), &e),
        };

        result.check_duration = Some(start_time.elapsed());
        info!(
            domain = %result.domain,
            status = %result.status,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            error = result.error.as_deref().unwrap_or(""),
            "domain checked"
        );
        result
    }

    async fn query_and_parse(
        &self,
        resolver: &ServerResolver,
        domain: &DomainName,
    ) -> Result<ParsedRecord, WhoisCheckError> {
        let server = resolver.resolve(domain).await?;
        let query = query_text(&server, domain.as_str());
        let follower = ReferralFollower::new(
            self.client.clone(),
            self.config.referral_timeout,
            self.config.max_referral_hops,
        );

        let mut retried = false;
        loop {
            let initial = self
                .client
                .query(&server, &query, self.config.whois_timeout)
                .await?;
            let (response, chain) = follower.follow(initial, domain.as_str()).await;
            debug!(domain = %domain, chain = ?chain, "referral chain");

            match parser::parse(&response) {
                Err(WhoisCheckError::RateLimited { .. })
                    if self.config.retry_rate_limited && !retried =>
                {
                    retried = true;
                    debug!(
                        domain = %domain,
                        server = %server,
                        backoff_ms = self.config.rate_limit_backoff.as_millis() as u64,
                        "rate limited, retrying once"
                    );
                    tokio::time::sleep(self.config.rate_limit_backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn probe(&self, domain: &DomainName) -> Option<ProbeReport> {
        if !self.config.probe_dns && !self.config.probe_http {
            return None;
        }

        let has_dns = probe::resolves(domain.as_str(), self.config.http_timeout).await;
        let has_website = match &self.http {
            Some(prober) if has_dns => Some(prober.reachable(domain.as_str()).await),
            _ => None,
        };

        Some(ProbeReport {
            has_dns,
            has_website,
        })
    }
}

impl Default for DomainChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn deadline_result(input: &str, deadline: Option<Duration>) -> LookupResult {
    let name = DomainName::parse(input)
        .map(|d| d.to_string())
        .unwrap_or_else(|_| input.trim().to_string());
    let err = WhoisCheckError::timeout(DEADLINE_EXCEEDED, deadline.unwrap_or_default());
    let mut result = LookupResult::unknown(name, &err);
    result.error = Some(DEADLINE_EXCEEDED.to_string());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_invalid_domain_short_circuits() {
        let checker = DomainChecker::new();
        let result = checker.check_domain("not a domain").await;

        assert_eq!(result.status, LookupStatus::Unknown);
        assert_eq!(result.error_kind, Some(ErrorKind::Validation));
        assert_eq!(result.domain, "not a domain");
        assert!(result.check_duration.is_some());
    }

    #[tokio::test]
    async fn test_batch_of_invalid_inputs_keeps_order() {
        let checker = DomainChecker::new();
        let inputs = vec!["".to_string(), "localhost".to_string(), "-bad.com".to_string()];
        let results = checker.check_domains(&inputs).await;

        let names: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(names, vec!["", "localhost", "-bad.com"]);
        assert!(results.iter().all(|r| r.error_kind == Some(ErrorKind::Validation)));
    }

    #[test]
    fn test_deadline_result() {
        let result = deadline_result(" Example.COM ", Some(Duration::from_secs(3)));
        assert_eq!(result.domain, "example.com");
        assert_eq!(result.status, LookupStatus::Unknown);
        assert_eq!(result.error.as_deref(), Some(DEADLINE_EXCEEDED));
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_checker_config_access() {
        let config = CheckConfig::default().with_concurrency(3);
        let checker = DomainChecker::with_config(config);
        assert_eq!(checker.config().concurrency, 3);
        assert!(checker.http.is_none());
    }
}
