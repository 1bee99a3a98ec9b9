//! Registrar referral following.
//!
//! Thin registries (Verisign for .com/.net) answer with a pointer to the
//! registrar's own WHOIS server, which holds the full record. The follower
//! re-queries that server a bounded number of times and never fails: when a
//! hop goes wrong the last good response is kept.

use crate::parser;
use crate::protocols::registry::query_text;
use crate::protocols::whois::WhoisClient;
use crate::types::{RawResponse, ReferralChain, ServerAddress};
use std::time::Duration;

/// Follows referral fields embedded in WHOIS responses.
#[derive(Debug, Clone)]
pub struct ReferralFollower {
    client: WhoisClient,
    timeout: Duration,
    max_hops: usize,
}

impl ReferralFollower {
    /// `timeout` bounds each hop on its own; `max_hops` of 0 disables following.
    pub fn new(client: WhoisClient, timeout: Duration, max_hops: usize) -> Self {
        Self {
            client,
            timeout,
            max_hops,
        }
    }

    /// Follow referrals starting from `initial`.
    ///
    /// `domain` is the name being looked up; each hop builds its own query
    /// line for the server it talks to. Returns the response to parse and the
    /// servers queried, the initial one included.
    pub async fn follow(&self, initial: RawResponse, domain: &str) -> (RawResponse, ReferralChain) {
        let mut chain: ReferralChain = vec![initial.server.clone()];
        let mut current = initial;

        for hop in 1..=self.max_hops {
            let Some(next) = find_referral(&current.text, &chain) else {
                break;
            };
            chain.push(next.clone());

            match self
                .client
                .query(&next, &query_text(&next, domain), self.timeout)
                .await
            {
                Ok(response) if !response.text.trim().is_empty() => {
                    tracing::debug!(hop, server = %next, "followed referral");
                    current = response;
                }
                Ok(_) => {
                    tracing::debug!(hop, server = %next, "referral answered empty, keeping previous response");
                    break;
                }
                Err(e) => {
                    tracing::debug!(hop, server = %next, error = %e, "referral failed, keeping previous response");
                    break;
                }
            }
        }

        (current, chain)
    }
}

/// The first referral target in `text` that has not been queried yet.
pub fn find_referral(text: &str, chain: &[ServerAddress]) -> Option<ServerAddress> {
    parser::referral_candidates(text)
        .into_iter()
        .find(|candidate| !chain.contains(candidate))
}
