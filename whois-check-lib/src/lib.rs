//! # WHOIS Check Library
//!
//! Bulk WHOIS lookups: for each domain name, find out whether it is
//! registered and, when it is, its expiration date and registrar.
//!
//! Each lookup resolves the authoritative WHOIS server for the name's suffix,
//! performs the raw RFC 3912 exchange, follows a registrar referral and parses
//! the free-text answer. Failures never abort a batch; they become an
//! `Unknown` result for the domain concerned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whois_check_lib::DomainChecker;
//!
//! #[tokio::main]
//! async fn main() {
//!     let checker = DomainChecker::new();
//!     let result = checker.check_domain("example.com").await;
//!
//!     println!(
//!         "{} - {} (expires {:?}, registrar {:?})",
//!         result.domain, result.status, result.expiration_date, result.registrar
//!     );
//! }
//! ```
//!
//! ## Features
//!
//! - **Server resolution**: built-in suffix table, caller overrides, root broker fallback
//! - **Referral following**: bounded, loop-free registrar hops
//! - **Table-driven parsing**: availability phrases, expiry and registrar labels
//! - **Concurrent batches**: bounded concurrency, optional deadline, input order preserved

pub use checker::{DomainChecker, DEADLINE_EXCEEDED};
pub use concurrent::ConcurrentProcessor;
pub use config::{
    load_env_config, load_env_config_from, parse_duration_string, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, OutputConfig, OUTPUT_FORMATS,
};
pub use error::{ErrorKind, NetworkErrorKind, WhoisCheckError, UNPARSEABLE_RESPONSE};
pub use parser::{normalize_date, parse, ParsedRecord, AVAILABILITY_PHRASES};
pub use protocols::{ReferralFollower, ServerResolver, WhoisClient};
pub use types::{
    CheckConfig, DomainName, LookupResult, LookupStatus, ProbeReport, RawResponse, ReferralChain,
    ServerAddress, DEFAULT_BROKER, WHOIS_PORT,
};

pub mod parser;
pub mod protocols;

mod checker;
mod concurrent;
mod config;
mod error;
mod probe;
mod types;
mod utils;

pub type Result<T> = std::result::Result<T, WhoisCheckError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

#[allow(clippy::vec_init_then_push)]
fn get_enabled_features() -> Vec<&'static str> {
    let mut features = Vec::new();

    #[cfg(feature = "broker")]
    features.push("broker");

    #[cfg(feature = "debug")]
    features.push("debug");

    features
}
