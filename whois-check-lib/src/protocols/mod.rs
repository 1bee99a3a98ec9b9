//! Network-facing parts of the lookup pipeline.
//!
//! The raw WHOIS exchange, suffix to server resolution, and registrar
//! referral following.

/// WHOIS protocol client
pub mod whois;

/// Suffix table, query templates and broker fallback
pub mod registry;

/// Registrar referral following
pub mod referral;

pub use referral::ReferralFollower;
pub use registry::{query_text, ServerResolver};
pub use whois::WhoisClient;
