//! WHOIS response classification and field extraction.
//!
//! WHOIS has no schema. Every registry words "no such domain" differently and
//! labels the same fields in its own way, so the parser is driven by ordered
//! tables instead of per-registry code:
//!
//! 1. availability phrase families (case-insensitive substring, first match wins)
//! 2. registration markers, which must be present for a `Registered` verdict
//! 3. rate-limit notices, only consulted when no registration marker matched
//!
//! Fields are then pulled out with tables of `(label pattern, normalizer)`
//! entries. The first entry whose pattern matches a line and whose normalizer
//! accepts the value wins. The same machinery extracts referral targets and
//! the broker's server answer.

use crate::error::WhoisCheckError;
use crate::types::{LookupResult, RawResponse, ServerAddress};
use chrono::{DateTime, NaiveDate};
use regex::Regex;

/// A group of phrases that all mean "no matching record".
#[derive(Debug)]
pub struct PhraseFamily {
    pub name: &'static str,
    pub phrases: &'static [&'static str],
}

/// Phrase families that mark a domain as available, checked in order.
pub const AVAILABILITY_PHRASES: &[PhraseFamily] = &[
    PhraseFamily {
        name: "no match",
        phrases: &["no match", "no matching record", "no matching entry"],
    },
    PhraseFamily {
        name: "not found",
        phrases: &[
            "not found",
            "domain not found",
            "domain name not found",
            "no found",
        ],
    },
    PhraseFamily {
        name: "no data",
        phrases: &[
            "no data found",
            "no entries found",
            "no information available",
        ],
    },
    PhraseFamily {
        name: "free",
        phrases: &["status: free", "status: available", "domain available"],
    },
    PhraseFamily {
        name: "not registered",
        phrases: &["not registered", "this domain name has not been registered"],
    },
    PhraseFamily {
        name: "no object",
        phrases: &[
            "no object found",
            "the queried object does not exist",
            "object does not exist",
        ],
    },
];

/// Notices servers send instead of data when a client queries too fast.
pub const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit exceeded",
    "too many requests",
    "try again later",
    "quota exceeded",
    "limit exceeded",
    "rate-limited",
    "query rate",
];

/// Lines that only appear in answers about an existing registration.
pub const REGISTRATION_MARKERS: &[&str] = &[
    "domain status:",
    "registrar:",
    "creation date:",
    "created:",
    "registry domain id:",
    "registrant:",
    "name server:",
    "nameservers:",
    "expiry date:",
    "expiration date:",
    "expires:",
    "paid-till:",
    "updated date:",
    "last updated:",
];

/// Outcome of classifying one response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord {
    Available,
    Registered {
        expiration_date: Option<NaiveDate>,
        registrar: Option<String>,
    },
}

impl ParsedRecord {
    /// Turn the record into the result reported for `domain`.
    pub fn into_result<D: Into<String>>(self, domain: D) -> LookupResult {
        match self {
            ParsedRecord::Available => LookupResult::available(domain),
            ParsedRecord::Registered {
                expiration_date,
                registrar,
            } => LookupResult::registered(domain, expiration_date, registrar),
        }
    }
}

/// One labeled-field pattern and the function that validates its value.
pub(crate) struct FieldPattern<T> {
    label: &'static str,
    regex: Regex,
    normalize: fn(&str) -> Option<T>,
    /// Value sits on the following line when the label line has none
    /// (Nominet's block layout)
    next_line: bool,
}

impl<T> FieldPattern<T> {
    fn new(label: &'static str, normalize: fn(&str) -> Option<T>) -> Self {
        Self::build(label, normalize, false)
    }

    fn block(label: &'static str, normalize: fn(&str) -> Option<T>) -> Self {
        Self::build(label, normalize, true)
    }

    fn build(label: &'static str, normalize: fn(&str) -> Option<T>, next_line: bool) -> Self {
        let pattern = format!(r"(?i)^\s*{}\s*:\s*(.*)$", regex::escape(label));
        Self {
            label,
            // Labels are fixed literals, escaped above
            regex: Regex::new(&pattern).unwrap(),
            normalize,
            next_line,
        }
    }

    fn value_at(&self, lines: &[&str], index: usize) -> Option<T> {
        let captures = self.regex.captures(lines[index])?;
        let value = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");

        if !value.is_empty() {
            return (self.normalize)(value);
        }
        if self.next_line {
            let next = lines.get(index + 1)?.trim();
            if !next.is_empty() {
                return (self.normalize)(next);
            }
        }
        None
    }
}

lazy_static::lazy_static! {
    static ref EXPIRY_PATTERNS: Vec<FieldPattern<NaiveDate>> = [
        "Registry Expiry Date",
        "Registrar Registration Expiration Date",
        "Expiration Date",
        "Expiry Date",
        "Expiration Time",
        "Expires On",
        "Expires",
        "Expire Date",
        "paid-till",
        "Renewal Date",
    ]
    .into_iter()
    .map(|label| FieldPattern::new(label, normalize_date))
    .collect();

    static ref REGISTRAR_PATTERNS: Vec<FieldPattern<String>> = vec![
        FieldPattern::new("Registrar Name", normalize_registrar),
        FieldPattern::new("Sponsoring Registrar", normalize_registrar),
        FieldPattern::new("Registrar", normalize_registrar),
        FieldPattern::new("Registrar Organization", normalize_registrar),
        FieldPattern::block("Registrar", normalize_registrar),
    ];

    static ref REFERRAL_PATTERNS: Vec<FieldPattern<ServerAddress>> = [
        "Registrar WHOIS Server",
        "Whois Server",
        "ReferralServer",
        "refer",
    ]
    .into_iter()
    .map(|label| FieldPattern::new(label, normalize_server))
    .collect();

    static ref BROKER_PATTERNS: Vec<FieldPattern<ServerAddress>> = vec![
        FieldPattern::new("refer", normalize_server),
        FieldPattern::new("whois", normalize_server),
    ];

    static ref ISO_DATE_PREFIX: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap();
    static ref REGISTRAR_TAG: Regex = Regex::new(r"\s*\[Tag\s*=\s*[^\]]*\]\s*$").unwrap();
}

/// Formats tried, in order, after RFC 3339 and the ISO prefix.
const DATE_FORMATS: &[&str] = &[
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d %b %Y",
    "%b %d %Y",
    "%B %d, %Y",
];

/// Classify a response and extract its fields.
///
/// # Errors
///
/// - `RateLimited` when the server answered with a rate-limit notice and
///   no registration marker
/// - `ParseError("unparseable response")` when the text is empty or carries
///   neither an availability phrase nor any registration marker
pub fn parse(response: &RawResponse) -> Result<ParsedRecord, WhoisCheckError> {
    let text = response.text.trim();
    if text.is_empty() {
        return Err(WhoisCheckError::unparseable());
    }

    let lower = text.to_lowercase();

    if let Some(family) = availability_family(&lower) {
        tracing::debug!(server = %response.server, family = family.name, "availability phrase matched");
        return Ok(ParsedRecord::Available);
    }

    if !REGISTRATION_MARKERS.iter().any(|m| lower.contains(m)) {
        // Rate-limit notices only count when no record came back.
        if RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p)) {
            return Err(WhoisCheckError::rate_limited(response.server.to_string()));
        }
        return Err(WhoisCheckError::unparseable());
    }

    let lines: Vec<&str> = text.lines().collect();
    Ok(ParsedRecord::Registered {
        expiration_date: extract(&EXPIRY_PATTERNS, &lines),
        registrar: extract(&REGISTRAR_PATTERNS, &lines),
    })
}

/// The first availability family with a phrase in `lower`.
fn availability_family(lower: &str) -> Option<&'static PhraseFamily> {
    AVAILABILITY_PHRASES
        .iter()
        .find(|family| family.phrases.iter().any(|p| lower.contains(p)))
}

/// Referral targets named in `text`, in label-priority order, deduplicated.
pub(crate) fn referral_candidates(text: &str) -> Vec<ServerAddress> {
    let lines: Vec<&str> = text.lines().collect();
    let mut candidates: Vec<ServerAddress> = Vec::new();

    for pattern in REFERRAL_PATTERNS.iter() {
        for index in 0..lines.len() {
            if let Some(server) = pattern.value_at(&lines, index) {
                if !candidates.contains(&server) {
                    candidates.push(server);
                }
            }
        }
    }

    candidates
}

/// The authoritative server named in a root broker answer (`refer:` before `whois:`).
pub(crate) fn broker_server(text: &str) -> Option<ServerAddress> {
    let lines: Vec<&str> = text.lines().collect();
    extract(&BROKER_PATTERNS, &lines)
}

fn extract<T>(patterns: &[FieldPattern<T>], lines: &[&str]) -> Option<T> {
    patterns.iter().find_map(|pattern| {
        let found = (0..lines.len()).find_map(|index| pattern.value_at(lines, index));
        if found.is_some() {
            tracing::trace!(label = pattern.label, "field matched");
        }
        found
    })
}

/// Normalize a registry date string to a calendar date.
///
/// Timestamps keep the date as written; no timezone conversion happens.
pub fn normalize_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.date_naive());
    }

    if let Some(caps) = ISO_DATE_PREFIX.captures(value) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let first_token = value.split_whitespace().next().unwrap_or(value);

    if first_token.len() == 8 && first_token.bytes().all(|b| b.is_ascii_digit()) {
        let year = first_token[..4].parse().ok()?;
        let month = first_token[4..6].parse().ok()?;
        let day = first_token[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format)
            .or_else(|_| NaiveDate::parse_from_str(first_token, format))
            .ok()
    })
}

fn normalize_registrar(value: &str) -> Option<String> {
    let name = REGISTRAR_TAG.replace(value, "");
    let name = name.trim();

    // Registries without data sometimes echo a placeholder
    if name.is_empty() || name.eq_ignore_ascii_case("n/a") || name == "-" {
        None
    } else {
        Some(name.to_string())
    }
}

fn normalize_server(value: &str) -> Option<ServerAddress> {
    let value = value.trim();
    let lower = value.to_lowercase();
    let host = ["whois://", "rwhois://"]
        .iter()
        .find_map(|scheme| lower.strip_prefix(scheme))
        .unwrap_or(&lower);

    let server = ServerAddress::parse(host).ok()?;
    // A bare word is a label echo, not a server
    if server.host().contains('.') {
        Some(server)
    } else {
        None
    }
}
