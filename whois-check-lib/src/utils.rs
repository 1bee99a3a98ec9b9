//! Utility functions for domain processing and validation.
//!
//! Normalization happens before any network activity: a name that fails here
//! short-circuits its lookup with a validation error.

use crate::error::WhoisCheckError;

/// Trim, lowercase and validate a domain name.
///
/// Rejects empty input, embedded whitespace, names without a dot, names
/// longer than 253 characters, and labels that are empty, longer than 63
/// characters, start or end with a hyphen, or contain anything other than
/// alphanumerics and hyphens. A single trailing root dot is dropped.
pub(crate) fn normalize_domain(input: &str) -> Result<String, WhoisCheckError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(WhoisCheckError::invalid_domain(
            input,
            "domain name cannot be empty",
        ));
    }

    if trimmed.chars().any(char::is_whitespace) {
        return Err(WhoisCheckError::invalid_domain(
            trimmed,
            "domain name contains whitespace",
        ));
    }

    let domain = trimmed.strip_suffix('.').unwrap_or(trimmed).to_lowercase();

    if !domain.contains('.') {
        return Err(WhoisCheckError::invalid_domain(
            trimmed,
            "no recognizable suffix",
        ));
    }

    if domain.len() > 253 {
        return Err(WhoisCheckError::invalid_domain(
            trimmed,
            "domain name longer than 253 characters",
        ));
    }

    for label in domain.split('.') {
        if let Some(reason) = invalid_label_reason(label) {
            return Err(WhoisCheckError::invalid_domain(trimmed, reason));
        }
    }

    Ok(domain)
}

fn invalid_label_reason(label: &str) -> Option<&'static str> {
    if label.is_empty() {
        return Some("empty label");
    }
    if label.len() > 63 {
        return Some("label longer than 63 characters");
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Some("label starts or ends with a hyphen");
    }
    if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Some("label contains invalid characters");
    }
    None
}

/// Byte offset where the suffix of `domain` starts.
///
/// Tries the longest multi-part candidate first ("example.co.uk" tries
/// "co.uk"), never the whole name, and falls back to the last label.
pub(crate) fn suffix_offset<F>(domain: &str, is_known_suffix: F) -> usize
where
    F: Fn(&str) -> bool,
{
    let dots: Vec<usize> = domain.match_indices('.').map(|(i, _)| i).collect();

    // The last dot is the single-label fallback below.
    for &dot in dots.iter().take(dots.len().saturating_sub(1)) {
        let candidate = &domain[dot + 1..];
        if is_known_suffix(candidate) {
            return dot + 1;
        }
    }

    dots.last().map(|dot| dot + 1).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knows_co_uk(suffix: &str) -> bool {
        matches!(suffix, "co.uk" | "org.uk")
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("  Example.COM ").unwrap(), "example.com");
        assert_eq!(normalize_domain("example.com.").unwrap(), "example.com");
        assert_eq!(normalize_domain("sub.example.co.uk").unwrap(), "sub.example.co.uk");
    }

    #[test]
    fn test_normalize_domain_rejects_malformed() {
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("   ").is_err());
        assert!(normalize_domain("exa mple.com").is_err());
        assert!(normalize_domain("localhost").is_err());
        assert!(normalize_domain(".com").is_err());
        assert!(normalize_domain("example..com").is_err());
        assert!(normalize_domain("-example.com").is_err());
        assert!(normalize_domain("example-.com").is_err());
        assert!(normalize_domain("exa_mple.com").is_err());
        assert!(normalize_domain(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_suffix_offset_single_label() {
        let name = "example.com";
        assert_eq!(&name[suffix_offset(name, knows_co_uk)..], "com");
    }

    #[test]
    fn test_suffix_offset_multi_part() {
        let name = "shop.example.co.uk";
        assert_eq!(&name[suffix_offset(name, knows_co_uk)..], "co.uk");
    }

    #[test]
    fn test_suffix_offset_never_whole_name() {
        // "co.uk" itself is a registrable query against the "uk" registry
        let name = "co.uk";
        assert_eq!(&name[suffix_offset(name, knows_co_uk)..], "uk");
    }
}
