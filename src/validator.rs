use crate::errors::CheckerError;
use once_cell::sync::Lazy;
use regex::Regex;

static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("domain pattern is a valid regex")
});

/// True when `domain` has the shape `label(.label)*.tld` with an alphabetic
/// TLD of at least two characters.
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_PATTERN.is_match(domain)
}

/// Checks the syntax and returns the lowercased domain used for lookups.
pub fn validate_domain(domain: &str) -> Result<String, CheckerError> {
    if !is_valid_domain(domain) {
        return Err(CheckerError::InvalidDomain(domain.to_string()));
    }
    Ok(domain.to_lowercase())
}
