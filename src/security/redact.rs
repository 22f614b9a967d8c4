//! Credential scrubbing for log output.

use once_cell::sync::Lazy;
use regex::Regex;

use super::validator::CREDENTIAL_PREFIX;

static CREDENTIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b{}[A-Za-z0-9_-]+", regex::escape(CREDENTIAL_PREFIX)))
        .expect("credential pattern is valid")
});

static BEARER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bbearer\s+[^\s,;]+").expect("bearer pattern is valid"));

/// Replace anything that looks like an API key or bearer token.
pub fn redact_secrets(text: &str) -> String {
    let text = BEARER.replace_all(text, "Bearer [REDACTED]");
    CREDENTIAL
        .replace_all(&text, format!("{}[REDACTED]", CREDENTIAL_PREFIX).as_str())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_keys() {
        let text = "saved key ci_u12345678_abcdefABCDEF0123456789abcdefABCDEF01 for alice";
        assert_eq!(redact_secrets(text), "saved key ci_[REDACTED] for alice");
    }

    #[test]
    fn redacts_bearer_tokens() {
        let text = "header was Authorization: Bearer sometoken123, retrying";
        let redacted = redact_secrets(text);
        assert!(!redacted.contains("sometoken123"));
        assert!(redacted.contains("Bearer [REDACTED]"));
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        let text = "Backend returned 503: service unavailable";
        assert_eq!(redact_secrets(text), text);
    }
}
