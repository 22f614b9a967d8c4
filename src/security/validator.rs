//! Input validators for command arguments.
//!
//! Every function here is pure and synchronous. A failed check returns a
//! [`ValidationError`] whose message names the violated rule; input is never
//! truncated or coerced into something acceptable.
//!
//! Enumerated fields are closed sets: each has its own enum with a single
//! allowed-value table, and anything outside that table is rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const AGENT_NAME_MIN_LEN: usize = 3;
pub const AGENT_NAME_MAX_LEN: usize = 50;
pub const MIN_INITIAL_BALANCE: i64 = 1_000;
pub const MAX_INITIAL_BALANCE: i64 = 1_000_000;
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 50;
pub const MAX_MESSAGE_LEN: usize = 500;

/// Required prefix of every API key issued by the backend.
pub const CREDENTIAL_PREFIX: &str = "ci_";
const CREDENTIAL_MIN_LEN: usize = 48;
const CREDENTIAL_MAX_LEN: usize = 100;
const CREDENTIAL_USER_SEGMENT_LEN: usize = 9;
const CREDENTIAL_USER_SENTINEL: char = 'u';

const FORBIDDEN_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>',
];

const MARKUP_PATTERNS: &[&str] = &["<script", "javascript:", "onerror=", "onload="];

static SQL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?-u:\b)(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION|SCRIPT)(?-u:\b)",
    )
    .expect("SQL keyword pattern is valid")
});

/// Which check rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Username,
    AgentName,
    Strategy,
    Persona,
    TradingStyle,
    ArenaFrequency,
    PositionStatus,
    AlertStatus,
    InitialBalance,
    Limit,
    Symbol,
    Message(MessageViolation),
    /// Structural argument check against a command schema.
    Argument,
    /// Command name not in the registry.
    Command,
}

/// Message filter categories, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageViolation {
    Empty,
    TooLong,
    SqlKeyword,
    SpecialCharacter,
    MarkupInjection,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub rule: Rule,
    pub message: String,
}

impl ValidationError {
    pub fn new(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

/// Declares a closed enumeration with its allowed-value table.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, label = $label:literal, rule = $rule:expr,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Exact, case-sensitive lookup in the allowed-value table.
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|choice| choice.as_str() == value)
                    .ok_or_else(|| {
                        ValidationError::new(
                            $rule,
                            format!(
                                "Invalid {}: '{}'. Available options: {}",
                                $label,
                                value,
                                Self::NAMES.join(", ")
                            ),
                        )
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(
    /// Risk appetite of the trading agent.
    Strategy, label = "strategy", rule = Rule::Strategy,
    {
        Conservative => "conservative",
        Moderate => "moderate",
        Aggressive => "aggressive",
    }
);

choice_enum!(
    /// How the agent behaves in the arena chat.
    Persona, label = "persona", rule = Rule::Persona,
    {
        AggressiveTalker => "aggressive_talker",
        SilentObserver => "silent_observer",
        DataDriven => "data_driven",
        Showman => "showman",
        Balanced => "balanced",
    }
);

choice_enum!(
    TradingStyle, label = "trading style", rule = Rule::TradingStyle,
    {
        Scalp => "scalp",
        Swing => "swing",
        Position => "position",
    }
);

choice_enum!(
    ArenaFrequency, label = "arena frequency", rule = Rule::ArenaFrequency,
    {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

choice_enum!(
    PositionStatus, label = "position status", rule = Rule::PositionStatus,
    {
        Open => "open",
        Closed => "closed",
        All => "all",
    }
);

choice_enum!(
    AlertStatus, label = "alert status", rule = Rule::AlertStatus,
    {
        Active => "active",
        Triggered => "triggered",
        All => "all",
    }
);

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(ValidationError::new(
            Rule::Username,
            format!("Username must be at least {} characters long", USERNAME_MIN_LEN),
        ));
    }
    if len > USERNAME_MAX_LEN {
        return Err(ValidationError::new(
            Rule::Username,
            format!("Username must be at most {} characters", USERNAME_MAX_LEN),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new(
            Rule::Username,
            "Username can only contain letters, numbers, underscores, and hyphens",
        ));
    }
    Ok(())
}

pub fn validate_agent_name(agent_name: &str) -> Result<(), ValidationError> {
    let len = agent_name.chars().count();
    if len < AGENT_NAME_MIN_LEN {
        return Err(ValidationError::new(
            Rule::AgentName,
            format!("Agent name must be at least {} characters long", AGENT_NAME_MIN_LEN),
        ));
    }
    if len > AGENT_NAME_MAX_LEN {
        return Err(ValidationError::new(
            Rule::AgentName,
            format!("Agent name must be at most {} characters", AGENT_NAME_MAX_LEN),
        ));
    }
    Ok(())
}

pub fn validate_initial_balance(balance: i64) -> Result<(), ValidationError> {
    if balance < MIN_INITIAL_BALANCE {
        return Err(ValidationError::new(
            Rule::InitialBalance,
            "Initial balance must be at least $1,000",
        ));
    }
    if balance > MAX_INITIAL_BALANCE {
        return Err(ValidationError::new(
            Rule::InitialBalance,
            "Initial balance cannot exceed $1,000,000",
        ));
    }
    Ok(())
}

pub fn validate_limit(limit: i64) -> Result<(), ValidationError> {
    if limit < MIN_LIMIT {
        return Err(ValidationError::new(Rule::Limit, "Limit must be at least 1"));
    }
    if limit > MAX_LIMIT {
        return Err(ValidationError::new(Rule::Limit, "Limit cannot exceed 50"));
    }
    Ok(())
}

/// Trading pair in `BASE/QUOTE` form, uppercase ASCII letters and digits only.
pub fn validate_symbol(symbol: &str) -> Result<(), ValidationError> {
    if symbol.is_empty() {
        return Err(ValidationError::new(Rule::Symbol, "Symbol is required"));
    }

    let is_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    };

    match symbol.split_once('/') {
        Some((base, quote)) if is_part(base) && is_part(quote) => Ok(()),
        _ => Err(ValidationError::new(
            Rule::Symbol,
            "Symbol must be in format: BTC/USDT",
        )),
    }
}

/// Ordered message filter. The first failing check wins, so a message that
/// contains both an SQL keyword and a forbidden character reports SQL.
pub fn validate_message(message: &str) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(message_error(
            MessageViolation::Empty,
            "Message cannot be empty".to_string(),
        ));
    }

    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(message_error(
            MessageViolation::TooLong,
            format!("Message must be at most {} characters", MAX_MESSAGE_LEN),
        ));
    }

    if SQL_KEYWORDS.is_match(message) {
        return Err(message_error(
            MessageViolation::SqlKeyword,
            "Message contains forbidden SQL keywords".to_string(),
        ));
    }

    if message.contains(FORBIDDEN_CHARS) {
        return Err(message_error(
            MessageViolation::SpecialCharacter,
            "Message contains forbidden special characters".to_string(),
        ));
    }

    let lowered = message.to_lowercase();
    if MARKUP_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Err(message_error(
            MessageViolation::MarkupInjection,
            "Message contains forbidden HTML/JavaScript".to_string(),
        ));
    }

    Ok(())
}

fn message_error(violation: MessageViolation, message: String) -> ValidationError {
    ValidationError::new(Rule::Message(violation), message)
}

/// Structural check of an API key: `ci_u<8 chars>_<url-safe token>`.
///
/// Never fails loudly; callers decide what an invalid key means.
pub fn validate_credential_format(key: &str) -> bool {
    let len = key.chars().count();
    if !(CREDENTIAL_MIN_LEN..=CREDENTIAL_MAX_LEN).contains(&len) {
        return false;
    }

    if !key.starts_with(CREDENTIAL_PREFIX) {
        return false;
    }

    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() < 3 {
        return false;
    }

    let user_segment = parts[1];
    if !user_segment.starts_with(CREDENTIAL_USER_SENTINEL)
        || user_segment.chars().count() != CREDENTIAL_USER_SEGMENT_LEN
    {
        return false;
    }

    let token = parts[2..].join("_");
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> String {
        format!("ci_u12345678_{}", "a".repeat(36))
    }

    #[test]
    fn usernames_within_rules_pass() {
        for name in ["test_user", "User123", "a-b-c", "abc", &"x".repeat(50)] {
            assert!(validate_username(name).is_ok(), "{} should pass", name);
        }
    }

    #[test]
    fn usernames_outside_rules_fail() {
        let short = validate_username("ab").unwrap_err();
        assert!(short.message.contains("at least 3 characters"));
        assert_eq!(short.rule, Rule::Username);

        let long = validate_username(&"a".repeat(51)).unwrap_err();
        assert!(long.message.contains("at most 50"));

        for bad in ["test@user", "test user", "tést_user", "drop;table"] {
            let err = validate_username(bad).unwrap_err();
            assert!(err.message.contains("letters, numbers, underscores"), "{}", bad);
        }
    }

    #[test]
    fn agent_name_has_length_rule_only() {
        assert!(validate_agent_name("Alpha One!").is_ok());
        assert!(validate_agent_name("AB").is_err());
        assert!(validate_agent_name(&"b".repeat(51)).is_err());
    }

    #[test]
    fn choices_accept_exact_table_values() {
        for name in Strategy::NAMES {
            assert_eq!(Strategy::parse(name).unwrap().as_str(), *name);
        }
        assert_eq!(Persona::parse("data_driven").unwrap(), Persona::DataDriven);
        assert_eq!(TradingStyle::parse("swing").unwrap(), TradingStyle::Swing);
        assert_eq!(ArenaFrequency::parse("high").unwrap(), ArenaFrequency::High);
    }

    #[test]
    fn choices_reject_anything_else() {
        let err = Strategy::parse("invalid").unwrap_err();
        assert_eq!(err.rule, Rule::Strategy);
        assert!(err.message.contains("Invalid strategy: 'invalid'"));
        assert!(err.message.contains("conservative, moderate, aggressive"));

        assert!(Strategy::parse("Moderate").is_err());
        assert!(Persona::parse("").is_err());
        assert_eq!(
            ArenaFrequency::parse("sometimes").unwrap_err().rule,
            Rule::ArenaFrequency
        );
    }

    #[test]
    fn choices_serialize_to_table_values() {
        let json = serde_json::to_string(&Persona::AggressiveTalker).unwrap();
        assert_eq!(json, "\"aggressive_talker\"");
    }

    #[test]
    fn initial_balance_bounds() {
        assert!(validate_initial_balance(1_000).is_ok());
        assert!(validate_initial_balance(1_000_000).is_ok());
        assert!(
            validate_initial_balance(999)
                .unwrap_err()
                .message
                .contains("at least $1,000")
        );
        assert!(
            validate_initial_balance(1_000_001)
                .unwrap_err()
                .message
                .contains("cannot exceed")
        );
    }

    #[test]
    fn limit_bounds() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(25).is_ok());
        assert!(validate_limit(50).is_ok());
        assert!(validate_limit(0).unwrap_err().message.contains("at least 1"));
        assert!(validate_limit(-5).unwrap_err().message.contains("at least 1"));
        assert!(validate_limit(51).unwrap_err().message.contains("cannot exceed 50"));
    }

    #[test]
    fn symbol_format() {
        assert!(validate_symbol("BTC/USDT").is_ok());
        assert!(validate_symbol("ETH/BTC").is_ok());
        assert!(validate_symbol("1INCH/USDT").is_ok());

        assert!(validate_symbol("").unwrap_err().message.contains("required"));
        for bad in ["BTCUSDT", "btc/usdt", "BTC/USDT/ETH", "/USDT", "BTC/", "BTC-USDT"] {
            let err = validate_symbol(bad).unwrap_err();
            assert!(err.message.contains("format: BTC/USDT"), "{}", bad);
        }
    }

    #[test]
    fn message_accepts_plain_text() {
        assert!(validate_message("Hello, how are you?").is_ok());
        assert!(validate_message("Should I buy ETH now?").is_ok());
        // Keyword embedded in a longer word is not a whole-word match
        assert!(validate_message("The selection looks updated").is_ok());
    }

    #[test]
    fn message_rejects_empty_and_long() {
        for empty in ["", "   ", "\n\t"] {
            let err = validate_message(empty).unwrap_err();
            assert_eq!(err.rule, Rule::Message(MessageViolation::Empty));
        }
        let err = validate_message(&"a".repeat(501)).unwrap_err();
        assert_eq!(err.rule, Rule::Message(MessageViolation::TooLong));
        assert!(validate_message(&"a".repeat(500)).is_ok());
    }

    #[test]
    fn message_rejects_sql_keywords() {
        let err = validate_message("SELECT * FROM users").unwrap_err();
        assert_eq!(err.rule, Rule::Message(MessageViolation::SqlKeyword));
        assert!(err.message.contains("SQL"));

        assert!(validate_message("please drop table test").is_err());
        assert!(validate_message("Union of traders").is_err());
    }

    #[test]
    fn message_rejects_special_characters() {
        let err = validate_message("test; rm -rf /").unwrap_err();
        assert_eq!(err.rule, Rule::Message(MessageViolation::SpecialCharacter));
        assert!(err.message.contains("special characters"));

        assert!(validate_message("test | cat").is_err());
        assert!(validate_message("price is $100").is_err());
    }

    #[test]
    fn sql_takes_precedence_over_special_characters() {
        let err = validate_message("DELETE everything; now").unwrap_err();
        assert_eq!(err.rule, Rule::Message(MessageViolation::SqlKeyword));
    }

    #[test]
    fn message_rejects_markup_injection() {
        let err = validate_message("onload=Something").unwrap_err();
        assert_eq!(err.rule, Rule::Message(MessageViolation::MarkupInjection));
        assert!(validate_message("test ONERROR= test").is_err());
        assert!(validate_message("visit javascript:void").is_err());
    }

    #[test]
    fn credential_format_accepts_expected_shape() {
        let key = valid_key();
        assert_eq!(key.len(), 49);
        assert!(validate_credential_format(&key));
        assert!(validate_credential_format(&format!(
            "ci_uabcdef12_{}_tail-part",
            "Z".repeat(40)
        )));
    }

    #[test]
    fn credential_format_rejects_malformed_keys() {
        assert!(!validate_credential_format("short"));
        assert!(!validate_credential_format(&format!("sk_u12345678_{}", "a".repeat(36))));
        // Segment 2 without sentinel or with wrong length
        assert!(!validate_credential_format(&format!("ci_x12345678_{}", "a".repeat(36))));
        assert!(!validate_credential_format(&format!("ci_u1234567_{}", "a".repeat(37))));
        // Too long
        assert!(!validate_credential_format(&format!("ci_u12345678_{}", "a".repeat(90))));
        // Token with characters outside the URL-safe set
        assert!(!validate_credential_format(&format!("ci_u12345678_{}!", "a".repeat(36))));
        // Only two segments
        assert!(!validate_credential_format(&format!("ci_u12345678{}", "a".repeat(40))));
    }
}
