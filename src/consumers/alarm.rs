// src/consumers/alarm.rs
//
// Keyword classifier for status lines coming off the radio link.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static ERROR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(error|failure|failed|fault)\b").expect("valid error pattern"));

static WARNING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(warn(?:ing)?|caution)\b").expect("valid warning pattern"));

static SUCCESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(success|succeeded|ok|passed)\b").expect("valid success pattern"));

/// Severity of a classified line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    Error,
    Warning,
    Success,
}

impl std::fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmLevel::Error => write!(f, "ERROR"),
            AlarmLevel::Warning => write!(f, "WARN"),
            AlarmLevel::Success => write!(f, "OK"),
        }
    }
}

/// Matches error, then warning, then success keywords; first hit wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlarmClassifier;

impl AlarmClassifier {
    pub fn new() -> Self {
        AlarmClassifier
    }

    pub fn classify(&self, line: &str) -> Option<AlarmLevel> {
        if ERROR_PATTERN.is_match(line) {
            Some(AlarmLevel::Error)
        } else if WARNING_PATTERN.is_match(line) {
            Some(AlarmLevel::Warning)
        } else if SUCCESS_PATTERN.is_match(line) {
            Some(AlarmLevel::Success)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let c = AlarmClassifier::new();
        assert_eq!(c.classify("GPS FAULT detected"), Some(AlarmLevel::Error));
        assert_eq!(c.classify("Warning: low battery"), Some(AlarmLevel::Warning));
        assert_eq!(c.classify("warn temp"), Some(AlarmLevel::Warning));
        assert_eq!(c.classify("Self test passed"), Some(AlarmLevel::Success));
        assert_eq!(c.classify("ALT 120"), None);
    }

    #[test]
    fn test_error_takes_priority() {
        let c = AlarmClassifier::new();
        assert_eq!(c.classify("OK after warning, then failure"), Some(AlarmLevel::Error));
        assert_eq!(c.classify("caution: link ok"), Some(AlarmLevel::Warning));
    }

    #[test]
    fn test_word_boundaries() {
        let c = AlarmClassifier::new();
        assert_eq!(c.classify("errorless run"), None);
        assert_eq!(c.classify("token okra"), None);
        assert_eq!(c.classify("forewarned"), None);
    }
}
