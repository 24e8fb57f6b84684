//! k6 duration strings (`30s`, `1m30s`, `500ms`, `2h`)

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)?(?:ms|us|µs|s|m|h))+$").expect("duration pattern is valid")
});

/// Check whether a string is a duration the runner will accept
pub fn is_valid_duration(value: &str) -> bool {
    DURATION_RE.is_match(value.trim())
}
