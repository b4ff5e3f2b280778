//! Reference strings (`ref(name)`) and the inline `column()` / `query()`
//! markers embedded in trace props and filters.

pub mod markers;

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ReferenceError;

/// Pattern every reference string must match in full.
pub const REF_PATTERN: &str = r"^ref\(([^()[:cntrl:]]+)\)$";

fn ref_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(REF_PATTERN).expect("reference regex should compile"))
}

#[must_use]
pub fn is_reference(value: &str) -> bool {
    ref_regex().is_match(value)
}

/// Returns the name inside `ref(<name>)`.
pub fn extract_name(value: &str) -> Result<&str, ReferenceError> {
    ref_regex()
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
        .ok_or_else(|| ReferenceError::Malformed {
            value: value.to_string(),
        })
}

#[must_use]
pub fn format_reference(name: &str) -> String {
    format!("ref({name})")
}
