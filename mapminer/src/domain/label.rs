//! Parsers for the free-form labels Maps renders around a place.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static STAR_RATING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d.]+)\s*star").unwrap());
static REVIEW_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d,]+)\s+review").unwrap());
static LEADING_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d.]+").unwrap());
static LEADING_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,]+").unwrap());
static PHONE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d\s()+-]+").unwrap());

const MIN_PHONE_LEN: usize = 7;

/// "4.5 stars 1,234 Reviews" -> 4.5
pub fn star_rating(label: &str) -> Option<f64> {
    STAR_RATING
        .captures(label)
        .and_then(|caps| caps[1].parse().ok())
}

/// "4.5 stars 1,234 Reviews" -> 1234
pub fn review_count(label: &str) -> Option<u32> {
    REVIEW_COUNT
        .captures(label)
        .and_then(|caps| parse_grouped_integer(&caps[1]))
}

pub fn leading_decimal(text: &str) -> Option<f64> {
    LEADING_DECIMAL
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

pub fn leading_integer(text: &str) -> Option<u32> {
    LEADING_INTEGER
        .find(text)
        .and_then(|m| parse_grouped_integer(m.as_str()))
}

fn parse_grouped_integer(digits: &str) -> Option<u32> {
    digits.replace(',', "").parse().ok()
}

/// Longest run of phone characters holding a digit, accepted when at least seven long.
pub fn phone_number(text: &str) -> Option<String> {
    PHONE_RUN
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|run| run.chars().any(|c| c.is_ascii_digit()))
        .max_by_key(|run| run.len())
        .filter(|run| run.len() >= MIN_PHONE_LEN)
        .map(str::to_string)
}

/// Unwraps Google's `/url?...&url=<target>` redirect links.
pub fn unwrap_redirect(href: &Url) -> String {
    href.query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| href.to_string())
}
