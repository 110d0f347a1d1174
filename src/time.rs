//! Derives timestamps from path or CLI tokens.
//!
//! Mirrors the "default heuristic + named extractor registry" design of
//! spec.md §4.1: a string is reduced to time-like tokens by splitting on a
//! separator set, the tokens are fed to a lenient date parser, and a small
//! registry of format-specific functions (currently just `bluecoat`) can be
//! selected by name instead.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tokens that look purely time-like: digits, colons, dashes.
static TIME_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9:-]+$").unwrap());

/// Split on `/`, `.`, `_`, whitespace (always), and `-` only when adjacent
/// to a letter on either side (so `2014-01-01` keeps its dashes, but
/// `proxy-s1` splits into `proxy` and `s1`). The `regex` crate has no
/// lookaround, so this is a small hand-rolled scan instead of one pattern.
fn split_tokens(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut tokens = Vec::new();
    let mut start = None;

    let is_hard_sep = |b: u8| matches!(b, b'/' | b'.' | b'_') || (b as char).is_whitespace();
    let is_letter = |b: u8| (b as char).is_ascii_alphabetic();

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let split_here = if is_hard_sep(b) {
            true
        } else if b == b'-' {
            let left_letter = i > 0 && is_letter(bytes[i - 1]);
            let right_letter = i + 1 < bytes.len() && is_letter(bytes[i + 1]);
            left_letter || right_letter
        } else {
            false
        };

        if split_here {
            if let Some(st) = start.take() {
                tokens.push(&s[st..i]);
            }
            i += 1;
            continue;
        }

        if start.is_none() {
            start = Some(i);
        }
        i += 1;
    }
    if let Some(st) = start {
        tokens.push(&s[st..]);
    }
    tokens
}

/// Local-timezone-aware point in time, stored with microsecond resolution.
pub type Timestamp = chrono::DateTime<Local>;

/// Convert a local timestamp to epoch seconds (float), for index persistence.
pub fn to_epoch(ts: Timestamp) -> f64 {
    let secs = ts.timestamp();
    let nanos = ts.timestamp_subsec_nanos();
    secs as f64 + nanos as f64 / 1_000_000_000.0
}

/// Convert epoch seconds back into a local timestamp.
pub fn from_epoch(epoch: f64) -> Timestamp {
    let secs = epoch.floor() as i64;
    let nanos = ((epoch - secs as f64) * 1_000_000_000.0).round() as u32;
    Local
        .timestamp_opt(secs, nanos)
        .single()
        .unwrap_or_else(|| Local.timestamp_opt(secs, 0).single().unwrap())
}

/// Split a string into the non-time-like tokens (used as the path-key by
/// the fuzzy resolver, spec.md §4.3).
pub fn non_time_tokens(s: &str) -> String {
    split_tokens(s)
        .into_iter()
        .filter(|tok| !tok.is_empty() && !TIME_TOKEN.is_match(tok))
        .collect::<Vec<_>>()
        .join("")
}

/// Split a string into its time-like tokens, in order.
fn time_tokens(s: &str) -> Vec<&str> {
    split_tokens(s)
        .into_iter()
        .filter(|tok| !tok.is_empty() && TIME_TOKEN.is_match(tok))
        .collect()
}

/// Extract a timestamp from a string, using either the default heuristic
/// or a named extractor. Never panics; returns `None` on any failure so
/// callers can skip the file (spec.md §4.1 "Failure").
pub fn extract(s: &str, extractor_name: Option<&str>) -> Option<Timestamp> {
    match extractor_name {
        None => default_extract(s),
        Some(name) => extractors::lookup(name)?(s),
    }
}

/// Parse a CLI-supplied interval bound using the default heuristic (the
/// same parser used for untagged path tokens, per spec.md §9 "ambiguous
/// CLI timestamps are parser-dependent").
pub fn time_bound(s: &str) -> Option<Timestamp> {
    default_extract(s)
}

/// Whether `name` names a known extractor (including the implicit default).
pub fn is_known_extractor(name: &str) -> bool {
    extractors::lookup(name).is_some()
}

fn default_extract(s: &str) -> Option<Timestamp> {
    if let Some(rest) = s.strip_prefix('@') {
        if let Ok(epoch) = rest.parse::<f64>() {
            return Some(normalize(from_epoch(epoch)));
        }
    }

    let tokens = time_tokens(s);
    if tokens.is_empty() {
        return None;
    }

    let joined = tokens.join(" ");
    if let Some(naive) = fuzzy_parse(&joined) {
        if let Some(ts) = Local.from_local_datetime(&naive).single() {
            return Some(normalize(ts));
        }
    }

    // Fallback: first two tokens joined by '.' as epoch seconds.
    if tokens.len() >= 2 {
        let candidate = format!("{}.{}", tokens[0], tokens[1]);
        if let Ok(epoch) = candidate.parse::<f64>() {
            return Some(normalize(from_epoch(epoch)));
        }
    }

    None
}

/// A lenient attempt at a handful of common log-filename date/time layouts.
/// Equivalent to a "fuzzy mode" date parser whose default-fill is the
/// minimum representable timestamp: if nothing usable is found, parsing
/// fails rather than returning year 1 (spec.md §4.1).
fn fuzzy_parse(joined: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y%m%d%H%M%S",
        "%Y%m%d %H%M%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y%m%d",
        "%Y-%m-%d",
        "%Y %m %d",
    ];

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(joined, fmt) {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(joined, fmt) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    // Last resort: an 8-digit date with no separators followed by arbitrary
    // trailing digits read as HHMMSS-prefix.
    let digits: String = joined.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 8 {
        if let Ok(date) = NaiveDate::parse_from_str(&digits[..8], "%Y%m%d") {
            if date.year() == 1 {
                return None;
            }
            let time = if digits.len() >= 14 {
                NaiveTime::parse_from_str(&digits[8..14], "%H%M%S").ok()
            } else {
                None
            };
            return Some(date.and_time(time.unwrap_or(NaiveTime::MIN)));
        }
    }

    None
}

fn normalize(ts: Timestamp) -> Timestamp {
    ts.with_timezone(&Local)
}

/// Named format-specific extractors.
pub mod extractors {
    use super::Timestamp;
    use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
    use regex::Regex;
    use std::path::Path;

    pub type ExtractorFn = fn(&str) -> Option<Timestamp>;

    /// Look up a named extractor function.
    pub fn lookup(name: &str) -> Option<ExtractorFn> {
        match name {
            "bluecoat" => Some(bluecoat as ExtractorFn),
            _ => None,
        }
    }

    /// All known extractor names with a one-line description, for `listx`.
    pub fn descriptions() -> Vec<(&'static str, &'static str)> {
        vec![(
            "bluecoat",
            "Blue Coat proxy log naming: year from directory, last 10 digits of basename",
        )]
    }

    /// Blue Coat proxy logs look like
    /// `bluecoat/2014/01/31/blueone/SG_main__60131080000.log.gz`: a 4-digit
    /// year appears somewhere in the directory chain, and the basename stem
    /// ends in a 10-digit `MMDDHHMMSS`-ish run. Concatenate year + those 10
    /// digits and parse as `%Y%m%d%H%M%S`.
    fn bluecoat(path: &str) -> Option<Timestamp> {
        let year_re = Regex::new(r"^(19|20)\d{2}$").unwrap();
        let year = Path::new(path)
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .find(|part| year_re.is_match(part))?;

        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        // Strip a further extension if the stem still carries one, e.g.
        // "SG_main__60131080000.log" -> "SG_main__60131080000".
        let stem = Path::new(stem)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(stem);

        let digits: String = stem.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 10 {
            return None;
        }
        let last10 = &digits[digits.len() - 10..];

        let combined = format!("{year}{last10}");
        let naive = NaiveDateTime::parse_from_str(&combined, "%Y%m%d%H%M%S")
            .or_else(|_| {
                NaiveDate::parse_from_str(&combined[..8], "%Y%m%d")
                    .map(|d| d.and_time(chrono::NaiveTime::MIN))
            })
            .ok()?;

        Local.from_local_datetime(&naive).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_shortcut() {
        let ts = extract("@1000000000", None).unwrap();
        assert_eq!(to_epoch(ts).round(), 1_000_000_000.0);
    }

    #[test]
    fn test_epoch_roundtrip_tolerance() {
        let ts = from_epoch(1_700_000_000.123_456);
        let back = to_epoch(ts);
        assert!((back - 1_700_000_000.123_456).abs() < 1e-3);
    }

    #[test]
    fn test_default_heuristic_basic_date() {
        let ts = extract("squid.20140101.gz", None).unwrap();
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "2014-01-01");
    }

    #[test]
    fn test_default_heuristic_no_timestamp() {
        assert!(extract("readme.txt", None).is_none());
    }

    #[test]
    fn test_non_time_tokens_path_key() {
        let a = non_time_tokens("/data/proxy-s1/squid.20140101.gz");
        let b = non_time_tokens("/data/proxy-s2/squid.20140101.gz");
        assert_ne!(a, b);
    }

    #[test]
    fn test_bluecoat_extractor() {
        let path = "bluecoat/2014/01/31/blueone/SG_main__60131080000.log.gz";
        let ts = extract(path, Some("bluecoat")).unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2014-01-31 08:00:00");
    }

    #[test]
    fn test_unknown_extractor_name() {
        assert!(!is_known_extractor("no-such-format"));
        assert!(is_known_extractor("bluecoat"));
    }
}
