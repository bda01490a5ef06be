//! `format` keyword checks for a baseline set of well-known formats:
//! `date`, `date-time`, `time`, `duration`, `email`, `hostname`, `ipv4`,
//! `ipv6`, `uri`, `uri-reference`, `uuid`, `regex`. Unrecognized format
//! names are ignored, so [`check`] returns `None` rather than `Some(false)`
//! for them.

use lazy_static::lazy_static;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref DATE_TIME_RE: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$").unwrap();
    static ref DURATION_RE: Regex = Regex::new(r"^P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+S)?)?$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref HOSTNAME_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
            .unwrap();
    static ref URI_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:.+$").unwrap();
    static ref URI_REFERENCE_RE: Regex = Regex::new(r"^[^\s]*$").unwrap();
}

/// Check `value` against the named format. `None` means the format name is
/// not recognized and the keyword should be treated as a no-op.
pub fn check(format_name: &str, value: &str) -> Option<bool> {
    Some(match format_name {
        "date" => DATE_RE.is_match(value) && is_plausible_date(value),
        "time" => TIME_RE.is_match(value),
        "date-time" => DATE_TIME_RE.is_match(value),
        "duration" => value != "P" && DURATION_RE.is_match(value),
        "email" => EMAIL_RE.is_match(value),
        "hostname" => value.len() <= 253 && HOSTNAME_RE.is_match(value),
        "ipv4" => Ipv4Addr::from_str(value).is_ok() && !value.contains(':'),
        "ipv6" => Ipv6Addr::from_str(value).is_ok(),
        "uri" => URI_RE.is_match(value),
        "uri-reference" => URI_REFERENCE_RE.is_match(value),
        "uuid" => uuid::Uuid::parse_str(value).is_ok(),
        "regex" => Regex::new(value).is_ok(),
        _ => return None,
    })
}

fn is_plausible_date(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 3 {
        return false;
    }
    let (Ok(month), Ok(day)) = (parts[1].parse::<u32>(), parts[2].parse::<u32>()) else {
        return false;
    };
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_valid_and_invalid_uuids() {
        assert_eq!(check("uuid", "550e8400-e29b-41d4-a716-446655440000"), Some(true));
        assert_eq!(check("uuid", "not-a-uuid"), Some(false));
    }

    #[test]
    fn recognizes_valid_and_invalid_emails() {
        assert_eq!(check("email", "a@example.com"), Some(true));
        assert_eq!(check("email", "not-an-email"), Some(false));
    }

    #[test]
    fn recognizes_ipv4_and_ipv6() {
        assert_eq!(check("ipv4", "127.0.0.1"), Some(true));
        assert_eq!(check("ipv4", "::1"), Some(false));
        assert_eq!(check("ipv6", "::1"), Some(true));
    }

    #[test]
    fn rejects_implausible_dates() {
        assert_eq!(check("date", "2024-13-40"), Some(false));
        assert_eq!(check("date", "2024-02-28"), Some(true));
    }

    #[test]
    fn unknown_format_is_ignored() {
        assert_eq!(check("made-up-format", "anything"), None);
    }
}
