//! Named format predicates for the `format` keyword.
//!
//! A format is a name plus an optional predicate over a JSON value. The
//! built-in predicates are deterministic string checks; non-string
//! instances always pass, and any predicate failure means "not matching",
//! never a crash. Registration is process-wide and last-writer-wins.

use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, RwLock};
use url::Url;
use uuid::Uuid;

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named format: a predicate, or a pure annotation when `predicate` is
/// `None` (the `regex` format is such an assertion-only placeholder).
#[derive(Clone)]
pub struct Format {
    name: String,
    predicate: Option<Predicate>,
}

impl Format {
    pub fn new<F>(name: &str, predicate: F) -> Format
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Format {
            name: name.to_owned(),
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn annotation_only(name: &str) -> Format {
        Format {
            name: name.to_owned(),
            predicate: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the predicate. Formats without one, and non-string coverage
    /// decisions, are the caller's concern; this only runs the check.
    pub fn check(&self, value: &Value) -> bool {
        match self.predicate {
            Some(ref predicate) => predicate(value),
            None => true,
        }
    }

    pub fn asserts(&self) -> bool {
        self.predicate.is_some()
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, Format>> = RwLock::new(builtin_formats());
}

/// Register a format process-wide. Names are case-sensitive; registering an
/// existing name replaces it.
pub fn register(format: Format) {
    let mut registry = REGISTRY.write().expect("format registry poisoned");
    registry.insert(format.name.clone(), format);
}

/// Look up a format by its exact name.
pub fn lookup(name: &str) -> Option<Format> {
    let registry = REGISTRY.read().expect("format registry poisoned");
    registry.get(name).cloned()
}

fn string_format<F>(name: &str, check: F) -> (String, Format)
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let format = Format::new(name, move |value: &Value| match value.as_str() {
        Some(s) => check(s),
        None => true,
    });
    (name.to_owned(), format)
}

fn builtin_formats() -> HashMap<String, Format> {
    let mut formats: HashMap<String, Format> = [
        string_format("date", is_date),
        string_format("date-time", |s| DateTime::parse_from_rfc3339(s).is_ok()),
        string_format("time", is_time),
        string_format("duration", is_duration),
        string_format("email", is_email),
        string_format("idn-email", is_idn_email),
        string_format("hostname", is_hostname),
        string_format("idn-hostname", is_idn_hostname),
        string_format("ipv4", |s| s.parse::<Ipv4Addr>().is_ok()),
        string_format("ipv6", |s| s.parse::<Ipv6Addr>().is_ok()),
        string_format("uri", |s| s.is_ascii() && Url::parse(s).is_ok()),
        string_format("uri-reference", |s| s.is_ascii() && is_iri_reference(s)),
        string_format("iri", |s| Url::parse(s).is_ok()),
        string_format("iri-reference", is_iri_reference),
        string_format("uri-template", is_uri_template),
        string_format("uuid", is_uuid),
        string_format("json-pointer", |s| {
            crate::pointer::Pointer::parse(s).is_ok()
        }),
        string_format("relative-json-pointer", |s| {
            crate::pointer::RelativePointer::parse(s).is_ok()
        }),
    ]
    .into_iter()
    .collect();

    formats.insert("regex".to_owned(), Format::annotation_only("regex"));
    formats
}

lazy_static! {
    static ref DATE_SHAPE: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex");
    static ref EMAIL: Regex =
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[^@\s]+$").expect("static regex");
    static ref HOSTNAME: Regex = Regex::new(
        r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.?$"
    )
    .expect("static regex");
    static ref UUID_SHAPE: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .expect("static regex");
    static ref URI_TEMPLATE: Regex = Regex::new(
        r#"^([^\x00-\x20"'<>%\\^`{|}\x7f]|%[0-9A-Fa-f]{2}|\{[+#./;?&=,!@|]?[A-Za-z0-9_%.]+(:[0-9]+|\*)?(,[A-Za-z0-9_%.]+(:[0-9]+|\*)?)*\})*$"#
    )
    .expect("static regex");
}

fn is_date(s: &str) -> bool {
    DATE_SHAPE.is_match(s) && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_time(s: &str) -> bool {
    // RFC 3339 full-time, checked by grafting it onto a fixed date.
    let mut candidate = String::with_capacity(11 + s.len());
    candidate.push_str("1970-01-01T");
    candidate.push_str(s);
    DateTime::parse_from_rfc3339(&candidate).is_ok()
}

/// ISO 8601 duration. The `regex` crate has no lookahead, so the "P alone
/// is not a duration" and "T needs a component" rules are easier to state
/// directly.
fn is_duration(s: &str) -> bool {
    let mut rest = match s.strip_prefix('P') {
        Some(rest) => rest,
        None => return false,
    };

    if rest.is_empty() {
        return false;
    }

    fn take_component<'a>(rest: &'a str, units: &[char]) -> Option<(&'a str, char)> {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let unit = rest[digits..].chars().next()?;
        if units.contains(&unit) {
            Some((&rest[digits + unit.len_utf8()..], unit))
        } else {
            None
        }
    }

    // Date side: Y, M, W, D in order.
    let mut date_units: &[char] = &['Y', 'M', 'W', 'D'];
    let mut any_date = false;
    while let Some((next, unit)) = take_component(rest, date_units) {
        rest = next;
        any_date = true;
        let at = date_units.iter().position(|&u| u == unit).unwrap_or(0);
        date_units = &date_units[at + 1..];
    }

    if rest.is_empty() {
        return any_date;
    }

    // Time side: T then H, M, S in order, where S may carry a fraction.
    rest = match rest.strip_prefix('T') {
        Some(rest) => rest,
        None => return false,
    };

    let mut time_units: &[char] = &['H', 'M', 'S'];
    let mut any_time = false;
    while let Some((next, unit)) = take_component(rest, time_units) {
        rest = next;
        any_time = true;
        let at = time_units.iter().position(|&u| u == unit).unwrap_or(0);
        time_units = &time_units[at + 1..];
    }

    // A fractional seconds component is the one remaining legal shape.
    if !rest.is_empty() && time_units.contains(&'S') {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && rest[digits..].starts_with('.') {
            let frac = rest[digits + 1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if frac > 0 && &rest[digits + 1 + frac..] == "S" {
                return true;
            }
        }
        return false;
    }

    rest.is_empty() && any_time
}

fn is_email(s: &str) -> bool {
    match EMAIL.find(s) {
        Some(m) if m.as_str().len() == s.len() => {}
        _ => return false,
    }

    match s.rsplit_once('@') {
        Some((_, domain)) => is_hostname(domain) || domain.parse::<Ipv4Addr>().is_ok(),
        None => false,
    }
}

fn is_idn_email(s: &str) -> bool {
    match s.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !local.contains(char::is_whitespace) && is_idn_hostname(domain)
        }
        None => false,
    }
}

fn is_hostname(s: &str) -> bool {
    s.len() <= 253 && HOSTNAME.is_match(s)
}

fn is_idn_hostname(s: &str) -> bool {
    if s.is_empty() || s.chars().count() > 253 {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.chars().count() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c == '-' || c.is_alphanumeric())
    })
}

fn is_iri_reference(s: &str) -> bool {
    if Url::parse(s).is_ok() {
        return true;
    }

    // Relative references resolve against a throwaway base.
    lazy_static! {
        static ref DUMMY_BASE: Url =
            Url::parse("thismessage:/base").expect("static url");
    }
    !s.contains(char::is_whitespace) && DUMMY_BASE.join(s).is_ok()
}

fn is_uri_template(s: &str) -> bool {
    match URI_TEMPLATE.find(s) {
        Some(m) => m.as_str().len() == s.len(),
        None => false,
    }
}

fn is_uuid(s: &str) -> bool {
    UUID_SHAPE.is_match(s) && Uuid::parse_str(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(name: &str, value: &str) -> bool {
        lookup(name).unwrap().check(&json!(value))
    }

    #[test]
    fn dates_and_times() {
        assert!(check("date", "2026-08-02"));
        assert!(!check("date", "2026-13-02"));
        assert!(!check("date", "2026-8-2"));
        assert!(check("date-time", "2026-08-02T10:30:00Z"));
        assert!(check("date-time", "2026-08-02T10:30:00.5+02:00"));
        assert!(!check("date-time", "2026-08-02 10:30:00Z"));
        assert!(check("time", "10:30:00Z"));
        assert!(check("time", "10:30:00+01:00"));
        assert!(!check("time", "25:30:00Z"));
    }

    #[test]
    fn durations() {
        assert!(check("duration", "P1Y2M3DT4H5M6S"));
        assert!(check("duration", "P3W"));
        assert!(check("duration", "PT0.5S"));
        assert!(check("duration", "PT1H30M"));
        assert!(!check("duration", "P"));
        assert!(!check("duration", "PT"));
        assert!(!check("duration", "P1S"));
        assert!(!check("duration", "1Y"));
    }

    #[test]
    fn network_shapes() {
        assert!(check("email", "user.name+tag@example.com"));
        assert!(!check("email", "not an email"));
        assert!(check("hostname", "example.com"));
        assert!(!check("hostname", "-leading.example.com"));
        assert!(check("idn-hostname", "bücher.example"));
        assert!(check("ipv4", "192.168.0.1"));
        assert!(!check("ipv4", "256.1.1.1"));
        assert!(check("ipv6", "::1"));
        assert!(!check("ipv6", "12345::"));
    }

    #[test]
    fn uris_and_ids() {
        assert!(check("uri", "https://example.com/a?b=c"));
        assert!(!check("uri", "/relative/only"));
        assert!(check("uri-reference", "/relative/only"));
        assert!(check("iri", "https://example.com/büro"));
        assert!(check("uri-template", "https://example.com/{user}/items{?limit}"));
        assert!(!check("uri-template", "https://example.com/{unclosed"));
        assert!(check("uuid", "123e4567-e89b-12d3-a456-426614174000"));
        assert!(!check("uuid", "not-a-uuid"));
        assert!(!check("uuid", "123e4567e89b12d3a456426614174000"));
        assert!(check("json-pointer", "/a/b~0c"));
        assert!(!check("json-pointer", "a/b"));
        assert!(check("relative-json-pointer", "1/a"));
    }

    #[test]
    fn non_strings_pass() {
        assert!(lookup("uuid").unwrap().check(&json!(42)));
        assert!(lookup("date").unwrap().check(&json!(null)));
    }

    #[test]
    fn registration_overrides() {
        register(Format::new("x-even-length", |value| match value.as_str() {
            Some(s) => s.len() % 2 == 0,
            None => true,
        }));
        assert!(check("x-even-length", "ab"));
        assert!(!check("x-even-length", "abc"));

        assert!(lookup("regex").is_some());
        assert!(!lookup("regex").unwrap().asserts());
        assert!(lookup("no-such-format").is_none());
    }
}
