// src/timeparse.rs
// Publish dates arrive in whatever format the feed felt like emitting.
// Parse lazily and defensively; anything unparseable sorts as epoch zero.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an RSS/Atom publish date. RFC 2822 is the RSS convention, RFC 3339
/// shows up in Atom-flavored feeds.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Unparseable timestamps sort as the oldest possible item.
pub fn published_or_epoch(raw: &str) -> DateTime<Utc> {
    parse_pub_date(raw).unwrap_or(DateTime::UNIX_EPOCH)
}

/// ISO-8601 UTC with second precision, the ledger's timestamp format.
pub fn iso_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_iso_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc2822_and_rfc3339() {
        let a = parse_pub_date("Tue, 09 Jan 2024 22:00:00 GMT").unwrap();
        assert_eq!(a, Utc.with_ymd_and_hms(2024, 1, 9, 22, 0, 0).unwrap());
        let b = parse_pub_date("2024-01-09T22:00:00+02:00").unwrap();
        assert_eq!(b, Utc.with_ymd_and_hms(2024, 1, 9, 20, 0, 0).unwrap());
    }

    #[test]
    fn garbage_falls_back_to_epoch() {
        assert!(parse_pub_date("").is_none());
        assert!(parse_pub_date("next tuesday").is_none());
        assert_eq!(published_or_epoch("not a date"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn iso_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 6, 7, 8).unwrap();
        let s = iso_utc(dt);
        assert_eq!(s, "2024-03-05T06:07:08Z");
        assert_eq!(parse_iso_utc(&s).unwrap(), dt);
    }
}
