//! Instrument date patterns and time zones
//!
//! Logger software describes its dates with letter patterns such as
//! `dd/MM/yy HH:mm:ss`. [`DatePattern`] turns those into chrono format
//! strings once and parses with them.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A letter date pattern and its chrono translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    pattern: String,
    chrono: String,
    has_time: bool,
}

impl DatePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let chrono = translate(&pattern);
        let has_time = pattern.chars().any(|c| matches!(c, 'H' | 'h' | 'm' | 's'));
        Self {
            pattern,
            chrono,
            has_time,
        }
    }

    /// The pattern as written in files
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The equivalent chrono format string
    pub fn chrono_format(&self) -> &str {
        &self.chrono
    }

    /// Parse a local date. Date-only patterns yield midnight.
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        if self.has_time {
            NaiveDateTime::parse_from_str(text, &self.chrono).ok()
        } else {
            NaiveDate::parse_from_str(text, &self.chrono)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        }
    }

    pub fn format(&self, date: &NaiveDateTime) -> String {
        date.format(&self.chrono).to_string()
    }
}

impl fmt::Display for DatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // '' is a literal quote, 'text' is literal text
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let mut j = i + 1;
            while j < chars.len() && chars[j] != '\'' {
                push_literal(&mut out, chars[j]);
                j += 1;
            }
            i = j + 1;
            continue;
        }

        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        let spec = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1 | 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', _) => Some("%d"),
            ('H', _) => Some("%H"),
            ('h', _) => Some("%I"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            ('S', 3) => Some("%3f"),
            ('S', 6) => Some("%6f"),
            ('S', _) => Some("%f"),
            ('a', _) => Some("%p"),
            ('E', 1..=3) => Some("%a"),
            ('E', _) => Some("%A"),
            ('Z' | 'X' | 'x', _) => Some("%z"),
            _ => None,
        };
        match spec {
            Some(spec) => out.push_str(spec),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }
    out
}

/// Time zone in which an instrument recorded its local dates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Zone {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    /// `UTC`, `GMT`, `GMT+02:00`, `+0100` or an IANA name such as `Europe/Paris`
    pub fn parse(text: &str) -> Option<Zone> {
        let text = text.trim();
        match text.to_ascii_uppercase().as_str() {
            "" | "UTC" | "GMT" | "Z" => return Some(Zone::Utc),
            _ => {}
        }
        let offset = text
            .strip_prefix("GMT")
            .or_else(|| text.strip_prefix("UTC"))
            .unwrap_or(text);
        if offset.starts_with('+') || offset.starts_with('-') {
            return parse_offset(offset).map(Zone::Fixed);
        }
        text.parse::<Tz>().ok().map(Zone::Named)
    }

    /// Zone announced by a column header such as `Date Heure, GMT+02:00`
    pub fn from_header(header: &str) -> Option<Zone> {
        let start = header.find("GMT").or_else(|| header.find("UTC"))? + 3;
        let offset: String = header[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ':'))
            .collect();
        if offset.is_empty() {
            Some(Zone::Utc)
        } else {
            parse_offset(&offset).map(Zone::Fixed)
        }
    }

    /// Instant of a local date in this zone; ambiguous dates take the earliest instant
    pub fn to_utc(&self, local: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::Utc => Some(Utc.from_utc_datetime(local)),
            Zone::Fixed(offset) => offset
                .from_local_datetime(local)
                .single()
                .map(|d| d.with_timezone(&Utc)),
            Zone::Named(tz) => tz
                .from_local_datetime(local)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Utc => write!(f, "UTC"),
            Zone::Fixed(offset) => write!(f, "GMT{}", offset),
            Zone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// `+02:00`, `-0530`, `+2`
fn parse_offset(text: &str) -> Option<FixedOffset> {
    let sign = match text.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let body = &text[1..];
    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if body.len() <= 2 => (body.parse::<i32>().ok()?, 0),
        None if body.len() == 4 => (body[..2].parse::<i32>().ok()?, body[2..].parse::<i32>().ok()?),
        None => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation() {
        assert_eq!(DatePattern::new("dd/MM/yyyy HH:mm:ss").chrono_format(), "%d/%m/%Y %H:%M:%S");
        assert_eq!(DatePattern::new("MM/dd/yy hh:mm:ss a").chrono_format(), "%m/%d/%y %I:%M:%S %p");
        assert_eq!(DatePattern::new("yyyy-MM-dd'T'HH:mm").chrono_format(), "%Y-%m-%dT%H:%M");
        assert_eq!(DatePattern::new("HH:mm:ss.SSS").chrono_format(), "%H:%M:%S.%3f");
    }

    #[test]
    fn test_parse_hobo_dates() {
        let european = DatePattern::new("dd/MM/yy HH:mm:ss");
        let parsed = european.parse("13/02/20 14:30:00").unwrap();
        assert_eq!(parsed.to_string(), "2020-02-13 14:30:00");

        let american = DatePattern::new("MM/dd/yy hh:mm:ss a");
        let parsed = american.parse("02/13/20 02:30:00 PM").unwrap();
        assert_eq!(parsed.to_string(), "2020-02-13 14:30:00");
        assert!(european.parse("02/13/20 02:30:00 PM").is_none());
    }

    #[test]
    fn test_date_only_pattern() {
        let daily = DatePattern::new("yyyy-MM-dd");
        assert_eq!(daily.parse("2019-07-01").unwrap().to_string(), "2019-07-01 00:00:00");
    }

    #[test]
    fn test_format() {
        let pattern = DatePattern::new("dd/MM/yyyy HH:mm:ss");
        let date = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap().and_hms_opt(5, 6, 7).unwrap();
        assert_eq!(pattern.format(&date), "04/03/2021 05:06:07");
        assert_eq!(pattern.parse(&pattern.format(&date)), Some(date));
    }

    #[test]
    fn test_zones() {
        assert_eq!(Zone::parse("UTC"), Some(Zone::Utc));
        assert_eq!(
            Zone::parse("GMT+02:00"),
            Some(Zone::Fixed(FixedOffset::east_opt(7200).unwrap()))
        );
        assert_eq!(
            Zone::parse("-0530"),
            Some(Zone::Fixed(FixedOffset::west_opt(19800).unwrap()))
        );
        assert_eq!(Zone::parse("Europe/Paris"), Some(Zone::Named(chrono_tz::Europe::Paris)));
        assert_eq!(Zone::parse("Somewhere/Else"), None);
    }

    #[test]
    fn test_zone_from_header() {
        let zone = Zone::from_header("Date Heure, GMT+01:00").unwrap();
        let local = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(zone.to_utc(&local).unwrap().to_rfc3339(), "2020-01-01T11:00:00+00:00");
        assert_eq!(Zone::from_header("Time, GMT"), Some(Zone::Utc));
        assert_eq!(Zone::from_header("Date"), None);
    }

    #[test]
    fn test_zone_display_reparses() {
        let zone = Zone::parse("GMT-03:00").unwrap();
        assert_eq!(zone.to_string(), "GMT-03:00");
        assert_eq!(Zone::parse(&zone.to_string()), Some(zone));
    }
}
