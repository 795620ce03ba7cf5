//! Parsing and rendering of user-facing amounts, dates and instants.
//!
//! Amounts are stored in minor units; the CLI reads and prints them with two decimals.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use circle_core::{time::start_of_day, MAX_AMOUNT};

use crate::errors::CliError;

const MINOR_UNITS: i64 = 100;

/// Parses `12`, `12.3` or `-12.34` into minor units, up to [`MAX_AMOUNT`] in magnitude.
pub fn parse_amount(raw: &str) -> Result<i64, CliError> {
    let invalid = || CliError::input(format!("invalid amount `{raw}`"));
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > 2 || !fraction.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };
    let magnitude = whole
        .checked_mul(MINOR_UNITS)
        .and_then(|value| value.checked_add(cents))
        .ok_or_else(invalid)?;
    if magnitude > MAX_AMOUNT {
        return Err(CliError::input(format!(
            "amount `{raw}` exceeds the limit of {}",
            format_amount(MAX_AMOUNT)
        )));
    }
    Ok(if negative { -magnitude } else { magnitude })
}

/// Renders minor units as `-1 234.56`.
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let magnitude = minor.unsigned_abs();
    let whole = (magnitude / MINOR_UNITS as u64).to_string();
    let cents = magnitude % MINOR_UNITS as u64;

    let mut grouped = String::new();
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{cents:02}")
}

pub fn format_money(minor: i64, currency: &str) -> String {
    format!("{} {}", format_amount(minor), currency)
}

/// Same as [`format_amount`] with an explicit `+` for positive values.
pub fn format_signed(minor: i64) -> String {
    if minor > 0 {
        format!("+{}", format_amount(minor))
    } else {
        format_amount(minor)
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::input(format!("invalid date `{raw}`; expected YYYY-MM-DD")))
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (UTC) or a bare date (start of day, UTC).
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }
    Err(CliError::input(format!(
        "invalid time `{raw}`; expected RFC 3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD"
    )))
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_parse_into_minor_units() {
        assert_eq!(parse_amount("12").unwrap(), 1_200);
        assert_eq!(parse_amount("12.3").unwrap(), 1_230);
        assert_eq!(parse_amount("-0.05").unwrap(), -5);
        assert_eq!(parse_amount(".5").unwrap(), 50);
        assert!(parse_amount("1.234").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-").is_err());
    }

    #[test]
    fn amounts_above_the_ledger_limit_are_refused() {
        assert_eq!(parse_amount("10000000000000").unwrap(), MAX_AMOUNT);
        assert_eq!(parse_amount("-10000000000000").unwrap(), -MAX_AMOUNT);
        assert!(matches!(
            parse_amount("10000000000000.01"),
            Err(CliError::Input(message)) if message.contains("exceeds the limit")
        ));
        assert!(parse_amount("50000000000000000").is_err());
    }

    #[test]
    fn amounts_render_with_grouping() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(-5), "-0.05");
        assert_eq!(format_amount(123_456_789), "1 234 567.89");
        assert_eq!(format_signed(250), "+2.50");
        assert_eq!(format_money(1_000, "EUR"), "10.00 EUR");
    }

    #[test]
    fn instants_accept_several_shapes() {
        let date_only = parse_instant("2024-03-01").unwrap();
        assert_eq!(format_instant(date_only), "2024-03-01T00:00:00Z");
        let minutes = parse_instant("2024-03-01T08:30").unwrap();
        assert_eq!(format_instant(minutes), "2024-03-01T08:30:00Z");
        let offset = parse_instant("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(format_instant(offset), "2024-03-01T08:00:00Z");
        assert!(parse_instant("yesterday").is_err());
    }
}
