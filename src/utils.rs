/// Utility functions for parsing and formatting
use std::time::Duration;
use time::{macros::format_description, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Parse a duration written as a sequence of `<number><unit>` pairs
///
/// Accepts the units `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`, e.g.
/// `30s`, `1m30s`, `500ms`. Fractions such as `1.5m` are allowed. The
/// result must be strictly positive and fit in a `u64` of nanoseconds.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }

    let mut total_nanos = 0.0_f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{}'", input))?;
        if number_len == 0 {
            return Err(format!("expected a number in duration '{}'", input));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };
        rest = &rest[unit_len..];

        total_nanos += value * nanos_per_unit;
    }

    let total_nanos = total_nanos.round();
    if !total_nanos.is_finite() || total_nanos >= u64::MAX as f64 {
        return Err(format!("duration '{}' is out of range", input));
    }
    let interval = Duration::from_nanos(total_nanos as u64);
    if interval.is_zero() {
        return Err(format!("duration '{}' must be greater than zero", input));
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_log_timestamps() {
        let dt = datetime!(2024-05-01 09:58:30 UTC);
        assert_eq!(format_datetime(&dt), "01.05.2024 - 09:58:30");
    }

    #[test]
    fn parses_simple_and_compound_intervals() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_interval(" 1.5m ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn rejects_invalid_intervals() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("30").is_err());
        assert!(parse_interval("s").is_err());
        assert!(parse_interval("10d").is_err());
        assert!(parse_interval("-5s").is_err());
    }

    #[test]
    fn accepts_sub_millisecond_units() {
        assert_eq!(parse_interval("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_interval("250µs").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_interval("1s500000ns").unwrap(), Duration::from_micros(1_000_500));
    }

    #[test]
    fn rejects_overflowing_intervals() {
        assert!(parse_interval("999999999999999999999h").is_err());
        assert!(parse_interval("6000000h").is_err());
        assert!(parse_interval("5000000h").is_ok());
    }
}
