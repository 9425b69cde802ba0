//! Duration literals
//!
//! Parses literals such as `1s`, `500ms`, `2h` or `1h30m` into nanoseconds.

use crate::error::{TransformError, TransformResult};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{map_res, value},
    multi::many1,
    sequence::pair,
    IResult,
};

pub const NANOSECOND: i64 = 1;
pub const MICROSECOND: i64 = 1_000 * NANOSECOND;
pub const MILLISECOND: i64 = 1_000 * MICROSECOND;
pub const SECOND: i64 = 1_000 * MILLISECOND;
pub const MINUTE: i64 = 60 * SECOND;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;
pub const WEEK: i64 = 7 * DAY;

/// Parse a duration literal into nanoseconds
pub fn parse_duration(input: &str) -> TransformResult<i64> {
    let input = input.trim();

    match duration_parts(input) {
        Ok(("", parts)) => parts
            .into_iter()
            .try_fold(0i64, |total, (count, unit)| {
                count.checked_mul(unit).and_then(|d| total.checked_add(d))
            })
            .ok_or_else(|| TransformError::InvalidDuration(format!("{} overflows", input))),
        Ok((remaining, _)) => Err(TransformError::InvalidDuration(format!(
            "unexpected input after duration: '{}'",
            remaining
        ))),
        Err(_) => Err(TransformError::InvalidDuration(input.to_string())),
    }
}

/// Format nanoseconds as the shortest exact literal
pub fn format_duration(nanos: i64) -> String {
    const UNITS: [(i64, &str); 8] = [
        (WEEK, "w"),
        (DAY, "d"),
        (HOUR, "h"),
        (MINUTE, "m"),
        (SECOND, "s"),
        (MILLISECOND, "ms"),
        (MICROSECOND, "us"),
        (NANOSECOND, "ns"),
    ];

    if nanos == 0 {
        return "0s".to_string();
    }
    for (unit, suffix) in UNITS {
        if nanos % unit == 0 {
            return format!("{}{}", nanos / unit, suffix);
        }
    }
    format!("{}ns", nanos)
}

/// One or more `<count><unit>` segments
fn duration_parts(input: &str) -> IResult<&str, Vec<(i64, i64)>> {
    many1(pair(
        map_res(digit1, |s: &str| s.parse::<i64>()),
        duration_unit,
    ))(input)
}

fn duration_unit(input: &str) -> IResult<&str, i64> {
    alt((
        value(NANOSECOND, tag("ns")),
        value(MICROSECOND, alt((tag("us"), tag("µs"), tag("u"), tag("µ")))),
        value(MILLISECOND, tag("ms")),
        value(SECOND, tag("s")),
        value(MINUTE, tag("m")),
        value(HOUR, tag("h")),
        value(DAY, tag("d")),
        value(WEEK, tag("w")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("1ns").unwrap(), 1);
        assert_eq!(parse_duration("3u").unwrap(), 3 * MICROSECOND);
        assert_eq!(parse_duration("3us").unwrap(), 3 * MICROSECOND);
        assert_eq!(parse_duration("500ms").unwrap(), 500 * MILLISECOND);
        assert_eq!(parse_duration("1s").unwrap(), SECOND);
        assert_eq!(parse_duration("5m").unwrap(), 5 * MINUTE);
        assert_eq!(parse_duration("2h").unwrap(), 2 * HOUR);
        assert_eq!(parse_duration("7d").unwrap(), 7 * DAY);
        assert_eq!(parse_duration("1w").unwrap(), WEEK);
    }

    #[test]
    fn test_parse_composite() {
        assert_eq!(parse_duration("1h30m").unwrap(), HOUR + 30 * MINUTE);
        assert_eq!(parse_duration(" 1m1s ").unwrap(), MINUTE + SECOND);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1s!").is_err());
        assert!(matches!(
            parse_duration("99999999999w"),
            Err(TransformError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(SECOND), "1s");
        assert_eq!(format_duration(90 * SECOND), "90s");
        assert_eq!(format_duration(2 * HOUR), "2h");
        assert_eq!(format_duration(1500 * MICROSECOND), "1500us");
        assert_eq!(format_duration(7), "7ns");
    }
}
