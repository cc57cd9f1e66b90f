use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::DateTime;

/// Parses a duration string into a number of milliseconds.
///
/// This function takes a string in the format `1d1h1m1s` and parses it into
/// a number of milliseconds. The string can contain any number of digits,
/// followed by any combination of the letters `s`, `m`, `h`, and `d` to
/// represent seconds, minutes, hours, and days, respectively.
///
/// # Returns
/// A number of milliseconds, or `None` if the input string is invalid.
/// If the integer overflows, the function returns `None`.
///
/// # Examples
///
/// ```
/// use pacmirror_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("30s"), Some(30_000));
/// ```
pub fn parse_duration(input: &str) -> Option<u128> {
    let mut total: u128 = 0;
    let mut chars = input.chars().peekable();

    while chars.peek().is_some() {
        let mut number_str = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number_str.push(chars.next()?);
            } else {
                break;
            }
        }

        if number_str.is_empty() {
            return None;
        }

        let number: u128 = number_str.parse().ok()?;
        let multiplier = match chars.next()? {
            's' => 1000,
            'm' => 60 * 1000,
            'h' => 60 * 60 * 1000,
            'd' => 24 * 60 * 60 * 1000,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(multiplier)?)?;
    }

    Some(total)
}

/// Parses an HTTP date (`Last-Modified` style, RFC 1123) into a [`SystemTime`].
///
/// Only whole seconds are kept. Dates before the Unix epoch are rejected.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use pacmirror_utils::time::parse_http_date;
///
/// let t = parse_http_date("Thu, 01 Jan 1970 00:01:00 GMT").unwrap();
/// assert_eq!(t, UNIX_EPOCH + Duration::from_secs(60));
/// ```
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    let parsed = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    let secs = u64::try_from(parsed.timestamp()).ok()?;
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s"), Some(1000));
        assert_eq!(parse_duration("1m"), Some(60 * 1000));
        assert_eq!(parse_duration("1h"), Some(60 * 60 * 1000));
        assert_eq!(
            parse_duration("1m30s"),
            Some(60 * 1000 + 30 * 1000)
        );
        assert_eq!(parse_duration("1d1h1m1s1"), None);
        assert_eq!(parse_duration("fail"), None);
        assert_eq!(parse_duration(""), Some(0));
    }

    #[test]
    fn test_integer_overflow() {
        assert_eq!(
            parse_duration("340282366920938463463374607431768211456"),
            None
        );
        assert_eq!(parse_duration("340282366920938463463374607431768211455d"), None);
    }

    #[test]
    fn test_parse_http_date() {
        let t = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(t, UNIX_EPOCH + Duration::from_secs(784111777));
        assert!(parse_http_date("not a date").is_none());
    }

    #[test]
    fn test_parse_http_date_before_epoch() {
        assert!(parse_http_date("Wed, 31 Dec 1969 23:59:59 GMT").is_none());
    }
}
