use chrono::NaiveTime;

/// Parse a `"HH:MM"` time-of-day. Surrounding whitespace is ignored;
/// seconds or any other trailing text is rejected.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    let (hours, minutes) = trimmed.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)
}

/// Render a time-of-day the way it is stored and displayed.
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zero_padded() {
        assert_eq!(parse_time_of_day("08:05"), NaiveTime::from_hms_opt(8, 5, 0));
        assert_eq!(parse_time_of_day("23:59"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_time_of_day("00:00"), NaiveTime::from_hms_opt(0, 0, 0));
    }

    #[test]
    fn accepts_single_digit_hour_and_whitespace() {
        assert_eq!(parse_time_of_day(" 8:30 "), NaiveTime::from_hms_opt(8, 30, 0));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "8", "24:00", "12:60", "12:5", "ab:cd", "12:00:00", "-1:00", "+1:00", "1200"] {
            assert_eq!(parse_time_of_day(bad), None, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn format_is_zero_padded() {
        let t = NaiveTime::from_hms_opt(7, 5, 0).unwrap();
        assert_eq!(format_time_of_day(t), "07:05");
    }
}
