//! Timestamp formatting.
//!
//! Index rows carry `YYYY-MM-DD HH:MM:SS` timestamps in local time. The
//! store's own `datetime('now')` fills column defaults; every explicit
//! engine write stamps rows through this helper so all code paths agree
//! on the format.

use chrono::{DateTime, Local};

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Formats the current local time.
#[must_use]
pub fn now() -> String {
    format_timestamp(&Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn single_digit_fields_are_zero_padded() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 7, 9, 1).single().unwrap();
        assert_eq!(format_timestamp(&at), "2024-03-05 07:09:01");
    }

    #[test]
    fn now_has_the_expected_shape() {
        let stamp = now();
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
        assert_eq!(&stamp[13..14], ":");
    }
}
