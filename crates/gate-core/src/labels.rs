//! Calendar labels used as bucket identifiers.
//!
//! All labels are computed in UTC so every instance agrees on rollover.

use time::{OffsetDateTime, UtcOffset};

/// `YYYY-MM`, the quota accounting month.
pub fn month_key(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!("{:04}-{:02}", at.year(), u8::from(at.month()))
}

/// `YYYY-MM-DD`, the per-day rate window.
pub fn day_key(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}",
        at.year(),
        u8::from(at.month()),
        at.day()
    )
}

/// `YYYY-MM-DD-HH-MM`, the per-minute rate window.
pub fn minute_key(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}-{:02}-{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_labels_are_zero_padded() {
        let at = datetime!(2024-03-05 07:09:59 UTC);
        assert_eq!(month_key(at), "2024-03");
        assert_eq!(day_key(at), "2024-03-05");
        assert_eq!(minute_key(at), "2024-03-05-07-09");
    }

    #[test]
    fn test_labels_use_utc() {
        let at = datetime!(2024-12-31 23:30 -2);
        assert_eq!(month_key(at), "2025-01");
        assert_eq!(day_key(at), "2025-01-01");
    }
}
