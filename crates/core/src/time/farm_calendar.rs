use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

// Backend timestamps arrive either as plain dates or as full timestamps. Timestamps with a zone
// are moved into the farm's offset before taking the calendar day.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_record_date(raw: &str, offset: FixedOffset) -> Option<NaiveDate> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Some(d);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&offset).date_naive());
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(t, fmt).ok())
        .map(|naive| naive.date())
}

/// Epoch milliseconds, as produced by `Date.getTime()` on some clients.
pub fn date_from_epoch_millis(ms: i64, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&offset).date_naive())
}

pub fn today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

/// Sunday-based week number: week 1 is the (possibly partial) week holding January 1.
///
/// Computed as `ceil((day_of_year + jan1_weekday) / 7)` with Sunday = 0. This is not ISO-8601:
/// late December days can land in week 53 and early January days are never attributed to the
/// previous year.
pub fn week_of_year(date: NaiveDate) -> u32 {
    let jan1_weekday =
        (date.weekday().num_days_from_sunday() as i64 - date.ordinal0() as i64).rem_euclid(7);
    (date.ordinal() + jan1_weekday as u32 + 6) / 7
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.ordinal0() as i64)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

/// First day of the Sunday-based week, clamped to January 1 for week 1.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let sunday = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    sunday.max(start_of_year(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn parses_plain_and_timestamped_dates() {
        assert_eq!(parse_record_date("2024-01-05", utc()), Some(d(2024, 1, 5)));
        assert_eq!(
            parse_record_date("2024-01-05T10:15:00.000Z", utc()),
            Some(d(2024, 1, 5))
        );
        assert_eq!(
            parse_record_date("2024-01-05T10:15:00", utc()),
            Some(d(2024, 1, 5))
        );
        assert_eq!(
            parse_record_date(" 2024-01-05 10:15:00.250 ", utc()),
            Some(d(2024, 1, 5))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_record_date("", utc()), None);
        assert_eq!(parse_record_date("yesterday", utc()), None);
        assert_eq!(parse_record_date("2024-13-40", utc()), None);
    }

    #[test]
    fn zoned_timestamps_use_farm_offset() {
        let nairobi = FixedOffset::east_opt(3 * 3600).unwrap();
        let raw = "2024-03-31T22:30:00Z";
        assert_eq!(parse_record_date(raw, utc()), Some(d(2024, 3, 31)));
        assert_eq!(parse_record_date(raw, nairobi), Some(d(2024, 4, 1)));
    }

    #[test]
    fn epoch_millis_map_to_dates() {
        // 2024-01-01T00:00:00Z
        assert_eq!(
            date_from_epoch_millis(1_704_067_200_000, utc()),
            Some(d(2024, 1, 1))
        );
    }

    #[test]
    fn week_numbers_start_on_sunday() {
        // 2024-01-01 is a Monday.
        assert_eq!(week_of_year(d(2024, 1, 1)), 1);
        assert_eq!(week_of_year(d(2024, 1, 6)), 1);
        assert_eq!(week_of_year(d(2024, 1, 7)), 2);
        assert_eq!(week_of_year(d(2024, 12, 31)), 53);

        // 2023-01-01 is a Sunday.
        assert_eq!(week_of_year(d(2023, 1, 1)), 1);
        assert_eq!(week_of_year(d(2023, 1, 8)), 2);
    }

    #[test]
    fn week_numbers_diverge_from_iso_near_year_end() {
        // 2022-01-01 is a Saturday: the following Sunday already opens week 2.
        assert_eq!(week_of_year(d(2022, 1, 1)), 1);
        assert_eq!(week_of_year(d(2022, 1, 2)), 2);
        let dec31 = d(2022, 12, 31);
        assert_eq!(week_of_year(dec31), 53);
        assert_eq!(dec31.iso_week().week(), 52);
    }

    #[test]
    fn period_starts() {
        assert_eq!(start_of_year(d(2024, 3, 15)), d(2024, 1, 1));
        assert_eq!(start_of_month(d(2024, 3, 15)), d(2024, 3, 1));
        // 2024-03-15 is a Friday.
        assert_eq!(start_of_week(d(2024, 3, 15)), d(2024, 3, 10));
        // Week 1 of 2024 is clamped to January 1.
        assert_eq!(start_of_week(d(2024, 1, 3)), d(2024, 1, 1));
    }
}
