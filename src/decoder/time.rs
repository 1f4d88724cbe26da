use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Resolves a post's displayed publish time against the crawl clock
///
/// Handles `刚刚`, `N分钟前`, `今天 HH:MM`, `MM月DD日 HH:MM` and
/// `YYYY-MM-DD HH:MM[:SS]`. Returns `None` for anything else.
pub fn parse_publish_time(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim();

    if text.contains("刚刚") {
        return Some(now);
    }

    if let Some((minutes, _)) = text.split_once("分钟") {
        let minutes: i64 = minutes.trim().parse().ok()?;
        return Some(now - Duration::minutes(minutes));
    }

    if let Some(rest) = text.strip_prefix("今天") {
        let time = NaiveTime::parse_from_str(rest.trim(), "%H:%M").ok()?;
        return Some(now.date().and_time(time));
    }

    if text.contains('月') && text.contains('日') {
        let (month, rest) = text.split_once('月')?;
        let (day, time) = rest.split_once('日')?;
        let date = NaiveDate::from_ymd_opt(
            now.year(),
            month.trim().parse().ok()?,
            day.trim().parse().ok()?,
        )?;
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
        return Some(date.and_time(time));
    }

    let minute_precision: String = text.chars().take(16).collect();
    NaiveDateTime::parse_from_str(&minute_precision, "%Y-%m-%d %H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_relative_times() {
        assert_eq!(parse_publish_time("刚刚", now()), Some(now()));
        assert_eq!(
            parse_publish_time("5分钟前", now()),
            Some(now() - Duration::minutes(5))
        );
        assert_eq!(
            parse_publish_time("今天 08:30", now()),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(8, 30, 0)
        );
    }

    #[test]
    fn test_month_day_uses_current_year() {
        assert_eq!(
            parse_publish_time("03月02日 21:05", now()),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap().and_hms_opt(21, 5, 0)
        );
    }

    #[test]
    fn test_full_timestamp_with_seconds() {
        assert_eq!(
            parse_publish_time("2021-11-30 23:59:58", now()),
            NaiveDate::from_ymd_opt(2021, 11, 30).unwrap().and_hms_opt(23, 59, 0)
        );
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(parse_publish_time("yesterday-ish", now()), None);
    }
}
