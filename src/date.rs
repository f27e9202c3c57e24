use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use digest_core::{DigestError, DigestResult};

/// Parse the `--date` argument: `YYYY-MM-DD`, `today` or `yesterday`.
///
/// Relative values are resolved against `now` in the report timezone, so
/// "today" late at night in UTC can still be yesterday locally.
pub fn parse_target_date(input: Option<&str>, tz: Tz, now: DateTime<Utc>) -> DigestResult<NaiveDate> {
    let today = now.with_timezone(&tz).date_naive();

    match input.map(str::trim) {
        None | Some("today") => Ok(today),
        Some("yesterday") => today
            .pred_opt()
            .ok_or_else(|| DigestError::InvalidDate("yesterday".into())),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| DigestError::InvalidDate(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Sao_Paulo;

    fn now() -> DateTime<Utc> {
        // 01:30 UTC is still the previous evening in Sao Paulo
        Utc.with_ymd_and_hms(2025, 9, 20, 1, 30, 0).unwrap()
    }

    #[test]
    fn relative_dates_use_report_timezone() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 19).unwrap();
        assert_eq!(parse_target_date(None, Sao_Paulo, now()).unwrap(), today);
        assert_eq!(parse_target_date(Some("today"), Sao_Paulo, now()).unwrap(), today);
        assert_eq!(
            parse_target_date(Some("yesterday"), Sao_Paulo, now()).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 18).unwrap()
        );
        assert_eq!(
            parse_target_date(None, Tz::UTC, now()).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 20).unwrap()
        );
    }

    #[test]
    fn explicit_dates() {
        assert_eq!(
            parse_target_date(Some("2024-02-29"), Sao_Paulo, now()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        for bad in ["2025-02-30", "19/09/2025", "tomorrow"] {
            assert!(matches!(
                parse_target_date(Some(bad), Sao_Paulo, now()),
                Err(DigestError::InvalidDate(_))
            ));
        }
    }
}
