use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

/// Market calendar helpers. Only weekends are known here; exchange holidays
/// show up as "no data" from the price source.
pub struct MarketCalendar;

impl MarketCalendar {
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Calendar date of `now` on the exchange clock
    pub fn exchange_date(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
        now.with_timezone(&timezone).date_naive()
    }

    /// Today's date on the exchange clock
    pub fn exchange_today(timezone: Tz) -> NaiveDate {
        Self::exchange_date(Utc::now(), timezone)
    }

    /// Most recent weekday on or before `date`
    pub fn last_trading_day(date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while Self::is_weekend(current) {
            current = current - Duration::days(1);
        }
        current
    }

    /// Date a run started on `today` should fill in: weekend runs roll back
    /// to the preceding Friday.
    pub fn target_date(today: NaiveDate) -> NaiveDate {
        Self::last_trading_day(today)
    }
}
