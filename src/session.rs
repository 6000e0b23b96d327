// =============================================================================
// Session & Time-Zone Classification
// =============================================================================
//
// Session and day-of-week classification use America/New_York civil time,
// never the host's locale. All inputs are Unix millisecond timestamps
// (`received_at`); this module is the only place `chrono_tz` is touched.
// =============================================================================

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// Market session label, derived from America/New_York wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSession {
    Premarket,
    Open,
    Midday,
    PowerHour,
    Afterhours,
    Weekend,
}

impl MarketSession {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSession::Premarket => "PREMARKET",
            MarketSession::Open => "OPEN",
            MarketSession::Midday => "MIDDAY",
            MarketSession::PowerHour => "POWER_HOUR",
            MarketSession::Afterhours => "AFTERHOURS",
            MarketSession::Weekend => "WEEKEND",
        }
    }
}

/// Day-of-week label, America/New_York civil calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }

    fn from_weekday(w: Weekday) -> Self {
        match w {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// Classify a Unix millisecond timestamp into an America/New_York session
/// and day-of-week pair.
///
/// Session boundaries (America/New_York wall clock):
///   weekend        — Saturday, Sunday
///   premarket      — 04:00–09:29
///   open           — 09:30–11:59
///   midday         — 12:00–14:59
///   power_hour     — 15:00–15:59
///   afterhours     — 16:00–19:59, and 00:00–03:59
pub fn classify(received_at_millis: i64) -> (MarketSession, DayOfWeek) {
    let utc: DateTime<chrono::Utc> = chrono::Utc
        .timestamp_millis_opt(received_at_millis)
        .single()
        .unwrap_or_else(chrono::Utc::now);
    let local = utc.with_timezone(&New_York);

    let day = DayOfWeek::from_weekday(local.weekday());

    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return (MarketSession::Weekend, day);
    }

    let minute_of_day = local.hour() * 60 + local.minute();
    let session = if minute_of_day < 4 * 60 {
        MarketSession::Afterhours
    } else if minute_of_day < 9 * 60 + 30 {
        MarketSession::Premarket
    } else if minute_of_day < 12 * 60 {
        MarketSession::Open
    } else if minute_of_day < 15 * 60 {
        MarketSession::Midday
    } else if minute_of_day < 16 * 60 {
        MarketSession::PowerHour
    } else {
        MarketSession::Afterhours
    };

    (session, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-09 is a Tuesday. 15:00 UTC = 10:00 America/New_York in January (EST, UTC-5).
    const TUESDAY_10AM_EST_UTC_MILLIS: i64 = 1_704_812_400_000;

    #[test]
    fn classifies_regular_open_session() {
        let (session, day) = classify(TUESDAY_10AM_EST_UTC_MILLIS);
        assert_eq!(session, MarketSession::Open);
        assert_eq!(day, DayOfWeek::Tuesday);
    }

    #[test]
    fn classifies_weekend() {
        // 2024-01-13 is a Saturday.
        let saturday_noon_utc = 1_705_147_200_000;
        let (session, day) = classify(saturday_noon_utc);
        assert_eq!(session, MarketSession::Weekend);
        assert_eq!(day, DayOfWeek::Saturday);
    }

    #[test]
    fn classifies_afterhours_late_evening() {
        // 21:00 UTC on the same Tuesday = 16:00 EST -> afterhours.
        let afterhours_utc = TUESDAY_10AM_EST_UTC_MILLIS + 11 * 3_600_000;
        let (session, _) = classify(afterhours_utc);
        assert_eq!(session, MarketSession::Afterhours);
    }
}
