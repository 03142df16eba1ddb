//! Serial date conversion
//!
//! Spreadsheet hosts store dates as a floating-point count of days since the
//! 1899-12-30 epoch; the fractional part is the time of day. Serial `44927`
//! is 2023-01-01 and `44927.5` is noon on that day.
//!
//! The calendar is plain proleptic Gregorian: there is no 1900-02-29, so
//! serial `1` is 1899-12-31 and serials agree with the host from
//! 1900-03-01 (serial `61`) onwards.
//!
//! Conversions add a small epsilon before flooring so that values which are a
//! rounding error short of a whole second, minute, or hour land on it.

use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone,
};

/// Added to a serial before it is split into days, hours, minutes and seconds
pub const SERIAL_EPSILON: f64 = 1e-10;

/// Largest serial a host accepts (9999-12-31)
pub const MAX_SERIAL: f64 = 2_958_465.999_999;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Convert a serial to a calendar date-time with no timezone attached
///
/// Seconds are truncated. Returns `None` for negative, non-finite or
/// out-of-range serials.
///
/// # Examples
/// ```
/// use excel_gateway_core::date_serial::serial_to_naive;
///
/// let noon = serial_to_naive(44927.5).unwrap();
/// assert_eq!(noon.to_string(), "2023-01-01 12:00:00");
/// ```
pub fn serial_to_naive(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let adjusted = serial + SERIAL_EPSILON;
    let days = adjusted.floor();

    let hours = (adjusted - days) * 24.0;
    let hour = hours.floor();
    let minutes = (hours - hour) * 60.0;
    let minute = minutes.floor();
    let second = ((minutes - minute) * 60.0).floor();

    let date = epoch()?.date().checked_add_signed(Duration::days(days as i64))?;
    let time = NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)?;
    Some(date.and_time(time))
}

/// Convert a calendar date-time to a serial
pub fn naive_to_serial(value: NaiveDateTime) -> Option<f64> {
    let elapsed = value - epoch()?;
    Some(elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY)
}

/// Convert a serial to a date-time in `tz`, reading the serial as wall-clock time there
///
/// Ambiguous wall-clock times resolve to the earlier instant. Times that fall
/// in a gap resolve using the offset in effect at the same UTC reading.
pub fn serial_to_datetime<Tz: TimeZone>(serial: f64, tz: &Tz) -> Option<DateTime<Tz>> {
    let naive = serial_to_naive(serial)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(value) => Some(value),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            let utc = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
            Some(tz.from_utc_datetime(&utc))
        }
    }
}

/// Convert a serial to a date-time in the machine's local timezone
pub fn serial_to_local(serial: f64) -> Option<DateTime<Local>> {
    serial_to_datetime(serial, &Local)
}

/// Serial for the current local wall-clock time
pub fn local_now_serial() -> Option<f64> {
    datetime_to_serial(&Local::now())
}

/// Convert a zoned date-time to a serial using its wall-clock reading
pub fn datetime_to_serial<Tz: TimeZone>(value: &DateTime<Tz>) -> Option<f64> {
    naive_to_serial(value.naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(serial_to_naive(0.0), Some(at(1899, 12, 30, 0, 0, 0)));
        assert_eq!(serial_to_naive(44927.0), Some(at(2023, 1, 1, 0, 0, 0)));
        assert_eq!(serial_to_naive(44927.5), Some(at(2023, 1, 1, 12, 0, 0)));
        assert_eq!(serial_to_naive(45000.75), Some(at(2023, 3, 15, 18, 0, 0)));
    }

    #[test]
    fn test_early_serials_follow_the_real_calendar() {
        assert_eq!(serial_to_naive(1.0), Some(at(1899, 12, 31, 0, 0, 0)));
        assert_eq!(serial_to_naive(60.0), Some(at(1900, 2, 28, 0, 0, 0)));
        assert_eq!(serial_to_naive(61.0), Some(at(1900, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn test_epsilon_lands_on_the_hour() {
        // one hour past midnight is not exactly representable at this magnitude
        let one_am = serial_to_naive(44927.0 + 1.0 / 24.0).unwrap();
        assert_eq!((one_am.hour(), one_am.minute(), one_am.second()), (1, 0, 0));

        let quarter = serial_to_naive(44927.0 + 0.1).unwrap();
        assert_eq!((quarter.hour(), quarter.minute(), quarter.second()), (2, 24, 0));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(serial_to_naive(-1.0), None);
        assert_eq!(serial_to_naive(f64::NAN), None);
        assert_eq!(serial_to_naive(f64::INFINITY), None);
        assert_eq!(serial_to_naive(3_000_000.0), None);
    }

    #[test]
    fn test_naive_to_serial() {
        assert_eq!(naive_to_serial(at(2023, 1, 1, 0, 0, 0)), Some(44927.0));
        assert_eq!(naive_to_serial(at(2023, 1, 1, 12, 0, 0)), Some(44927.5));
        assert_eq!(naive_to_serial(at(1899, 12, 30, 0, 0, 0)), Some(0.0));
    }

    #[test]
    fn test_zoned_round_trip() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        let value = serial_to_datetime(44927.5, &tz).unwrap();
        assert_eq!(value.naive_local(), at(2023, 1, 1, 12, 0, 0));
        assert_eq!(value.naive_utc(), at(2023, 1, 1, 5, 0, 0));
        assert_eq!(datetime_to_serial(&value), Some(44927.5));

        let utc = serial_to_datetime(44927.5, &Utc).unwrap();
        assert_eq!(datetime_to_serial(&utc), Some(44927.5));
    }

    #[test]
    fn test_local_uses_wall_clock() {
        let local = serial_to_local(44927.5).unwrap();
        assert_eq!(local.naive_local(), at(2023, 1, 1, 12, 0, 0));
    }

    #[test]
    fn test_local_now_serial() {
        let now = local_now_serial().unwrap();
        assert!(now > 44927.0);
    }
}
