//! HTTP date handling (`Last-Modified`, `If-Modified-Since`).
//!
//! Only the IMF-fixdate form is produced and parsed:
//! `Sun, 06 Nov 1994 08:49:37 GMT`. Timestamps are whole seconds in UTC.

use std::time::{SystemTime, UNIX_EPOCH};

const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// UTC timestamp broken down into calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpDate {
    secs: u64,
}

impl HttpDate {
    /// Truncates sub-second precision; times before the epoch clamp to it.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { secs }
    }

    pub fn next_second(self) -> Self {
        Self {
            secs: self.secs + 1,
        }
    }

    /// Parse an IMF-fixdate. Other legacy formats yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (weekday, rest) = s.split_once(", ")?;
        if !WEEKDAYS.contains(&weekday) {
            return None;
        }

        let mut parts = rest.split(' ');
        let day: u64 = parts.next()?.parse().ok()?;
        let month = parts.next()?;
        let month = MONTHS.iter().position(|m| *m == month)? as u64 + 1;
        let year: u64 = parts.next()?.parse().ok()?;
        let time = parts.next()?;
        if parts.next()? != "GMT" || parts.next().is_some() {
            return None;
        }

        let mut hms = time.split(':').map(str::parse::<u64>);
        let (h, m, sec) = (hms.next()?.ok()?, hms.next()?.ok()?, hms.next()?.ok()?);
        if !(1..=31).contains(&day) || h > 23 || m > 59 || sec > 60 || year < 1970 {
            return None;
        }

        let days = days_from_civil(year, month, day);
        Some(Self {
            secs: days * 86_400 + h * 3600 + m * 60 + sec,
        })
    }

    /// Format as IMF-fixdate.
    pub fn to_rfc2822(self) -> String {
        let days = self.secs / 86_400;
        let rem = self.secs % 86_400;
        let (year, month, day) = civil_from_days(days);

        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            WEEKDAYS[(days % 7) as usize],
            day,
            MONTHS[(month - 1) as usize],
            year,
            rem / 3600,
            (rem / 60) % 60,
            rem % 60
        )
    }
}

/// Days since 1970-01-01 to (year, month, day).
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

/// (year, month, day) to days since 1970-01-01. Requires year >= 1970.
fn days_from_civil(year: u64, month: u64, day: u64) -> u64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year / 400;
    let yoe = year - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
