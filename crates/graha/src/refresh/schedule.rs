use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Fixed local wall-clock time at which the daily refresh fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub at: NaiveTime,
    pub offset: FixedOffset,
    /// How late a trigger may still run after a stall.
    pub misfire_grace: Duration,
}

impl Default for DailySchedule {
    /// 00:05 at UTC+05:30.
    fn default() -> Self {
        Self {
            at: NaiveTime::from_hms_opt(0, 5, 0).unwrap_or_default(),
            offset: FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix()),
            misfire_grace: Duration::hours(1),
        }
    }
}

impl DailySchedule {
    /// Build from `HH:MM[:SS]` and `±HH:MM` strings.
    pub fn parse(local_time: &str, utc_offset: &str) -> Result<Self, String> {
        let at = NaiveTime::parse_from_str(local_time.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(local_time.trim(), "%H:%M:%S"))
            .map_err(|err| format!("invalid local time '{}': {}", local_time, err))?;
        Ok(Self {
            at,
            offset: parse_utc_offset(utc_offset)?,
            ..Self::default()
        })
    }

    /// Local calendar day containing `now`.
    pub fn operational_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant of the trigger on local day `day`.
    pub fn trigger_instant(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = day.and_time(self.at);
        let shift = Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&(local - shift))
    }

    /// First trigger strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.operational_day(now);
        let candidate = self.trigger_instant(today);
        if candidate > now {
            return candidate;
        }
        match today.succ_opt() {
            Some(tomorrow) => self.trigger_instant(tomorrow),
            None => candidate + Duration::days(1),
        }
    }

    /// Whether a trigger scheduled for `scheduled` may still run at `now`.
    pub fn within_grace(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - scheduled <= self.misfire_grace
    }
}

/// Parse `+05:30`, `-08:00`, `+0530`, `Z` or `UTC`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, String> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let invalid = || format!("invalid UTC offset '{}': expected ±HH:MM", value);
    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_trigger_is_1835_utc_previous_day() {
        let schedule = DailySchedule::default();
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let instant = schedule.trigger_instant(day);
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 3, 14, 18, 35, 0).unwrap());
    }

    #[test]
    fn test_operational_day_uses_local_date() {
        let schedule = DailySchedule::default();
        // 20:00 UTC is 01:30 the next day in IST
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 20, 0, 0).unwrap();
        assert_eq!(schedule.operational_day(now), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_next_after() {
        let schedule = DailySchedule::default();
        let before = Utc.with_ymd_and_hms(2024, 3, 14, 18, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(before),
            Utc.with_ymd_and_hms(2024, 3, 14, 18, 35, 0).unwrap()
        );
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 18, 35, 0).unwrap();
        assert_eq!(
            schedule.next_after(at),
            Utc.with_ymd_and_hms(2024, 3, 15, 18, 35, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28800);
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("05:30").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }

    #[test]
    fn test_parse_schedule() {
        let schedule = DailySchedule::parse("06:00", "-05:00").unwrap();
        assert_eq!(schedule.at, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert!(DailySchedule::parse("6 o'clock", "+00:00").is_err());
    }
}
