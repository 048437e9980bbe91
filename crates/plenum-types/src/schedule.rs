use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("end date/time cannot be before start date/time")]
    EndBeforeStart,
}

/// An event's time range as edited: two dates and two times-of-day that
/// are recombined at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingWindow {
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
}

/// Accepts "HH:MM" as the pickers produce, or "HH:MM:SS".
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

impl MeetingWindow {
    pub fn from_parts(
        start_date: NaiveDate,
        start_time: &str,
        end_date: NaiveDate,
        end_time: &str,
    ) -> Option<Self> {
        Some(Self {
            start_date,
            start_time: parse_time_of_day(start_time)?,
            end_date,
            end_time: parse_time_of_day(end_time)?,
        })
    }

    /// Join each date with its time-of-day into UTC timestamps.
    /// Rejects a range that ends before it starts.
    pub fn combine(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ScheduleError> {
        let start = self.start_date.and_time(self.start_time).and_utc();
        let end = self.end_date.and_time(self.end_time).and_utc();
        if end < start {
            return Err(ScheduleError::EndBeforeStart);
        }
        Ok((start, end))
    }

    /// Live-edit rule: after the start moves, an end that now falls before
    /// it is pulled forward to start + 1 h instead of being rejected. The
    /// time-of-day wraps at midnight and the end date advances with it.
    /// Returns whether anything changed.
    pub fn adjust_end_after_start_change(&mut self) -> bool {
        let start = self.start_date.and_time(self.start_time);
        let end = self.end_date.and_time(self.end_time);
        if end >= start {
            return false;
        }

        let (bumped, wrapped) = self.start_time.overflowing_add_signed(Duration::hours(1));
        self.end_time = bumped;
        self.end_date = if wrapped != 0 {
            self.start_date.succ_opt().unwrap_or(self.start_date)
        } else {
            self.start_date
        };
        true
    }
}
