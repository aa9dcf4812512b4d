// Recording window arithmetic: when to wait, when to record, when to stop.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};

/// Daily wall-clock recording window.
#[derive(Debug, Clone)]
pub struct RecordingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub weekdays: HashSet<Weekday>,
    /// How far ahead of `start` the pipeline may begin recording.
    pub lead: Duration,
    /// Extra wall-clock time past `end` before discovery stops.
    pub pad: Duration,
}

/// Scheduler-facing classification of "now" against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// Today is not an active weekday.
    ClosedToday,
    /// Active day, before `start - lead`.
    BeforeWindow { until_open: Duration },
    /// Between `start - lead` and `end`; recording may run for `remaining`
    /// (until `end + pad`).
    Open { remaining: Duration },
    /// Past `end` for today.
    AfterWindow,
}

impl RecordingWindow {
    pub fn status(&self, now: NaiveDateTime) -> WindowStatus {
        if !self.weekdays.contains(&now.weekday()) {
            return WindowStatus::ClosedToday;
        }

        let time = now.time();
        let open_from = self.open_from();
        if time < open_from {
            let until_open = (open_from - time).to_std().unwrap_or_default();
            return WindowStatus::BeforeWindow { until_open };
        }
        if time <= self.end {
            let remaining = (self.close_at() - time).to_std().unwrap_or_default();
            return WindowStatus::Open { remaining };
        }
        WindowStatus::AfterWindow
    }

    /// Earliest time of day recording may start, clamped to midnight.
    fn open_from(&self) -> NaiveTime {
        let lead = chrono::Duration::from_std(self.lead).unwrap_or_else(|_| chrono::Duration::zero());
        let (time, wrapped) = self.start.overflowing_sub_signed(lead);
        if wrapped != 0 { NaiveTime::MIN } else { time }
    }

    /// Time of day discovery stops, clamped to the end of the day.
    fn close_at(&self) -> NaiveTime {
        let pad = chrono::Duration::from_std(self.pad).unwrap_or_else(|_| chrono::Duration::zero());
        let (time, wrapped) = self.end.overflowing_add_signed(pad);
        if wrapped != 0 {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(self.end)
        } else {
            time
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> RecordingWindow {
        RecordingWindow {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            weekdays: HashSet::from([Weekday::Mon, Weekday::Wed]),
            lead: Duration::from_secs(60),
            pad: Duration::from_secs(60),
        }
    }

    fn monday_at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        // 2026-08-03 is a Monday.
        NaiveDate::from_ymd_opt(2026, 8, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn tuesday_at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn inactive_weekday_never_opens() {
        assert_eq!(window().status(tuesday_at(9, 45, 0)), WindowStatus::ClosedToday);
    }

    #[test]
    fn before_lead_is_waiting() {
        match window().status(monday_at(9, 0, 0)) {
            WindowStatus::BeforeWindow { until_open } => {
                assert_eq!(until_open, Duration::from_secs(29 * 60));
            }
            status => panic!("unexpected status {status:?}"),
        }
    }

    #[test]
    fn lead_boundary_opens_the_window() {
        // One second before start - lead: still waiting.
        assert!(matches!(
            window().status(monday_at(9, 28, 59)),
            WindowStatus::BeforeWindow { .. }
        ));
        // Exactly start - lead: open.
        match window().status(monday_at(9, 29, 0)) {
            WindowStatus::Open { remaining } => {
                // Runs until end + pad.
                assert_eq!(remaining, Duration::from_secs(32 * 60));
            }
            status => panic!("unexpected status {status:?}"),
        }
    }

    #[test]
    fn end_is_inclusive_and_padded() {
        match window().status(monday_at(10, 0, 0)) {
            WindowStatus::Open { remaining } => {
                assert_eq!(remaining, Duration::from_secs(60));
            }
            status => panic!("unexpected status {status:?}"),
        }
        assert_eq!(window().status(monday_at(10, 0, 1)), WindowStatus::AfterWindow);
    }

    #[test]
    fn lead_larger_than_start_clamps_to_midnight() {
        let mut window = window();
        window.start = NaiveTime::from_hms_opt(0, 0, 30).unwrap();
        window.lead = Duration::from_secs(120);
        assert!(matches!(
            window.status(monday_at(0, 0, 0)),
            WindowStatus::Open { .. }
        ));
    }
}
