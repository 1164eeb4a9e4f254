use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike,
    Utc, Weekday,
};

use crate::limits::*;
use crate::model::{Span, Ts};

const MINUTES_PER_WEEK: i64 = 7 * 24 * 60;

/// Start times of the bookable half-hour slots, 08:00 through 21:30.
/// Each call yields a fresh iterator; callers splice in the date.
pub fn daily_slots() -> impl Iterator<Item = NaiveTime> + Clone {
    (0..SLOTS_PER_DAY).filter_map(|i| {
        let minutes = FIRST_SLOT_HOUR * 60 + (i as u32) * SLOT_MINUTES;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
    })
}

/// Half-open overlap test: touching endpoints do not overlap.
pub fn overlaps(start_a: Ts, end_a: Ts, start_b: Ts, end_b: Ts) -> bool {
    start_a < end_b && start_b < end_a
}

/// Monday 00:00:00 of the week containing `local`. Weeks run Monday–Sunday.
pub fn week_start(local: NaiveDateTime) -> NaiveDateTime {
    checked_week_start(local).unwrap_or(NaiveDateTime::MIN)
}

fn checked_week_start(local: NaiveDateTime) -> Option<NaiveDateTime> {
    let back = Duration::days(i64::from(local.weekday().num_days_from_monday()));
    Some(local.date().checked_sub_signed(back)?.and_time(NaiveTime::MIN))
}

/// `None` when the result falls outside the representable range.
pub fn checked_add_minutes(t: Ts, minutes: i64) -> Option<Ts> {
    t.checked_add_signed(Duration::minutes(minutes))
}

/// Saturates at the ends of the representable range.
pub fn add_minutes(t: Ts, minutes: i64) -> Ts {
    checked_add_minutes(t, minutes).unwrap_or(if minutes < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

fn shift(local: NaiveDateTime, seconds: i64) -> NaiveDateTime {
    local
        .checked_add_signed(Duration::seconds(seconds))
        .unwrap_or(if seconds < 0 { NaiveDateTime::MIN } else { NaiveDateTime::MAX })
}

/// The 7-day half-open window `[monday, next monday)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Week {
    pub start: Ts,
    pub end: Ts,
}

impl Week {
    pub fn contains(&self, t: Ts) -> bool {
        self.start <= t && t < self.end
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Interprets instants in the team's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// `None` when the offset is outside ±14h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return None;
        }
        FixedOffset::east_opt(minutes * 60).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn offset_seconds(&self) -> i64 {
        i64::from(self.offset.local_minus_utc())
    }

    pub fn local(&self, t: Ts) -> NaiveDateTime {
        shift(t.naive_utc(), self.offset_seconds())
    }

    pub fn local_date(&self, t: Ts) -> NaiveDate {
        self.local(t).date()
    }

    /// Convert a local wall-clock time back to an instant.
    pub fn to_utc(&self, local: NaiveDateTime) -> Ts {
        Utc.from_utc_datetime(&shift(local, -self.offset_seconds()))
    }

    /// Monday–Friday with local hour < 18. Only the instant itself is looked at,
    /// so a session starting 17:45 counts fully and one starting 18:00 not at all.
    pub fn is_work_hours(&self, t: Ts) -> bool {
        let local = self.local(t);
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        !weekend && local.hour() < WORK_DAY_END_HOUR
    }

    pub fn week_start(&self, t: Ts) -> Ts {
        self.to_utc(week_start(self.local(t)))
    }

    /// Near the ends of the representable range the bounds saturate; use
    /// [`Calendar::checked_week_of`] where that matters.
    pub fn week_of(&self, t: Ts) -> Week {
        let start = self.week_start(t);
        Week {
            start,
            end: add_minutes(start, MINUTES_PER_WEEK),
        }
    }

    /// `None` when either bound of the week is not representable.
    pub fn checked_week_of(&self, t: Ts) -> Option<Week> {
        let offset = Duration::seconds(self.offset_seconds());
        let local = t.naive_utc().checked_add_signed(offset)?;
        let monday = checked_week_start(local)?.checked_sub_signed(offset)?;
        let start = Utc.from_utc_datetime(&monday);
        let end = checked_add_minutes(start, MINUTES_PER_WEEK)?;
        Some(Week { start, end })
    }

    /// Slot start instants for one local date.
    pub fn slots_on(&self, date: NaiveDate) -> impl Iterator<Item = Ts> + '_ {
        daily_slots().map(move |time| self.to_utc(date.and_time(time)))
    }
}
