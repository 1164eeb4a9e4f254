use crate::calendar::Calendar;
use crate::limits::WEEKLY_LIMIT_MINUTES;
use crate::model::{Booking, WeeklyUsage};

/// Minutes that count against the weekly ceiling: bookings that start in work hours.
pub fn quota_minutes<'a>(calendar: &Calendar, bookings: impl IntoIterator<Item = &'a Booking>) -> u32 {
    bookings
        .into_iter()
        .filter(|b| calendar.is_work_hours(b.start_time))
        .fold(0u32, |acc, b| acc.saturating_add(b.duration_minutes))
}

/// All booked minutes regardless of hour. Display only, never enforced.
pub fn total_minutes<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> u32 {
    bookings
        .into_iter()
        .fold(0u32, |acc, b| acc.saturating_add(b.duration_minutes))
}

pub fn remaining(quota_minutes: u32) -> u32 {
    WEEKLY_LIMIT_MINUTES.saturating_sub(quota_minutes)
}

/// Whether `requested` more quota-counted minutes still fit under the ceiling.
pub fn fits(used: u32, requested: u32) -> bool {
    used.saturating_add(requested) <= WEEKLY_LIMIT_MINUTES
}

/// Usage summary for one user's bookings of one week.
pub fn weekly_usage<'a>(calendar: &Calendar, bookings: impl IntoIterator<Item = &'a Booking> + Clone) -> WeeklyUsage {
    let quota = quota_minutes(calendar, bookings.clone());
    WeeklyUsage {
        quota_minutes: quota,
        total_minutes: total_minutes(bookings),
        remaining: remaining(quota),
        limit: WEEKLY_LIMIT_MINUTES,
    }
}
