use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::calendar::Week;
use crate::limits::SLOT_MINUTES;
use crate::model::*;

use super::authorize::{authorize, duration_options, validate_candidate, Candidate, Decision};
use super::ledger::BookingLedger;
use super::quota::weekly_usage;
use super::{Engine, EngineError};

const UNKNOWN_USER: &str = "Unknown";
const UNKNOWN_COURSE: &str = "Unknown Course";

fn names_by_id(users: &[User]) -> HashMap<&str, &str> {
    users.iter().map(|u| (u.id.as_str(), u.name.as_str())).collect()
}

impl Engine {
    fn week_containing(&self, at: Ts) -> Result<Week, EngineError> {
        self.calendar()
            .checked_week_of(at)
            .ok_or(EngineError::Invalid("time out of range"))
    }

    /// Authorization without side effects, for previews.
    pub async fn check_booking(&self, candidate: &Candidate) -> Result<Decision, EngineError> {
        validate_candidate(candidate, self.calendar())?;
        let ledger = self.load_ledger().await?;
        Ok(authorize(candidate, &ledger, self.calendar()))
    }

    /// Decision for each of the fixed duration options at one start.
    pub async fn check_duration_options(&self, candidate: &Candidate) -> Result<Vec<(u32, Decision)>, EngineError> {
        validate_candidate(candidate, self.calendar())?;
        let ledger = self.load_ledger().await?;
        Ok(duration_options(candidate, &ledger, self.calendar()))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, EngineError> {
        Ok(self.store().list_users().await?)
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, EngineError> {
        Ok(self.store().list_courses().await?)
    }

    pub async fn list_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.load_ledger().await?.into_vec())
    }

    pub async fn get_booking(&self, id: &str) -> Result<Booking, EngineError> {
        self.load_ledger()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Quota and total minutes of `user` in the week containing `at`.
    pub async fn weekly_usage(&self, user_id: &str, at: Ts) -> Result<WeeklyUsage, EngineError> {
        let week = self.week_containing(at)?;
        let ledger = self.load_ledger().await?;
        Ok(weekly_usage(self.calendar(), ledger.for_user_in_week(user_id, week)))
    }

    /// Users ranked by booked minutes in the week containing `at`. Bookings of
    /// users that no longer exist are left out. Ties break on name.
    pub async fn leaderboard(&self, at: Ts, top: usize) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let week = self.week_containing(at)?;
        let (users, bookings) = futures::try_join!(self.store().list_users(), self.store().list_bookings())?;
        let ledger = BookingLedger::from(bookings);

        let mut minutes: HashMap<&str, u32> = HashMap::new();
        for b in ledger.in_week(week) {
            let total = minutes.entry(b.user_id.as_str()).or_default();
            *total = total.saturating_add(b.duration_minutes);
        }

        let mut entries: Vec<LeaderboardEntry> = users
            .iter()
            .filter_map(|u| {
                minutes.get(u.id.as_str()).map(|&m| LeaderboardEntry {
                    user_id: u.id.clone(),
                    name: u.name.clone(),
                    minutes: m,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.minutes.cmp(&a.minutes).then_with(|| a.name.cmp(&b.name)));
        entries.truncate(top);
        Ok(entries)
    }

    /// The 28 half-hour slots of `date` as seen by `user_id`.
    pub async fn day_board(&self, user_id: &str, date: NaiveDate) -> Result<Vec<SlotView>, EngineError> {
        let (users, bookings) = futures::try_join!(self.store().list_users(), self.store().list_bookings())?;
        let names = names_by_id(&users);
        let ledger = BookingLedger::from(bookings);
        let calendar = self.calendar();

        let board = calendar
            .slots_on(date)
            .map(|start| {
                let span = Span::starting_at(start, SLOT_MINUTES);
                let work_hours = calendar.is_work_hours(start);
                let status = if let Some(mine) = ledger.overlapping(span).find(|b| b.user_id == user_id) {
                    SlotStatus::Mine {
                        booking_id: mine.id.clone(),
                    }
                } else if let Some(other) = ledger.overlapping(span).next() {
                    let name = names.get(other.user_id.as_str()).copied().unwrap_or(UNKNOWN_USER).to_string();
                    if work_hours {
                        SlotStatus::Blocked { by: name }
                    } else {
                        SlotStatus::Shared { with: name }
                    }
                } else {
                    SlotStatus::Available
                };
                SlotView {
                    start: span.start,
                    end: span.end,
                    work_hours,
                    status,
                }
            })
            .collect();
        Ok(board)
    }

    /// Every booking with user and course names resolved.
    pub async fn booking_views(&self) -> Result<Vec<BookingView>, EngineError> {
        let (users, courses, bookings) = futures::try_join!(
            self.store().list_users(),
            self.store().list_courses(),
            self.store().list_bookings()
        )?;
        let names = names_by_id(&users);
        let titles: HashMap<&str, &str> = courses.iter().map(|c| (c.id.as_str(), c.title.as_str())).collect();

        Ok(BookingLedger::from(bookings)
            .into_vec()
            .into_iter()
            .map(|booking| BookingView {
                user_name: names.get(booking.user_id.as_str()).copied().unwrap_or(UNKNOWN_USER).to_string(),
                course_title: titles.get(booking.course_id.as_str()).copied().unwrap_or(UNKNOWN_COURSE).to_string(),
                booking,
            })
            .collect())
    }

    /// Courses the user can pick, in library order. With `hide_completed`,
    /// courses the user has ever booked are left out.
    pub async fn available_courses(&self, user_id: &str, hide_completed: bool) -> Result<Vec<Course>, EngineError> {
        let courses = self.store().list_courses().await?;
        if !hide_completed {
            return Ok(courses);
        }
        let ledger = self.load_ledger().await?;
        let completed: HashSet<&str> = ledger.for_user(user_id).map(|b| b.course_id.as_str()).collect();
        Ok(courses
            .iter()
            .filter(|c| !completed.contains(c.id.as_str()))
            .cloned()
            .collect())
    }

    /// Case-insensitive substring match on title or any tag. Empty term matches all.
    pub async fn search_courses(&self, term: &str) -> Result<Vec<Course>, EngineError> {
        let term = term.trim().to_lowercase();
        let courses = self.store().list_courses().await?;
        if term.is_empty() {
            return Ok(courses);
        }
        Ok(courses
            .into_iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&term) || c.tags.iter().any(|t| t.to_lowercase().contains(&term))
            })
            .collect())
    }

    pub async fn admin_settings(&self) -> Result<AdminSettings, EngineError> {
        Ok(self.store().get_admin_settings().await?)
    }
}
