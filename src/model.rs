use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar;

/// Absolute instant. The only time type that is persisted.
pub type Ts = DateTime<Utc>;

pub type UserId = String;
pub type CourseId = String;
pub type BookingId = String;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ts,
    pub end: Ts,
}

impl Span {
    pub fn new(start: Ts, end: Ts) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    /// Span of `minutes` starting at `start`. The end saturates at the last
    /// representable instant.
    pub fn starting_at(start: Ts, minutes: u32) -> Self {
        Self::new(start, calendar::add_minutes(start, i64::from(minutes)))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        calendar::overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_instant(&self, t: Ts) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Engineer,
    Lead,
}

/// A team member. Role carries no scheduling privilege.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    /// Estimated length; a booking may pick a different duration.
    pub duration_minutes: u32,
    pub created_by: UserId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub quiz: Option<Quiz>,
}

/// Course as submitted by a client, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub duration_minutes: u32,
    pub created_by: UserId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub quiz: Option<Quiz>,
}

/// A committed learning session. Never edited in place: a change is a
/// cancel followed by a fresh booking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    /// Weak reference: the course may no longer exist.
    pub course_id: CourseId,
    pub start_time: Ts,
    pub end_time: Ts,
    pub duration_minutes: u32,
}

impl Booking {
    /// Build a booking whose end is derived from start + duration.
    pub fn new(id: BookingId, user_id: UserId, course_id: CourseId, start: Ts, duration_minutes: u32) -> Self {
        let span = Span::starting_at(start, duration_minutes);
        Self {
            id,
            user_id,
            course_id,
            start_time: span.start,
            end_time: span.end,
            duration_minutes,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// `end == start + duration` and `end > start`.
    pub fn is_consistent(&self) -> bool {
        self.duration_minutes > 0
            && self.end_time > self.start_time
            && calendar::checked_add_minutes(self.start_time, i64::from(self.duration_minutes)) == Some(self.end_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    #[serde(default)]
    pub oauth_url: String,
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserAdded { user: User },
    CourseAdded { course: Course },
    BookingCreated { booking: Booking },
    BookingCancelled { id: BookingId },
    AdminSettingsSaved { settings: AdminSettings },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyUsage {
    pub quota_minutes: u32,
    pub total_minutes: u32,
    pub remaining: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub name: String,
    pub minutes: u32,
}

/// How a half-hour slot looks to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SlotStatus {
    Available,
    Mine { booking_id: BookingId },
    /// Another user holds it during work hours.
    Blocked { by: String },
    /// Another user holds it off hours; still bookable.
    Shared { with: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub start: Ts,
    pub end: Ts,
    pub work_hours: bool,
    pub status: SlotStatus,
}

/// A booking joined with display names; dangling references fall back to placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub user_name: String,
    pub course_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub description: String,
    pub tags: Vec<String>,
    pub quiz: Quiz,
}
