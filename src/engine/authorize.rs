use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calendar::{checked_add_minutes, Calendar};
use crate::limits::*;
use crate::model::*;

use super::conflict::{find_own_conflict, find_team_conflict};
use super::ledger::BookingLedger;
use super::quota::{fits, quota_minutes};
use super::EngineError;

/// A proposed booking, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub start: Ts,
    pub duration_minutes: u32,
    /// Booking being replaced; ignored by every check.
    #[serde(default)]
    pub replaces: Option<BookingId>,
}

impl Candidate {
    pub fn new(user_id: impl Into<UserId>, course_id: impl Into<CourseId>, start: Ts, duration_minutes: u32) -> Self {
        Self {
            user_id: user_id.into(),
            course_id: course_id.into(),
            start,
            duration_minutes,
            replaces: None,
        }
    }

    pub fn replacing(mut self, id: impl Into<BookingId>) -> Self {
        self.replaces = Some(id.into());
        self
    }

    pub fn with_duration(&self, duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            ..self.clone()
        }
    }

    pub fn span(&self) -> Span {
        Span::starting_at(self.start, self.duration_minutes)
    }

    fn is_replaced(&self, booking: &Booking) -> bool {
        self.replaces.as_deref() == Some(booking.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyReason {
    /// Someone on the team already occupies an overlapping work-hours interval.
    TeamBusy,
    /// The user already has an overlapping session.
    Overlap,
    /// The booking would push work-hour minutes past the weekly ceiling.
    QuotaFull,
}

impl DenyReason {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DenyReason::TeamBusy => "team_busy",
            DenyReason::Overlap => "overlap",
            DenyReason::QuotaFull => "quota_full",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::TeamBusy => write!(f, "team busy"),
            DenyReason::Overlap => write!(f, "overlaps an existing session"),
            DenyReason::QuotaFull => write!(f, "weekly quota full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_valid(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(r) => Some(*r),
        }
    }
}

pub(crate) fn validate_candidate(candidate: &Candidate, calendar: &Calendar) -> Result<(), EngineError> {
    if candidate.duration_minutes == 0 {
        return Err(EngineError::Invalid("duration must be positive"));
    }
    if candidate.duration_minutes > MAX_BOOKING_MINUTES {
        return Err(EngineError::Invalid("duration too long"));
    }
    if candidate.user_id.is_empty() || candidate.user_id.len() > MAX_ID_LEN {
        return Err(EngineError::Invalid("bad user id"));
    }
    if candidate.course_id.is_empty() || candidate.course_id.len() > MAX_ID_LEN {
        return Err(EngineError::Invalid("bad course id"));
    }
    // The end and the enclosing week must both be representable instants.
    let end = checked_add_minutes(candidate.start, i64::from(candidate.duration_minutes));
    if end.is_none() || calendar.checked_week_of(candidate.start).is_none() {
        return Err(EngineError::Invalid("start time out of range"));
    }
    Ok(())
}

/// Decide whether `candidate` may be booked. First failing check wins:
///
/// 1. work-hours start: any overlapping booking on the team → `TeamBusy`
/// 2. any hour: an overlapping booking of the same user → `Overlap`
/// 3. work-hours start: quota-counted minutes of the start's week plus the
///    candidate exceed the ceiling → `QuotaFull`
///
/// Pure; the candidate must already have passed validation.
pub fn authorize(candidate: &Candidate, ledger: &BookingLedger, calendar: &Calendar) -> Decision {
    let span = candidate.span();
    let work_hours = calendar.is_work_hours(candidate.start);

    if work_hours && find_team_conflict(ledger, &span, candidate.replaces.as_deref()).is_some() {
        return Decision::Denied(DenyReason::TeamBusy);
    }

    let own = ledger
        .overlapping(span)
        .filter(|b| b.user_id == candidate.user_id && !candidate.is_replaced(b));
    if find_own_conflict(&span, own).is_some() {
        return Decision::Denied(DenyReason::Overlap);
    }

    if work_hours {
        let week = calendar.week_of(candidate.start);
        let used = quota_minutes(
            calendar,
            ledger
                .for_user_in_week(&candidate.user_id, week)
                .filter(|b| !candidate.is_replaced(b)),
        );
        if !fits(used, candidate.duration_minutes) {
            return Decision::Denied(DenyReason::QuotaFull);
        }
    }

    Decision::Allowed
}

/// Evaluate each of the fixed duration options for one slot.
pub fn duration_options(candidate: &Candidate, ledger: &BookingLedger, calendar: &Calendar) -> Vec<(u32, Decision)> {
    DURATION_OPTIONS
        .iter()
        .map(|&minutes| (minutes, authorize(&candidate.with_duration(minutes), ledger, calendar)))
        .collect()
}
