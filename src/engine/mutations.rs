use ulid::Ulid;

use crate::content::{fallback_draft, ContentError};
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::authorize::{authorize, validate_candidate, Candidate, Decision};
use super::ledger::BookingLedger;
use super::{Engine, EngineError};

fn validate_id(id: &str, what: &'static str) -> Result<(), EngineError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(EngineError::Invalid(what));
    }
    Ok(())
}

/// Whether a stored booking is the one `candidate` describes.
fn same_request(existing: &Booking, candidate: &Candidate) -> bool {
    existing.user_id == candidate.user_id
        && existing.course_id == candidate.course_id
        && existing.start_time == candidate.start
        && existing.duration_minutes == candidate.duration_minutes
}

pub(crate) fn validate_course(course: &NewCourse) -> Result<(), EngineError> {
    if course.title.trim().is_empty() {
        return Err(EngineError::Invalid("course title is required"));
    }
    if course.title.len() > MAX_TITLE_LEN {
        return Err(EngineError::Invalid("course title too long"));
    }
    if course.description.len() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::Invalid("course description too long"));
    }
    if course.url.len() > MAX_URL_LEN {
        return Err(EngineError::Invalid("course url too long"));
    }
    if course.duration_minutes == 0 || course.duration_minutes > MAX_BOOKING_MINUTES {
        return Err(EngineError::Invalid("course duration out of range"));
    }
    validate_id(&course.created_by, "bad creator id")?;
    if course.tags.len() > MAX_TAGS {
        return Err(EngineError::Invalid("too many tags"));
    }
    if course
        .tags
        .iter()
        .any(|t| t.trim().is_empty() || t.len() > MAX_TAG_LEN)
    {
        return Err(EngineError::Invalid("bad tag"));
    }
    if let Some(quiz) = &course.quiz {
        validate_quiz(quiz)?;
    }
    Ok(())
}

fn validate_quiz(quiz: &Quiz) -> Result<(), EngineError> {
    if quiz.questions.len() > MAX_QUIZ_QUESTIONS {
        return Err(EngineError::Invalid("too many quiz questions"));
    }
    for q in &quiz.questions {
        if q.options.len() != QUIZ_OPTIONS {
            return Err(EngineError::Invalid("quiz questions need exactly four options"));
        }
        if usize::from(q.correct_answer_index) >= QUIZ_OPTIONS {
            return Err(EngineError::Invalid("quiz answer index out of range"));
        }
    }
    Ok(())
}

impl Engine {
    /// Denials are counted and logged here so every write path reports them the same way.
    fn check(&self, candidate: &Candidate, ledger: &BookingLedger) -> Result<(), EngineError> {
        match authorize(candidate, ledger, self.calendar()) {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => {
                metrics::counter!(observability::BOOKING_DENIALS_TOTAL, "reason" => reason.label()).increment(1);
                tracing::debug!(
                    user = %candidate.user_id,
                    start = %candidate.start,
                    minutes = candidate.duration_minutes,
                    %reason,
                    "booking denied"
                );
                Err(EngineError::Denied(reason))
            }
        }
    }

    /// Authorize and persist a new booking.
    ///
    /// `id` is an optional client-chosen idempotency key. Repeating a request with
    /// the same key returns the stored booking; reusing the key for a different
    /// request is `AlreadyExists`.
    pub async fn create_booking(&self, candidate: Candidate, id: Option<BookingId>) -> Result<Booking, EngineError> {
        validate_candidate(&candidate, self.calendar())?;
        if candidate.replaces.is_some() {
            return Err(EngineError::Invalid("use reschedule to replace a booking"));
        }
        if let Some(id) = &id {
            validate_id(id, "bad booking id")?;
        }

        let _commit = self.commit.lock().await;
        let ledger = self.load_ledger().await?;

        if let Some(id) = &id
            && let Some(existing) = ledger.get(id)
        {
            return if same_request(existing, &candidate) {
                Ok(existing.clone())
            } else {
                Err(EngineError::AlreadyExists(id.clone()))
            };
        }

        self.check(&candidate, &ledger)?;

        let booking = Booking::new(
            id.unwrap_or_else(|| Ulid::new().to_string()),
            candidate.user_id,
            candidate.course_id,
            candidate.start,
            candidate.duration_minutes,
        );
        self.store().add_booking(booking.clone()).await?;

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::info!(
            id = %booking.id,
            user = %booking.user_id,
            course = %booking.course_id,
            start = %booking.start_time,
            minutes = booking.duration_minutes,
            "booking created"
        );
        Ok(booking)
    }

    /// Move a booking to a new start and duration. The replaced booking does not
    /// count against its own move. Bookings are never edited in place: the new
    /// one is appended under a fresh id, then the old one is deleted.
    pub async fn reschedule_booking(&self, id: &str, start: Ts, duration_minutes: u32) -> Result<Booking, EngineError> {
        let _commit = self.commit.lock().await;
        let ledger = self.load_ledger().await?;
        let existing = ledger
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let candidate = Candidate::new(existing.user_id.clone(), existing.course_id.clone(), start, duration_minutes)
            .replacing(id);
        validate_candidate(&candidate, self.calendar())?;
        self.check(&candidate, &ledger)?;

        let booking = Booking::new(
            Ulid::new().to_string(),
            candidate.user_id,
            candidate.course_id,
            start,
            duration_minutes,
        );
        self.store().add_booking(booking.clone()).await?;
        if let Err(e) = self.store().delete_booking(id).await {
            tracing::error!(old = id, new = %booking.id, error = %e, "rescheduled booking left the old one behind");
            return Err(e.into());
        }

        metrics::counter!(observability::BOOKINGS_RESCHEDULED_TOTAL).increment(1);
        tracing::info!(old = id, new = %booking.id, start = %booking.start_time, minutes = duration_minutes, "booking rescheduled");
        Ok(booking)
    }

    /// Delete a booking. Ownership is the caller's concern.
    pub async fn cancel_booking(&self, id: &str) -> Result<Booking, EngineError> {
        let _commit = self.commit.lock().await;
        let ledger = self.load_ledger().await?;
        let booking = ledger
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.store().delete_booking(id).await?;

        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        tracing::info!(id, user = %booking.user_id, "booking cancelled");
        Ok(booking)
    }

    /// Store a course. Without an id a fresh one is assigned; an existing id is replaced.
    pub async fn add_course(&self, course: NewCourse, id: Option<CourseId>) -> Result<Course, EngineError> {
        validate_course(&course)?;
        if let Some(id) = &id {
            validate_id(id, "bad course id")?;
        }
        let course = Course {
            id: id.unwrap_or_else(|| Ulid::new().to_string()),
            title: course.title.trim().to_string(),
            description: course.description,
            url: course.url,
            duration_minutes: course.duration_minutes,
            created_by: course.created_by,
            tags: course.tags.into_iter().map(|t| t.trim().to_string()).collect(),
            quiz: course.quiz,
        };
        self.store().add_course(course.clone()).await?;
        tracing::info!(id = %course.id, title = %course.title, "course added");
        Ok(course)
    }

    /// Ask the content generator for a description, tags and quiz. Never fails
    /// on generator trouble: the fallback draft comes back instead.
    pub async fn draft_course(&self, title: &str, url: &str) -> Result<CourseDraft, EngineError> {
        if title.trim().is_empty() {
            return Err(EngineError::Invalid("course title is required"));
        }
        if title.len() > MAX_TITLE_LEN || url.len() > MAX_URL_LEN {
            return Err(EngineError::Invalid("title or url too long"));
        }
        let generated = self
            .content()
            .course_details(title, url)
            .await
            .and_then(|draft| match validate_quiz(&draft.quiz) {
                Ok(()) => Ok(draft),
                Err(e) => Err(ContentError::Malformed(e.to_string())),
            });
        match generated {
            Ok(draft) => Ok(draft),
            Err(e) => {
                tracing::warn!(title, error = %e, "course draft generation failed, using fallback");
                Ok(fallback_draft())
            }
        }
    }

    pub async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), EngineError> {
        if settings.oauth_url.len() > MAX_URL_LEN {
            return Err(EngineError::Invalid("oauth url too long"));
        }
        self.store().save_admin_settings(settings).await?;
        tracing::info!("admin settings saved");
        Ok(())
    }
}
