use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::{Candidate, Decision, DenyReason};
use crate::limits::{DURATION_OPTIONS, LEADERBOARD_SIZE};
use crate::model::*;

use super::error::ApiError;
use super::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Header a caller uses to say who it is. Absent means trusted caller.
pub const USER_HEADER: &str = "x-user-id";

const MAX_LEADERBOARD: usize = 100;

fn require_owner(headers: &HeaderMap, owner: &str) -> ApiResult<()> {
    let Some(value) = headers.get(USER_HEADER) else {
        return Ok(());
    };
    let caller = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{USER_HEADER} is not valid text")))?;
    if caller == owner {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

// ── Request / response bodies ──────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Client-chosen idempotency key.
    #[serde(default)]
    pub id: Option<BookingId>,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub start_time: Ts,
    pub duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub start_time: Ts,
    /// Checked in addition to the fixed options.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Booking being moved, ignored by every check.
    #[serde(default)]
    pub replaces: Option<BookingId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBody {
    pub duration_minutes: u32,
    pub valid: bool,
    pub reason: Option<DenyReason>,
}

impl DecisionBody {
    fn new(duration_minutes: u32, decision: Decision) -> Self {
        Self {
            duration_minutes,
            valid: decision.is_valid(),
            reason: decision.reason(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub start_time: Ts,
    pub duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub id: Option<CourseId>,
    #[serde(flatten)]
    pub course: NewCourse,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseQuery {
    #[serde(default)]
    pub q: Option<String>,
    /// List the courses this user can still pick instead of searching.
    #[serde(default)]
    pub available_for: Option<UserId>,
    #[serde(default)]
    pub hide_completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AtQuery {
    #[serde(default)]
    pub at: Option<Ts>,
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// ── Handlers ───────────────────────────────────────────────

/// GET /health
pub async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/users
pub async fn get_users(State(s): State<Arc<AppState>>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(s.engine.list_users().await?))
}

/// GET /api/courses
pub async fn get_courses(
    State(s): State<Arc<AppState>>,
    query: Result<Query<CourseQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Course>>> {
    let Query(query) = query?;
    let courses = match query.available_for {
        Some(user) => {
            s.engine
                .available_courses(&user, query.hide_completed.unwrap_or(true))
                .await?
        }
        None => s.engine.search_courses(query.q.as_deref().unwrap_or("")).await?,
    };
    Ok(Json(courses))
}

/// POST /api/courses
pub async fn post_course(
    State(s): State<Arc<AppState>>,
    body: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let course = s.engine.add_course(req.course, req.id).await?;
    Ok((StatusCode::CREATED, Json(course)).into_response())
}

/// POST /api/courses/draft
pub async fn post_course_draft(
    State(s): State<Arc<AppState>>,
    body: Result<Json<DraftRequest>, JsonRejection>,
) -> ApiResult<Json<CourseDraft>> {
    let Json(req) = body?;
    Ok(Json(s.engine.draft_course(&req.title, &req.url).await?))
}

/// GET /api/bookings
pub async fn get_bookings(State(s): State<Arc<AppState>>) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(s.engine.list_bookings().await?))
}

/// GET /api/bookings/views
pub async fn get_booking_views(State(s): State<Arc<AppState>>) -> ApiResult<Json<Vec<BookingView>>> {
    Ok(Json(s.engine.booking_views().await?))
}

/// POST /api/bookings
pub async fn post_booking(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<BookingRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    require_owner(&headers, &req.user_id)?;
    let candidate = Candidate::new(req.user_id, req.course_id, req.start_time, req.duration_minutes);
    let booking = s.engine.create_booking(candidate, req.id).await?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

/// POST /api/bookings/check
pub async fn post_booking_check(
    State(s): State<Arc<AppState>>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<DecisionBody>>> {
    let Json(req) = body?;
    let mut candidate = Candidate::new(req.user_id, req.course_id, req.start_time, DURATION_OPTIONS[0]);
    candidate.replaces = req.replaces;

    let mut decisions: Vec<DecisionBody> = s
        .engine
        .check_duration_options(&candidate)
        .await?
        .into_iter()
        .map(|(minutes, decision)| DecisionBody::new(minutes, decision))
        .collect();

    if let Some(minutes) = req.duration_minutes
        && !DURATION_OPTIONS.contains(&minutes)
    {
        let decision = s.engine.check_booking(&candidate.with_duration(minutes)).await?;
        decisions.push(DecisionBody::new(minutes, decision));
    }
    Ok(Json(decisions))
}

/// PUT /api/bookings/:id
pub async fn put_booking(
    State(s): State<Arc<AppState>>,
    Path(id): Path<BookingId>,
    headers: HeaderMap,
    body: Result<Json<RescheduleRequest>, JsonRejection>,
) -> ApiResult<Json<Booking>> {
    let Json(req) = body?;
    let existing = s.engine.get_booking(&id).await?;
    require_owner(&headers, &existing.user_id)?;
    Ok(Json(
        s.engine
            .reschedule_booking(&id, req.start_time, req.duration_minutes)
            .await?,
    ))
}

/// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(s): State<Arc<AppState>>,
    Path(id): Path<BookingId>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let existing = s.engine.get_booking(&id).await?;
    require_owner(&headers, &existing.user_id)?;
    s.engine.cancel_booking(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/:id/usage
pub async fn get_usage(
    State(s): State<Arc<AppState>>,
    Path(user): Path<UserId>,
    query: Result<Query<AtQuery>, QueryRejection>,
) -> ApiResult<Json<WeeklyUsage>> {
    let Query(query) = query?;
    let at = query.at.unwrap_or_else(Utc::now);
    Ok(Json(s.engine.weekly_usage(&user, at).await?))
}

/// GET /api/users/:id/board
pub async fn get_board(
    State(s): State<Arc<AppState>>,
    Path(user): Path<UserId>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SlotView>>> {
    let Query(query) = query?;
    let date = query
        .date
        .unwrap_or_else(|| s.engine.calendar().local_date(Utc::now()));
    Ok(Json(s.engine.day_board(&user, date).await?))
}

/// GET /api/leaderboard
pub async fn get_leaderboard(
    State(s): State<Arc<AppState>>,
    query: Result<Query<AtQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let Query(query) = query?;
    let at = query.at.unwrap_or_else(Utc::now);
    let top = query.top.unwrap_or(LEADERBOARD_SIZE).min(MAX_LEADERBOARD);
    Ok(Json(s.engine.leaderboard(at, top).await?))
}

/// GET /api/admin/settings
pub async fn get_admin_settings(State(s): State<Arc<AppState>>) -> ApiResult<Json<AdminSettings>> {
    Ok(Json(s.engine.admin_settings().await?))
}

/// POST /api/admin/settings
pub async fn post_admin_settings(
    State(s): State<Arc<AppState>>,
    body: Result<Json<AdminSettings>, JsonRejection>,
) -> ApiResult<Json<AdminSettings>> {
    let Json(settings) = body?;
    s.engine.save_admin_settings(settings.clone()).await?;
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn owner_header_rules() {
        let mut headers = HeaderMap::new();
        assert!(require_owner(&headers, "u1").is_ok());
        headers.insert(USER_HEADER, HeaderValue::from_static("u1"));
        assert!(require_owner(&headers, "u1").is_ok());
        assert!(matches!(require_owner(&headers, "u2"), Err(ApiError::Forbidden)));
    }

    #[test]
    fn booking_request_ignores_end_time() {
        let req: BookingRequest = serde_json::from_str(
            r#"{"id":"b1","userId":"u1","courseId":"c1","startTime":"2025-03-04T10:00:00Z",
                "endTime":"2025-03-04T10:30:00Z","durationMinutes":30}"#,
        )
        .unwrap();
        assert_eq!(req.id.as_deref(), Some("b1"));
        assert_eq!(req.duration_minutes, 30);
    }

    #[test]
    fn course_request_accepts_full_course() {
        let req: CourseRequest = serde_json::from_str(
            r#"{"id":"c9","title":"Rust","url":"https://example.com","durationMinutes":30,
                "createdBy":"u1","tags":["Lang"]}"#,
        )
        .unwrap();
        assert_eq!(req.id.as_deref(), Some("c9"));
        assert_eq!(req.course.title, "Rust");
        assert_eq!(req.course.tags, ["Lang"]);
    }
}
