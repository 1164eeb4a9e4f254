//! Course content generation. Best effort: callers always have a fallback draft.

use async_trait::async_trait;

use crate::model::{CourseDraft, Quiz};

#[derive(Debug)]
pub enum ContentError {
    /// No generator configured, or it could not be reached.
    Unavailable(String),
    /// The generator answered with something that is not a usable draft.
    Malformed(String),
}

impl std::fmt::Display for ContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentError::Unavailable(e) => write!(f, "content generator unavailable: {e}"),
            ContentError::Malformed(e) => write!(f, "malformed draft: {e}"),
        }
    }
}

impl std::error::Error for ContentError {}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Description, tags and quiz for a course with the given title and source url.
    async fn course_details(&self, title: &str, url: &str) -> Result<CourseDraft, ContentError>;
}

/// Generator used when nothing is configured.
pub struct NoContent;

#[async_trait]
impl ContentGenerator for NoContent {
    async fn course_details(&self, _title: &str, _url: &str) -> Result<CourseDraft, ContentError> {
        Err(ContentError::Unavailable("no generator configured".into()))
    }
}

pub const FALLBACK_DESCRIPTION: &str = "Could not generate description automatically. Please add one manually.";

pub fn fallback_draft() -> CourseDraft {
    CourseDraft {
        description: FALLBACK_DESCRIPTION.into(),
        tags: vec!["Custom".into()],
        quiz: Quiz::default(),
    }
}
