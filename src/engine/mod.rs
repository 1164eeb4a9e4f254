mod authorize;
mod conflict;
mod error;
mod ledger;
mod mutations;
mod queries;
mod quota;

pub use authorize::{authorize, duration_options, Candidate, Decision, DenyReason};
pub use conflict::{find_own_conflict, find_team_conflict};
pub use error::EngineError;
pub use ledger::BookingLedger;
pub use quota::{fits, quota_minutes, remaining, total_minutes, weekly_usage};

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::calendar::Calendar;
use crate::content::{ContentGenerator, NoContent};
use crate::store::Store;

/// Booking engine: authorization plus every write that depends on it.
///
/// The engine is the single authority for booking writes. Create and reschedule
/// run behind `commit`, re-reading the booking list inside the lock, so two
/// requests for the same work-hours slot can never both pass authorization.
pub struct Engine {
    store: Arc<dyn Store>,
    content: Arc<dyn ContentGenerator>,
    calendar: Calendar,
    commit: Mutex<()>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, calendar: Calendar) -> Self {
        Self {
            store,
            content: Arc::new(NoContent),
            calendar,
            commit: Mutex::new(()),
        }
    }

    pub fn with_content(mut self, content: Arc<dyn ContentGenerator>) -> Self {
        self.content = content;
        self
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn content(&self) -> &dyn ContentGenerator {
        self.content.as_ref()
    }

    /// Fresh snapshot of every persisted booking.
    pub async fn load_ledger(&self) -> Result<BookingLedger, EngineError> {
        Ok(BookingLedger::from(self.store.list_bookings().await?))
    }
}
