mod fallback;
mod memory;
mod remote;
pub mod seed;
mod wal_store;

pub use fallback::FallbackStore;
pub use memory::InMemoryStore;
pub use remote::RemoteStore;
pub use wal_store::WalStore;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    /// Transport unreachable or timed out. A write may or may not have landed.
    Unavailable(String),
    /// The other side answered and refused the request.
    Rejected { status: u16, message: String },
    Decode(String),
    Io(io::Error),
    /// Background log writer is gone.
    Closed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
            StoreError::Rejected { status, message } => write!(f, "rejected ({status}): {message}"),
            StoreError::Decode(e) => write!(f, "decode error: {e}"),
            StoreError::Io(e) => write!(f, "io error: {e}"),
            StoreError::Closed => write!(f, "WAL writer shut down"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// The persistence collaborator. Plain list/append/delete; no transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;
    async fn add_course(&self, course: Course) -> Result<(), StoreError>;
    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError>;
    async fn add_booking(&self, booking: Booking) -> Result<(), StoreError>;
    /// Removing an id that does not exist is not an error.
    async fn delete_booking(&self, id: &str) -> Result<(), StoreError>;
    async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError>;
    async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).list_users().await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        (**self).list_courses().await
    }

    async fn add_course(&self, course: Course) -> Result<(), StoreError> {
        (**self).add_course(course).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        (**self).list_bookings().await
    }

    async fn add_booking(&self, booking: Booking) -> Result<(), StoreError> {
        (**self).add_booking(booking).await
    }

    async fn delete_booking(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete_booking(id).await
    }

    async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
        (**self).get_admin_settings().await
    }

    async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), StoreError> {
        (**self).save_admin_settings(settings).await
    }
}
