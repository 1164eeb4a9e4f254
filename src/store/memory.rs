use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::*;

use super::{Store, StoreError};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local state. Also the replay target for [`super::WalStore`].
pub struct InMemoryStore {
    users: RwLock<Vec<User>>,
    /// Insertion order is kept: the first course is the default pick.
    courses: RwLock<Vec<Course>>,
    bookings: DashMap<BookingId, Booking>,
    admin: RwLock<AdminSettings>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            courses: RwLock::new(Vec::new()),
            bookings: DashMap::new(),
            admin: RwLock::new(AdminSettings::default()),
        }
    }

    /// Store pre-populated with the given users and courses.
    pub fn with_directory(users: Vec<User>, courses: Vec<Course>) -> Self {
        let store = Self::new();
        for user in users {
            store.apply_event(&Event::UserAdded { user });
        }
        for course in courses {
            store.apply_event(&Event::CourseAdded { course });
        }
        store
    }

    pub fn users(&self) -> Vec<User> {
        read(&self.users).clone()
    }

    pub fn courses(&self) -> Vec<Course> {
        read(&self.courses).clone()
    }

    /// All bookings ordered by start time, then id.
    pub fn bookings(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn admin_settings(&self) -> AdminSettings {
        read(&self.admin).clone()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.users).is_empty() && read(&self.courses).is_empty() && self.bookings.is_empty()
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::UserAdded { user } => {
                let mut users = write(&self.users);
                match users.iter_mut().find(|u| u.id == user.id) {
                    Some(existing) => *existing = user.clone(),
                    None => users.push(user.clone()),
                }
            }
            Event::CourseAdded { course } => {
                let mut courses = write(&self.courses);
                match courses.iter_mut().find(|c| c.id == course.id) {
                    Some(existing) => *existing = course.clone(),
                    None => courses.push(course.clone()),
                }
            }
            Event::BookingCreated { booking } => {
                self.bookings.insert(booking.id.clone(), booking.clone());
            }
            Event::BookingCancelled { id } => {
                self.bookings.remove(id);
            }
            Event::AdminSettingsSaved { settings } => {
                *write(&self.admin) = settings.clone();
            }
        }
    }

    /// Minimal event list that recreates the current state.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for user in self.users() {
            events.push(Event::UserAdded { user });
        }
        for course in self.courses() {
            events.push(Event::CourseAdded { course });
        }
        for booking in self.bookings() {
            events.push(Event::BookingCreated { booking });
        }
        let settings = self.admin_settings();
        if settings != AdminSettings::default() {
            events.push(Event::AdminSettingsSaved { settings });
        }
        events
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.courses())
    }

    async fn add_course(&self, course: Course) -> Result<(), StoreError> {
        self.apply_event(&Event::CourseAdded { course });
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.bookings())
    }

    async fn add_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.apply_event(&Event::BookingCreated { booking });
        Ok(())
    }

    async fn delete_booking(&self, id: &str) -> Result<(), StoreError> {
        self.apply_event(&Event::BookingCancelled { id: id.to_string() });
        Ok(())
    }

    async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
        Ok(self.admin_settings())
    }

    async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), StoreError> {
        self.apply_event(&Event::AdminSettingsSaved { settings });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed;
    use chrono::{TimeZone, Utc};

    fn booking(id: &str, h: u32) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 3, 4, h, 0, 0).unwrap();
        Booking::new(id.into(), "u1".into(), "c1".into(), start, 30)
    }

    #[tokio::test]
    async fn bookings_listed_in_start_order() {
        let store = InMemoryStore::new();
        store.add_booking(booking("b", 11)).await.unwrap();
        store.add_booking(booking("a", 9)).await.unwrap();
        let ids: Vec<_> = store.list_bookings().await.unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let store = InMemoryStore::new();
        store.add_booking(booking("a", 9)).await.unwrap();
        store.delete_booking("nope").await.unwrap();
        assert_eq!(store.booking_count(), 1);
        store.delete_booking("a").await.unwrap();
        assert_eq!(store.booking_count(), 0);
    }

    #[tokio::test]
    async fn courses_keep_insertion_order_and_replace_by_id() {
        let store = InMemoryStore::with_directory(seed::default_users(), seed::default_courses());
        let mut first = store.courses()[0].clone();
        first.title = "Renamed".into();
        store.add_course(first.clone()).await.unwrap();

        let courses = store.list_courses().await.unwrap();
        assert_eq!(courses.len(), seed::default_courses().len());
        assert_eq!(courses[0], first);
    }

    #[test]
    fn snapshot_recreates_state() {
        let store = InMemoryStore::with_directory(seed::default_users(), Vec::new());
        store.apply_event(&Event::BookingCreated { booking: booking("a", 9) });
        store.apply_event(&Event::BookingCreated { booking: booking("b", 10) });
        store.apply_event(&Event::BookingCancelled { id: "a".into() });
        store.apply_event(&Event::AdminSettingsSaved {
            settings: AdminSettings { oauth_url: "https://sso.example.com".into() },
        });

        let replayed = InMemoryStore::new();
        for event in store.snapshot() {
            replayed.apply_event(&event);
        }
        assert_eq!(replayed.users(), store.users());
        assert_eq!(replayed.bookings(), store.bookings());
        assert_eq!(replayed.admin_settings(), store.admin_settings());
    }

    #[test]
    fn snapshot_skips_default_settings() {
        let store = InMemoryStore::new();
        assert!(store.snapshot().is_empty());
        assert!(store.is_empty());
    }
}
