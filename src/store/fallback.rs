use async_trait::async_trait;

use crate::model::*;
use crate::observability;

use super::{Store, StoreError};

/// Reads prefer `primary` and fall back to `local` when it fails. Writes go to
/// `primary` and are mirrored into `local`. Only an unreachable primary lets a
/// write land locally on its own; a primary that answers with a refusal or
/// garbage fails the write and `local` is left as it was. Last write wins,
/// nothing is merged.
pub struct FallbackStore<P, L> {
    primary: P,
    local: L,
}

impl<P: Store, L: Store> FallbackStore<P, L> {
    pub fn new(primary: P, local: L) -> Self {
        Self { primary, local }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    async fn read<T, PF, LF>(&self, op: &'static str, primary: PF, local: LF) -> Result<T, StoreError>
    where
        PF: Future<Output = Result<T, StoreError>>,
        LF: Future<Output = Result<T, StoreError>>,
    {
        match primary.await {
            Ok(v) => Ok(v),
            Err(e) => {
                metrics::counter!(observability::STORE_FALLBACKS_TOTAL, "op" => op).increment(1);
                tracing::warn!(op, error = %e, "primary store read failed, using local copy");
                local.await
            }
        }
    }

    async fn write<PF, LF>(&self, op: &'static str, primary: PF, local: LF) -> Result<(), StoreError>
    where
        PF: Future<Output = Result<(), StoreError>>,
        LF: Future<Output = Result<(), StoreError>>,
    {
        match primary.await {
            Ok(()) => {
                if let Err(e) = local.await {
                    tracing::warn!(op, error = %e, "local mirror write failed");
                }
                Ok(())
            }
            Err(StoreError::Unavailable(e)) => {
                metrics::counter!(observability::STORE_FALLBACKS_TOTAL, "op" => op).increment(1);
                tracing::warn!(op, error = %e, "primary store unreachable, writing locally only");
                local.await
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<P: Store, L: Store> Store for FallbackStore<P, L> {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.read("list_users", self.primary.list_users(), self.local.list_users())
            .await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        self.read("list_courses", self.primary.list_courses(), self.local.list_courses())
            .await
    }

    async fn add_course(&self, course: Course) -> Result<(), StoreError> {
        self.write("add_course", self.primary.add_course(course.clone()), self.local.add_course(course))
            .await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        self.read("list_bookings", self.primary.list_bookings(), self.local.list_bookings())
            .await
    }

    async fn add_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.write("add_booking", self.primary.add_booking(booking.clone()), self.local.add_booking(booking))
            .await
    }

    async fn delete_booking(&self, id: &str) -> Result<(), StoreError> {
        self.write("delete_booking", self.primary.delete_booking(id), self.local.delete_booking(id))
            .await
    }

    async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
        self.read(
            "get_admin_settings",
            self.primary.get_admin_settings(),
            self.local.get_admin_settings(),
        )
        .await
    }

    async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), StoreError> {
        self.write(
            "save_admin_settings",
            self.primary.save_admin_settings(settings.clone()),
            self.local.save_admin_settings(settings),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    /// Primary whose every call fails as if the network were down.
    struct Down;

    #[async_trait]
    impl Store for Down {
        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn add_course(&self, _: Course) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn add_booking(&self, _: Booking) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn delete_booking(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn save_admin_settings(&self, _: AdminSettings) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    /// Primary that is reachable but refuses every write.
    struct Refuses(InMemoryStore);

    fn refused() -> StoreError {
        StoreError::Rejected {
            status: 409,
            message: "TeamBusy".into(),
        }
    }

    #[async_trait]
    impl Store for Refuses {
        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            self.0.list_users().await
        }
        async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
            self.0.list_courses().await
        }
        async fn add_course(&self, _: Course) -> Result<(), StoreError> {
            Err(refused())
        }
        async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
            self.0.list_bookings().await
        }
        async fn add_booking(&self, _: Booking) -> Result<(), StoreError> {
            Err(refused())
        }
        async fn delete_booking(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Decode("unexpected body".into()))
        }
        async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
            self.0.get_admin_settings().await
        }
        async fn save_admin_settings(&self, _: AdminSettings) -> Result<(), StoreError> {
            Err(refused())
        }
    }

    fn booking(id: &str) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 3, 6, 14, 0, 0).unwrap();
        Booking::new(id.into(), "u1".into(), "c2".into(), start, 30)
    }

    #[tokio::test]
    async fn down_primary_serves_local() {
        let store = FallbackStore::new(Down, InMemoryStore::new());
        store.add_booking(booking("b1")).await.unwrap();
        assert_eq!(store.list_bookings().await.unwrap(), vec![booking("b1")]);
        store.delete_booking("b1").await.unwrap();
        assert!(store.list_bookings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn healthy_primary_wins_reads_and_gets_writes() {
        let primary = InMemoryStore::new();
        primary.add_booking(booking("remote")).await.unwrap();
        let store = FallbackStore::new(primary, InMemoryStore::new());

        assert_eq!(store.list_bookings().await.unwrap(), vec![booking("remote")]);

        store.add_booking(booking("both")).await.unwrap();
        assert_eq!(store.local().list_bookings().await.unwrap(), vec![booking("both")]);
        assert_eq!(store.list_bookings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refused_writes_fail_and_leave_local_alone() {
        let local = InMemoryStore::new();
        local.add_booking(booking("kept")).await.unwrap();
        let store = FallbackStore::new(Refuses(InMemoryStore::new()), local);

        let err = store.add_booking(booking("b1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 409, .. }), "{err}");
        assert!(matches!(store.delete_booking("kept").await, Err(StoreError::Decode(_))));
        assert_eq!(store.local().list_bookings().await.unwrap(), vec![booking("kept")]);

        let settings = AdminSettings {
            oauth_url: "https://sso.example.com".into(),
        };
        assert!(store.save_admin_settings(settings).await.is_err());
        assert_eq!(store.local().get_admin_settings().await.unwrap(), AdminSettings::default());

        let course = crate::store::seed::default_courses().remove(0);
        assert!(store.add_course(course).await.is_err());
        assert!(store.local().list_courses().await.unwrap().is_empty());
    }
}
