use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use super::{seed, InMemoryStore, Store, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

type Pending = (Event, oneshot::Sender<io::Result<()>>);

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Control(Control),
}

enum Control {
    /// Respond with the number of events in the rewritten log.
    Compact {
        response: oneshot::Sender<io::Result<usize>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the log and is the only writer of `state`. Appends that queue up while
/// one fsync runs are written together and share the next fsync. An event is
/// applied once it is durable, whether or not its caller is still waiting.
async fn wal_writer_loop(mut wal: Wal, state: Arc<InMemoryStore>, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            WalCommand::Control(control) => {
                handle_control(&mut wal, &state, control);
                continue;
            }
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                WalCommand::Control(control) => {
                    deferred = Some(control);
                    break;
                }
            }
        }

        commit_batch(&mut wal, &state, batch);
        if let Some(control) = deferred {
            handle_control(&mut wal, &state, control);
        }
    }
    tracing::debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, state: &InMemoryStore, batch: Vec<Pending>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();
    let result = flush_batch(wal, &batch);
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!(error = %e, batch = batch.len(), "WAL flush failed");
    }
    for (event, tx) in batch {
        let r = match &result {
            Ok(()) => {
                state.apply_event(&event);
                Ok(())
            }
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let appended = batch.iter().try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so stale bytes don't ride along with the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_control(wal: &mut Wal, state: &InMemoryStore, control: Control) {
    match control {
        Control::Compact { response } => {
            // Every queued append ahead of this command is already applied.
            let events = state.snapshot();
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file())
                .map(|()| events.len());
            let _ = response.send(result);
        }
        Control::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
    }
}

/// Durable local store: in-memory state rebuilt from an append-only log.
pub struct WalStore {
    state: Arc<InMemoryStore>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Shared by appends, exclusive for seeding, so the emptiness check and the
    /// seed events are not interleaved with other writes.
    gate: RwLock<()>,
}

impl WalStore {
    /// Replay `path` and start the writer task. Must run inside a Tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let state = Arc::new(InMemoryStore::new());
        for event in &events {
            state.apply_event(event);
        }
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, state.clone(), wal_rx));

        tracing::info!(
            path = %path.display(),
            events = events.len(),
            bookings = state.booking_count(),
            "WAL replayed"
        );
        Ok(Self {
            state,
            wal_tx,
            gate: RwLock::new(()),
        })
    }

    /// Write the reference team and courses if nothing has been stored yet.
    pub async fn seed_if_empty(&self) -> Result<bool, StoreError> {
        let _guard = self.gate.write().await;
        if !self.state.is_empty() {
            return Ok(false);
        }
        for event in seed::seed_events() {
            self.append_locked(event).await?;
        }
        tracing::info!("seeded empty store with default users and courses");
        Ok(true)
    }

    async fn append_locked(&self, event: Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event, response: tx })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)??;
        Ok(())
    }

    async fn persist(&self, event: Event) -> Result<(), StoreError> {
        let _guard = self.gate.read().await;
        self.append_locked(event).await
    }

    /// Rewrite the log as the minimal event list for the current state.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Control(Control::Compact { response: tx }))
            .await
            .map_err(|_| StoreError::Closed)?;
        Ok(rx.await.map_err(|_| StoreError::Closed)??)
    }

    pub async fn appends_since_compact(&self) -> Result<u64, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Control(Control::AppendsSinceCompact { response: tx }))
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }
}

#[async_trait]
impl Store for WalStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.state.users())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.state.courses())
    }

    async fn add_course(&self, course: Course) -> Result<(), StoreError> {
        self.persist(Event::CourseAdded { course }).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.state.bookings())
    }

    async fn add_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.persist(Event::BookingCreated { booking }).await
    }

    async fn delete_booking(&self, id: &str) -> Result<(), StoreError> {
        self.persist(Event::BookingCancelled { id: id.to_string() }).await
    }

    async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
        Ok(self.state.admin_settings())
    }

    async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), StoreError> {
        self.persist(Event::AdminSettingsSaved { settings }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("learnslot_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn booking(id: &str, hour: u32) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 3, 5, hour, 0, 0).unwrap();
        Booking::new(id.into(), "u2".into(), "c3".into(), start, 45)
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let path = test_wal_path("reopen.wal");
        {
            let store = WalStore::open(&path).unwrap();
            assert!(store.seed_if_empty().await.unwrap());
            store.add_booking(booking("b1", 9)).await.unwrap();
            store.add_booking(booking("b2", 10)).await.unwrap();
            store.delete_booking("b1").await.unwrap();
            store
                .save_admin_settings(AdminSettings { oauth_url: "https://sso.example.com".into() })
                .await
                .unwrap();
        }

        let store = WalStore::open(&path).unwrap();
        assert!(!store.seed_if_empty().await.unwrap());
        assert_eq!(store.list_users().await.unwrap(), seed::default_users());
        assert_eq!(store.list_courses().await.unwrap(), seed::default_courses());
        assert_eq!(store.list_bookings().await.unwrap(), vec![booking("b2", 10)]);
        assert_eq!(store.get_admin_settings().await.unwrap().oauth_url, "https://sso.example.com");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn compact_keeps_state_and_resets_counter() {
        let path = test_wal_path("compact.wal");
        {
            let store = WalStore::open(&path).unwrap();
            for i in 0..10 {
                let id = format!("tmp{i}");
                store.add_booking(booking(&id, 9)).await.unwrap();
                store.delete_booking(&id).await.unwrap();
            }
            store.add_booking(booking("kept", 11)).await.unwrap();
            assert_eq!(store.appends_since_compact().await.unwrap(), 21);

            assert_eq!(store.compact().await.unwrap(), 1);
            assert_eq!(store.appends_since_compact().await.unwrap(), 0);
        }

        let store = WalStore::open(&path).unwrap();
        assert_eq!(store.list_bookings().await.unwrap(), vec![booking("kept", 11)]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn concurrent_appends_all_land() {
        let path = test_wal_path("concurrent.wal");
        let store = Arc::new(WalStore::open(&path).unwrap());
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.add_booking(booking(&format!("b{i:02}"), 8)).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(store.list_bookings().await.unwrap().len(), 50);
        drop(store);

        let reopened = WalStore::open(&path).unwrap();
        assert_eq!(reopened.list_bookings().await.unwrap().len(), 50);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn abandoned_append_still_reaches_memory() {
        let path = test_wal_path("abandoned.wal");
        let store = WalStore::open(&path).unwrap();
        {
            let mut pending = store.add_booking(booking("b1", 9));
            // One poll queues the event, then the caller gives up on it.
            assert!(futures::poll!(pending.as_mut()).is_pending());
        }
        // Control commands queue behind appends.
        assert_eq!(store.appends_since_compact().await.unwrap(), 1);
        assert_eq!(store.list_bookings().await.unwrap(), vec![booking("b1", 9)]);
        drop(store);

        let reopened = WalStore::open(&path).unwrap();
        assert_eq!(reopened.list_bookings().await.unwrap(), vec![booking("b1", 9)]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn compact_after_abandoned_append_keeps_it() {
        let path = test_wal_path("abandoned_compact.wal");
        let store = WalStore::open(&path).unwrap();
        {
            let mut pending = store.add_booking(booking("b1", 9));
            assert!(futures::poll!(pending.as_mut()).is_pending());
        }
        assert_eq!(store.compact().await.unwrap(), 1);
        drop(store);

        let reopened = WalStore::open(&path).unwrap();
        assert_eq!(reopened.list_bookings().await.unwrap(), vec![booking("b1", 9)]);
        let _ = std::fs::remove_file(&path);
    }
}
