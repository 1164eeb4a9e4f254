use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::observability;
use crate::store::WalStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact once more than `threshold` appends have piled up since the last rewrite.
pub async fn compact_if_needed(store: &WalStore, threshold: u64) -> bool {
    let appends = match store.appends_since_compact().await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("compactor: cannot read WAL counter: {e}");
            return false;
        }
    };
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(events) => {
            metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL: {appends} appends folded into {events} events");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that periodically rewrites the WAL.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&store, threshold).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Booking;
    use crate::store::Store;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("learnslot_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn booking(id: &str) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 3, 7, 9, 0, 0).unwrap();
        Booking::new(id.into(), "u4".into(), "c1".into(), start, 30)
    }

    #[tokio::test]
    async fn below_threshold_leaves_log_alone() {
        let path = test_wal_path("below.wal");
        let store = WalStore::open(&path).unwrap();
        store.add_booking(booking("b1")).await.unwrap();
        assert!(!compact_if_needed(&store, 10).await);
        assert_eq!(store.appends_since_compact().await.unwrap(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn over_threshold_compacts() {
        let path = test_wal_path("over.wal");
        let store = WalStore::open(&path).unwrap();
        for i in 0..6 {
            let id = format!("b{i}");
            store.add_booking(booking(&id)).await.unwrap();
            store.delete_booking(&id).await.unwrap();
        }
        assert!(compact_if_needed(&store, 10).await);
        assert_eq!(store.appends_since_compact().await.unwrap(), 0);
        assert!(store.list_bookings().await.unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }
}
