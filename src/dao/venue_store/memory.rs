//! In-process store used by single-node setups and the test-suite.
//!
//! A single mutex serializes every transaction, which gives the same all-or-nothing visibility
//! the document store guarantees across processes.

use std::{sync::Arc, time::SystemTime};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

/// Announcements kept in memory; older records are dropped on append.
const ANNOUNCEMENT_HISTORY: usize = 64;

use super::{StationTx, TxAction, TxWork, VenueStore, recent_announcements};
use crate::dao::{
    models::{AnnouncementEntity, StationEntity},
    storage::StorageResult,
};

#[derive(Clone)]
pub struct MemoryVenueStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    stations: Mutex<IndexMap<Uuid, StationEntity>>,
    station_changes: watch::Sender<Arc<Vec<StationEntity>>>,
    /// Retained announcement history, oldest first. The channel value is the only copy.
    announcements: watch::Sender<Arc<Vec<AnnouncementEntity>>>,
}

impl MemoryVenueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (station_changes, _) = watch::channel(Arc::new(Vec::new()));
        let (announcements, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(MemoryInner {
                stations: Mutex::new(IndexMap::new()),
                station_changes,
                announcements,
            }),
        }
    }
}

impl Default for MemoryVenueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInner {
    fn publish_stations(&self, stations: &IndexMap<Uuid, StationEntity>) {
        let snapshot = Arc::new(stations.values().cloned().collect::<Vec<_>>());
        self.station_changes.send_replace(snapshot);
    }
}

impl VenueStore for MemoryVenueStore {
    fn list_stations(&self) -> BoxFuture<'static, StorageResult<Vec<StationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.inner.stations.lock().await;
            Ok(guard.values().cloned().collect())
        })
    }

    fn find_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<StationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.inner.stations.lock().await;
            Ok(guard.get(&id).cloned())
        })
    }

    fn save_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.stations.lock().await;
            guard.insert(station.id, station);
            store.inner.publish_stations(&guard);
            Ok(())
        })
    }

    fn delete_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.stations.lock().await;
            let removed = guard.shift_remove(&id).is_some();
            if removed {
                store.inner.publish_stations(&guard);
            }
            Ok(removed)
        })
    }

    fn transact<'a>(
        &'a self,
        ids: Vec<Uuid>,
        mut work: TxWork<'a>,
    ) -> BoxFuture<'a, StorageResult<bool>> {
        Box::pin(async move {
            let mut guard = self.inner.stations.lock().await;
            let documents = ids
                .iter()
                .map(|id| (*id, guard.get(id).cloned()))
                .collect::<IndexMap<_, _>>();
            let mut tx = StationTx::new(documents);

            if work(&mut tx) == TxAction::Abort {
                return Ok(false);
            }

            let changes = tx.into_changes();
            if !changes.is_empty() {
                for station in changes {
                    guard.insert(station.id, station);
                }
                self.inner.publish_stations(&guard);
            }
            Ok(true)
        })
    }

    fn watch_stations(&self) -> BoxStream<'static, StorageResult<Vec<StationEntity>>> {
        let receiver = self.inner.station_changes.subscribe();
        WatchStream::new(receiver)
            .map(|snapshot| Ok(snapshot.as_ref().clone()))
            .boxed()
    }

    fn append_announcement(
        &self,
        announcement: AnnouncementEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.announcements.send_modify(|records| {
                let records = Arc::make_mut(records);
                records.push(announcement);
                let overflow = records.len().saturating_sub(ANNOUNCEMENT_HISTORY);
                records.drain(..overflow);
            });
            Ok(())
        })
    }

    fn watch_announcements(
        &self,
        since: SystemTime,
        limit: usize,
    ) -> BoxStream<'static, StorageResult<Vec<AnnouncementEntity>>> {
        let receiver = self.inner.announcements.subscribe();
        WatchStream::new(receiver)
            .map(move |records| Ok(recent_announcements(&records, since, limit)))
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
