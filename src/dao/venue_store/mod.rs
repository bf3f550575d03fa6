pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{collections::HashSet, time::SystemTime};

use futures::{future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::{
    models::{AnnouncementEntity, StationEntity},
    storage::{StorageError, StorageResult},
};

pub use memory::MemoryVenueStore;

/// Closure run by [`VenueStore::transact`] against a consistent read of the requested stations.
///
/// Backends may call it more than once when the underlying database asks for a retry; only the
/// last run is committed.
pub type TxWork<'a> = Box<dyn FnMut(&mut StationTx) -> TxAction + Send + 'a>;

/// Abstraction over the document store shared by every floor node.
pub trait VenueStore: Send + Sync {
    fn list_stations(&self) -> BoxFuture<'static, StorageResult<Vec<StationEntity>>>;
    fn find_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<StationEntity>>>;
    /// Upsert a station document as-is.
    fn save_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Read `ids`, hand them to `work` and atomically commit every document it touched.
    ///
    /// Returns `true` when the work asked for a commit and it went through, `false` when the work
    /// aborted. No partial write is ever visible to other readers.
    fn transact<'a>(
        &'a self,
        ids: Vec<Uuid>,
        work: TxWork<'a>,
    ) -> BoxFuture<'a, StorageResult<bool>>;
    /// Full station list, yielded on subscription and again after every change.
    fn watch_stations(&self) -> BoxStream<'static, StorageResult<Vec<StationEntity>>>;
    fn append_announcement(
        &self,
        announcement: AnnouncementEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// The `limit` most recent announcements newer than `since`, oldest first, yielded on
    /// subscription and again after every append.
    fn watch_announcements(
        &self,
        since: SystemTime,
        limit: usize,
    ) -> BoxStream<'static, StorageResult<Vec<AnnouncementEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Decision returned by a transaction closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Commit,
    Abort,
}

/// Outcome of a typed transaction built with [`with_station_tx`].
#[derive(Debug)]
pub enum TxOutcome<T> {
    /// Persist the touched documents and return the value.
    Commit(T),
    /// Discard every change and return the value.
    Abort(T),
}

/// Transactional view over a set of station documents.
#[derive(Debug, Default)]
pub struct StationTx {
    documents: IndexMap<Uuid, Option<StationEntity>>,
    touched: HashSet<Uuid>,
}

impl StationTx {
    /// Build a view from the documents read at the start of the transaction.
    pub fn new(documents: IndexMap<Uuid, Option<StationEntity>>) -> Self {
        Self {
            documents,
            touched: HashSet::new(),
        }
    }

    /// Borrow a station read by this transaction.
    pub fn get(&self, id: Uuid) -> Option<&StationEntity> {
        self.documents.get(&id).and_then(Option::as_ref)
    }

    /// Replace a station document; it will be written on commit.
    pub fn put(&mut self, station: StationEntity) {
        self.touched.insert(station.id);
        self.documents.insert(station.id, Some(station));
    }

    /// Documents written through [`StationTx::put`], in read order.
    pub fn into_changes(self) -> Vec<StationEntity> {
        let Self {
            documents,
            touched,
        } = self;
        documents
            .into_iter()
            .filter(|(id, _)| touched.contains(id))
            .filter_map(|(_, doc)| doc)
            .collect()
    }
}

/// Run `work` inside an atomic station transaction and hand its value back to the caller.
pub async fn with_station_tx<T, F>(
    store: &dyn VenueStore,
    ids: Vec<Uuid>,
    mut work: F,
) -> StorageResult<T>
where
    T: Send,
    F: FnMut(&mut StationTx) -> TxOutcome<T> + Send,
{
    let mut result = None;
    store
        .transact(
            ids,
            Box::new(|tx| {
                let (action, value) = match work(tx) {
                    TxOutcome::Commit(value) => (TxAction::Commit, value),
                    TxOutcome::Abort(value) => (TxAction::Abort, value),
                };
                result = Some(value);
                action
            }),
        )
        .await?;
    result.ok_or(StorageError::TransactionIncomplete)
}

/// Keep the `limit` most recent announcements newer than `since`, ordered oldest first.
pub fn recent_announcements(
    records: &[AnnouncementEntity],
    since: SystemTime,
    limit: usize,
) -> Vec<AnnouncementEntity> {
    let mut recent: Vec<AnnouncementEntity> = records
        .iter()
        .filter(|record| record.timestamp > since)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(limit);
    recent.reverse();
    recent
}
