use std::{sync::Arc, time::SystemTime};

use async_stream::try_stream;
use futures::{
    StreamExt, TryStreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use indexmap::IndexMap;
use mongodb::{
    Client, ClientSession, Collection, Database,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoAnnouncementDocument, MongoStationDocument, doc_id},
};
use crate::dao::{
    models::{AnnouncementEntity, StationEntity},
    storage::{StorageError, StorageResult},
    venue_store::{StationTx, TxAction, TxWork, VenueStore},
};

const STATION_COLLECTION_NAME: &str = "stations";
const ANNOUNCEMENT_COLLECTION_NAME: &str = "announcements";
/// Attempts for a transaction that keeps hitting write conflicts.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct MongoVenueStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoVenueStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    ///
    /// Transactions and change streams require the server to run as a replica set.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.announcement_collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"timestamp": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("announcement_timestamp_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ANNOUNCEMENT_COLLECTION_NAME,
                index: "timestamp",
                source,
            })?;

        Ok(())
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn collection(&self) -> Collection<MongoStationDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoStationDocument>(STATION_COLLECTION_NAME)
    }

    async fn announcement_collection(&self) -> Collection<MongoAnnouncementDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoAnnouncementDocument>(ANNOUNCEMENT_COLLECTION_NAME)
    }

    async fn list_stations(&self) -> MongoResult<Vec<StationEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoStationDocument> = collection
            .find(doc! {})
            .sort(doc! {"name": 1})
            .await
            .map_err(|source| MongoDaoError::ListStations { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListStations { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_station(&self, id: Uuid) -> MongoResult<Option<StationEntity>> {
        let collection = self.collection().await;

        collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadStation { id, source })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn save_station(&self, station: StationEntity) -> MongoResult<()> {
        let id = station.id;
        let document: MongoStationDocument = station.into();
        let collection = self.collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveStation { id, source })?;

        Ok(())
    }

    async fn delete_station(&self, id: Uuid) -> MongoResult<bool> {
        let collection = self.collection().await;
        let result = collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteStation { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn transact(&self, ids: &[Uuid], work: &mut TxWork<'_>) -> MongoResult<bool> {
        let mut attempt = 1;
        loop {
            match self.transact_once(ids, work).await {
                Err(err) if err.is_transient_transaction() && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    debug!(attempt, error = %err, "station transaction conflicted; retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn transact_once(&self, ids: &[Uuid], work: &mut TxWork<'_>) -> MongoResult<bool> {
        let client = self.client().await;
        let collection = self.collection().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;

        let mut documents = IndexMap::with_capacity(ids.len());
        for id in ids {
            let found = collection
                .find_one(doc_id(*id))
                .session(&mut session)
                .await
                .map_err(|source| MongoDaoError::Transaction { source })?
                .map(StationEntity::try_from)
                .transpose()?;
            documents.insert(*id, found);
        }

        let mut tx = StationTx::new(documents);
        if work(&mut tx) == TxAction::Abort {
            abort(&mut session).await?;
            return Ok(false);
        }

        for station in tx.into_changes() {
            let id = station.id;
            let document: MongoStationDocument = station.into();
            collection
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .session(&mut session)
                .await
                .map_err(|source| MongoDaoError::Transaction { source })?;
        }

        session
            .commit_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;
        Ok(true)
    }

    async fn append_announcement(&self, announcement: AnnouncementEntity) -> MongoResult<()> {
        let id = announcement.id;
        let document: MongoAnnouncementDocument = announcement.into();
        self.announcement_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendAnnouncement { id, source })?;
        Ok(())
    }

    async fn recent_announcements(
        &self,
        since: SystemTime,
        limit: usize,
    ) -> MongoResult<Vec<AnnouncementEntity>> {
        let collection = self.announcement_collection().await;
        let documents: Vec<MongoAnnouncementDocument> = collection
            .find(doc! {"timestamp": {"$gt": DateTime::from_system_time(since)}})
            .sort(doc! {"timestamp": -1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::ListAnnouncements { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListAnnouncements { source })?;

        let mut records = documents
            .into_iter()
            .map(AnnouncementEntity::try_from)
            .collect::<MongoResult<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }
}

async fn abort(session: &mut ClientSession) -> MongoResult<()> {
    session
        .abort_transaction()
        .await
        .map_err(|source| MongoDaoError::Transaction { source })
}

impl VenueStore for MongoVenueStore {
    fn list_stations(&self) -> BoxFuture<'static, StorageResult<Vec<StationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_stations().await.map_err(Into::into) })
    }

    fn find_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<StationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_station(id).await.map_err(Into::into) })
    }

    fn save_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_station(station).await.map_err(Into::into) })
    }

    fn delete_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_station(id).await.map_err(Into::into) })
    }

    fn transact<'a>(
        &'a self,
        ids: Vec<Uuid>,
        mut work: TxWork<'a>,
    ) -> BoxFuture<'a, StorageResult<bool>> {
        Box::pin(async move { self.transact(&ids, &mut work).await.map_err(Into::into) })
    }

    fn watch_stations(&self) -> BoxStream<'static, StorageResult<Vec<StationEntity>>> {
        let store = self.clone();
        try_stream! {
            // Open the change stream first so no write slips in between the snapshot and it.
            let mut changes = store
                .collection()
                .await
                .watch()
                .await
                .map_err(|source| StorageError::from(MongoDaoError::Watch {
                    collection: STATION_COLLECTION_NAME,
                    source,
                }))?;
            yield store.list_stations().await.map_err(StorageError::from)?;

            while changes
                .try_next()
                .await
                .map_err(|source| StorageError::from(MongoDaoError::Watch {
                    collection: STATION_COLLECTION_NAME,
                    source,
                }))?
                .is_some()
            {
                yield store.list_stations().await.map_err(StorageError::from)?;
            }
        }
        .boxed()
    }

    fn append_announcement(
        &self,
        announcement: AnnouncementEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .append_announcement(announcement)
                .await
                .map_err(Into::into)
        })
    }

    fn watch_announcements(
        &self,
        since: SystemTime,
        limit: usize,
    ) -> BoxStream<'static, StorageResult<Vec<AnnouncementEntity>>> {
        let store = self.clone();
        try_stream! {
            let mut changes = store
                .announcement_collection()
                .await
                .watch()
                .await
                .map_err(|source| StorageError::from(MongoDaoError::Watch {
                    collection: ANNOUNCEMENT_COLLECTION_NAME,
                    source,
                }))?;
            yield store
                .recent_announcements(since, limit)
                .await
                .map_err(StorageError::from)?;

            while changes
                .try_next()
                .await
                .map_err(|source| StorageError::from(MongoDaoError::Watch {
                    collection: ANNOUNCEMENT_COLLECTION_NAME,
                    source,
                }))?
                .is_some()
            {
                yield store
                    .recent_announcements(since, limit)
                    .await
                    .map_err(StorageError::from)?;
            }
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
