//! Error types shared by the MongoDB storage implementation.

use mongodb::error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR};
use thiserror::Error;
use uuid::Uuid;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("failed to read the MongoDB deployment topology")]
    Topology {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB deployment is a standalone server; station moves need a replica set")]
    TransactionsUnsupported,
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save station `{id}`")]
    SaveStation {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load station `{id}`")]
    LoadStation {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete station `{id}`")]
    DeleteStation {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list stations")]
    ListStations {
        #[source]
        source: MongoError,
    },
    #[error("stored station document `{id}` is malformed: {reason}")]
    InvalidDocument { id: String, reason: String },
    #[error("station transaction failed")]
    Transaction {
        #[source]
        source: MongoError,
    },
    #[error("failed to watch collection `{collection}`")]
    Watch {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to append announcement `{id}`")]
    AppendAnnouncement {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list announcements")]
    ListAnnouncements {
        #[source]
        source: MongoError,
    },
}

impl MongoDaoError {
    /// Whether MongoDB flagged the failed transaction as safe to retry from the start.
    pub fn is_transient_transaction(&self) -> bool {
        match self {
            MongoDaoError::Transaction { source } => {
                source.contains_label(TRANSIENT_TRANSACTION_ERROR)
            }
            _ => false,
        }
    }
}
