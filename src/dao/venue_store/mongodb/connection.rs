//! Connection bootstrap for the venue database.
//!
//! Session moves need multi-document transactions, which MongoDB only offers on a replica set or
//! a sharded cluster. A standalone server is refused here rather than on the first move.

use std::time::Duration;

use mongodb::{
    Client, Database,
    bson::{Document, doc},
    options::ClientOptions,
};
use tokio::time::sleep;
use tracing::{info, warn};

use super::error::{MongoDaoError, MongoResult};

const CONNECT_ATTEMPTS: u32 = 6;
const FIRST_BACKOFF: Duration = Duration::from_millis(500);
const BACKOFF_CEILING: Duration = Duration::from_secs(4);

/// Build a client, wait for the server to answer and check it can run transactions.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    wait_until_reachable(&database).await?;
    ensure_transactions(&database).await?;
    Ok((client, database))
}

async fn wait_until_reachable(database: &Database) -> MongoResult<()> {
    let mut attempt = 1;
    let mut backoff = FIRST_BACKOFF;

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                info!(attempt, database = database.name(), "venue database reachable");
                return Ok(());
            }
            Err(source) if attempt >= CONNECT_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    attempt,
                    retry_in_ms = backoff.as_millis() as u64,
                    error = %err,
                    "venue database not reachable yet"
                );
                sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CEILING);
                attempt += 1;
            }
        }
    }
}

async fn ensure_transactions(database: &Database) -> MongoResult<()> {
    let hello = database
        .run_command(doc! { "hello": 1 })
        .await
        .map_err(|source| MongoDaoError::Topology { source })?;

    if supports_transactions(&hello) {
        Ok(())
    } else {
        Err(MongoDaoError::TransactionsUnsupported)
    }
}

/// Replica set members report `setName`; `mongos` routers answer `msg: "isdbgrid"`.
fn supports_transactions(hello: &Document) -> bool {
    hello.contains_key("setName") || hello.get_str("msg").is_ok_and(|msg| msg == "isdbgrid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_sets_and_routers_support_transactions() {
        assert!(supports_transactions(
            &doc! { "isWritablePrimary": true, "setName": "rs0" }
        ));
        assert!(supports_transactions(&doc! { "msg": "isdbgrid" }));
    }

    #[test]
    fn standalone_server_is_refused() {
        assert!(!supports_transactions(&doc! { "isWritablePrimary": true }));
        assert!(!supports_transactions(&doc! { "msg": "something else" }));
    }
}
