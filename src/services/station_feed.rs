use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    services::{background::BackgroundTask, sse_events},
    state::{SharedState, station::Station},
};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Mirror the store's station list into the node state and onto the floor SSE stream.
pub fn spawn(state: SharedState) -> BackgroundTask {
    BackgroundTask::spawn("station-feed", move |shutdown| run(state, shutdown))
}

async fn run(state: SharedState, shutdown: CancellationToken) {
    info!("station feed started");

    loop {
        if let Some(store) = state.store().await {
            let mut updates = store.watch_stations();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    next = updates.next() => match next {
                        Some(Ok(entities)) => {
                            let stations: Vec<Station> =
                                entities.into_iter().map(Station::from).collect();
                            debug!(count = stations.len(), "station snapshot received");
                            sse_events::broadcast_stations_snapshot(&state, &stations);
                            state.publish_stations(stations);
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, "station feed failed; resubscribing");
                            break;
                        }
                        None => {
                            debug!("station feed closed; resubscribing");
                            break;
                        }
                    },
                }
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(RESUBSCRIBE_DELAY) => {}
        }
    }
}
