//! Operator announcements shared between floor nodes.
//!
//! Messages are appended to the store's announcement channel; every node follows the channel
//! and queues the records it has not voiced yet.

use std::{collections::HashSet, time::Duration};

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::AnnouncementEntity,
    dto::{
        announcement::{AnnouncementRequest, AnnouncementResponse},
        format_system_time,
    },
    error::ServiceError,
    services::{background::BackgroundTask, sse_events},
    state::SharedState,
};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Append an operator message to the shared channel so every node voices it.
pub async fn publish_operator_message(
    state: &SharedState,
    request: AnnouncementRequest,
) -> Result<AnnouncementResponse, ServiceError> {
    let store = state.require_store().await?;
    let record = AnnouncementEntity {
        id: Uuid::new_v4(),
        text: request.text.trim().to_string(),
        timestamp: OffsetDateTime::now_utc().into(),
    };
    let response = AnnouncementResponse {
        id: record.id,
        timestamp: format_system_time(record.timestamp),
    };

    store.append_announcement(record).await?;
    info!(announcement_id = %response.id, "operator announcement published");
    Ok(response)
}

/// Ids of shared announcements this node already queued.
#[derive(Debug, Default)]
pub struct AnnouncementDedup {
    seen: HashSet<Uuid>,
}

impl AnnouncementDedup {
    /// Records from `batch` not handed out before, in batch order.
    pub fn fresh<'a>(&mut self, batch: &'a [AnnouncementEntity]) -> Vec<&'a AnnouncementEntity> {
        batch
            .iter()
            .filter(|record| self.seen.insert(record.id))
            .collect()
    }
}

/// Follow the shared channel and queue every new operator message on this node.
pub fn spawn_feed(state: SharedState) -> BackgroundTask {
    BackgroundTask::spawn("announcement-feed", move |shutdown| run_feed(state, shutdown))
}

async fn run_feed(state: SharedState, shutdown: CancellationToken) {
    let since = state.started_at();
    let limit = state.config().announcement_limit;
    let mut dedup = AnnouncementDedup::default();
    info!(limit, "announcement feed started");

    loop {
        if let Some(store) = state.store().await {
            let mut batches = store.watch_announcements(since, limit);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    next = batches.next() => match next {
                        Some(Ok(batch)) => {
                            for record in dedup.fresh(&batch) {
                                debug!(announcement_id = %record.id, "queueing operator announcement");
                                sse_events::broadcast_operator_announcement(&state, record);
                                state.playback().enqueue(record.text.clone());
                            }
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, "announcement feed failed; resubscribing");
                            break;
                        }
                        None => break,
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
