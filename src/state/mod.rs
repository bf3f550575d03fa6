pub mod alerts;
mod sse;
pub mod station;

use std::{sync::Arc, time::SystemTime};

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::venue_store::VenueStore,
    error::ServiceError,
    services::{playback::PlaybackQueue, sse_events},
};

pub use self::alerts::{AlertBoard, Audience, ExpiryAlert};
pub use self::sse::SseHub;
use self::station::Station;

pub type SharedState = Arc<AppState>;

const FLOOR_SSE_CAPACITY: usize = 64;

/// Central state of a floor node: store handle, live station snapshot, alerts and the local
/// playback queue.
pub struct AppState {
    store: RwLock<Option<Arc<dyn VenueStore>>>,
    sse: SseHub,
    stations: watch::Sender<Arc<Vec<Station>>>,
    alerts: AlertBoard,
    playback: Arc<PlaybackQueue>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
    started_at: SystemTime,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The node starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, playback: PlaybackQueue) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (stations_tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Arc::new(Self {
            store: RwLock::new(None),
            sse: SseHub::new(FLOOR_SSE_CAPACITY),
            stations: stations_tx,
            alerts: AlertBoard::new(),
            playback: Arc::new(playback),
            config,
            degraded: degraded_tx,
            started_at: SystemTime::now(),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn VenueStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or a degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn VenueStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn VenueStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });

        if changed {
            sse_events::broadcast_system_status(self, value);
        }
    }

    /// Broadcast hub backing the floor SSE stream.
    pub fn floor_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Latest station list pushed by the store.
    pub fn station_snapshot(&self) -> Arc<Vec<Station>> {
        self.stations.borrow().clone()
    }

    /// Replace the live station snapshot.
    pub fn publish_stations(&self, stations: Vec<Station>) {
        self.stations.send_replace(Arc::new(stations));
    }

    /// Subscribe to station snapshot replacements.
    pub fn station_watcher(&self) -> watch::Receiver<Arc<Vec<Station>>> {
        self.stations.subscribe()
    }

    /// Pending expiry acknowledgements.
    pub fn alerts(&self) -> &AlertBoard {
        &self.alerts
    }

    /// The node's playback queue.
    pub fn playback(&self) -> &Arc<PlaybackQueue> {
        &self.playback
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// When this node started; older shared announcements are never replayed.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}
