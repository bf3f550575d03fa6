use std::sync::Arc;

use arcade_floor_back::{
    config::AppConfig,
    dao::venue_store::{MemoryVenueStore, VenueStore},
    services::{
        playback::{
            AudioOutput, LocalVoice, PlaybackBackends, PlaybackError, PlaybackLimits,
            PlaybackQueue,
        },
        speech::DisabledSynthesizer,
    },
    state::{AppState, SharedState},
};
use futures::future::BoxFuture;

/// Output and voice that accept everything without making a sound.
pub struct Mute;

impl AudioOutput for Mute {
    fn play<'a>(&'a self, _audio: &'a [u8]) -> BoxFuture<'a, Result<(), PlaybackError>> {
        Box::pin(async { Ok(()) })
    }
}

impl LocalVoice for Mute {
    fn speak<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<(), PlaybackError>> {
        Box::pin(async { Ok(()) })
    }
}

/// A node with no store installed yet, so it starts degraded. Audio stays locked, which keeps
/// every queued announcement counted in `pending()`.
pub fn node() -> SharedState {
    let backends = PlaybackBackends {
        synthesizer: Arc::new(DisabledSynthesizer),
        output: Arc::new(Mute),
        voice: Arc::new(Mute),
    };
    let playback = PlaybackQueue::new(backends, PlaybackLimits::default());
    AppState::new(AppConfig::default(), playback)
}

/// A node backed by `store`.
pub async fn node_on(store: MemoryVenueStore) -> SharedState {
    let state = node();
    state.set_store(Arc::new(store) as Arc<dyn VenueStore>).await;
    state
}
