//! Per-node announcement playback.
//!
//! Every announcement a node voices goes through one [`PlaybackQueue`]: items are played in
//! arrival order with a single item in flight. Each item is first synthesized remotely and played
//! on the audio output; when synthesis fails, the output refuses the clip or stays silent past
//! its ceiling, it is spoken by the local fallback voice instead, bounded by a timeout. Nothing is
//! voiced until a user gesture unlocks audio.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{
    sync::{OnceCell, mpsc, watch},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::background::BackgroundTask;

/// Remote text-to-speech engine.
pub trait SpeechSynthesizer: Send + Sync {
    /// Audio bytes for `text`, in a format the [`AudioOutput`] understands.
    fn synthesize<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<u8>, SpeechError>>;
}

/// Device that plays synthesized audio.
pub trait AudioOutput: Send + Sync {
    /// Resolve once the clip finished playing.
    fn play<'a>(&'a self, audio: &'a [u8]) -> BoxFuture<'a, Result<(), PlaybackError>>;
}

/// On-device speech used when remote synthesis or playback fails.
pub trait LocalVoice: Send + Sync {
    fn speak<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), PlaybackError>>;
}

/// Failure of the remote speech engine. Never surfaced to operators.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech service request failed")]
    Request(#[source] reqwest::Error),
    #[error("speech service reported an error: {0}")]
    Service(String),
    #[error("speech service returned no audio")]
    EmptyAudio,
    #[error("speech service returned an invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("remote speech synthesis is disabled")]
    Disabled,
}

/// Failure of a local audio backend.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The backend refused to start; the item goes to the fallback voice.
    #[error("audio backend refused to start: {0}")]
    Rejected(String),
    /// Playback started and then broke; the item counts as voiced.
    #[error("audio playback interrupted: {0}")]
    Interrupted(String),
}

/// Time ceilings applied to each queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackLimits {
    /// Longest a synthesized clip may hold the output before the item goes to the fallback.
    pub output_timeout: Duration,
    /// Longest the fallback voice may take before the queue moves on.
    pub fallback_timeout: Duration,
}

impl Default for PlaybackLimits {
    fn default() -> Self {
        Self {
            output_timeout: Duration::from_secs(60),
            fallback_timeout: Duration::from_secs(8),
        }
    }
}

/// How an item ended up being voiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Remote,
    RemoteInterrupted,
    Fallback,
    FallbackFailed,
    FallbackTimedOut,
}

/// Audio backends used by a [`PlaybackQueue`].
#[derive(Clone)]
pub struct PlaybackBackends {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub output: Arc<dyn AudioOutput>,
    pub voice: Arc<dyn LocalVoice>,
}

/// FIFO, single-flight announcement player owned by the node.
pub struct PlaybackQueue {
    sender: mpsc::UnboundedSender<String>,
    pending: watch::Sender<usize>,
    unlocked: watch::Sender<bool>,
    primed: OnceCell<()>,
    output: Arc<dyn AudioOutput>,
    limits: PlaybackLimits,
    _worker: BackgroundTask,
}

impl PlaybackQueue {
    /// Start the playback worker. Must be called from within a Tokio runtime.
    pub fn new(backends: PlaybackBackends, limits: PlaybackLimits) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _rx) = watch::channel(0usize);
        let (unlocked, unlocked_rx) = watch::channel(false);
        let output = backends.output.clone();

        let worker = Worker {
            receiver,
            pending: pending.clone(),
            unlocked: unlocked_rx,
            backends,
            limits,
        };
        let worker = BackgroundTask::spawn("playback", move |shutdown| worker.run(shutdown));

        Self {
            sender,
            pending,
            unlocked,
            primed: OnceCell::new(),
            output,
            limits,
            _worker: worker,
        }
    }

    /// Append an announcement to the queue.
    pub fn enqueue(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }

        self.pending.send_modify(|count| *count += 1);
        if let Err(err) = self.sender.send(text) {
            self.pending.send_modify(|count| *count = count.saturating_sub(1));
            warn!(text = %err.0, "playback worker is gone; dropping announcement");
        }
    }

    /// Items waiting or playing.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    pub fn is_unlocked(&self) -> bool {
        *self.unlocked.borrow()
    }

    /// Open the audio gate after a user gesture.
    ///
    /// The first call plays a silent clip to prime the output; later calls do nothing. Returns
    /// whether this call opened the gate.
    pub async fn unlock(&self) -> bool {
        let mut opened = false;
        self.primed
            .get_or_init(|| {
                opened = true;
                let output = self.output.clone();
                let ceiling = self.limits.output_timeout;
                async move {
                    match timeout(ceiling, output.play(&silent_clip())).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => warn!(error = %err, "failed to prime audio output"),
                        Err(_) => warn!("priming the audio output timed out"),
                    }
                }
            })
            .await;

        if opened {
            self.unlocked.send_replace(true);
            info!("audio unlocked; playback queue running");
        }
        opened
    }

    /// Wait until every queued item has been voiced or dropped.
    pub async fn wait_idle(&self) {
        let mut pending = self.pending.subscribe();
        let _ = pending.wait_for(|count| *count == 0).await;
    }
}

struct Worker {
    receiver: mpsc::UnboundedReceiver<String>,
    pending: watch::Sender<usize>,
    unlocked: watch::Receiver<bool>,
    backends: PlaybackBackends,
    limits: PlaybackLimits,
}

impl Worker {
    async fn run(mut self, shutdown: CancellationToken) {
        let gate = async { self.unlocked.wait_for(|unlocked| *unlocked).await.is_ok() };
        tokio::select! {
            _ = shutdown.cancelled() => return,
            opened = gate => {
                if !opened {
                    return;
                }
            }
        }

        loop {
            let text = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(text) => text,
                    None => break,
                },
            };

            let delivery = voice(&self.backends, &text, self.limits).await;
            debug!(?delivery, %text, "announcement voiced");
            self.pending
                .send_modify(|count| *count = count.saturating_sub(1));
        }

        debug!("playback worker exiting");
    }
}

/// Voice one item: remote synthesis first, local voice when that fails.
async fn voice(backends: &PlaybackBackends, text: &str, limits: PlaybackLimits) -> Delivery {
    match backends.synthesizer.synthesize(text).await {
        Ok(audio) if !audio.is_empty() => {
            match timeout(limits.output_timeout, backends.output.play(&audio)).await {
                Ok(Ok(())) => return Delivery::Remote,
                Ok(Err(PlaybackError::Interrupted(reason))) => {
                    warn!(%reason, "announcement playback interrupted");
                    return Delivery::RemoteInterrupted;
                }
                Ok(Err(err)) => warn!(error = %err, "audio output rejected announcement"),
                Err(_) => warn!(
                    timeout_ms = limits.output_timeout.as_millis() as u64,
                    "audio output stalled; using the fallback voice"
                ),
            }
        }
        Ok(_) => warn!(error = %SpeechError::EmptyAudio, "speech synthesis failed"),
        Err(SpeechError::Disabled) => {}
        Err(err) => warn!(error = %err, "speech synthesis failed"),
    }

    let fallback_timeout = limits.fallback_timeout;
    match timeout(fallback_timeout, backends.voice.speak(text)).await {
        Ok(Ok(())) => Delivery::Fallback,
        Ok(Err(err)) => {
            warn!(error = %err, "fallback voice failed; skipping announcement");
            Delivery::FallbackFailed
        }
        Err(_) => {
            warn!(
                timeout_ms = fallback_timeout.as_millis() as u64,
                "fallback voice timed out; skipping announcement"
            );
            Delivery::FallbackTimedOut
        }
    }
}

const PRIME_SAMPLE_RATE: u32 = 8_000;
const PRIME_SAMPLES: u32 = 800;

/// 100 ms of 8-bit mono PCM silence wrapped in a WAV container.
pub fn silent_clip() -> Vec<u8> {
    let data_len = PRIME_SAMPLES;
    let mut clip = Vec::with_capacity(44 + data_len as usize);
    clip.extend_from_slice(b"RIFF");
    clip.extend_from_slice(&(36 + data_len).to_le_bytes());
    clip.extend_from_slice(b"WAVE");
    clip.extend_from_slice(b"fmt ");
    clip.extend_from_slice(&16u32.to_le_bytes());
    clip.extend_from_slice(&1u16.to_le_bytes()); // PCM
    clip.extend_from_slice(&1u16.to_le_bytes()); // mono
    clip.extend_from_slice(&PRIME_SAMPLE_RATE.to_le_bytes());
    clip.extend_from_slice(&PRIME_SAMPLE_RATE.to_le_bytes()); // byte rate
    clip.extend_from_slice(&1u16.to_le_bytes()); // block align
    clip.extend_from_slice(&8u16.to_le_bytes());
    clip.extend_from_slice(b"data");
    clip.extend_from_slice(&data_len.to_le_bytes());
    clip.resize(44 + data_len as usize, 0x80);
    clip
}
