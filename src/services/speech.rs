//! Concrete audio backends: the HTTP speech service and local player/voice programs.

use std::{process::Stdio, sync::Arc};

use base64::Engine;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    services::playback::{
        AudioOutput, LocalVoice, PlaybackBackends, PlaybackError, SpeechError, SpeechSynthesizer,
    },
};

/// Client for the speech service: `POST {text}` answers `{audioDataUri?, error?}`.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechResponse {
    #[serde(default)]
    audio_data_uri: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpSpeechSynthesizer {
    pub fn new(endpoint: String, request_timeout: std::time::Duration) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(SpeechError::Request)?;
        Ok(Self { client, endpoint })
    }

    async fn request(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SpeechRequest { text })
            .send()
            .await
            .map_err(SpeechError::Request)?;

        let status = response.status();
        let body: SpeechResponse = response.json().await.map_err(SpeechError::Request)?;
        if let Some(message) = body.error {
            return Err(SpeechError::Service(message));
        }
        if !status.is_success() {
            return Err(SpeechError::Service(format!("status {status}")));
        }

        let uri = body
            .audio_data_uri
            .filter(|uri| !uri.is_empty())
            .ok_or(SpeechError::EmptyAudio)?;
        decode_data_uri(&uri)
    }
}

impl SpeechSynthesizer for HttpSpeechSynthesizer {
    fn synthesize<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<u8>, SpeechError>> {
        Box::pin(self.request(text))
    }
}

/// Decode a `data:<mime>;base64,<payload>` URI into raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, SpeechError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| SpeechError::InvalidDataUri("missing payload separator".into()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(SpeechError::InvalidDataUri(format!(
            "unsupported header `{header}`"
        )));
    }

    let audio = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| SpeechError::InvalidDataUri(err.to_string()))?;
    if audio.is_empty() {
        return Err(SpeechError::EmptyAudio);
    }
    Ok(audio)
}

/// Used when no speech endpoint is configured; every item goes to the local voice.
pub struct DisabledSynthesizer;

impl SpeechSynthesizer for DisabledSynthesizer {
    fn synthesize<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<u8>, SpeechError>> {
        Box::pin(async { Err(SpeechError::Disabled) })
    }
}

/// Plays audio by piping it into an external player's stdin.
pub struct CommandAudioOutput {
    program: String,
    args: Vec<String>,
}

impl CommandAudioOutput {
    pub fn new(command: &[String]) -> Self {
        let (program, args) = split_command(command);
        Self { program, args }
    }

    async fn run(&self, audio: &[u8]) -> Result<(), PlaybackError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| PlaybackError::Rejected(format!("{}: {err}", self.program)))?;

        // A player that closes its input early or exits non-zero refused the clip: nothing
        // tells us it was heard, so the fallback voice gets the item.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(audio).await.map_err(|err| {
                PlaybackError::Rejected(format!("{} closed its input: {err}", self.program))
            })?;
        }

        let status = child
            .wait()
            .await
            .map_err(|err| PlaybackError::Interrupted(err.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Rejected(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

impl AudioOutput for CommandAudioOutput {
    fn play<'a>(&'a self, audio: &'a [u8]) -> BoxFuture<'a, Result<(), PlaybackError>> {
        Box::pin(self.run(audio))
    }
}

/// Speaks text through a local TTS program; the text is passed as the last argument.
pub struct CommandVoice {
    program: String,
    args: Vec<String>,
}

impl CommandVoice {
    pub fn new(command: &[String]) -> Self {
        let (program, args) = split_command(command);
        Self { program, args }
    }

    async fn run(&self, text: &str) -> Result<(), PlaybackError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|err| PlaybackError::Rejected(format!("{}: {err}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Interrupted(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

impl LocalVoice for CommandVoice {
    fn speak<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), PlaybackError>> {
        Box::pin(self.run(text))
    }
}

fn split_command(command: &[String]) -> (String, Vec<String>) {
    match command.split_first() {
        Some((program, args)) => (program.clone(), args.to_vec()),
        None => (String::new(), Vec::new()),
    }
}

/// Build the node's audio backends from configuration.
pub fn backends_from_config(config: &AppConfig) -> Result<PlaybackBackends, SpeechError> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match &config.speech.endpoint {
        Some(endpoint) => {
            info!(%endpoint, "remote speech synthesis enabled");
            Arc::new(HttpSpeechSynthesizer::new(
                endpoint.clone(),
                config.speech.request_timeout,
            )?)
        }
        None => {
            debug!("no speech endpoint configured; announcements use the local voice");
            Arc::new(DisabledSynthesizer)
        }
    };

    Ok(PlaybackBackends {
        synthesizer,
        output: Arc::new(CommandAudioOutput::new(&config.playback.player_command)),
        voice: Arc::new(CommandVoice::new(&config.playback.voice_command)),
    })
}
