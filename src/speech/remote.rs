//! Remote voice: text-to-speech service → temp mp3 → external player.
//!
//! Every call gets its own temp file, so concurrent requests don't share
//! anything. The file is removed on every exit path; a failed removal is
//! logged and otherwise ignored.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::json;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{SpeechBackend, SpeechError};
use crate::config::VoiceConfig;

pub struct RemoteVoice {
    client: Client,
    config: VoiceConfig,
}

impl RemoteVoice {
    pub fn new(config: VoiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {e}");
                Client::new()
            });

        Self { client, config }
    }

    fn temp_audio_path(&self) -> Result<TempPath, SpeechError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("shadowdesk-").suffix(".mp3");
        let file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }

    /// Stream the synthesized audio into `path`. Returns the byte count.
    async fn download(&self, text: &str, path: &Path) -> Result<u64, SpeechError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SpeechError::MissingCredential)?;

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        );
        let body = json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost
            }
        });

        let mut resp = self
            .client
            .post(&url)
            .header("xi-api-key", key)
            .header(ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpeechError::Status { status, body });
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    /// Run the player on `path` and wait for it.
    async fn play(&self, path: &Path) -> Result<(), SpeechError> {
        let started = Instant::now();

        let status = Command::new(&self.config.player)
            .args(&self.config.player_args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SpeechError::PlayerMissing(self.config.player.clone()),
                _ => SpeechError::Io(e),
            })?;

        // Some players exit before they let go of the file.
        let floor = Duration::from_millis(self.config.min_playback_ms);
        if let Some(rest) = floor.checked_sub(started.elapsed()) {
            tokio::time::sleep(rest).await;
        }

        if !status.success() {
            return Err(SpeechError::PlayerExit(status.to_string()));
        }
        debug!("Playback finished in {:.1}s", started.elapsed().as_secs_f64());
        Ok(())
    }

    async fn fetch_and_play(&self, text: &str, path: &Path) -> Result<(), SpeechError> {
        let t_fetch = Instant::now();
        let bytes = self.download(text, path).await?;
        if bytes == 0 {
            return Err(SpeechError::EmptyAudio);
        }
        info!(
            "Received {bytes} bytes of audio in {:.0}ms",
            t_fetch.elapsed().as_secs_f64() * 1000.0
        );
        self.play(path).await
    }
}

#[async_trait]
impl SpeechBackend for RemoteVoice {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn synthesize(&self, text: &str) -> Result<(), SpeechError> {
        let audio = self.temp_audio_path()?;
        let result = self.fetch_and_play(text, &audio).await;

        let shown = audio.display().to_string();
        if let Err(e) = audio.close() {
            warn!("Failed to remove temp audio {shown}: {e}");
        }
        result
    }
}
