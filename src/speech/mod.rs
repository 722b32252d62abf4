//! Speech output for announcements.
//!
//! Two interchangeable backends:
//! - `remote`: voice service → temp audio file → external player
//! - `local`: in-process Kokoro ONNX engine, serialized behind one lock
//!
//! [`SpeechSynthesizer`] picks one at startup and resolves every attempt
//! into a [`SynthesisOutcome`]; nothing escapes as an error.

pub mod kokoro;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

pub use kokoro::KokoroEngine;
pub use local::{LocalVoice, SpeechEngine};
pub use remote::RemoteVoice;

/// Result of one `speak` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl SynthesisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SynthesisOutcome::Succeeded)
    }
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("voice request failed: {0}")]
    Http(String),

    #[error("voice request timed out")]
    Timeout,

    #[error("voice service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("no voice API key configured")]
    MissingCredential,

    #[error("voice service returned no audio")]
    EmptyAudio,

    #[error("audio player '{0}' not found")]
    PlayerMissing(String),

    #[error("audio player exited with {0}")]
    PlayerExit(String),

    #[error("local speech engine is not available")]
    EngineUnavailable,

    #[error("speech engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Http(e.to_string())
        }
    }
}

/// A way of turning text into audible speech.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render `text` and block until playback is over.
    async fn synthesize(&self, text: &str) -> Result<(), SpeechError>;
}

/// Selected backend plus an optional second chance on another one.
pub struct SpeechSynthesizer {
    primary: Box<dyn SpeechBackend>,
    fallback: Option<Box<dyn SpeechBackend>>,
}

impl SpeechSynthesizer {
    pub fn new(primary: impl SpeechBackend + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl SpeechBackend + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Remote voice when a credential is configured, otherwise the local
    /// engine. Loads the Kokoro model if the local engine can be used, so
    /// call it from a blocking context.
    pub fn from_config(config: &Config) -> Self {
        if config.voice.has_credential() {
            let speech = Self::new(RemoteVoice::new(config.voice.clone()));
            info!("Speech backend: remote voice {}", config.voice.voice_id);
            if !config.fallback_to_local {
                return speech;
            }
            let local = LocalVoice::new(KokoroEngine::try_load(&config.local));
            if local.is_available() {
                info!("Fallback to local engine enabled");
                speech.with_fallback(local)
            } else {
                warn!("Fallback to local engine requested but the model did not load");
                speech
            }
        } else {
            info!("Speech backend: local engine (no voice API key)");
            Self::new(LocalVoice::new(KokoroEngine::try_load(&config.local)))
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Speak `text`. Blank text never reaches a backend.
    pub async fn speak(&self, text: &str) -> SynthesisOutcome {
        if text.trim().is_empty() {
            return SynthesisOutcome::Skipped("empty-text".into());
        }

        let primary_err = match self.primary.synthesize(text).await {
            Ok(()) => {
                info!("Spoke via {}", self.primary.name());
                return SynthesisOutcome::Succeeded;
            }
            Err(e) => {
                warn!("{} speech failed: {e}", self.primary.name());
                e
            }
        };

        let Some(fallback) = &self.fallback else {
            return SynthesisOutcome::Failed(primary_err.to_string());
        };

        match fallback.synthesize(text).await {
            Ok(()) => {
                info!("Spoke via fallback {}", fallback.name());
                SynthesisOutcome::Succeeded
            }
            Err(e) => {
                warn!("Fallback {} speech failed: {e}", fallback.name());
                SynthesisOutcome::Failed(format!("{primary_err}; fallback: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        spoken: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl SpeechBackend for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn synthesize(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(SpeechError::EmptyAudio)
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn blank_text_is_skipped_without_backend_call() {
        let backend = Recorder::default();
        let speech = SpeechSynthesizer::new(backend.clone());
        for text in ["", "   \n"] {
            assert_eq!(speech.speak(text).await, SynthesisOutcome::Skipped("empty-text".into()));
        }
        assert!(backend.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_speaks_once() {
        let backend = Recorder::default();
        let speech = SpeechSynthesizer::new(backend.clone());
        assert!(speech.speak("Beware, Sir Cody.").await.is_success());
        assert_eq!(*backend.spoken.lock().unwrap(), vec!["Beware, Sir Cody.".to_string()]);
    }

    #[tokio::test]
    async fn failure_without_fallback_is_reported() {
        let speech = SpeechSynthesizer::new(Recorder { fail: true, ..Default::default() });
        let outcome = speech.speak("hello").await;
        assert_eq!(outcome, SynthesisOutcome::Failed("voice service returned no audio".into()));
    }

    #[tokio::test]
    async fn fallback_runs_only_after_primary_fails() {
        let primary = Recorder { fail: true, ..Default::default() };
        let fallback = Recorder::default();
        let speech = SpeechSynthesizer::new(primary.clone()).with_fallback(fallback.clone());

        assert!(speech.speak("the printer stirs").await.is_success());
        assert_eq!(primary.spoken.lock().unwrap().len(), 1);
        assert_eq!(fallback.spoken.lock().unwrap().len(), 1);

        let healthy = Recorder::default();
        let unused = Recorder::default();
        let speech = SpeechSynthesizer::new(healthy).with_fallback(unused.clone());
        assert!(speech.speak("all is well").await.is_success());
        assert!(unused.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn both_failing_is_failed() {
        let speech = SpeechSynthesizer::new(Recorder { fail: true, ..Default::default() })
            .with_fallback(Recorder { fail: true, ..Default::default() });
        assert!(matches!(speech.speak("doom").await, SynthesisOutcome::Failed(_)));
    }

    #[test]
    fn unloadable_local_model_is_not_attached_as_fallback() {
        let mut config = Config::default();
        config.voice.api_key = Some("xi-test".into());
        config.fallback_to_local = true;
        config.local.model_path = "/nonexistent/kokoro.onnx".into();
        config.local.tokenizer_path = "/nonexistent/tokenizer.json".into();

        let speech = SpeechSynthesizer::from_config(&config);
        assert_eq!(speech.backend_name(), "remote");
        assert!(speech.fallback.is_none());
    }
}
