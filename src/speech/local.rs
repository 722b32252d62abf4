//! Local speech backend.
//!
//! The engine handle is single-owner: all calls go through one mutex and
//! run on the blocking pool, so concurrent webhooks take turns. A missing
//! engine (model failed to load) doubles as "local backend unavailable".

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{SpeechBackend, SpeechError};

/// Blocking, in-process text-to-speech engine.
pub trait SpeechEngine: Send {
    /// Speak `text` and return once playback has finished.
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;
}

pub struct LocalVoice {
    engine: Option<Arc<Mutex<Box<dyn SpeechEngine>>>>,
}

impl LocalVoice {
    pub fn new<E: SpeechEngine + 'static>(engine: Option<E>) -> Self {
        Self {
            engine: engine.map(|e| Arc::new(Mutex::new(Box::new(e) as Box<dyn SpeechEngine>))),
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }
}

#[async_trait]
impl SpeechBackend for LocalVoice {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn synthesize(&self, text: &str) -> Result<(), SpeechError> {
        let engine = self.engine.as_ref().ok_or(SpeechError::EngineUnavailable)?;
        let engine = Arc::clone(engine);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            // A panic mid-utterance leaves no state worth protecting.
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.speak(&text)
        })
        .await
        .map_err(|e| SpeechError::Engine(format!("speech task aborted: {e}")))?
    }
}
