//! Webhook pipeline: normalize → summarize → speak.
//!
//! Only malformed input aborts a request. Model and speech failures are
//! downgraded to fallback lines or a failed outcome and still count as a
//! delivered announcement.

use std::time::Instant;

use tracing::{info, warn};

use super::normalizer::{normalize, NormalizeError};
use super::prompt::build_prompt;
use super::summarizer::{Fallback, Summarizer};
use crate::speech::{SpeechSynthesizer, SynthesisOutcome};

/// What happened to one webhook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub shape: &'static str,
    pub announcement: String,
    pub outcome: SynthesisOutcome,
}

pub struct WebhookPipeline {
    summarizer: Summarizer,
    speech: SpeechSynthesizer,
}

impl WebhookPipeline {
    pub fn new(summarizer: Summarizer, speech: SpeechSynthesizer) -> Self {
        Self { summarizer, speech }
    }

    pub fn backend_name(&self) -> &'static str {
        self.speech.backend_name()
    }

    /// Run one webhook body through the whole pipeline.
    pub async fn handle(&self, body: &[u8], content_type: Option<&str>) -> Result<Delivery, NormalizeError> {
        let t_total = Instant::now();
        let input = normalize(body, content_type)?;

        let announcement = match build_prompt(&input) {
            Some(prompt) if !input.is_void() => self.summarizer.summarize(&prompt).await,
            _ => {
                info!("Void request, skipping summarization");
                Fallback::VoidInput.announcement().to_string()
            }
        };

        let t_speak = Instant::now();
        let outcome = self.speech.speak(&announcement).await;

        let speak_ms = t_speak.elapsed().as_secs_f64() * 1000.0;
        let total_ms = t_total.elapsed().as_secs_f64() * 1000.0;
        if outcome.is_success() {
            info!(
                "Webhook done [{}]: speak={speak_ms:.0}ms total={total_ms:.0}ms: \"{announcement}\"",
                input.shape(),
            );
        } else {
            warn!(
                "Webhook done [{}] without audio ({outcome:?}) total={total_ms:.0}ms: \"{announcement}\"",
                input.shape(),
            );
        }

        Ok(Delivery {
            shape: input.shape(),
            announcement,
            outcome,
        })
    }
}
