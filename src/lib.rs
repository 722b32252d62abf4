//! shadowdesk: IT support webhook relay with spoken announcements.

pub mod config;
pub mod error;
pub mod relay;
pub mod speech;

pub use config::Config;
pub use relay::api::{router, AppState};
pub use relay::normalizer::{normalize, NormalizeError, NormalizedInput};
pub use relay::pipeline::{Delivery, WebhookPipeline};
pub use relay::prompt::{build_prompt, PromptSpec};
pub use relay::summarizer::{ChatCompletionClient, CompletionClient, Fallback, SummarizeError, Summarizer};
pub use speech::{SpeechBackend, SpeechError, SpeechSynthesizer, SynthesisOutcome};
