//! Webhook relay: turns IT support requests into spoken announcements.
//!
//! Components:
//! - `normalizer`: body + content type → structured / free text / empty
//! - `prompt`: herald persona templates and the prompt pair per input
//! - `summarizer`: chat-completion call with themed fallback lines
//! - `pipeline`: normalize → summarize → speak for one request
//! - `api`: axum router (`POST /webhook`, `GET /health`)

pub mod api;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod summarizer;
