//! Inbound payload normalization.
//!
//! Decides what shape a webhook body has from its bytes and declared
//! content type. Every outcome is a value: a [`NormalizedInput`] or a
//! client-facing [`NormalizeError`].

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Typed view of one webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    /// Object-shaped JSON, fields in their original key order.
    Structured(Vec<(String, String)>),
    /// Any decodable text that isn't an object.
    FreeText(String),
    /// Zero-length or undecodable body.
    Empty,
}

impl NormalizedInput {
    /// True when there is nothing worth sending to the model.
    pub fn is_void(&self) -> bool {
        match self {
            NormalizedInput::Empty => true,
            NormalizedInput::Structured(fields) => fields.iter().all(|(_, value)| value.trim().is_empty()),
            NormalizedInput::FreeText(_) => false,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            NormalizedInput::Structured(_) => "structured",
            NormalizedInput::FreeText(_) => "free-text",
            NormalizedInput::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("invalid JSON format")]
    InvalidJson,

    #[error("invalid text encoding")]
    InvalidTextEncoding,
}

/// Media type family of a `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    PlainText,
    Other,
}

impl ContentKind {
    /// Classify a raw header value, ignoring parameters and case.
    pub fn from_header(content_type: Option<&str>) -> Self {
        let Some(raw) = content_type else {
            return ContentKind::Other;
        };
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json")) {
            ContentKind::Json
        } else if essence == "text/plain" {
            ContentKind::PlainText
        } else {
            ContentKind::Other
        }
    }
}

/// Turn a body and its declared content type into a [`NormalizedInput`].
pub fn normalize(body: &[u8], content_type: Option<&str>) -> Result<NormalizedInput, NormalizeError> {
    let kind = ContentKind::from_header(content_type);

    if body.is_empty() {
        info!("Empty webhook body (content-type: {})", content_type.unwrap_or("none"));
        return Ok(NormalizedInput::Empty);
    }

    let input = match kind {
        ContentKind::Json => normalize_json(body)?,
        ContentKind::PlainText => match std::str::from_utf8(body) {
            Ok(text) => NormalizedInput::FreeText(text.to_string()),
            Err(e) => {
                warn!("text/plain body is not UTF-8: {e}");
                return Err(NormalizeError::InvalidTextEncoding);
            }
        },
        ContentKind::Other => {
            warn!(
                "Unsupported content-type {:?}, attempting to read body as text",
                content_type.unwrap_or("none")
            );
            match std::str::from_utf8(body) {
                Ok(text) => NormalizedInput::FreeText(text.to_string()),
                Err(_) => {
                    info!("Body is binary or of unknown encoding ({} bytes), treating as empty", body.len());
                    NormalizedInput::Empty
                }
            }
        }
    };

    info!("Webhook payload shape: {}", input.shape());
    Ok(input)
}

fn normalize_json(body: &[u8]) -> Result<NormalizedInput, NormalizeError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        warn!("Content-Type is JSON but body failed to parse: {e}");
        NormalizeError::InvalidJson
    })?;

    match value {
        Value::Object(map) => {
            let fields = map
                .into_iter()
                .filter_map(|(key, value)| field_text(value).map(|text| (key, text)))
                .collect();
            Ok(NormalizedInput::Structured(fields))
        }
        other => {
            // Valid JSON that isn't an object is still readable text.
            debug!("JSON body is not an object ({}), using it as text", json_kind(&other));
            let text = std::str::from_utf8(body).map_err(|_| NormalizeError::InvalidJson)?;
            Ok(NormalizedInput::FreeText(text.to_string()))
        }
    }
}

/// Strings stay as they are, nulls are dropped, anything else is compact JSON.
fn field_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
