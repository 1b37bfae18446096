use serde_json::Value;

use logsink_api::{Batch, LogRecord};

use crate::error::IngestError;

// ═══════════════════════════════════════════════════════════════
//  WireFormat / Payload: the two accepted encodings
// ═══════════════════════════════════════════════════════════════

/// Body encoding, decided once from the declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `application/json`: one object, or an array of objects.
    Json,
    /// `text/plain` (or `application/x-ndjson`): one JSON object per line.
    Ndjson,
}

impl WireFormat {
    /// Match a `Content-Type` header value. Parameters such as `charset`
    /// are ignored. `None` for any other media type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Some(WireFormat::Json),
            "text/plain" | "application/x-ndjson" => Some(WireFormat::Ndjson),
            _ => None,
        }
    }

    /// Tag `body` with this encoding.
    pub fn payload(self, body: &[u8]) -> Payload<'_> {
        match self {
            WireFormat::Json => Payload::Structured(body),
            WireFormat::Ndjson => Payload::LineDelimited(body),
        }
    }
}

/// Request body tagged with its wire encoding. Never guessed from the
/// shape of the parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Structured(&'a [u8]),
    LineDelimited(&'a [u8]),
}

impl<'a> Payload<'a> {
    pub fn from_content_type(content_type: &str, body: &'a [u8]) -> Option<Self> {
        WireFormat::from_content_type(content_type).map(|f| f.payload(body))
    }

    /// Turn the body into records, in wire order.
    ///
    /// Parsing is all-or-nothing: one bad value or line fails the whole
    /// payload. An empty array, an empty or all-whitespace JSON body, and
    /// empty text all yield an empty batch.
    pub fn normalize(self) -> Result<Batch, IngestError> {
        match self {
            Payload::Structured(body) => normalize_structured(body),
            Payload::LineDelimited(body) => normalize_lines(body),
        }
    }
}

fn normalize_structured(body: &[u8]) -> Result<Batch, IngestError> {
    if body.trim_ascii().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| IngestError::malformed(format!("body: {e}")))?;

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| into_record(item, || format!("element {i}")))
            .collect(),
        single => Ok(vec![into_record(single, || "body".to_string())?]),
    }
}

fn normalize_lines(body: &[u8]) -> Result<Batch, IngestError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| IngestError::malformed(format!("body is not UTF-8: {e}")))?;

    let mut batch = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = i + 1;
        let value: Value = serde_json::from_str(line)
            .map_err(|e| IngestError::malformed(format!("line {line_no}: {e}")))?;
        batch.push(into_record(value, || format!("line {line_no}"))?);
    }
    Ok(batch)
}

fn into_record(value: Value, location: impl FnOnce() -> String) -> Result<LogRecord, IngestError> {
    LogRecord::from_value(value)
        .map_err(|_| IngestError::malformed(format!("{} is not a JSON object", location())))
}
