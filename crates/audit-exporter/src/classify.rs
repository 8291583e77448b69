//! Line classification for the ingestion stream.
//!
//! Each line is first decoded into a minimal envelope holding only the `type`
//! discriminant. The discriminant selects the concrete record type for the
//! full decode; unknown discriminants are reported as [`Classification::Unrecognized`]
//! so newer record kinds do not break older exporters.

use std::borrow::Cow;

use serde::Deserialize;
use serde::de::Error as _;
use thiserror::Error;

use crate::entry::{REQUEST_TYPE, RESPONSE_TYPE, RequestEntry, ResponseEntry};

/// Outcome of classifying a well-formed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The line held a request record.
    Request(RequestEntry),
    /// The line held a response record.
    Response(ResponseEntry),
    /// The line was a JSON object with a missing or unknown `type`.
    Unrecognized {
        /// Discriminant found on the line, if any.
        entry_type: Option<String>,
    },
}

/// Reasons a line cannot be trusted.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The line is not a JSON object with a string `type` field.
    #[error("malformed audit entry envelope: {source}")]
    MalformedEnvelope {
        #[source]
        source: serde_json::Error,
    },
    /// The line claimed to be a request but did not decode as one.
    #[error("malformed request audit entry: {source}")]
    MalformedRequest {
        #[source]
        source: serde_json::Error,
    },
    /// The line claimed to be a response but did not decode as one.
    #[error("malformed response audit entry: {source}")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
    },
}

impl ClassifyError {
    /// Short label used in structured logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::MalformedRequest { .. } => "malformed_request",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

#[derive(Deserialize)]
struct EntryEnvelope<'a> {
    #[serde(rename = "type", default, borrow)]
    entry_type: Option<Cow<'a, str>>,
}

/// Classifies one line read from a connection.
///
/// A trailing `\n` or `\r\n` is ignored.
///
/// # Errors
///
/// Returns a [`ClassifyError`] when the line is not a JSON object, or when
/// it carries a known discriminant but does not decode into that record type.
pub fn classify(line: &[u8]) -> Result<Classification, ClassifyError> {
    let line = trim_line_ending(line);
    let envelope = decode_envelope(line)?;

    match envelope.entry_type.as_deref() {
        Some(REQUEST_TYPE) => serde_json::from_slice(line)
            .map(Classification::Request)
            .map_err(|source| ClassifyError::MalformedRequest { source }),
        Some(RESPONSE_TYPE) => serde_json::from_slice(line)
            .map(Classification::Response)
            .map_err(|source| ClassifyError::MalformedResponse { source }),
        other => Ok(Classification::Unrecognized {
            entry_type: other.map(str::to_owned),
        }),
    }
}

fn decode_envelope(line: &[u8]) -> Result<EntryEnvelope<'_>, ClassifyError> {
    // Structs also deserialize from JSON arrays; only objects are entries.
    let starts_object = line
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .is_some_and(|byte| *byte == b'{');
    if !starts_object {
        return Err(ClassifyError::MalformedEnvelope {
            source: serde_json::Error::custom("audit entry must be a JSON object"),
        });
    }

    serde_json::from_slice(line).map_err(|source| ClassifyError::MalformedEnvelope { source })
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
