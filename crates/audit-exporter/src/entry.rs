//! Typed audit records received from the secrets-management daemon.
//!
//! Only the fields the exporter inspects are modelled. Everything else on the
//! wire is retained in a flattened map so an entry re-encodes to the object it
//! was decoded from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminant carried by request records.
pub const REQUEST_TYPE: &str = "request";

/// Discriminant carried by response records.
pub const RESPONSE_TYPE: &str = "response";

/// Details of the operation an audit record describes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuditRequest {
    /// Correlation identifier shared by a request record and its response.
    pub id: String,
    /// Operation name, for example `read` or `update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Logical path the operation targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Address of the client that issued the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    /// Namespace the operation ran in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Value>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuditRequest {
    /// Builds request details carrying only a correlation identifier.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: None,
            path: None,
            remote_address: None,
            namespace: None,
            extra: Map::new(),
        }
    }
}

/// Audit record written when the daemon receives an operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RequestEntry {
    /// Timestamp formatted by the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Record discriminant, always `request`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Authentication context, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
    /// Operation details.
    pub request: AuditRequest,
    /// Error reported by the daemon, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestEntry {
    /// Builds a request record around the supplied operation details.
    #[must_use]
    pub fn new(request: AuditRequest) -> Self {
        Self {
            time: None,
            entry_type: REQUEST_TYPE.to_owned(),
            auth: None,
            request,
            error: None,
            extra: Map::new(),
        }
    }

    /// Correlation identifier of the operation.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request.id
    }
}

/// Audit record written when the daemon answers an operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseEntry {
    /// Timestamp formatted by the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Record discriminant, always `response`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Authentication context, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
    /// Details of the operation being answered.
    pub request: AuditRequest,
    /// Response payload, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Error reported by the daemon, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseEntry {
    /// Builds a response record for the supplied operation details.
    #[must_use]
    pub fn new(request: AuditRequest, response: Option<Value>) -> Self {
        Self {
            time: None,
            entry_type: RESPONSE_TYPE.to_owned(),
            auth: None,
            request,
            response,
            error: None,
            extra: Map::new(),
        }
    }

    /// Correlation identifier of the operation being answered.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request.id
    }
}

/// Either kind of decoded audit record.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEntry {
    /// An inbound operation.
    Request(RequestEntry),
    /// The answer to an operation.
    Response(ResponseEntry),
}

impl AuditEntry {
    /// Correlation identifier of the underlying record.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Request(entry) => entry.request_id(),
            Self::Response(entry) => entry.request_id(),
        }
    }

    /// Wire discriminant of the underlying record.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => REQUEST_TYPE,
            Self::Response(_) => RESPONSE_TYPE,
        }
    }
}

impl From<RequestEntry> for AuditEntry {
    fn from(entry: RequestEntry) -> Self {
        Self::Request(entry)
    }
}

impl From<ResponseEntry> for AuditEntry {
    fn from(entry: ResponseEntry) -> Self {
        Self::Response(entry)
    }
}
