//! Error types for the object-document mapper.
//!
//! Errors are split by where they originate: query construction (caller
//! mistakes, raised before any network call), the document gateway (transport
//! and server failures), response decoding, and model persistence.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all ODM operations.
#[derive(Error, Debug)]
pub enum OdmError {
    /// Invalid query construction
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Document gateway failures
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Response decoding failures
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Model persistence errors
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised while building a query.
///
/// These are always caller mistakes and are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The comparison operator is not part of the supported operator table.
    #[error("unsupported operator '{operator}'")]
    UnsupportedOperator { operator: String },

    /// A field name was empty or whitespace.
    #[error("field name must not be empty")]
    EmptyField,

    /// Page numbers are 1-based and page sizes must be positive.
    #[error("invalid page {page} with {per_page} items per page")]
    InvalidPage { page: u64, per_page: u64 },

    /// The sort direction could not be parsed.
    #[error("invalid sort direction '{direction}'")]
    InvalidDirection { direction: String },

    /// The value does not fit the operator (e.g. `between` without two bounds).
    #[error("invalid value for '{operator}': {message}")]
    InvalidValue { operator: String, message: String },

    /// Aggregation and suggester names must be non-empty.
    #[error("{kind} name must not be empty")]
    EmptyName { kind: String },

    /// The pagination cursor could not be decoded.
    #[error("invalid pagination cursor: {cursor}")]
    InvalidCursor { cursor: String },

    /// The operation has no meaning for a raw ES|QL query.
    #[error("{operation} is not available for ES|QL queries")]
    EsqlMode { operation: String },
}

/// Errors originating from the document gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway could not be constructed or reached.
    #[error("connection failed to {gateway}: {message}")]
    ConnectionFailed { gateway: String, message: String },

    /// The request never produced an HTTP response.
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    /// The store answered with a non-success status.
    #[error("{operation} returned status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// The gateway is temporarily unavailable.
    #[error("gateway unavailable: {message}")]
    Unavailable { message: String },
}

impl GatewayError {
    /// Returns true when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport { .. } | GatewayError::Unavailable { .. } => true,
            GatewayError::Status { status, .. } => is_retryable_status(*status),
            GatewayError::ConnectionFailed { .. } | GatewayError::Serialization { .. } => false,
        }
    }

    /// Returns the HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP statuses worth retrying: throttling and transient server errors.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Errors raised while decoding store responses.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The response carried hits but none of them could be decoded.
    #[error("none of the {hits} returned hits could be decoded")]
    NoDecodableHits { hits: usize },

    /// The response did not have the expected shape.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// A document could not be converted into the model type.
    #[error("failed to decode document '{id}' into {model}: {message}")]
    Model {
        id: String,
        model: String,
        message: String,
    },
}

/// Errors related to model persistence.
#[derive(Error, Debug)]
pub enum ModelError {
    /// No document exists with the given id.
    #[error("document not found: {index}/{id}")]
    NotFound { index: String, id: String },

    /// The model was serialized into something other than a JSON object.
    #[error("model for index '{index}' must serialize to a JSON object")]
    NotAnObject { index: String },

    /// A lookup attribute set was empty.
    #[error("at least one attribute is required to look up a document in '{index}'")]
    EmptyAttributes { index: String },

    /// The operation needs a persisted model but the model has no id.
    #[error("model for index '{index}' has no id; save it first")]
    NotPersisted { index: String },

    /// The model attributes could not be converted.
    #[error("invalid attributes for index '{index}': {message}")]
    InvalidAttributes { index: String, message: String },
}

/// Result type alias for ODM operations.
pub type OdmResult<T> = Result<T, OdmError>;

/// Result type alias for query construction.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<serde_json::Error> for OdmError {
    fn from(err: serde_json::Error) -> Self {
        OdmError::Gateway(GatewayError::Serialization {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = OdmError::Query(QueryError::UnsupportedOperator {
            operator: "~=".to_string(),
        });
        assert_eq!(err.to_string(), "unsupported operator '~='");

        let err = QueryError::InvalidPage {
            page: 0,
            per_page: 15,
        };
        assert_eq!(err.to_string(), "invalid page 0 with 15 items per page");
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::Status {
            operation: "search".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "search returned status 503: unavailable");
    }

    #[test]
    fn test_gateway_error_retryable() {
        let transport = GatewayError::Transport {
            operation: "get".to_string(),
            message: "connection reset".to_string(),
        };
        assert!(transport.is_retryable());

        let throttled = GatewayError::Status {
            operation: "bulk".to_string(),
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_retryable());
        assert_eq!(throttled.status(), Some(429));

        let bad_request = GatewayError::Status {
            operation: "search".to_string(),
            status: 400,
            body: String::new(),
        };
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::NoDecodableHits { hits: 3 };
        assert_eq!(err.to_string(), "none of the 3 returned hits could be decoded");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: OdmError = parse_err.into();
        assert!(matches!(
            err,
            OdmError::Gateway(GatewayError::Serialization { .. })
        ));
    }
}
