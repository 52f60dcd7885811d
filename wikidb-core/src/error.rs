//! Error taxonomy for the wiki data-access boundary.
//!
//! Every operation resolves to `Ok(value)` or one of these kinds; nothing in
//! this layer surfaces a raw driver fault to callers. Kinds round trip over
//! the message bus as strings via [`ServiceError::kind`] and
//! [`ServiceError::from_wire`].

use rusqlite::ffi::ErrorCode;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure kinds crossing the service boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Pool exhausted, acquire timed out, or the store is unreachable.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// The store rejected the statement (malformed SQL, constraint breach
    /// other than a duplicate name, malformed arguments).
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A lookup keyed by id missed where the contract has no found flag.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-name violation on create.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The dispatcher received an operation tag outside the enumeration.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Propagated opaquely from authorization collaborators.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ServiceError {
    /// Stable kind string used in the wire reply's `errorKind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable(_) => "connection_unavailable",
            Self::QueryFailed(_) => "query_failed",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::Unauthorized(_) => "unauthorized",
        }
    }

    /// The detail message without the kind prefix, for the wire `message`
    /// field.
    pub fn message(&self) -> &str {
        match self {
            Self::ConnectionUnavailable(m)
            | Self::QueryFailed(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::UnsupportedOperation(m)
            | Self::Unauthorized(m) => m,
        }
    }

    /// Rebuild an error from its wire `errorKind` + `message` pair.
    ///
    /// An unrecognized kind (a newer peer, a mangled frame) degrades to
    /// `QueryFailed` rather than being dropped.
    pub fn from_wire(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "connection_unavailable" => Self::ConnectionUnavailable(message),
            "not_found" => Self::NotFound(message),
            "conflict" => Self::Conflict(message),
            "unsupported_operation" => Self::UnsupportedOperation(message),
            "unauthorized" => Self::Unauthorized(message),
            _ => Self::QueryFailed(message),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(cause, _)
                if cause.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(err.to_string())
            }
            _ => Self::QueryFailed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_round_trip() {
        let errors = [
            ServiceError::ConnectionUnavailable("pool drained".into()),
            ServiceError::QueryFailed("syntax error".into()),
            ServiceError::NotFound("page id 7".into()),
            ServiceError::Conflict("duplicate name".into()),
            ServiceError::UnsupportedOperation("frobnicate".into()),
            ServiceError::Unauthorized("no token".into()),
        ];
        for err in errors {
            let rebuilt = ServiceError::from_wire(err.kind(), err.message());
            assert_eq!(rebuilt, err);
        }
    }

    #[test]
    fn unknown_wire_kind_degrades_to_query_failed() {
        let err = ServiceError::from_wire("future_kind", "something new");
        assert_eq!(err, ServiceError::QueryFailed("something new".into()));
    }

    #[test]
    fn display_carries_kind_prefix() {
        let err = ServiceError::NotFound("page id 3".into());
        assert_eq!(err.to_string(), "not found: page id 3");
    }
}
