//! Request/reply marshaling for the service boundary.
//!
//! An [`Envelope`] is one request: the operation tag as a raw header
//! string (so unknown tags survive to the dispatcher and are rejected
//! there, not dropped in transit), a JSON argument body, and the oneshot
//! reply channel that correlates the reply without any id matching.
//!
//! Reply wire shape: `{"ok":true,"value":...}` on success,
//! `{"ok":false,"errorKind":...,"message":...}` on failure.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};
use tokio::sync::oneshot;

use wikidb_core::ServiceError;

/// Closed enumeration of operation tags. The wire form is the
/// [`as_str`](Action::as_str)/[`FromStr`] pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ListPageNames,
    GetPageByName,
    GetPageById,
    CreatePage,
    SavePage,
    DeletePage,
    ListPagesFull,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ListPageNames,
        Action::GetPageByName,
        Action::GetPageById,
        Action::CreatePage,
        Action::SavePage,
        Action::DeletePage,
        Action::ListPagesFull,
    ];

    /// Wire form of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ListPageNames => "list-page-names",
            Action::GetPageByName => "get-page-by-name",
            Action::GetPageById => "get-page-by-id",
            Action::CreatePage => "create-page",
            Action::SavePage => "save-page",
            Action::DeletePage => "delete-page",
            Action::ListPagesFull => "list-pages-full",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or(())
    }
}

/// One request/reply exchange. Ephemeral: lives only until the reply is
/// sent on `reply`.
#[derive(Debug)]
pub struct Envelope {
    /// Operation tag header. Kept as the raw string so the dispatcher can
    /// reject tags outside the enumeration with a typed error.
    pub action: String,
    /// Keyed arguments; keys depend on the action.
    pub body: Value,
    /// Per-envelope reply channel. Implicit correlation: the caller holds
    /// the only receiver.
    pub reply: oneshot::Sender<Value>,
}

/// Encode a successful reply.
pub fn encode_ok(value: Value) -> Value {
    json!({ "ok": true, "value": value })
}

/// Encode a failure reply, kind and message carried verbatim.
pub fn encode_err(err: &ServiceError) -> Value {
    json!({ "ok": false, "errorKind": err.kind(), "message": err.message() })
}

/// Decode a wire reply back into a typed result.
pub fn decode_reply(reply: Value) -> Result<Value, ServiceError> {
    match reply.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(reply.get("value").cloned().unwrap_or(Value::Null)),
        Some(false) => {
            let kind = reply
                .get("errorKind")
                .and_then(Value::as_str)
                .unwrap_or("query_failed");
            let message = reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown failure");
            Err(ServiceError::from_wire(kind, message))
        }
        None => Err(ServiceError::QueryFailed(format!(
            "malformed reply frame: {reply}"
        ))),
    }
}
