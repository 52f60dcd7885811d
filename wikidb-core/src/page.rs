//! Domain records for wiki pages.

use serde::{Deserialize, Serialize};

/// A stored wiki page. `id` is assigned by the store on create; `id` and
/// `name` never change afterwards, only `content` does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub name: String,
    pub content: String,
}

/// Result of a by-name lookup. The name is what the caller searched with,
/// so only the pool-assigned id and the content come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMatch {
    pub id: i64,
    pub content: String,
}
