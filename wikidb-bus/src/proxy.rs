//! Caller-side proxy: the service contract over the bus.
//!
//! Implements [`WikiDatabaseService`] by encoding each call into an
//! envelope, sending it to the dispatcher's address, and decoding the
//! reply back into the same typed results the local service produces. A
//! caller holding a `&dyn WikiDatabaseService` cannot tell the two apart.

use async_trait::async_trait;
use serde_json::{json, Value};

use wikidb_core::{Page, PageMatch, ServiceError, ServiceResult, WikiDatabaseService};

use crate::bus::MessageBus;
use crate::envelope::{decode_reply, Action};

pub struct WikiDatabaseProxy {
    bus: MessageBus,
    address: String,
}

impl WikiDatabaseProxy {
    /// Build a proxy talking to the dispatcher registered on `address`.
    pub fn new(bus: MessageBus, address: impl Into<String>) -> Self {
        Self {
            bus,
            address: address.into(),
        }
    }

    async fn call(&self, action: Action, body: Value) -> ServiceResult<Value> {
        let reply = self
            .bus
            .request(&self.address, action.as_str(), body)
            .await?;
        decode_reply(reply)
    }
}

fn malformed(action: Action, detail: impl std::fmt::Display) -> ServiceError {
    ServiceError::QueryFailed(format!("malformed {action} reply: {detail}"))
}

/// Decode the found-flag record shared by both lookups.
fn decode_found<T: serde::de::DeserializeOwned>(
    action: Action,
    value: Value,
) -> ServiceResult<Option<T>> {
    match value.get("found").and_then(Value::as_bool) {
        Some(true) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| malformed(action, e)),
        Some(false) => Ok(None),
        None => Err(malformed(action, "missing 'found' flag")),
    }
}

#[async_trait]
impl WikiDatabaseService for WikiDatabaseProxy {
    async fn fetch_all_page_names(&self) -> ServiceResult<Vec<String>> {
        let value = self.call(Action::ListPageNames, json!({})).await?;
        serde_json::from_value(value).map_err(|e| malformed(Action::ListPageNames, e))
    }

    async fn fetch_page(&self, name: &str) -> ServiceResult<Option<PageMatch>> {
        let value = self
            .call(Action::GetPageByName, json!({ "name": name }))
            .await?;
        decode_found(Action::GetPageByName, value)
    }

    async fn fetch_page_by_id(&self, id: i64) -> ServiceResult<Option<Page>> {
        let value = self.call(Action::GetPageById, json!({ "id": id })).await?;
        decode_found(Action::GetPageById, value)
    }

    async fn create_page(&self, name: &str, content: &str) -> ServiceResult<()> {
        self.call(
            Action::CreatePage,
            json!({ "name": name, "content": content }),
        )
        .await?;
        Ok(())
    }

    async fn save_page(&self, id: i64, content: &str) -> ServiceResult<()> {
        self.call(Action::SavePage, json!({ "id": id, "content": content }))
            .await?;
        Ok(())
    }

    async fn delete_page(&self, id: i64) -> ServiceResult<()> {
        self.call(Action::DeletePage, json!({ "id": id })).await?;
        Ok(())
    }

    async fn fetch_all_pages_data(&self) -> ServiceResult<Vec<Page>> {
        let value = self.call(Action::ListPagesFull, json!({})).await?;
        serde_json::from_value(value).map_err(|e| malformed(Action::ListPagesFull, e))
    }
}
