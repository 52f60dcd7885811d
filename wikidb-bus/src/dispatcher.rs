//! Dispatcher: the service-side end of the boundary.
//!
//! Consumes envelopes from one well-known bus address, decodes the
//! operation tag and arguments, invokes the local service, and replies on
//! the envelope's own channel. Explicit match over the enumeration; a tag
//! outside it gets `UnsupportedOperation` rather than crashing the loop.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use wikidb_core::{ServiceError, ServiceResult, WikiDatabaseService};

use crate::bus::MessageBus;
use crate::envelope::{encode_err, encode_ok, Action};

/// Register the service on `address` and start consuming envelopes.
///
/// Each envelope is handled on its own task, so slow queries interleave
/// instead of serializing behind one another; the connection pool is the
/// only point of contention. The loop ends when every sender to the
/// address is gone.
pub fn start(
    bus: &MessageBus,
    address: &str,
    service: Arc<dyn WikiDatabaseService>,
) -> JoinHandle<()> {
    let mut rx = bus.register(address);
    let address = address.to_owned();
    tokio::spawn(async move {
        tracing::info!(address = %address, "dispatcher listening");
        while let Some(envelope) = rx.recv().await {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let reply = match handle(service.as_ref(), &envelope.action, &envelope.body).await
                {
                    Ok(value) => encode_ok(value),
                    Err(err) => {
                        tracing::debug!(action = %envelope.action, error = %err, "operation failed");
                        encode_err(&err)
                    }
                };
                // The caller abandoning its request is not an error here.
                let _ = envelope.reply.send(reply);
            });
        }
        tracing::info!(address = %address, "dispatcher stopped");
    })
}

async fn handle(
    service: &dyn WikiDatabaseService,
    action: &str,
    body: &Value,
) -> ServiceResult<Value> {
    let Ok(action) = action.parse::<Action>() else {
        return Err(ServiceError::UnsupportedOperation(action.to_owned()));
    };

    match action {
        Action::ListPageNames => {
            let names = service.fetch_all_page_names().await?;
            Ok(json!(names))
        }
        Action::GetPageByName => {
            let name = str_arg(body, "name")?;
            let reply = match service.fetch_page(name).await? {
                Some(page) => json!({ "found": true, "id": page.id, "content": page.content }),
                None => json!({ "found": false }),
            };
            Ok(reply)
        }
        Action::GetPageById => {
            let id = int_arg(body, "id")?;
            let reply = match service.fetch_page_by_id(id).await? {
                Some(page) => json!({
                    "found": true,
                    "id": page.id,
                    "name": page.name,
                    "content": page.content,
                }),
                None => json!({ "found": false }),
            };
            Ok(reply)
        }
        Action::CreatePage => {
            let name = str_arg(body, "name")?;
            let content = str_arg(body, "content")?;
            service.create_page(name, content).await?;
            Ok(Value::Null)
        }
        Action::SavePage => {
            let id = int_arg(body, "id")?;
            let content = str_arg(body, "content")?;
            service.save_page(id, content).await?;
            Ok(Value::Null)
        }
        Action::DeletePage => {
            let id = int_arg(body, "id")?;
            service.delete_page(id).await?;
            Ok(Value::Null)
        }
        Action::ListPagesFull => {
            let pages = service.fetch_all_pages_data().await?;
            Ok(json!(pages))
        }
    }
}

fn str_arg<'a>(body: &'a Value, key: &str) -> ServiceResult<&'a str> {
    body.get(key).and_then(Value::as_str).ok_or_else(|| {
        ServiceError::QueryFailed(format!("missing or non-string argument '{key}'"))
    })
}

fn int_arg(body: &Value, key: &str) -> ServiceResult<i64> {
    body.get(key).and_then(Value::as_i64).ok_or_else(|| {
        ServiceError::QueryFailed(format!("missing or non-integer argument '{key}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_arg_rejects_missing_and_mistyped() {
        let body = json!({ "name": 42 });
        assert!(str_arg(&body, "name").is_err());
        assert!(str_arg(&body, "content").is_err());
    }

    #[test]
    fn int_arg_accepts_integers_only() {
        let body = json!({ "id": 7, "bad": "7" });
        assert_eq!(int_arg(&body, "id").unwrap(), 7);
        assert!(int_arg(&body, "bad").is_err());
    }
}
