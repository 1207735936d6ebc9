use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::AuditSink;

pub mod kind;
pub use kind::EventKind;

/// One audit record. `user_id` is the principal (auth user) id when known.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: EventKind,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: EventKind, user_id: Option<Uuid>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            description: description.into(),
            occurred_at: Utc::now(),
        }
    }
}

pub type EventBus = broadcast::Sender<AuditEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<AuditEvent>) {
    broadcast::channel(1024)
}

/// Publish an audit record without waiting for it to be stored.
pub fn log_event(event_bus: &EventBus, kind: EventKind, user_id: Option<Uuid>, description: impl Into<String>) {
    let event = AuditEvent::new(kind, user_id, description);

    // Fire and forget - audit failures must not break the primary operation
    if event_bus.send(event).is_err() {
        tracing::warn!(event_type = kind.as_str(), "no audit listener attached, event dropped");
    }
}

pub async fn start_audit_listener(mut rx: broadcast::Receiver<AuditEvent>, sink: Arc<dyn AuditSink>) {
    tracing::info!("Audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged, events lost");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(e) = sink.insert_log(&event).await {
            tracing::error!(event_type = event.kind.as_str(), "Failed to save audit log: {}", e);
        }
    }
    tracing::info!("Audit listener stopped");
}
