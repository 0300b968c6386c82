//! Operation execution pipeline shared by the services.
//!
//! ```text
//! decide (read documents, plan every change in memory)
//!   ↓
//! commit ChangeSet (all-or-nothing, versions checked)
//!   ↓            ↘ stale read: decide again from fresh reads
//! publish events (best-effort)
//! ```
//!
//! The decide step is re-run from scratch on a concurrency conflict, so it
//! must only read through the store it is given and must not have side
//! effects of its own.

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use chrono::{DateTime, Utc};
use stockbook_events::{Event, EventBus, EventEnvelope};

use crate::error::ServiceError;
use crate::store::{ChangeSet, CommitReceipt, Document, DocumentRef, DocumentStore};

/// A domain event waiting for its commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    target: DocumentRef,
    event_type: &'static str,
    occurred_at: DateTime<Utc>,
    payload: JsonValue,
}

impl PendingEvent {
    pub fn new<E>(target: impl Into<DocumentRef>, event: &E) -> Result<Self, ServiceError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| ServiceError::Persistence(format!("event serialization failed: {e}")))?;
        Ok(Self {
            target: target.into(),
            event_type: event.event_type(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    fn into_envelope(self, receipt: &CommitReceipt) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            self.target.aggregate_id(),
            self.target.aggregate_type(),
            receipt.version_of(self.target).unwrap_or(0),
            self.event_type,
            self.occurred_at,
            self.payload,
        )
    }
}

/// Result of the decide step: what to write, what to announce, and what to
/// hand back to the caller.
#[derive(Debug)]
pub struct Outcome<T> {
    pub changes: ChangeSet,
    pub events: Vec<PendingEvent>,
    pub value: T,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            changes: ChangeSet::new(),
            events: Vec::new(),
            value,
        }
    }

    pub fn put(&mut self, document: impl Into<Document>) {
        self.changes.put(document);
    }

    pub fn delete(&mut self, target: impl Into<DocumentRef>, version: u64) {
        self.changes.delete(target, version);
    }

    pub fn event<E>(&mut self, target: impl Into<DocumentRef>, event: &E) -> Result<(), ServiceError>
    where
        E: Event + Serialize,
    {
        self.events.push(PendingEvent::new(target, event)?);
        Ok(())
    }
}

/// Runs decide → commit → publish with bounded retries on stale reads.
#[derive(Debug)]
pub struct Dispatcher<S, B> {
    store: S,
    bus: B,
    max_retries: u32,
}

impl<S, B> Dispatcher<S, B> {
    pub fn new(store: S, bus: B, max_retries: u32) -> Self {
        Self {
            store,
            bus,
            max_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> Dispatcher<S, B>
where
    S: DocumentStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn execute<T>(
        &self,
        operation: &'static str,
        mut decide: impl FnMut(&S) -> Result<Outcome<T>, ServiceError>,
    ) -> Result<(T, CommitReceipt), ServiceError> {
        let mut attempt: u32 = 0;
        loop {
            let Outcome {
                changes,
                events,
                value,
            } = decide(&self.store)?;
            let writes = changes.len();

            match self.store.commit(changes) {
                Ok(receipt) => {
                    tracing::debug!(operation, writes, attempt, "committed");
                    self.publish(operation, &receipt, events);
                    return Ok((value, receipt));
                }
                Err(err) => {
                    let err = ServiceError::from(err);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt >= self.max_retries {
                        tracing::warn!(operation, attempts = attempt + 1, error = %err, "giving up");
                        return Err(ServiceError::Conflict(format!(
                            "{operation} kept conflicting with concurrent changes, try again"
                        )));
                    }
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %err, "stale read, retrying");
                }
            }
        }
    }

    fn publish(&self, operation: &'static str, receipt: &CommitReceipt, events: Vec<PendingEvent>) {
        for event in events {
            let event_type = event.event_type();
            // The commit stands regardless; the bus is a notification channel.
            if let Err(err) = self.bus.publish(event.into_envelope(receipt)) {
                tracing::warn!(operation, event_type, error = ?err, "event publication failed");
            }
        }
    }
}
