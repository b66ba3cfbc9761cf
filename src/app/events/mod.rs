use std::sync::Arc;
use tokio::sync::broadcast;

use crate::app::models::{DeliveryStatus, DieselUlid, EventType};

/// Internal observability hook points. The core emits these; external dashboards and alerting
/// subscribe by holding their own receiver. No listener is required for the engine to function —
/// a full channel buffer drops the oldest event rather than blocking a scheduler or worker.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    PrecalcCompleted { total_eligible: u64, scheduled: u64, duplicates_skipped: u64, errors: u64 },
    EnqueueCompleted { advanced: u64, publish_failures: u64 },
    RecoveryCompleted { total_missed: u64, recovered: u64, failed: u64, errors: u64 },
    DeliveryTransitioned { delivery_log_id: DieselUlid, event_type: EventType, to: DeliveryStatus },
    DeliverySent { delivery_log_id: DieselUlid },
    DeliveryFailed { delivery_log_id: DieselUlid, reason: String },
}

/// Process-wide broadcast bus. Cloned cheaply; every scheduler, worker and CLI command holds
/// one `Arc<EventBus>` handed down from `main`/`enginectl` at startup.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(1024);
        Arc::new(Self { sender })
    }

    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is the common case outside tests/observability tooling; a send error
        // here just means nobody was listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }
}
