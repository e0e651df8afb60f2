//! Recording audit sink for testing.

use async_trait::async_trait;
use parking_lot::Mutex;

use vigil_core::audit::AuditEvent;
use vigil_core::effects::{AuditSink, EgressError};

/// Sink that records every event and can be told to fail.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: Mutex<bool>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// The single event sent so far; panics if there are zero or many.
    pub fn only(&self) -> AuditEvent {
        let events = self.events.lock();
        assert_eq!(events.len(), 1, "expected exactly one audit event, got {}", events.len());
        events[0].clone()
    }

    /// Make subsequent sends fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn send(&self, event: &AuditEvent) -> Result<(), EgressError> {
        if *self.failing.lock() {
            return Err(EgressError::Unavailable("scripted egress failure".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}
