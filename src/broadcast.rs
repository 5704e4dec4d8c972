use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::types::OutboundEvent;

pub trait PartyBroadcaster: Send + Sync {
    fn emit(&self, party_id: &str, event: OutboundEvent);
}

#[derive(Clone, Debug)]
pub struct Envelope {
    pub party_id: String,
    pub event: OutboundEvent,
}

#[derive(Clone, Debug)]
pub struct ChannelBroadcaster {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelBroadcaster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PartyBroadcaster for ChannelBroadcaster {
    fn emit(&self, party_id: &str, event: OutboundEvent) {
        let envelope = Envelope {
            party_id: party_id.to_string(),
            event,
        };
        if self.tx.send(envelope).is_err() {
            tracing::debug!(party_id, "broadcast.receiver_closed");
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingBroadcaster {
    events: Arc<Mutex<Vec<Envelope>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<OutboundEvent> {
        self.lock()
            .iter()
            .map(|envelope| envelope.event.clone())
            .collect()
    }

    pub fn drain(&self) -> Vec<OutboundEvent> {
        self.lock()
            .drain(..)
            .map(|envelope| envelope.event)
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.lock()
            .iter()
            .filter(|envelope| envelope.event.kind() == kind)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Envelope>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartyBroadcaster for RecordingBroadcaster {
    fn emit(&self, party_id: &str, event: OutboundEvent) {
        self.lock().push(Envelope {
            party_id: party_id.to_string(),
            event,
        });
    }
}
