//! Sequenced publication of typed events.

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::{Event, EventBus, EventEnvelope};

/// Wraps events of one source in envelopes and publishes them.
///
/// Sequence numbers start at 1. Assignment and publication happen under one lock, so
/// subscribers see each source's events in sequence order with no gaps.
#[derive(Debug)]
pub struct EventEmitter<B> {
    source: String,
    bus: B,
    next_sequence: Mutex<u64>,
}

impl<B> EventEmitter<B> {
    pub fn new(source: impl Into<String>, bus: B) -> Self {
        Self {
            source: source.into(),
            bus,
            next_sequence: Mutex::new(1),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Publish `event`; returns the assigned sequence number.
    ///
    /// State has already been committed when this runs, so a publish failure is
    /// logged and reported as `None` rather than propagated. A failed publish does
    /// not consume its sequence number.
    pub fn emit<E>(&self, event: E) -> Option<u64>
    where
        E: Event,
        B: EventBus<EventEnvelope<E>>,
    {
        let mut next = self.next_sequence.lock().unwrap_or_else(|p| p.into_inner());
        let sequence = *next;
        let envelope = EventEnvelope::wrap(self.source.clone(), sequence, event);
        let event_type = envelope.event_type().to_string();

        match self.bus.publish(envelope) {
            Ok(()) => {
                *next += 1;
                debug!(source = %self.source, sequence, event_type, "event published");
                Some(sequence)
            }
            Err(err) => {
                warn!(source = %self.source, sequence, event_type, error = ?err, "event publication failed");
                None
            }
        }
    }
}
