//! Notification mechanics: event contract, envelopes, pub/sub bus.
//!
//! Domain crates define their own typed events; this crate only moves them.

pub mod bus;
pub mod emitter;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use emitter::EventEmitter;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
