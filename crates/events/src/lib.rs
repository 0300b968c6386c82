//! Domain events and their distribution.
//!
//! Services publish events only after the change set that produced them has
//! been committed; the bus is for notification, the store is the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
