//! Named-topic publish/subscribe event bus with listener priorities,
//! ordered dispatch, and a bounded internal queue for asynchronous
//! delivery.
//!
//! Shape follows the teacher's `EventBus` (`bus.rs`): a config struct,
//! a dedicated worker task drained from a channel, `start`/`close`
//! lifecycle methods, and an `EventBusStats` snapshot. The dispatch
//! model itself is reworked from the teacher's plain broadcast-to-all
//! into topic + priority + per-listener busy-set semantics.

mod bus;

pub use bus::{Event, EventBus, EventBusConfig, EventBusStats, Listener, ListenerId, Priority};
