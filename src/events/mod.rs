//! Lifecycle events.
//!
//! Every invite, membership and account change fires a [`TeamEvent`]. With
//! no registered listeners, dispatch does nothing.
//!
//! ```rust,ignore
//! use teamgate::register_event_listeners;
//! use teamgate::events::listeners::LoggingListener;
//!
//! register_event_listeners(|registry| {
//!     registry.listen(LoggingListener::new());
//! });
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::TeamEvent;
pub use listener::Listener;
pub use registry::{EventRegistry, dispatch, register_event_listeners};
