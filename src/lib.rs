//! Team access control and the invite/join lifecycle.
//!
//! Two halves:
//!
//! - [`access`]: a static permission matrix and the attribute evaluator that
//!   answers "may this role do that to this kind of resource".
//! - [`teams`]: memberships, invites and the actions that move a user into,
//!   around and out of a team.
//!
//! [`TeamGate`] ties both to bearer-token identities and is the surface a
//! request handler calls.

pub mod access;
pub mod config;
pub mod crypto;
pub mod events;
pub mod service;
pub mod teams;
pub mod validators;

mod error;
mod secret;

#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use config::TeamGateConfig;
pub use error::{AccessError, Entity, ErrorKind};
pub use events::{TeamEvent, register_event_listeners};
pub use secret::SecretString;
pub use service::TeamGate;
