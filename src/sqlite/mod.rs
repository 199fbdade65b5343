//! `SQLite` backend for the team store and bearer identities.
//!
//! Enable the `sqlx_sqlite` feature to use it. Run [`migrations::run`] once
//! per pool before handing the pool to [`SqliteTeamStore`].

mod identity;
pub mod migrations;
mod records;
mod store;

pub use identity::SqliteIdentityProvider;
pub use store::SqliteTeamStore;
