//! SQLite persistence for the sentiment cache.
//!
//! A single worker thread owns the connection; see [`Database`].

mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::CacheEntry;
