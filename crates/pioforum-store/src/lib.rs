//! # pioforum-store
//!
//! Document storage for the forum: the [`DocumentStore`] trait that the client
//! core talks to, and [`LiveStore`], a SQLite-backed implementation that pushes
//! a fresh query snapshot to every open [`Subscription`] after each write.
//!
//! The synchronous [`Database`] handle wraps a `rusqlite::Connection` and
//! provides typed CRUD helpers for every collection.

pub mod channels;
pub mod database;
pub mod document;
pub mod live;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod subscription;

mod error;

pub use database::{store_now, Database};
pub use document::DocumentStore;
pub use error::{Result, StoreError};
pub use live::{Change, LiveStore};
pub use models::*;
pub use subscription::Subscription;
