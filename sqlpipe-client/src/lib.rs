//! # sqlpipe-client
//!
//! Client runtime for the sqlpipe pipelined SQL protocol.
//!
//! This crate provides:
//! - Transparent connection rotation and recovery behind a single logical
//!   connection
//! - A per-connection stored-SQL text cache
//! - Atomic pipelined batches and interactive transactions
//! - An embedded-engine pass-through backend for `file:` URLs

pub mod batch;
pub mod cache;
pub mod client;
pub mod connection;
pub mod error;
pub mod local;
pub mod stream;
pub mod transaction;

pub use batch::TransactionMode;
pub use cache::SqlTextCache;
pub use client::{Client, ResultSet};
pub use connection::{Config, ConnectionManager, DEFAULT_MAX_CONN_AGE, DEFAULT_SQL_CACHE_CAPACITY};
pub use error::ClientError;
pub use local::{LocalEngine, LocalStatement};
pub use stream::StreamSession;
pub use transaction::Transaction;
