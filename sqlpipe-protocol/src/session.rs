//! Collaborator interfaces implemented by transport layers.
//!
//! The client runtime never touches sockets: it drives these interfaces and
//! leaves framing, request correlation and the handshake to the transport.

use crate::batch::{BatchResult, BatchStep};
use crate::error::SessionError;
use crate::result::{DescribeResult, StmtResult};
use crate::stmt::{Sql, SqlId, Stmt};
use async_trait::async_trait;

/// Opens physical sessions. One connector serves one configured endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new physical session. Returns as soon as the transport is
    /// established; the protocol handshake may still be in flight.
    async fn connect(&self) -> Result<Box<dyn ProtocolSession>, SessionError>;
}

/// Session-scoped stored-SQL registry.
///
/// Both operations are non-suspending: the request is pipelined ahead of
/// the next statement, and a rejection surfaces as the failure of the
/// request that references the handle.
pub trait SqlStore: Send + Sync {
    /// Uploads SQL text, returning its handle.
    fn store_sql(&self, sql: &str) -> SqlId;

    /// Releases a stored-SQL handle on the server.
    fn close_sql(&self, sql_id: SqlId);
}

/// One physical multiplexed session to the server.
#[async_trait]
pub trait ProtocolSession: SqlStore + Send + Sync {
    /// Opens a logical stream. Non-suspending: the open is pipelined.
    fn open_stream(&self) -> Result<Box<dyn ProtoStream>, SessionError>;

    /// The protocol version negotiated with the server. Suspends until the
    /// handshake completes.
    async fn protocol_version(&self) -> Result<u32, SessionError>;

    /// Whether the session has been closed, locally or by the transport.
    fn is_closed(&self) -> bool;

    /// Closes the session and every stream on it. Idempotent.
    fn close(&self);
}

/// A logical request stream multiplexed over one session.
///
/// Requests issued on one stream are delivered in order; streams on the
/// same session are unordered relative to each other.
#[async_trait]
pub trait ProtoStream: Send + Sync {
    /// Executes one statement and awaits its result.
    async fn execute(&self, stmt: Stmt) -> Result<StmtResult, SessionError>;

    /// Dispatches a step chain in one pipelined request and awaits all step
    /// outcomes.
    async fn batch(&self, steps: Vec<BatchStep>) -> Result<BatchResult, SessionError>;

    /// Describes a statement without executing it.
    async fn describe(&self, sql: Sql) -> Result<DescribeResult, SessionError>;

    /// Executes a multi-statement SQL script, discarding results.
    async fn sequence(&self, sql: Sql) -> Result<(), SessionError>;

    /// Abandons this stream. Other streams on the session are unaffected.
    /// Idempotent.
    fn close(&self);
}
