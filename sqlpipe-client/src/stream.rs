//! Logical stream sessions.

use crate::connection::{Conn, ConnectionManager};
use crate::error::ClientError;
use sqlpipe_protocol::{
    BatchResult, BatchStep, DescribeResult, ProtoStream, Sql, Stmt, StmtResult,
};
use std::sync::Arc;

/// A logical, independently closable cursor multiplexed over one physical
/// connection.
///
/// Operations issued on one session execute in issue order; sessions over
/// the same connection are unordered relative to each other. Closing a
/// session abandons only its logical stream and releases it back to the
/// manager for connection accounting.
pub struct StreamSession {
    manager: ConnectionManager,
    conn: Arc<Conn>,
    stream: Box<dyn ProtoStream>,
    closed: bool,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    pub(crate) fn new(
        manager: ConnectionManager,
        conn: Arc<Conn>,
        stream: Box<dyn ProtoStream>,
    ) -> Self {
        Self {
            manager,
            conn,
            stream,
            closed: false,
        }
    }

    /// Executes a single statement.
    pub async fn execute(&mut self, stmt: impl Into<Stmt>) -> Result<StmtResult, ClientError> {
        self.ensure_open()?;
        let mut stmts = [stmt.into()];
        self.conn.cache().lock().apply(self.conn.as_ref(), &mut stmts);
        let [stmt] = stmts;
        Ok(self.stream.execute(stmt).await?)
    }

    /// Dispatches a prepared step chain in one pipelined round trip.
    pub async fn send_batch(
        &mut self,
        mut steps: Vec<BatchStep>,
    ) -> Result<BatchResult, ClientError> {
        self.ensure_open()?;
        self.conn
            .cache()
            .lock()
            .apply_steps(self.conn.as_ref(), &mut steps);
        Ok(self.stream.batch(steps).await?)
    }

    /// Describes a statement without executing it.
    pub async fn describe(&mut self, sql: impl Into<String>) -> Result<DescribeResult, ClientError> {
        self.ensure_open()?;
        let mut sql = Sql::text(sql);
        self.conn.cache().lock().apply_sql(self.conn.as_ref(), &mut sql);
        Ok(self.stream.describe(sql).await?)
    }

    /// Executes a multi-statement SQL script, discarding results.
    pub async fn sequence(&mut self, sql: impl Into<String>) -> Result<(), ClientError> {
        self.ensure_open()?;
        let mut sql = Sql::text(sql);
        self.conn.cache().lock().apply_sql(self.conn.as_ref(), &mut sql);
        Ok(self.stream.sequence(sql).await?)
    }

    /// Closes the logical stream and releases it back to the manager.
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stream.close();
        self.manager.release_stream(&self.conn);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed {
            Err(ClientError::StreamClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}
