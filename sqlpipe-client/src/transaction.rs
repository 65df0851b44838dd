//! Interactive transactions.

use crate::batch::{chained_results, chained_steps, TransactionMode};
use crate::error::ClientError;
use crate::local::{run_simple, run_stmt, LocalEngine};
use crate::stream::StreamSession;
use parking_lot::Mutex;
use sqlpipe_protocol::{Stmt, StmtResult};
use std::sync::Arc;

/// A caller-driven transaction spanning multiple round trips.
///
/// The transaction holds a dedicated stream for its whole lifetime. Its
/// state machine is `Open → Closed`: `commit` and `rollback` both close it
/// (idempotently), `execute`/`batch` on a closed transaction fail with
/// [`ClientError::TransactionClosed`], and [`close`](Transaction::close) on
/// an open transaction rolls back best-effort.
pub struct Transaction {
    inner: TxInner,
    closed: bool,
}

enum TxInner {
    Remote(StreamSession),
    Local(Arc<Mutex<Box<dyn LocalEngine>>>),
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            TxInner::Remote(_) => "Remote",
            TxInner::Local(_) => "Local",
        };
        f.debug_struct("Transaction")
            .field("inner", &kind)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Transaction {
    pub(crate) async fn begin_remote(
        mut stream: StreamSession,
        mode: TransactionMode,
    ) -> Result<Self, ClientError> {
        stream
            .execute(Stmt::new(mode.begin_stmt()).without_rows())
            .await?;
        Ok(Self {
            inner: TxInner::Remote(stream),
            closed: false,
        })
    }

    pub(crate) fn begin_local(
        engine: Arc<Mutex<Box<dyn LocalEngine>>>,
        mode: TransactionMode,
    ) -> Result<Self, ClientError> {
        {
            let mut guard = engine.lock();
            run_simple(guard.as_mut(), mode.begin_stmt()).map_err(ClientError::from_server)?;
        }
        Ok(Self {
            inner: TxInner::Local(engine),
            closed: false,
        })
    }

    /// Executes a single statement inside the transaction.
    pub async fn execute(&mut self, stmt: impl Into<Stmt>) -> Result<StmtResult, ClientError> {
        self.ensure_open()?;
        match &mut self.inner {
            TxInner::Remote(stream) => stream.execute(stmt).await,
            TxInner::Local(engine) => {
                let mut guard = engine.lock();
                run_stmt(guard.as_mut(), &stmt.into())
            }
        }
    }

    /// Executes the statements as one pipelined chain inside the
    /// transaction: each statement is gated on its predecessor, with no
    /// nested begin or commit.
    pub async fn batch(&mut self, stmts: Vec<Stmt>) -> Result<Vec<StmtResult>, ClientError> {
        self.ensure_open()?;
        match &mut self.inner {
            TxInner::Remote(stream) => {
                let count = stmts.len();
                let result = stream.send_batch(chained_steps(stmts)).await?;
                chained_results(result, count)
            }
            TxInner::Local(engine) => {
                let mut guard = engine.lock();
                let engine = guard.as_mut();
                let mut results = Vec::with_capacity(stmts.len());
                for (i, stmt) in stmts.iter().enumerate() {
                    match run_stmt(engine, stmt) {
                        Ok(res) => results.push(res),
                        Err(ClientError::Server { message, code }) => {
                            return Err(ClientError::BatchAborted {
                                step: i,
                                message,
                                code,
                            })
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(results)
            }
        }
    }

    /// Commits and closes the transaction. A no-op if already closed.
    pub async fn commit(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        let res = self.run_terminal("COMMIT").await;
        self.finish();
        res
    }

    /// Rolls back and closes the transaction. A no-op if already closed.
    pub async fn rollback(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        let res = self.run_terminal("ROLLBACK").await;
        self.finish();
        res
    }

    /// Closes the transaction, rolling back best-effort if it is still
    /// open. Dropping the handle releases the stream without the rollback
    /// statement; the server rolls back when the stream goes away.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        let _ = self.run_terminal("ROLLBACK").await;
        self.finish();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn run_terminal(&mut self, sql: &str) -> Result<(), ClientError> {
        match &mut self.inner {
            TxInner::Remote(stream) => stream
                .execute(Stmt::new(sql).without_rows())
                .await
                .map(|_| ()),
            TxInner::Local(engine) => {
                let mut guard = engine.lock();
                run_simple(guard.as_mut(), sql).map_err(ClientError::from_server)
            }
        }
    }

    fn finish(&mut self) {
        self.closed = true;
        if let TxInner::Remote(stream) = &mut self.inner {
            stream.close();
        }
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed {
            Err(ClientError::TransactionClosed)
        } else {
            Ok(())
        }
    }
}
