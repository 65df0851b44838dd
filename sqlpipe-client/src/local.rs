//! Embedded-engine pass-through backend.
//!
//! `file:` URLs bypass the network path entirely: statements are driven
//! synchronously through a [`LocalEngine`]. There is no rotation and no
//! stored-SQL cache here; this backend exists so both flavors expose the
//! same capability surface.

use crate::batch::TransactionMode;
use crate::error::ClientError;
use parking_lot::Mutex;
use sqlpipe_protocol::{Col, NamedArg, ServerError, Stmt, StmtResult, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A synchronous embedded SQL engine.
pub trait LocalEngine: Send {
    /// Prepares one statement.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn LocalStatement>, ServerError>;

    /// Whether the engine is outside an explicit transaction.
    fn is_autocommit(&self) -> bool;
}

/// A prepared statement with bind/step/finalize semantics.
pub trait LocalStatement: Send {
    /// Binds positional and named arguments.
    fn bind(&mut self, args: &[Value], named_args: &[NamedArg]) -> Result<(), ServerError>;

    /// Result column descriptors.
    fn cols(&self) -> Vec<Col>;

    /// Steps to the next row; `None` when the statement is done.
    fn step(&mut self) -> Result<Option<Vec<Value>>, ServerError>;

    /// Finalizes the statement, returning the affected row count and the
    /// last inserted rowid.
    fn finalize(self: Box<Self>) -> Result<(u64, Option<i64>), ServerError>;
}

pub(crate) struct LocalBackend {
    engine: Arc<Mutex<Box<dyn LocalEngine>>>,
    closed: AtomicBool,
}

impl LocalBackend {
    pub(crate) fn new(engine: Box<dyn LocalEngine>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn execute(&self, stmt: Stmt) -> Result<StmtResult, ClientError> {
        self.ensure_open()?;
        let mut engine = self.engine.lock();
        run_stmt(engine.as_mut(), &stmt)
    }

    /// Runs the statements inside a transaction of the given mode, rolling
    /// back on the first failure. Step indexes in errors match the network
    /// backend's chain layout (step 0 is the begin).
    pub(crate) fn batch(
        &self,
        stmts: Vec<Stmt>,
        mode: TransactionMode,
    ) -> Result<Vec<StmtResult>, ClientError> {
        self.ensure_open()?;
        let mut engine = self.engine.lock();
        let engine = engine.as_mut();

        if !engine.is_autocommit() {
            return Err(ClientError::Server {
                message: "cannot start a transaction within a transaction".to_string(),
                code: None,
            });
        }

        run_simple(engine, mode.begin_stmt())
            .map_err(|e| ClientError::batch_aborted(0, e))?;

        let mut results = Vec::with_capacity(stmts.len());
        for (i, stmt) in stmts.iter().enumerate() {
            match run_stmt_raw(engine, stmt) {
                Ok(res) => results.push(res),
                Err(e) => {
                    let _ = run_simple(engine, "ROLLBACK");
                    return Err(ClientError::batch_aborted(i + 1, e));
                }
            }
        }

        match run_simple(engine, "COMMIT") {
            Ok(()) => Ok(results),
            Err(e) => {
                let _ = run_simple(engine, "ROLLBACK");
                Err(ClientError::batch_aborted(stmts.len() + 1, e))
            }
        }
    }

    pub(crate) fn engine(&self) -> Arc<Mutex<Box<dyn LocalEngine>>> {
        self.engine.clone()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ClientError::ClientClosed)
        } else {
            Ok(())
        }
    }
}

/// Drives one statement through the engine.
pub(crate) fn run_stmt(engine: &mut dyn LocalEngine, stmt: &Stmt) -> Result<StmtResult, ClientError> {
    run_stmt_raw(engine, stmt).map_err(ClientError::from_server)
}

fn run_stmt_raw(engine: &mut dyn LocalEngine, stmt: &Stmt) -> Result<StmtResult, ServerError> {
    let sql = stmt
        .sql
        .as_text()
        .ok_or_else(|| ServerError::new("stored SQL handles require a network backend"))?;

    let mut prepared = engine.prepare(sql)?;
    prepared.bind(&stmt.args, &stmt.named_args)?;
    let cols = prepared.cols();

    let mut rows = Vec::new();
    while let Some(row) = prepared.step()? {
        if stmt.want_rows {
            rows.push(row);
        }
    }

    let (affected_row_count, last_insert_rowid) = prepared.finalize()?;
    Ok(StmtResult {
        cols,
        rows,
        affected_row_count,
        last_insert_rowid,
    })
}

pub(crate) fn run_simple(engine: &mut dyn LocalEngine, sql: &str) -> Result<(), ServerError> {
    run_stmt_raw(engine, &Stmt::new(sql).without_rows()).map(|_| ())
}
