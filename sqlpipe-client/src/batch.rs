//! Step-chain construction and result extraction for pipelined batches.
//!
//! An atomic batch travels as one pipelined request whose steps form a
//! linear chain: begin, then one step per statement each gated on its
//! predecessor, then commit gated on the last statement, then a rollback
//! that fires whenever the commit did not. The server evaluates the
//! conditions; the client only reads the outcomes back in step order.

use crate::error::ClientError;
use sqlpipe_protocol::{BatchCond, BatchResult, BatchStep, Stmt, StmtResult};
use std::fmt;
use std::str::FromStr;

/// Isolation/locking intent declared at transaction start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Take the write lock up front.
    #[default]
    Write,
    /// Read-only snapshot.
    Read,
    /// Defer lock acquisition to the first statement.
    Deferred,
}

impl TransactionMode {
    /// The statement that opens a transaction in this mode.
    pub fn begin_stmt(self) -> &'static str {
        match self {
            TransactionMode::Write => "BEGIN IMMEDIATE",
            TransactionMode::Read => "BEGIN TRANSACTION READONLY",
            TransactionMode::Deferred => "BEGIN DEFERRED",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::Write => write!(f, "write"),
            TransactionMode::Read => write!(f, "read"),
            TransactionMode::Deferred => write!(f, "deferred"),
        }
    }
}

impl FromStr for TransactionMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, ClientError> {
        match s {
            "write" => Ok(TransactionMode::Write),
            "read" => Ok(TransactionMode::Read),
            "deferred" => Ok(TransactionMode::Deferred),
            other => Err(ClientError::InvalidMode(other.to_string())),
        }
    }
}

/// Builds the step chain for an atomic batch:
/// begin → statements → commit, plus a rollback step that fires when the
/// commit did not run or did not succeed.
pub(crate) fn transactional_steps(mode: TransactionMode, stmts: Vec<Stmt>) -> Vec<BatchStep> {
    let mut steps = Vec::with_capacity(stmts.len() + 3);
    steps.push(BatchStep::new(Stmt::new(mode.begin_stmt()).without_rows()));

    let mut prev = 0;
    for stmt in stmts {
        let idx = steps.len();
        steps.push(BatchStep::new(stmt).when(BatchCond::ok(prev)));
        prev = idx;
    }

    let commit = steps.len();
    steps.push(BatchStep::new(Stmt::new("COMMIT").without_rows()).when(BatchCond::ok(prev)));
    steps.push(
        BatchStep::new(Stmt::new("ROLLBACK").without_rows())
            .when(BatchCond::not(BatchCond::ok(commit))),
    );
    steps
}

/// Step chain for a batch inside an already-open transaction: the same
/// gating, without begin/commit/rollback steps.
pub(crate) fn chained_steps(stmts: Vec<Stmt>) -> Vec<BatchStep> {
    stmts
        .into_iter()
        .enumerate()
        .map(|(i, stmt)| {
            let step = BatchStep::new(stmt);
            if i == 0 {
                step
            } else {
                step.when(BatchCond::ok(i - 1))
            }
        })
        .collect()
}

/// Extracts the statement results of an atomic batch dispatched via
/// [`transactional_steps`]. A missing statement or commit result means an
/// earlier step failed; the first recorded error is surfaced and the
/// rollback step's outcome is never reported.
pub(crate) fn transactional_results(
    result: BatchResult,
    stmt_count: usize,
) -> Result<Vec<StmtResult>, ClientError> {
    let BatchResult {
        step_results,
        step_errors,
    } = result;
    let mut step_results = step_results.into_iter();

    // Begin step: its failure shows up as missing statement results below.
    let _ = step_results.next();

    let mut results = Vec::with_capacity(stmt_count);
    for _ in 0..stmt_count {
        match step_results.next().flatten() {
            Some(res) => results.push(res),
            None => return Err(first_failure(&step_errors)),
        }
    }

    match step_results.next().flatten() {
        Some(_) => Ok(results),
        None => Err(first_failure(&step_errors)),
    }
}

/// Extracts the results of a chain dispatched via [`chained_steps`].
pub(crate) fn chained_results(
    result: BatchResult,
    stmt_count: usize,
) -> Result<Vec<StmtResult>, ClientError> {
    let BatchResult {
        step_results,
        step_errors,
    } = result;
    let mut step_results = step_results.into_iter();

    let mut results = Vec::with_capacity(stmt_count);
    for _ in 0..stmt_count {
        match step_results.next().flatten() {
            Some(res) => results.push(res),
            None => return Err(first_failure(&step_errors)),
        }
    }
    Ok(results)
}

fn first_failure(step_errors: &[Option<sqlpipe_protocol::ServerError>]) -> ClientError {
    for (step, err) in step_errors.iter().enumerate() {
        if let Some(err) = err {
            return ClientError::batch_aborted(step, err.clone());
        }
    }
    // No step reported an error yet a result is missing: the transport
    // returned a malformed batch response.
    ClientError::Server {
        message: "batch response is missing step results".to_string(),
        code: None,
    }
}
