//! Conditional batch steps for pipelined execution.

use crate::error::ServerError;
use crate::result::StmtResult;
use crate::stmt::Stmt;
use serde::{Deserialize, Serialize};

/// A condition deciding whether a batch step executes, evaluated by the
/// server against the outcomes of earlier steps in the same batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchCond {
    /// The referenced step executed and succeeded.
    Ok { step: usize },
    /// The referenced step executed and failed.
    Error { step: usize },
    Not { cond: Box<BatchCond> },
    And { conds: Vec<BatchCond> },
    Or { conds: Vec<BatchCond> },
}

impl BatchCond {
    pub fn ok(step: usize) -> Self {
        BatchCond::Ok { step }
    }

    pub fn error(step: usize) -> Self {
        BatchCond::Error { step }
    }

    pub fn not(cond: BatchCond) -> Self {
        BatchCond::Not {
            cond: Box::new(cond),
        }
    }
}

/// One unit of work inside a pipelined batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStep {
    /// Absent means the step always executes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<BatchCond>,
    pub stmt: Stmt,
}

impl BatchStep {
    pub fn new(stmt: impl Into<Stmt>) -> Self {
        Self {
            condition: None,
            stmt: stmt.into(),
        }
    }

    /// Gates the step on a condition.
    pub fn when(mut self, cond: BatchCond) -> Self {
        self.condition = Some(cond);
        self
    }
}

/// Per-step outcomes of a dispatched batch, in step order.
///
/// A step that was skipped (its condition evaluated false) has neither a
/// result nor an error; a step that executed has exactly one of the two.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub step_results: Vec<Option<StmtResult>>,
    pub step_errors: Vec<Option<ServerError>>,
}

impl BatchResult {
    /// The first step that executed and failed, in step order.
    pub fn first_error(&self) -> Option<(usize, &ServerError)> {
        self.step_errors
            .iter()
            .enumerate()
            .find_map(|(step, err)| err.as_ref().map(|e| (step, e)))
    }
}
