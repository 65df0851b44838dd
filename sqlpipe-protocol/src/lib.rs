//! # sqlpipe-protocol
//!
//! Wire data model for the sqlpipe pipelined SQL protocol.
//!
//! This crate provides:
//! - Value, statement and result types crossing the protocol boundary
//! - Conditional batch steps for pipelined execution
//! - The `Connector`/`ProtocolSession`/`ProtoStream` interfaces implemented
//!   by transport layers
//! - Session-level error types distinguishing transport failures from
//!   server-reported errors

pub mod batch;
pub mod error;
pub mod result;
pub mod session;
pub mod stmt;
pub mod value;

pub use batch::{BatchCond, BatchResult, BatchStep};
pub use error::{ServerError, SessionError};
pub use result::{Col, DescribeParam, DescribeResult, StmtResult};
pub use session::{Connector, ProtoStream, ProtocolSession, SqlStore};
pub use stmt::{NamedArg, Sql, SqlId, Stmt};
pub use value::Value;

/// Protocol version implemented by this client runtime.
pub const PROTOCOL_VERSION: u32 = 2;
