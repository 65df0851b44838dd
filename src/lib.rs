//! sqlpipe - Pipelined SQL client runtime
//!
//! A client-side runtime for a request/response SQL protocol multiplexed
//! over long-lived connections. Statements, atomic batches and interactive
//! transactions are issued against a remote engine while connection churn,
//! handshake latency and round-trip cost stay hidden from the caller.

pub use sqlpipe_client::{
    Client, ClientError, Config, ConnectionManager, LocalEngine, LocalStatement, ResultSet,
    SqlTextCache, StreamSession, Transaction, TransactionMode, DEFAULT_MAX_CONN_AGE,
    DEFAULT_SQL_CACHE_CAPACITY,
};
pub use sqlpipe_protocol::{
    BatchCond, BatchResult, BatchStep, Col, Connector, DescribeParam, DescribeResult, NamedArg,
    ProtoStream, ProtocolSession, ServerError, SessionError, Sql, SqlId, SqlStore, Stmt,
    StmtResult, Value, PROTOCOL_VERSION,
};

/// The protocol data model, for transport implementors.
pub use sqlpipe_protocol as protocol;
