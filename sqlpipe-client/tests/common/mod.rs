//! Scripted fake transport for integration tests.
//!
//! The fake implements the collaborator interfaces over in-memory state and
//! evaluates batch step conditions exactly as the server does, so the
//! runtime's pipelining, caching and rotation behavior can be observed
//! through one shared telemetry object.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlpipe_client::{Client, Config, ConnectionManager};
use sqlpipe_protocol::{
    BatchCond, BatchResult, BatchStep, Connector, DescribeResult, ProtoStream, ProtocolSession,
    ServerError, SessionError, Sql, SqlId, SqlStore, Stmt, StmtResult, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observable state shared by every session a [`FakeConnector`] opens.
#[derive(Default)]
pub struct Telemetry {
    /// Number of connect attempts.
    pub connects: AtomicUsize,
    /// Every SQL text uploaded via `store_sql`, across all sessions.
    pub uploads: Mutex<Vec<String>>,
    /// Every statement the server executed, in execution order.
    pub executed: Mutex<Vec<String>>,
    /// One entry per `close()` call on a session, by session id.
    pub session_closes: Mutex<Vec<usize>>,
    /// Statements that fail with a server error when executed.
    pub failing: Mutex<HashMap<String, ServerError>>,
    /// Canned results returned for specific statements.
    pub canned: Mutex<HashMap<String, StmtResult>>,
    /// When set, the next request fails with a transport error and marks
    /// its session closed.
    pub fail_next_request: AtomicBool,
    /// Handshake delays for upcoming connects, consumed front-first.
    pub handshake_delays: Mutex<Vec<Duration>>,
    /// Connect attempt indexes (0-based) that fail outright.
    pub failing_connects: Mutex<Vec<usize>>,
}

impl Telemetry {
    pub fn upload_count(&self, sql: &str) -> usize {
        self.uploads.lock().iter().filter(|s| *s == sql).count()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn executed_contains(&self, sql: &str) -> bool {
        self.executed.lock().iter().any(|s| s == sql)
    }

    pub fn close_count(&self, session: usize) -> usize {
        self.session_closes.lock().iter().filter(|s| **s == session).count()
    }

    pub fn fail_stmt(&self, sql: &str, message: &str, code: &str) {
        self.failing
            .lock()
            .insert(sql.to_string(), ServerError::new(message).with_code(code));
    }

    pub fn canned_rows(&self, sql: &str, rows: Vec<Vec<Value>>) {
        self.canned.lock().insert(
            sql.to_string(),
            StmtResult {
                rows,
                ..Default::default()
            },
        );
    }

    pub fn push_handshake_delay(&self, delay: Duration) {
        self.handshake_delays.lock().push(delay);
    }

    pub fn fail_connect(&self, attempt: usize) {
        self.failing_connects.lock().push(attempt);
    }
}

pub struct FakeConnector {
    tele: Arc<Telemetry>,
    next_session: AtomicUsize,
}

impl FakeConnector {
    pub fn new(tele: Arc<Telemetry>) -> Self {
        Self {
            tele,
            next_session: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn ProtocolSession>, SessionError> {
        let attempt = self.tele.connects.fetch_add(1, Ordering::SeqCst);
        if self.tele.failing_connects.lock().contains(&attempt) {
            return Err(SessionError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "injected connect failure",
            )));
        }

        let delays = &mut *self.tele.handshake_delays.lock();
        let handshake_delay = if delays.is_empty() {
            Duration::ZERO
        } else {
            delays.remove(0)
        };

        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            inner: Arc::new(SessionInner {
                id,
                tele: self.tele.clone(),
                handshake_delay,
                sqls: Mutex::new(HashMap::new()),
                next_sql_id: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            }),
        }))
    }
}

struct SessionInner {
    id: usize,
    tele: Arc<Telemetry>,
    handshake_delay: Duration,
    sqls: Mutex<HashMap<u32, String>>,
    next_sql_id: AtomicU32,
    closed: AtomicBool,
}

pub struct FakeSession {
    inner: Arc<SessionInner>,
}

impl SqlStore for FakeSession {
    fn store_sql(&self, sql: &str) -> SqlId {
        let id = self.inner.next_sql_id.fetch_add(1, Ordering::SeqCst);
        self.inner.sqls.lock().insert(id, sql.to_string());
        self.inner.tele.uploads.lock().push(sql.to_string());
        SqlId(id)
    }

    fn close_sql(&self, sql_id: SqlId) {
        self.inner.sqls.lock().remove(&sql_id.0);
    }
}

#[async_trait]
impl ProtocolSession for FakeSession {
    fn open_stream(&self) -> Result<Box<dyn ProtoStream>, SessionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        Ok(Box::new(FakeStream {
            inner: self.inner.clone(),
        }))
    }

    async fn protocol_version(&self) -> Result<u32, SessionError> {
        if !self.inner.handshake_delay.is_zero() {
            tokio::time::sleep(self.inner.handshake_delay).await;
        }
        Ok(sqlpipe_protocol::PROTOCOL_VERSION)
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.tele.session_closes.lock().push(self.inner.id);
    }
}

struct FakeStream {
    inner: Arc<SessionInner>,
}

impl FakeStream {
    fn resolve(&self, sql: &Sql) -> Result<String, ServerError> {
        match sql {
            Sql::Text { sql } => Ok(sql.clone()),
            Sql::Stored { sql_id } => self
                .inner
                .sqls
                .lock()
                .get(&sql_id.0)
                .cloned()
                .ok_or_else(|| ServerError::new("stored SQL not found").with_code("SQL_NOT_FOUND")),
        }
    }

    fn run(&self, stmt: &Stmt) -> Result<StmtResult, ServerError> {
        let sql = self.resolve(&stmt.sql)?;
        if let Some(err) = self.inner.tele.failing.lock().get(&sql) {
            return Err(err.clone());
        }
        self.inner.tele.executed.lock().push(sql.clone());
        let mut result = self
            .inner
            .tele
            .canned
            .lock()
            .get(&sql)
            .cloned()
            .unwrap_or_default();
        if !stmt.want_rows {
            result.rows.clear();
        }
        Ok(result)
    }

    fn check_transport(&self) -> Result<(), SessionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if self.inner.tele.fail_next_request.swap(false, Ordering::SeqCst) {
            self.inner.closed.store(true, Ordering::SeqCst);
            return Err(SessionError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "injected transport failure",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProtoStream for FakeStream {
    async fn execute(&self, stmt: Stmt) -> Result<StmtResult, SessionError> {
        self.check_transport()?;
        self.run(&stmt).map_err(SessionError::from)
    }

    async fn batch(&self, steps: Vec<BatchStep>) -> Result<BatchResult, SessionError> {
        self.check_transport()?;
        let mut step_results = Vec::with_capacity(steps.len());
        let mut step_errors = Vec::with_capacity(steps.len());
        for step in &steps {
            let enabled = step
                .condition
                .as_ref()
                .map_or(true, |c| eval_cond(c, &step_results, &step_errors));
            let (res, err) = if enabled {
                match self.run(&step.stmt) {
                    Ok(r) => (Some(r), None),
                    Err(e) => (None, Some(e)),
                }
            } else {
                (None, None)
            };
            step_results.push(res);
            step_errors.push(err);
        }
        Ok(BatchResult {
            step_results,
            step_errors,
        })
    }

    async fn describe(&self, sql: Sql) -> Result<DescribeResult, SessionError> {
        self.check_transport()?;
        self.resolve(&sql)?;
        Ok(DescribeResult::default())
    }

    async fn sequence(&self, sql: Sql) -> Result<(), SessionError> {
        self.check_transport()?;
        let sql = self.resolve(&sql)?;
        self.inner.tele.executed.lock().push(sql);
        Ok(())
    }

    fn close(&self) {}
}

fn eval_cond(
    cond: &BatchCond,
    results: &[Option<StmtResult>],
    errors: &[Option<ServerError>],
) -> bool {
    match cond {
        BatchCond::Ok { step } => results.get(*step).map_or(false, Option::is_some),
        BatchCond::Error { step } => errors.get(*step).map_or(false, Option::is_some),
        BatchCond::Not { cond } => !eval_cond(cond, results, errors),
        BatchCond::And { conds } => conds.iter().all(|c| eval_cond(c, results, errors)),
        BatchCond::Or { conds } => conds.iter().any(|c| eval_cond(c, results, errors)),
    }
}

/// A client over a fake transport, plus the telemetry to observe it.
pub fn fake_client(config: Config) -> (Client, Arc<Telemetry>) {
    let tele = Arc::new(Telemetry::default());
    let connector = Arc::new(FakeConnector::new(tele.clone()));
    let client = Client::remote(config, connector).expect("valid config");
    (client, tele)
}

/// A bare connection manager over a fake transport.
pub fn fake_manager(config: Config) -> (ConnectionManager, Arc<Telemetry>) {
    let tele = Arc::new(Telemetry::default());
    let connector = Arc::new(FakeConnector::new(tele.clone()));
    (ConnectionManager::new(connector, config), tele)
}

pub fn default_config() -> Config {
    Config::new("ws://localhost:8080").expect("valid url")
}
