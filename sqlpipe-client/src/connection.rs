//! Connection lifecycle: rotation, recovery and stream accounting.

use crate::cache::SqlTextCache;
use crate::error::ClientError;
use crate::stream::StreamSession;
use parking_lot::Mutex;
use sqlpipe_protocol::{Connector, ProtoStream, ProtocolSession, SessionError, SqlId, SqlStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

/// Default maximum connection age before proactive rotation.
pub const DEFAULT_MAX_CONN_AGE: Duration = Duration::from_secs(60);

/// Default stored-SQL cache capacity per connection.
pub const DEFAULT_SQL_CACHE_CAPACITY: usize = 30;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL; the scheme selects the backend.
    pub url: Url,
    /// Maximum connection age before a replacement is prepared.
    pub max_conn_age: Duration,
    /// Stored-SQL cache capacity per connection (0 disables caching).
    pub sql_cache_capacity: usize,
}

impl Config {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(url).map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            url,
            max_conn_age: DEFAULT_MAX_CONN_AGE,
            sql_cache_capacity: DEFAULT_SQL_CACHE_CAPACITY,
        })
    }

    pub fn with_max_conn_age(mut self, age: Duration) -> Self {
        self.max_conn_age = age;
        self
    }

    pub fn with_sql_cache_capacity(mut self, capacity: usize) -> Self {
        self.sql_cache_capacity = capacity;
        self
    }
}

/// One physical multiplexed session to the server.
pub(crate) struct Conn {
    id: Uuid,
    session: Box<dyn ProtocolSession>,
    protocol_version: u32,
    opened_at: Instant,
    cache: Mutex<SqlTextCache>,
    active_streams: AtomicUsize,
    closed_by_manager: AtomicBool,
}

impl Conn {
    fn new(session: Box<dyn ProtocolSession>, protocol_version: u32, cache_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
            protocol_version,
            opened_at: Instant::now(),
            cache: Mutex::new(SqlTextCache::new(cache_capacity)),
            active_streams: AtomicUsize::new(0),
            closed_by_manager: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed_by_manager.load(Ordering::SeqCst) || self.session.is_closed()
    }

    pub(crate) fn cache(&self) -> &Mutex<SqlTextCache> {
        &self.cache
    }

    fn open_stream(&self) -> Result<Box<dyn ProtoStream>, SessionError> {
        self.session.open_stream()
    }

    fn register_stream(&self) {
        self.active_streams.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the active-stream count, returning the remaining count.
    fn release_stream(&self) -> usize {
        self.active_streams.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub(crate) fn stream_count(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }

    /// Closes the underlying session. Idempotent: the session sees exactly
    /// one close even when retirement and stream release race.
    fn close(&self) {
        if !self.closed_by_manager.swap(true, Ordering::SeqCst) {
            self.session.close();
            tracing::debug!("closed connection {}", self.id);
        }
    }
}

// The stored-SQL registry lives on the session, so all streams of one
// connection share cached handles.
impl SqlStore for Conn {
    fn store_sql(&self, sql: &str) -> SqlId {
        self.session.store_sql(sql)
    }

    fn close_sql(&self, sql_id: SqlId) {
        self.session.close_sql(sql_id)
    }
}

struct ManagerState {
    closed: bool,
    current: Option<Arc<Conn>>,
    /// Present while a replacement connection is being prepared, by the
    /// background rotation task or an inline reconnect. Signalled (and
    /// cleared) when the attempt resolves either way.
    replacement: Option<watch::Receiver<bool>>,
}

struct ManagerInner {
    connector: Arc<dyn Connector>,
    config: Config,
    state: Mutex<ManagerState>,
}

/// What `acquire_stream` decided to do with the state it observed.
enum Plan {
    /// Use the current connection as-is.
    Use(Arc<Conn>),
    /// A replacement is being prepared; wait for it and look again.
    Await(watch::Receiver<bool>),
    /// Open a connection inline, holding the replacement slot.
    Connect(watch::Sender<bool>),
}

/// Presents one logical, always-available connection to callers while
/// rotating and recovering the physical session underneath.
///
/// Rotation never blocks the hot path: an aged connection keeps serving
/// while its replacement handshakes in the background, and the swap is a
/// no-op if the connection it was meant to replace is gone by then.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: Config) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                config,
                state: Mutex::new(ManagerState {
                    closed: false,
                    current: None,
                    replacement: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Opens a [`StreamSession`] on the current connection, transparently
    /// creating, rotating or replacing the physical connection as needed.
    /// Fails only when the client has been closed.
    pub async fn acquire_stream(&self) -> Result<StreamSession, ClientError> {
        loop {
            match self.plan_acquire()? {
                Plan::Use(conn) => match conn.open_stream() {
                    Ok(stream) => {
                        conn.register_stream();
                        return Ok(StreamSession::new(self.clone(), conn, stream));
                    }
                    // Lost a race with an asynchronous close; plan again.
                    Err(_) if conn.is_closed() => continue,
                    Err(e) => return Err(e.into()),
                },
                Plan::Await(mut done) => {
                    let _ = done.changed().await;
                }
                Plan::Connect(done) => {
                    let res = self.open_conn().await;
                    let conn = {
                        let mut state = self.inner.state.lock();
                        state.replacement = None;
                        match res {
                            Ok(conn) => {
                                if state.closed {
                                    drop(state);
                                    conn.close();
                                    let _ = done.send(true);
                                    return Err(ClientError::ClientClosed);
                                }
                                let old = state.current.replace(conn.clone());
                                drop(state);
                                let _ = done.send(true);
                                if let Some(old) = old {
                                    self.retire(old);
                                }
                                conn
                            }
                            Err(e) => {
                                drop(state);
                                let _ = done.send(true);
                                return Err(e);
                            }
                        }
                    };
                    let stream = conn.open_stream().map_err(ClientError::from)?;
                    conn.register_stream();
                    return Ok(StreamSession::new(self.clone(), conn, stream));
                }
            }
        }
    }

    /// Inspects the state under the lock and decides how to proceed.
    fn plan_acquire(&self) -> Result<Plan, ClientError> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ClientError::ClientClosed);
        }

        if let Some(conn) = state.current.clone() {
            if !conn.is_closed() {
                if conn.age() >= self.inner.config.max_conn_age && state.replacement.is_none() {
                    let (tx, rx) = watch::channel(false);
                    state.replacement = Some(rx);
                    drop(state);
                    tracing::debug!(
                        "connection {} aged out, preparing replacement in the background",
                        conn.id
                    );
                    self.spawn_replacement(conn.id, tx);
                }
                return Ok(Plan::Use(conn));
            }
        }

        // No usable connection: first use, or the current one is closed.
        if let Some(rx) = &state.replacement {
            // An abandoned attempt (sender dropped mid-connect) is taken
            // over instead of waited on.
            if rx.has_changed().is_ok() {
                return Ok(Plan::Await(rx.clone()));
            }
        }

        // No attempt in flight: take the slot and connect inline.
        // Concurrent acquirers wait on it.
        let (tx, rx) = watch::channel(false);
        state.replacement = Some(rx);
        Ok(Plan::Connect(tx))
    }

    /// Connects and waits for the handshake so the connection is usable
    /// (protocol version known) before it becomes current.
    async fn open_conn(&self) -> Result<Arc<Conn>, ClientError> {
        let session = self.inner.connector.connect().await?;
        let version = session.protocol_version().await?;
        let conn = Arc::new(Conn::new(
            session,
            version,
            self.inner.config.sql_cache_capacity,
        ));
        tracing::debug!(
            "opened connection {} (protocol version {})",
            conn.id,
            version
        );
        Ok(conn)
    }

    /// Prepares a replacement for `intended` off the hot path. The swap
    /// only happens if `intended` is still the current connection when the
    /// handshake finishes; otherwise the replacement is discarded, so a
    /// stale rotation never clobbers a newer emergency reconnect.
    fn spawn_replacement(&self, intended: Uuid, done: watch::Sender<bool>) {
        let manager = self.clone();
        tokio::spawn(async move {
            let res = manager.open_conn().await;
            {
                let mut state = manager.inner.state.lock();
                state.replacement = None;
                match res {
                    Ok(conn) => {
                        let intended_still_current = !state.closed
                            && state.current.as_ref().map_or(false, |c| c.id == intended);
                        if intended_still_current {
                            tracing::debug!(
                                "swapped in replacement connection {} (protocol version {})",
                                conn.id,
                                conn.protocol_version()
                            );
                            let old = state.current.replace(conn);
                            drop(state);
                            if let Some(old) = old {
                                manager.retire(old);
                            }
                        } else {
                            drop(state);
                            conn.close();
                            tracing::debug!(
                                "discarding replacement: connection {} is no longer current",
                                intended
                            );
                        }
                    }
                    Err(e) => {
                        drop(state);
                        // Keep serving on the existing connection.
                        tracing::warn!("background replacement handshake failed: {}", e);
                    }
                }
            }
            let _ = done.send(true);
        });
    }

    /// Retires a connection that is no longer current: closed immediately
    /// if idle, otherwise when its last stream is released.
    fn retire(&self, old: Arc<Conn>) {
        if old.stream_count() == 0 {
            old.close();
        } else {
            tracing::debug!(
                "deferring close of retired connection {} ({} active streams)",
                old.id,
                old.stream_count()
            );
        }
    }

    /// Releases a stream's slot on its connection; called by
    /// [`StreamSession::close`]. A retired connection is closed when its
    /// last stream goes away.
    pub(crate) fn release_stream(&self, conn: &Arc<Conn>) {
        let remaining = conn.release_stream();
        let is_current = {
            let state = self.inner.state.lock();
            state.current.as_ref().map_or(false, |c| c.id == conn.id)
        };
        if !is_current && remaining == 0 {
            conn.close();
        }
    }

    /// Closes the current connection unconditionally and rejects all
    /// further `acquire_stream` calls.
    pub fn close(&self) {
        let current = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.current.take()
        };
        if let Some(conn) = current {
            conn.close();
        }
        tracing::debug!("connection manager closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}
