//! Client facade and backend selection.

use crate::batch::{transactional_results, transactional_steps, TransactionMode};
use crate::connection::{Config, ConnectionManager};
use crate::error::ClientError;
use crate::local::{LocalBackend, LocalEngine};
use crate::transaction::Transaction;
use sqlpipe_protocol::{Connector, Stmt, StmtResult};
use std::sync::Arc;

/// Statement results as exposed to application callers.
pub type ResultSet = StmtResult;

/// URL schemes served by the network backend.
const REMOTE_SCHEMES: [&str; 4] = ["ws", "wss", "http", "https"];

/// A database client.
///
/// One backend is selected at construction time from the URL scheme and
/// never changes: `ws`/`wss`/`http`/`https` run over a [`Connector`] with
/// managed connections, `file` drives an embedded [`LocalEngine`] directly.
pub struct Client {
    backend: Backend,
}

enum Backend {
    Remote(ConnectionManager),
    Local(LocalBackend),
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.backend {
            Backend::Remote(_) => "Remote",
            Backend::Local(_) => "Local",
        };
        f.debug_struct("Client").field("backend", &kind).finish()
    }
}

impl Client {
    /// Creates a client over a network transport. Fails with
    /// [`ClientError::UnsupportedScheme`] before any I/O if the URL scheme
    /// does not name a network backend.
    pub fn remote(config: Config, connector: Arc<dyn Connector>) -> Result<Self, ClientError> {
        let scheme = config.url.scheme();
        if !REMOTE_SCHEMES.contains(&scheme) {
            return Err(ClientError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(Self {
            backend: Backend::Remote(ConnectionManager::new(connector, config)),
        })
    }

    /// Creates a client over an embedded engine. The URL scheme must be
    /// `file`.
    pub fn local(config: Config, engine: Box<dyn LocalEngine>) -> Result<Self, ClientError> {
        let scheme = config.url.scheme();
        if scheme != "file" {
            return Err(ClientError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(Self {
            backend: Backend::Local(LocalBackend::new(engine)),
        })
    }

    /// Executes a single statement.
    pub async fn execute(&self, stmt: impl Into<Stmt>) -> Result<ResultSet, ClientError> {
        match &self.backend {
            Backend::Remote(manager) => {
                let mut stream = manager.acquire_stream().await?;
                let res = stream.execute(stmt).await;
                stream.close();
                res
            }
            Backend::Local(local) => local.execute(stmt.into()),
        }
    }

    /// Executes the statements atomically in one round trip. Either every
    /// statement's result is returned, in input order, or the whole batch
    /// is rolled back and a single error is surfaced.
    pub async fn batch(
        &self,
        stmts: Vec<Stmt>,
        mode: TransactionMode,
    ) -> Result<Vec<ResultSet>, ClientError> {
        match &self.backend {
            Backend::Remote(manager) => {
                let count = stmts.len();
                let steps = transactional_steps(mode, stmts);
                let mut stream = manager.acquire_stream().await?;
                let res = stream.send_batch(steps).await;
                stream.close();
                transactional_results(res?, count)
            }
            Backend::Local(local) => local.batch(stmts, mode),
        }
    }

    /// Opens an interactive transaction; the begin statement is issued
    /// before the handle is returned.
    pub async fn transaction(&self, mode: TransactionMode) -> Result<Transaction, ClientError> {
        match &self.backend {
            Backend::Remote(manager) => {
                let stream = manager.acquire_stream().await?;
                Transaction::begin_remote(stream, mode).await
            }
            Backend::Local(local) => {
                local.ensure_open()?;
                Transaction::begin_local(local.engine(), mode)
            }
        }
    }

    /// Closes the client; every later operation fails with
    /// [`ClientError::ClientClosed`].
    pub fn close(&self) {
        match &self.backend {
            Backend::Remote(manager) => manager.close(),
            Backend::Local(local) => local.close(),
        }
    }
}
