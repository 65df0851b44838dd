//! Embedded-engine pass-through behavior.

use parking_lot::Mutex;
use sqlpipe_client::{Client, ClientError, Config, LocalEngine, LocalStatement, TransactionMode};
use sqlpipe_protocol::{Col, NamedArg, ServerError, Value};
use std::sync::Arc;

/// A toy single-table engine: `INSERT <n>` appends an integer, `SELECT`
/// returns all of them, and explicit transactions work on a working copy.
#[derive(Default)]
struct ToyState {
    rows: Vec<i64>,
    tx: Option<Vec<i64>>,
}

struct ToyEngine {
    state: Arc<Mutex<ToyState>>,
}

impl ToyEngine {
    fn new() -> (Self, Arc<Mutex<ToyState>>) {
        let state = Arc::new(Mutex::new(ToyState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

enum ToyCmd {
    Begin,
    Commit,
    Rollback,
    Insert(i64),
    Select(Vec<i64>),
}

struct ToyStatement {
    state: Arc<Mutex<ToyState>>,
    cmd: Option<ToyCmd>,
    pending_rows: Vec<i64>,
    affected: u64,
    rowid: Option<i64>,
}

impl LocalEngine for ToyEngine {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn LocalStatement>, ServerError> {
        let state = self.state.lock();
        let cmd = if sql.starts_with("BEGIN") {
            if state.tx.is_some() {
                return Err(ServerError::new("cannot start a transaction within a transaction")
                    .with_code("SQLITE_ERROR"));
            }
            ToyCmd::Begin
        } else if sql == "COMMIT" {
            ToyCmd::Commit
        } else if sql == "ROLLBACK" {
            ToyCmd::Rollback
        } else if let Some(n) = sql.strip_prefix("INSERT ") {
            let n = n
                .parse::<i64>()
                .map_err(|_| ServerError::new("malformed insert").with_code("SQLITE_ERROR"))?;
            ToyCmd::Insert(n)
        } else if sql == "SELECT" {
            ToyCmd::Select(state.tx.as_ref().unwrap_or(&state.rows).clone())
        } else if sql == "BOOM" {
            return Err(ServerError::new("boom").with_code("SQLITE_ERROR"));
        } else {
            return Err(ServerError::new(format!("unknown statement: {sql}")));
        };

        Ok(Box::new(ToyStatement {
            state: self.state.clone(),
            cmd: Some(cmd),
            pending_rows: Vec::new(),
            affected: 0,
            rowid: None,
        }))
    }

    fn is_autocommit(&self) -> bool {
        self.state.lock().tx.is_none()
    }
}

impl LocalStatement for ToyStatement {
    fn bind(&mut self, _args: &[Value], _named_args: &[NamedArg]) -> Result<(), ServerError> {
        Ok(())
    }

    fn cols(&self) -> Vec<Col> {
        match self.cmd {
            Some(ToyCmd::Select(_)) => vec![Col::named("a")],
            _ => Vec::new(),
        }
    }

    fn step(&mut self) -> Result<Option<Vec<Value>>, ServerError> {
        if let Some(cmd) = self.cmd.take() {
            let mut state = self.state.lock();
            match cmd {
                ToyCmd::Begin => state.tx = Some(state.rows.clone()),
                ToyCmd::Commit => {
                    let rows = state
                        .tx
                        .take()
                        .ok_or_else(|| ServerError::new("no transaction is active"))?;
                    state.rows = rows;
                }
                ToyCmd::Rollback => state.tx = None,
                ToyCmd::Insert(n) => {
                    let st = &mut *state;
                    let target = st.tx.as_mut().unwrap_or(&mut st.rows);
                    target.push(n);
                    self.affected = 1;
                    self.rowid = Some(target.len() as i64);
                }
                ToyCmd::Select(rows) => self.pending_rows = rows,
            }
        }

        if self.pending_rows.is_empty() {
            Ok(None)
        } else {
            let n = self.pending_rows.remove(0);
            Ok(Some(vec![Value::from(n)]))
        }
    }

    fn finalize(self: Box<Self>) -> Result<(u64, Option<i64>), ServerError> {
        Ok((self.affected, self.rowid))
    }
}

fn toy_client() -> (Client, Arc<Mutex<ToyState>>) {
    let (engine, state) = ToyEngine::new();
    let config = Config::new("file:///tmp/toy.db").unwrap();
    let client = Client::local(config, Box::new(engine)).unwrap();
    (client, state)
}

#[tokio::test]
async fn local_execute_and_select() {
    let (client, _state) = toy_client();

    let res = client.execute("INSERT 7").await.unwrap();
    assert_eq!(res.affected_row_count, 1);
    assert_eq!(res.last_insert_rowid, Some(1));

    let res = client.execute("SELECT").await.unwrap();
    assert_eq!(res.rows, vec![vec![Value::from(7i64)]]);
    assert_eq!(res.cols, vec![Col::named("a")]);
}

#[tokio::test]
async fn local_batch_commits_atomically() {
    let (client, state) = toy_client();

    let results = client
        .batch(
            vec!["INSERT 1".into(), "INSERT 2".into()],
            TransactionMode::Write,
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(state.lock().rows, vec![1, 2]);
    assert!(state.lock().tx.is_none());
}

#[tokio::test]
async fn local_batch_failure_rolls_back() {
    let (client, state) = toy_client();
    client.execute("INSERT 1").await.unwrap();

    let err = client
        .batch(
            vec!["INSERT 2".into(), "BOOM".into(), "INSERT 3".into()],
            TransactionMode::Write,
        )
        .await
        .unwrap_err();

    // Chain layout matches the network backend: begin is step 0.
    assert!(matches!(err, ClientError::BatchAborted { step: 2, .. }));
    assert_eq!(err.code(), Some("SQLITE_ERROR"));

    // Pre-batch state is intact.
    assert_eq!(state.lock().rows, vec![1]);
    assert!(state.lock().tx.is_none());
}

#[tokio::test]
async fn local_transaction_lifecycle() {
    let (client, state) = toy_client();

    let mut tx = client.transaction(TransactionMode::Write).await.unwrap();
    tx.execute("INSERT 1").await.unwrap();
    tx.execute("INSERT 2").await.unwrap();

    // Uncommitted work is invisible outside the transaction copy.
    assert_eq!(state.lock().rows, Vec::<i64>::new());

    tx.commit().await.unwrap();
    assert_eq!(state.lock().rows, vec![1, 2]);

    let err = tx.execute("INSERT 3").await.unwrap_err();
    assert!(matches!(err, ClientError::TransactionClosed));
    tx.rollback().await.unwrap();
    assert_eq!(state.lock().rows, vec![1, 2]);
}

#[tokio::test]
async fn local_transaction_close_discards_work() {
    let (client, state) = toy_client();

    let mut tx = client.transaction(TransactionMode::Deferred).await.unwrap();
    tx.execute("INSERT 9").await.unwrap();
    tx.close().await;

    assert!(tx.is_closed());
    assert_eq!(state.lock().rows, Vec::<i64>::new());
    assert!(state.lock().tx.is_none());
}

#[tokio::test]
async fn local_close_rejects_operations() {
    let (client, _state) = toy_client();
    client.close();

    let err = client.execute("SELECT").await.unwrap_err();
    assert!(matches!(err, ClientError::ClientClosed));
}
