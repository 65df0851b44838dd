//! Server-side SQL text cache.
//!
//! Maps literal SQL text to stored-SQL handles for one connection, so
//! repeated statements are not re-uploaded. Eviction is least-recently-used
//! with one exception: a handle already chosen for the call being assembled
//! is pinned and stops eviction, and the statement that could not be cached
//! falls back to literal text. Correctness never depends on a hit.

use lru::LruCache;
use sqlpipe_protocol::{BatchStep, Sql, SqlId, SqlStore, Stmt};
use std::collections::HashSet;

/// An LRU map from SQL text to server handles, scoped to one connection.
pub struct SqlTextCache {
    capacity: usize,
    entries: LruCache<String, SqlId>,
}

impl SqlTextCache {
    /// Creates a cache holding at most `capacity` entries. Capacity 0
    /// disables caching: every statement passes through as literal text.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: LruCache::unbounded(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites literal SQL to stored handles across a set of statements,
    /// uploading on miss. All statements share one pin set: a handle used
    /// by any statement of this call is not evicted by a later one.
    pub fn apply(&mut self, store: &dyn SqlStore, stmts: &mut [Stmt]) {
        if self.capacity == 0 {
            return;
        }
        let mut used = HashSet::new();
        for stmt in stmts.iter_mut() {
            self.apply_one(store, &mut stmt.sql, &mut used);
        }
    }

    /// [`apply`](Self::apply) over the statements of a step chain.
    pub fn apply_steps(&mut self, store: &dyn SqlStore, steps: &mut [BatchStep]) {
        if self.capacity == 0 {
            return;
        }
        let mut used = HashSet::new();
        for step in steps.iter_mut() {
            self.apply_one(store, &mut step.stmt.sql, &mut used);
        }
    }

    /// Single-SQL variant used for describe and sequence requests.
    pub fn apply_sql(&mut self, store: &dyn SqlStore, sql: &mut Sql) {
        if self.capacity == 0 {
            return;
        }
        let mut used = HashSet::new();
        self.apply_one(store, sql, &mut used);
    }

    fn apply_one(&mut self, store: &dyn SqlStore, sql: &mut Sql, used: &mut HashSet<SqlId>) {
        let text = match sql {
            Sql::Text { sql } => sql.clone(),
            // Already a handle; the caller manages its lifetime.
            Sql::Stored { .. } => return,
        };

        if let Some(&id) = self.entries.get(&text) {
            *sql = Sql::Stored { sql_id: id };
            used.insert(id);
            return;
        }

        while self.entries.len() + 1 > self.capacity {
            let pinned = match self.entries.peek_lru() {
                Some((_, id)) => used.contains(id),
                None => break,
            };
            if pinned {
                // Evicting would break a statement already chosen for this
                // call; this statement stays literal instead.
                break;
            }
            if let Some((_, id)) = self.entries.pop_lru() {
                store.close_sql(id);
            }
        }

        if self.entries.len() < self.capacity {
            let id = store.store_sql(&text);
            self.entries.put(text, id);
            *sql = Sql::Stored { sql_id: id };
            used.insert(id);
        }
    }
}
