//! Query dispatch.
//!
//! A block of queries runs inside one transaction: write commands share a
//! coalesced batch commit, read commands share one snapshot. A failing query
//! only affects its own status; its siblings still run and the transaction
//! still commits. A transaction that cannot begin or commit fails every
//! query in the block.

use std::sync::Arc;

use bytes::Bytes;
use tabula_proto::response::{count_line, fields_line, status_line};
use tabula_proto::{Command, Query, Status};
use tabula_store::{ReadTx, Store, StoreResult, WriteTxn};
use tabula_tables::{Registry, TableError, TableResult};
use tracing::{debug, warn};

use crate::error::ServerResult;

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Query status.
    pub status: Status,
    /// Lookup results.
    pub fields: Vec<Bytes>,
    /// Count or number of expired records.
    pub count: u64,
}

impl Outcome {
    fn status(status: Status) -> Self {
        Self {
            status,
            fields: Vec::new(),
            count: 0,
        }
    }

    fn from_result<T>(result: TableResult<T>, f: impl FnOnce(T, &mut Self)) -> Self {
        match result {
            Ok(value) => {
                let mut outcome = Self::status(Status::Ok);
                f(value, &mut outcome);
                outcome
            }
            Err(err) => Self::status(status_for(&err)),
        }
    }
}

/// Maps a table error to the status reported to the client.
pub fn status_for(err: &TableError) -> Status {
    if err.is_not_found() {
        Status::NotFound
    } else if err.is_bad_record() {
        Status::Invalid
    } else {
        warn!(error = %err, "query failed");
        Status::Fail
    }
}

/// Formats the response line for one query.
pub fn format_line(command: Command, outcome: &Outcome) -> Vec<u8> {
    match command {
        Command::Lookup => fields_line(&outcome.fields, outcome.status),
        Command::Count => count_line(outcome.count, outcome.status),
        _ => status_line(outcome.status),
    }
}

/// Runs query blocks against the store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<Store>,
    registry: Arc<Registry>,
}

impl Dispatcher {
    /// Creates a dispatcher over `store` with the tables in `registry`.
    pub fn new(store: Arc<Store>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the table registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs a block on the blocking pool and returns one response line per
    /// query, in order.
    pub async fn execute(&self, command: Command, queries: Vec<Query>) -> ServerResult<Vec<Vec<u8>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let dispatcher = self.clone();
        let lines =
            tokio::task::spawn_blocking(move || dispatcher.execute_blocking(command, queries))
                .await?;
        Ok(lines)
    }

    /// Runs a block on the current thread and formats the response lines.
    pub fn execute_blocking(&self, command: Command, queries: Vec<Query>) -> Vec<Vec<u8>> {
        self.run(command, queries)
            .iter()
            .map(|outcome| format_line(command, outcome))
            .collect()
    }

    /// Runs a block and returns one outcome per query, in order.
    pub fn run(&self, command: Command, queries: Vec<Query>) -> Vec<Outcome> {
        let count = queries.len();
        debug!(%command, queries = count, "running block");

        let result = if command.is_write() {
            self.run_write(command, queries)
        } else {
            self.run_read(command, &queries)
        };

        match result {
            Ok(outcomes) => outcomes,
            Err(err) => {
                warn!(%command, queries = count, error = %err, "transaction failed");
                vec![Outcome::status(Status::Fail); count]
            }
        }
    }

    fn run_write(&self, command: Command, queries: Vec<Query>) -> StoreResult<Vec<Outcome>> {
        if !queries.iter().any(|q| self.registry.get(q.table()).is_some()) {
            return Ok(vec![Outcome::status(Status::NoTable); queries.len()]);
        }
        let registry = Arc::clone(&self.registry);
        // The batch may run this closure more than once; each run starts over.
        self.store.batch(move |tx| {
            Ok(queries
                .iter()
                .map(|query| apply_write(&registry, tx, command, query))
                .collect())
        })
    }

    fn run_read(&self, command: Command, queries: &[Query]) -> StoreResult<Vec<Outcome>> {
        self.store.view(|tx| {
            Ok(queries
                .iter()
                .map(|query| apply_read(&self.registry, tx, command, query))
                .collect())
        })
    }
}

fn apply_write(registry: &Registry, tx: &WriteTxn<'_>, command: Command, query: &Query) -> Outcome {
    let Some(table) = registry.get(query.table()) else {
        return Outcome::status(Status::NoTable);
    };
    let record = query.record();
    match command {
        Command::Record => Outcome::from_result(table.insert(tx, record), |(), _| {}),
        Command::Delete => Outcome::from_result(table.delete(tx, record), |(), _| {}),
        Command::Expire => Outcome::from_result(table.expire(tx, record), |n, o| o.count = n),
        _ => apply_read(registry, tx, command, query),
    }
}

fn apply_read(registry: &Registry, tx: &dyn ReadTx, command: Command, query: &Query) -> Outcome {
    let Some(table) = registry.get(query.table()) else {
        return Outcome::status(Status::NoTable);
    };
    let record = query.record();
    match command {
        Command::Lookup => Outcome::from_result(table.lookup(tx, record), |f, o| o.fields = f),
        Command::Count => Outcome::from_result(table.count(tx, record), |n, o| o.count = n),
        _ => Outcome::status(Status::Invalid),
    }
}
