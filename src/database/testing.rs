//! In-memory driver used by unit tests. Records every connect, query and close.

use crate::database::descriptor::ConnectionDescriptor;
use crate::database::result::Row;
use crate::database::traits::{Connector, DatabaseDriver};
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(String),
    Query(String, String),
    Close(String),
}

#[derive(Default)]
struct Shared {
    events: Vec<Event>,
    connect_failures: VecDeque<DatabaseError>,
    query_failures: HashMap<String, DatabaseError>,
    close_failures: HashSet<String>,
    connect_delays: HashMap<String, Duration>,
    query_delay: Option<Duration>,
}

/// Connector whose drivers never touch the network.
#[derive(Clone, Default)]
pub struct MockConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.lock().events.clone()
    }

    pub fn connects(&self) -> usize {
        self.count(|e| matches!(e, Event::Connect(_)))
    }

    pub fn queries(&self) -> usize {
        self.count(|e| matches!(e, Event::Query(..)))
    }

    pub fn closes(&self) -> usize {
        self.count(|e| matches!(e, Event::Close(_)))
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.shared.lock().events.iter().filter(|e| pred(e)).count()
    }

    /// The next connect attempt fails with `error`.
    pub fn fail_next_connect(&self, error: DatabaseError) {
        self.shared.lock().connect_failures.push_back(error);
    }

    /// Every execution of `sql` fails with `error`.
    pub fn fail_query(&self, sql: &str, error: DatabaseError) {
        self.shared
            .lock()
            .query_failures
            .insert(sql.to_string(), error);
    }

    /// Closing the pool for `descriptor` fails.
    pub fn fail_close(&self, descriptor: &ConnectionDescriptor) {
        self.shared
            .lock()
            .close_failures
            .insert(descriptor.canonical_key());
    }

    /// Connecting to `descriptor` takes `delay`.
    pub fn delay_connect(&self, descriptor: &ConnectionDescriptor, delay: Duration) {
        self.shared
            .lock()
            .connect_delays
            .insert(descriptor.canonical_key(), delay);
    }

    pub fn delay_queries(&self, delay: Duration) {
        self.shared.lock().query_delay = Some(delay);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> DbResult<Arc<dyn DatabaseDriver>> {
        let key = descriptor.canonical_key();
        let delay = {
            let mut shared = self.shared.lock();
            shared.events.push(Event::Connect(key.clone()));
            shared.connect_delays.get(&key).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.shared.lock().connect_failures.pop_front() {
            return Err(error);
        }

        Ok(Arc::new(MockDriver {
            key,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockDriver {
    key: String,
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute_query(&self, query: &str) -> DbResult<Vec<Row>> {
        let (failure, delay) = {
            let mut shared = self.shared.lock();
            shared
                .events
                .push(Event::Query(self.key.clone(), query.to_string()));
            (shared.query_failures.get(query).cloned(), shared.query_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = failure {
            return Err(error);
        }

        let mut row = Row::new();
        row.push("id", 1i64);
        row.push("name", "Test");
        Ok(vec![row])
    }

    async fn close(&self) -> DbResult<()> {
        let mut shared = self.shared.lock();
        shared.events.push(Event::Close(self.key.clone()));
        if shared.close_failures.contains(&self.key) {
            return Err(DatabaseError::other("close failed"));
        }
        Ok(())
    }
}
