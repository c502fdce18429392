//! Savepoint discipline around an accept cycle.
//!
//! Each logical step runs inside a nested transaction that is always rolled
//! back: the step's database side effects are exploratory until the whole
//! workflow reaches end of flow, at which point a second savepoint wraps
//! the deferred effects and is the only one ever committed. A crash between
//! persisting a new instance and committing therefore leaves the database
//! in the pre-step state, and replaying the instance re-derives the same
//! steps.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::WorkflowError;

#[async_trait]
pub trait Savepoint: Send + Sync {
    async fn commit(self: Box<Self>) -> Result<(), WorkflowError>;
    async fn rollback(self: Box<Self>) -> Result<(), WorkflowError>;
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn begin_savepoint(&self) -> Result<Box<dyn Savepoint>, WorkflowError>;
}

/// Savepoint lifecycle events, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavepointEvent {
    Begin,
    Commit,
    Rollback,
}

/// Database double that only records the savepoint protocol. Useful for
/// tests and for deployments whose effects are all idempotent writes to
/// non-transactional backends.
#[derive(Default)]
pub struct MemoryDatabase {
    events: Arc<Mutex<Vec<SavepointEvent>>>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SavepointEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin_savepoint(&self) -> Result<Box<dyn Savepoint>, WorkflowError> {
        let events = self.events.clone();
        push(&events, SavepointEvent::Begin);
        Ok(Box::new(MemorySavepoint { events }))
    }
}

struct MemorySavepoint {
    events: Arc<Mutex<Vec<SavepointEvent>>>,
}

#[async_trait]
impl Savepoint for MemorySavepoint {
    async fn commit(self: Box<Self>) -> Result<(), WorkflowError> {
        push(&self.events, SavepointEvent::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), WorkflowError> {
        push(&self.events, SavepointEvent::Rollback);
        Ok(())
    }
}

fn push(events: &Mutex<Vec<SavepointEvent>>, event: SavepointEvent) {
    match events.lock() {
        Ok(mut events) => events.push(event),
        Err(poisoned) => poisoned.into_inner().push(event),
    }
}
