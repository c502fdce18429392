//! Durable persistence of workflows and sessions.
//!
//! Workflow documents are keyed twice: by the rotating instance id (one
//! record per accepted step) and by the stable workflow id (a liveness
//! key). Deleting the workflow id key is enough to make every
//! instance-keyed snapshot logically not-found; the snapshots themselves
//! are bounded garbage reclaimed by TTL. An expired or missing record is
//! reported as not-found — callers cannot tell the difference, on purpose.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::Value;

use crate::codec::{decode_workflow, encode_workflow};
use crate::deps::Clock;
use crate::error::WorkflowError;
use crate::registry::Registry;
use crate::session::Session;
use crate::workflow::Workflow;

#[async_trait]
pub trait Store: Send + Sync {
    /// Persist one instance snapshot and refresh the workflow's liveness.
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), WorkflowError>;
    async fn get_workflow_by_instance_id(&self, instance_id: &str)
        -> Result<Workflow, WorkflowError>;
    /// Drop the liveness key; instance snapshots become not-found at once
    /// and are reclaimed lazily by TTL.
    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError>;

    async fn create_session(&self, session: &Session) -> Result<(), WorkflowError>;
    async fn get_session(&self, workflow_id: &str) -> Result<Session, WorkflowError>;
    async fn delete_session(&self, workflow_id: &str) -> Result<(), WorkflowError>;
}

struct Expiring<T> {
    expires_at: SystemTime,
    value: T,
}

impl<T> Expiring<T> {
    fn live(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Records {
    /// workflow_id -> liveness (the value is the expiry itself).
    workflows: HashMap<String, Expiring<()>>,
    /// instance_id -> encoded workflow document.
    instances: HashMap<String, Expiring<Value>>,
    /// workflow_id -> session.
    sessions: HashMap<String, Expiring<Session>>,
}

impl Records {
    /// Reclaim expired entries. Called on every write so the maps stay
    /// bounded by the set of records still inside their TTL.
    fn sweep(&mut self, now: SystemTime) {
        self.workflows.retain(|_, record| record.live(now));
        self.instances.retain(|_, record| record.live(now));
        self.sessions.retain(|_, record| record.live(now));
    }
}

/// In-memory store for tests and single-process deployments.
pub struct MemoryStore {
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    records: RwLock<Records>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(registry: Arc<Registry>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            registry,
            clock,
            ttl,
            records: RwLock::new(Records::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Records>, WorkflowError> {
        self.records
            .read()
            .map_err(|err| WorkflowError::Storage(err.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Records>, WorkflowError> {
        self.records
            .write()
            .map_err(|err| WorkflowError::Storage(err.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        let doc = encode_workflow(workflow)?;
        let now = self.clock.now();
        let expires_at = now + self.ttl;

        let mut records = self.write()?;
        records.sweep(now);
        records.instances.insert(
            workflow.instance_id.clone(),
            Expiring {
                expires_at,
                value: doc,
            },
        );
        records.workflows.insert(
            workflow.workflow_id.clone(),
            Expiring {
                expires_at,
                value: (),
            },
        );
        Ok(())
    }

    async fn get_workflow_by_instance_id(
        &self,
        instance_id: &str,
    ) -> Result<Workflow, WorkflowError> {
        let now = self.clock.now();
        let doc = {
            let records = self.read()?;
            let instance = records
                .instances
                .get(instance_id)
                .filter(|record| record.live(now))
                .ok_or(WorkflowError::WorkflowNotFound)?;

            let workflow = decode_workflow(&self.registry, instance.value.clone())?;

            // The instance snapshot only counts while its workflow id key
            // is still live.
            let live = records
                .workflows
                .get(&workflow.workflow_id)
                .is_some_and(|record| record.live(now));
            if !live {
                return Err(WorkflowError::WorkflowNotFound);
            }
            workflow
        };
        Ok(doc)
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        let mut records = self.write()?;
        records.workflows.remove(workflow_id);
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<(), WorkflowError> {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let mut records = self.write()?;
        records.sweep(now);
        records.sessions.insert(
            session.workflow_id.clone(),
            Expiring {
                expires_at,
                value: session.clone(),
            },
        );
        Ok(())
    }

    async fn get_session(&self, workflow_id: &str) -> Result<Session, WorkflowError> {
        let now = self.clock.now();
        let records = self.read()?;
        records
            .sessions
            .get(workflow_id)
            .filter(|record| record.live(now))
            .map(|record| record.value.clone())
            .ok_or(WorkflowError::SessionNotFound)
    }

    async fn delete_session(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        let mut records = self.write()?;
        records.sessions.remove(workflow_id);
        Ok(())
    }
}
