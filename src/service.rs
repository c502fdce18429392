//! Orchestration of workflow creation, resumption and input feeding.
//!
//! The service owns the savepoint discipline: every step is trialed under
//! a savepoint that is always rolled back, and only terminal finalization
//! commits one. The workflow instance records themselves live in the store,
//! outside the transaction, so a rolled-back step still leaves a resumable
//! snapshot behind.

use std::sync::Arc;

use tracing::{debug, error};

use crate::database::{Database, Savepoint};
use crate::deps::Dependencies;
use crate::error::WorkflowError;
use crate::input::Input;
use crate::intent::Intent;
use crate::output::{FlowAction, ServiceOutput, WorkflowOutput};
use crate::session::Session;
use crate::store::Store;
use crate::workflow::Workflow;

pub struct Service {
    deps: Arc<Dependencies>,
    store: Arc<dyn Store>,
    database: Arc<dyn Database>,
}

impl Service {
    #[must_use]
    pub fn new(deps: Arc<Dependencies>, store: Arc<dyn Store>, database: Arc<dyn Database>) -> Self {
        Self {
            deps,
            store,
            database,
        }
    }

    /// Start a new workflow under `intent`, advancing through any
    /// input-independent first edges, and persist it together with its
    /// session. A workflow that is terminal on arrival is finalized
    /// immediately.
    pub async fn create_workflow(
        &self,
        intent: Box<dyn Intent>,
        client_id: &str,
    ) -> Result<ServiceOutput, WorkflowError> {
        let savepoint = self.database.begin_savepoint().await?;
        let result = self.create_inner(intent, client_id).await;
        let (session, workflow, output, finished) = rollback_after(savepoint, result).await?;

        debug!(
            workflow_id = %workflow.workflow_id,
            instance_id = %workflow.instance_id,
            finished,
            "created workflow"
        );

        let action = if finished {
            self.finalize(&workflow).await?;
            FlowAction::Finish
        } else {
            FlowAction::Continue
        };

        Ok(ServiceOutput {
            session: session.to_output(),
            workflow: output,
            action,
        })
    }

    async fn create_inner(
        &self,
        intent: Box<dyn Intent>,
        client_id: &str,
    ) -> Result<(Session, Workflow, WorkflowOutput, bool), WorkflowError> {
        let session = Session::new(self.deps.ids.as_ref(), client_id);
        self.store.create_session(&session).await?;

        let mut workflow = Workflow::new(
            self.deps.ids.as_ref(),
            session.workflow_id.clone(),
            intent,
        );

        // A fresh workflow has no run effects to replay. Feed the empty
        // input so edges that ignore their input advance immediately; not
        // every workflow reacts to it, so no-change is fine here.
        let finished = match workflow.accept(&self.deps, None).await {
            Ok(()) | Err(WorkflowError::NoChange) => false,
            Err(WorkflowError::Eof) => true,
            Err(err) => return Err(err),
        };

        self.store.create_workflow(&workflow).await?;
        let output = workflow.to_output(&self.deps).await?;
        Ok((session, workflow, output, finished))
    }

    /// Load a workflow snapshot for display: replays run effects and
    /// projects the output without accepting any input.
    pub async fn get(
        &self,
        workflow_id: &str,
        instance_id: &str,
    ) -> Result<ServiceOutput, WorkflowError> {
        let savepoint = self.database.begin_savepoint().await?;
        let result = self.get_inner(workflow_id, instance_id).await;
        let (session, output, finished) = rollback_after(savepoint, result).await?;

        Ok(ServiceOutput {
            session: session.to_output(),
            workflow: output,
            action: if finished {
                FlowAction::Finish
            } else {
                FlowAction::Continue
            },
        })
    }

    async fn get_inner(
        &self,
        workflow_id: &str,
        instance_id: &str,
    ) -> Result<(Session, WorkflowOutput, bool), WorkflowError> {
        let workflow = self.load(workflow_id, instance_id).await?;
        let session = self.store.get_session(&workflow.workflow_id).await?;

        workflow.apply_run_effects(&self.deps).await?;
        let output = workflow.to_output(&self.deps).await?;
        let finished = workflow.is_finished(&self.deps).await?;
        Ok((session, output, finished))
    }

    /// Feed one input into an existing workflow instance. On terminal
    /// completion the workflow's deferred effects are applied under a
    /// committed savepoint and the workflow and session are deleted.
    pub async fn feed_input(
        &self,
        workflow_id: &str,
        instance_id: &str,
        input: &dyn Input,
    ) -> Result<ServiceOutput, WorkflowError> {
        let savepoint = self.database.begin_savepoint().await?;
        let result = self.feed_inner(workflow_id, instance_id, input).await;
        let (session, workflow, output, finished) = rollback_after(savepoint, result).await?;

        debug!(
            workflow_id = %workflow.workflow_id,
            instance_id = %workflow.instance_id,
            finished,
            "accepted input"
        );

        let action = if finished {
            self.finalize(&workflow).await?;
            FlowAction::Finish
        } else {
            FlowAction::Continue
        };

        Ok(ServiceOutput {
            session: session.to_output(),
            workflow: output,
            action,
        })
    }

    async fn feed_inner(
        &self,
        workflow_id: &str,
        instance_id: &str,
        input: &dyn Input,
    ) -> Result<(Session, Workflow, WorkflowOutput, bool), WorkflowError> {
        let mut workflow = self.load(workflow_id, instance_id).await?;
        let session = self.store.get_session(&workflow.workflow_id).await?;

        // The tree was reconstructed from storage: rebuild the external
        // state its existing nodes stand for before reacting to anything.
        workflow.apply_run_effects(&self.deps).await?;

        let finished = match workflow.accept(&self.deps, Some(input)).await {
            Ok(()) => false,
            Err(WorkflowError::Eof) => true,
            // NoChange and domain errors propagate; the prior instance
            // stays valid and resumable.
            Err(err) => return Err(err),
        };

        self.store.create_workflow(&workflow).await?;
        let output = workflow.to_output(&self.deps).await?;
        Ok((session, workflow, output, finished))
    }

    async fn load(&self, workflow_id: &str, instance_id: &str) -> Result<Workflow, WorkflowError> {
        let workflow = self.store.get_workflow_by_instance_id(instance_id).await?;
        if workflow.workflow_id != workflow_id {
            return Err(WorkflowError::WorkflowNotFound);
        }
        Ok(workflow)
    }

    /// Apply all effects under the one savepoint that is ever committed,
    /// then delete the workflow and its session.
    async fn finalize(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        let savepoint = self.database.begin_savepoint().await?;
        match workflow.apply_all_effects(&self.deps).await {
            Ok(()) => savepoint.commit().await?,
            Err(cause) => {
                return match savepoint.rollback().await {
                    Ok(()) => Err(cause),
                    Err(rollback_err) => {
                        error!(
                            workflow_id = %workflow.workflow_id,
                            "rollback failed during finalization: {rollback_err}"
                        );
                        Err(WorkflowError::TransactionCleanup {
                            op: "rollback",
                            cause: Box::new(cause),
                            source: Box::new(rollback_err),
                        })
                    }
                };
            }
        }

        self.store.delete_workflow(&workflow.workflow_id).await?;
        self.store.delete_session(&workflow.workflow_id).await?;

        debug!(workflow_id = %workflow.workflow_id, "finalized workflow");
        Ok(())
    }
}

/// Roll the savepoint back no matter how the step went, attaching a
/// rollback failure as a secondary error instead of swallowing either.
async fn rollback_after<T>(
    savepoint: Box<dyn Savepoint>,
    result: Result<T, WorkflowError>,
) -> Result<T, WorkflowError> {
    match savepoint.rollback().await {
        Ok(()) => result,
        Err(rollback_err) => {
            error!("savepoint rollback failed: {rollback_err}");
            match result {
                Ok(_) => Err(rollback_err),
                Err(cause) => Err(WorkflowError::TransactionCleanup {
                    op: "rollback",
                    cause: Box::new(cause),
                    source: Box::new(rollback_err),
                }),
            }
        }
    }
}
