//! Tree elements: one recorded step of an intent's progress.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::deps::Dependencies;
use crate::edge::Edge;
use crate::effect::Effect;
use crate::error::WorkflowError;
use crate::input::AsAny;
use crate::intent::Intent;
use crate::workflow::{Workflow, Workflows};

/// A leaf business step, polymorphic by kind.
#[async_trait]
pub trait NodeSimple: AsAny + Send + Sync + 'static {
    /// Unique string discriminator, persisted with the node.
    fn kind(&self) -> &'static str;

    /// Serializable state, persisted as the `data` half of `{kind, data}`.
    fn data(&self) -> Result<Value, WorkflowError>;

    /// Candidate transitions out of this step. Signal
    /// [`WorkflowError::Eof`] when the step is terminal for its branch so
    /// the owning intent is consulted instead. Side-effect free.
    async fn derive_edges(
        &self,
        deps: &Dependencies,
        flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError>;

    /// Declared side effects; nodes may declare both run and on-commit
    /// effects.
    async fn effects(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        Ok(Vec::new())
    }

    /// Externally visible output, computed on demand.
    async fn output_data(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Value, WorkflowError> {
        Ok(Value::Null)
    }
}

/// One node in a workflow's ordered history: either a terminal simple step
/// or a nested sub-workflow. Position in the parent's node sequence is
/// significant and never reordered; nodes are appended only, except for the
/// update-node control signal which replaces the last node in place.
pub enum Node {
    Simple(Box<dyn NodeSimple>),
    SubWorkflow(Workflow),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Simple(step) => f.debug_tuple("Simple").field(&step.kind()).finish(),
            Node::SubWorkflow(sub) => f.debug_tuple("SubWorkflow").field(sub).finish(),
        }
    }
}

impl Node {
    pub fn simple(step: impl NodeSimple) -> Self {
        Node::Simple(Box::new(step))
    }

    /// Start a nested workflow under the given intent. The sub-workflow
    /// carries no ids of its own; only the root is keyed in the store.
    pub fn sub_workflow(intent: impl Intent) -> Self {
        Node::SubWorkflow(Workflow::new_sub(Box::new(intent)))
    }
}
