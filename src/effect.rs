//! Deferred side effects declared by intents and nodes.
//!
//! A run effect fires the moment its node is appended and again on every
//! replay of the tree, so it must be idempotent against external state
//! (create-if-absent, not create). An on-commit effect fires exactly once,
//! when the whole workflow is finalized at end of flow. Only nodes may
//! declare run effects; an intent declaring one is a wiring bug and panics
//! during effect application.

use async_trait::async_trait;

use crate::deps::Dependencies;
use crate::error::WorkflowError;

#[async_trait]
pub trait EffectAction: Send + Sync {
    async fn apply(&self, deps: &Dependencies) -> Result<(), WorkflowError>;
}

pub enum Effect {
    /// Applied immediately after the owning node is appended, and on every
    /// replay of the persisted tree.
    Run(Box<dyn EffectAction>),
    /// Applied once, when the workflow reaches end of flow and is being
    /// finalized under a committed savepoint.
    OnCommit(Box<dyn EffectAction>),
}

impl Effect {
    pub fn run(action: impl EffectAction + 'static) -> Self {
        Effect::Run(Box::new(action))
    }

    pub fn on_commit(action: impl EffectAction + 'static) -> Self {
        Effect::OnCommit(Box::new(action))
    }
}
