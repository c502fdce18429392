//! Intents: the business-logic unit attached to one workflow.

use async_trait::async_trait;
use serde_json::Value;

use crate::deps::Dependencies;
use crate::edge::Edge;
use crate::effect::Effect;
use crate::error::WorkflowError;
use crate::input::AsAny;
use crate::workflow::Workflows;

/// Polymorphic business-logic unit owning a workflow's next-step decision
/// and its declared side effects.
///
/// An intent holds whatever serializable state it needs (pending user id,
/// login id). It decides what can happen next by deriving candidate edges
/// from the current progress of its workflow, and signals
/// [`WorkflowError::Eof`] once its branch is complete.
#[async_trait]
pub trait Intent: AsAny + Send + Sync + 'static {
    /// Unique string discriminator, stable across releases: it is written
    /// into every persisted workflow document.
    fn kind(&self) -> &'static str;

    /// Serializable state, persisted as the `data` half of `{kind, data}`.
    fn data(&self) -> Result<Value, WorkflowError>;

    /// Candidate transitions given current progress. Must be side-effect
    /// free and idempotent; it can be called several times per input.
    /// Returning an empty vector without signalling end of flow is a wiring
    /// bug and panics in the accept driver.
    async fn derive_edges(
        &self,
        deps: &Dependencies,
        flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError>;

    /// Declared side effects. Intents may declare on-commit effects only;
    /// a run effect here panics during effect application.
    async fn effects(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        Ok(Vec::new())
    }

    /// Externally visible output, computed on demand. May differ from the
    /// persisted state (masked values, candidate lists).
    async fn output_data(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Value, WorkflowError> {
        Ok(Value::Null)
    }
}
