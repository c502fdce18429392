//! Transition rules tried against one input during accept.
//!
//! Edges are ephemeral: derived on demand, never persisted. Derivation must
//! be side-effect free and idempotent because it can run several times per
//! input; anything that touches a collaborator belongs in `instantiate` or
//! in an effect.
//!
//! # Hazard: same-input cascade
//!
//! After an edge produces a node, the engine re-derives edges and feeds the
//! *same* input to them, so one input can advance the tree through any
//! number of automatic transitions. An edge that matches regardless of its
//! input must therefore move the tree strictly toward end of flow or toward
//! a node that genuinely requires new input, otherwise accept never returns.
//! There is no artificial loop bound.

use async_trait::async_trait;

use crate::deps::Dependencies;
use crate::error::WorkflowError;
use crate::input::Input;
use crate::node::Node;
use crate::workflow::Workflows;

/// What a matching edge did with the input.
pub enum EdgeOutcome {
    /// Append this node to the workflow level the edge was derived from and
    /// keep cascading with the same input.
    Node(Node),
    /// The input was consumed purely for a side effect; nothing is
    /// appended, and the accept call stops here reporting a change.
    SameNode,
    /// Replace the last node of the owning workflow level (e.g. "resend
    /// code" regenerating the pending OTP). The replacement's run effects
    /// fire as if it had been appended: in the same accept cycle, not on
    /// the next replay of the tree. Only legal when that level already has
    /// nodes; an edge derived from a fresh intent must never return this.
    UpdateNode(Node),
}

#[async_trait]
pub trait Edge: Send + Sync {
    /// Try to consume `input`. Reject with
    /// [`WorkflowError::IncompatibleInput`] to let the next candidate edge
    /// have a go; any other error aborts the whole accept call unchanged.
    async fn instantiate(
        &self,
        deps: &Dependencies,
        flows: Workflows<'_>,
        input: Option<&dyn Input>,
    ) -> Result<EdgeOutcome, WorkflowError>;
}
