//! Resumable, tree-structured workflows for identity flows.
//!
//! A workflow is an [`Intent`] (the goal) plus the ordered nodes produced
//! while pursuing it; nodes can be nested workflows, so a signup flow can
//! delegate "verify this email" to its own sub-workflow. The tree advances
//! through [`Workflow::accept`]: edges derived from the current state are
//! tried against one input, and automatic transitions cascade until a real
//! decision point or end of flow.
//!
//! State is persisted as an immutable snapshot per accepted step, keyed by
//! a rotating instance id under a stable workflow id, so any step a client
//! still holds an instance id for can be resumed or branched. Side effects
//! are split into idempotent run effects, replayed whenever a snapshot is
//! reconstructed, and on-commit effects, deferred until [`Service`]
//! finalizes the finished workflow under the single committed savepoint.

pub mod codec;
pub mod database;
pub mod deps;
pub mod edge;
pub mod effect;
pub mod error;
pub mod ids;
pub mod input;
pub mod intent;
pub mod node;
pub mod output;
pub mod registry;
pub mod service;
pub mod session;
pub mod store;
pub mod workflow;

pub use codec::{decode_workflow, encode_workflow, KindData};
pub use database::{Database, MemoryDatabase, Savepoint, SavepointEvent};
pub use deps::{Clock, Dependencies, SystemClock};
pub use edge::{Edge, EdgeOutcome};
pub use effect::{Effect, EffectAction};
pub use error::WorkflowError;
pub use ids::{IdGenerator, RandomIdGenerator};
pub use input::{input_as, Input};
pub use intent::Intent;
pub use node::{Node, NodeSimple};
pub use output::{FlowAction, NodeOutput, ServiceOutput, WorkflowOutput};
pub use registry::{RegisteredInput, RegisteredIntent, RegisteredNode, Registry};
pub use service::Service;
pub use session::{Session, SessionOutput};
pub use store::{MemoryStore, Store};
pub use workflow::{Workflow, Workflows};
