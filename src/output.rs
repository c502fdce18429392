//! Read-only output projection of a workflow.
//!
//! Mirrors the shape of the tree but replaces each intent and node with
//! `{kind, data}` where `data` is computed on demand and may differ from
//! the persisted state (masked values, computed candidate lists).

use serde::Serialize;

use crate::codec::KindData;
use crate::session::SessionOutput;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workflow_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    pub intent: KindData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeOutput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum NodeOutput {
    #[serde(rename = "SIMPLE")]
    Simple { simple: KindData },
    #[serde(rename = "SUB_WORKFLOW")]
    SubWorkflow { workflow: Box<WorkflowOutput> },
}

/// What the caller should do with the workflow next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    /// Keep feeding input against the returned instance id.
    Continue,
    /// The workflow finished and was finalized; stop issuing input.
    Finish,
}

/// Everything a service call exposes across the engine boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceOutput {
    pub session: SessionOutput,
    pub workflow: WorkflowOutput,
    pub action: FlowAction,
}
