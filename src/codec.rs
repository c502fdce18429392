//! Persisted document shape and the polymorphic (de)serializer.
//!
//! A workflow document is
//! `{workflow_id, instance_id, intent: {kind, data}, nodes: [...]}` where a
//! node is either `{type: "SIMPLE", simple: {kind, data}}` or
//! `{type: "SUB_WORKFLOW", workflow: <recursive>}`. Sub-workflows recurse
//! structurally; no kind wrapper is needed because the inner workflow
//! carries its own intent kind. Decoding resolves every kind through the
//! registry to reconstruct the exact concrete types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;
use crate::node::Node;
use crate::registry::Registry;
use crate::workflow::Workflow;

/// A `{kind, data}` pair: the persisted (or projected) form of any
/// polymorphic element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindData {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Serialize, Deserialize)]
struct WorkflowDoc {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    workflow_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    instance_id: String,
    intent: KindData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<NodeDoc>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum NodeDoc {
    #[serde(rename = "SIMPLE")]
    Simple { simple: KindData },
    #[serde(rename = "SUB_WORKFLOW")]
    SubWorkflow { workflow: Box<WorkflowDoc> },
}

/// Serialize a workflow tree into its generic document form.
pub fn encode_workflow(workflow: &Workflow) -> Result<Value, WorkflowError> {
    let doc = doc_of(workflow)?;
    Ok(serde_json::to_value(doc)?)
}

/// Reconstruct a workflow tree from its document form, resolving every
/// kind through the registry.
pub fn decode_workflow(registry: &Registry, value: Value) -> Result<Workflow, WorkflowError> {
    let doc: WorkflowDoc = serde_json::from_value(value)?;
    workflow_of(registry, doc)
}

fn doc_of(workflow: &Workflow) -> Result<WorkflowDoc, WorkflowError> {
    let mut nodes = Vec::with_capacity(workflow.nodes.len());
    for node in &workflow.nodes {
        nodes.push(match node {
            Node::Simple(step) => NodeDoc::Simple {
                simple: KindData {
                    kind: step.kind().to_string(),
                    data: step.data()?,
                },
            },
            Node::SubWorkflow(sub) => NodeDoc::SubWorkflow {
                workflow: Box::new(doc_of(sub)?),
            },
        });
    }

    Ok(WorkflowDoc {
        workflow_id: workflow.workflow_id.clone(),
        instance_id: workflow.instance_id.clone(),
        intent: KindData {
            kind: workflow.intent.kind().to_string(),
            data: workflow.intent.data()?,
        },
        nodes,
    })
}

fn workflow_of(registry: &Registry, doc: WorkflowDoc) -> Result<Workflow, WorkflowError> {
    let intent = registry.decode_intent(&doc.intent.kind, doc.intent.data)?;

    let mut nodes = Vec::with_capacity(doc.nodes.len());
    for node in doc.nodes {
        nodes.push(match node {
            NodeDoc::Simple { simple } => {
                Node::Simple(registry.decode_node(&simple.kind, simple.data)?)
            }
            NodeDoc::SubWorkflow { workflow } => {
                Node::SubWorkflow(workflow_of(registry, *workflow)?)
            }
        });
    }

    Ok(Workflow {
        workflow_id: doc.workflow_id,
        instance_id: doc.instance_id,
        intent,
        nodes,
    })
}
