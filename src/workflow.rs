//! The workflow tree and the accept driver.
//!
//! A workflow is an intent plus the ordered history of its nodes; nodes can
//! themselves be nested workflows, recursively. `accept` advances the tree
//! with one input: it finds the innermost level that can still derive
//! edges, tries those edges in order, appends whatever node the matching
//! edge produced, applies the node's run effects, and loops with the same
//! input until a real decision point or end of flow is reached.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::deps::Dependencies;
use crate::edge::{Edge, EdgeOutcome};
use crate::effect::Effect;
use crate::error::WorkflowError;
use crate::ids::IdGenerator;
use crate::input::Input;
use crate::intent::Intent;
use crate::node::{Node, NodeSimple};
use crate::codec::KindData;
use crate::output::{NodeOutput, WorkflowOutput};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Root and nearest views of the tree handed to intents, nodes and edges.
/// `nearest` is the workflow level the callee belongs to.
#[derive(Clone, Copy)]
pub struct Workflows<'a> {
    pub root: &'a Workflow,
    pub nearest: &'a Workflow,
}

pub struct Workflow {
    /// Stable identifier shared with the session; immutable once created.
    pub workflow_id: String,
    /// Optimistic-concurrency marker, regenerated on every successful
    /// accept. Empty for sub-workflows.
    pub instance_id: String,
    pub intent: Box<dyn Intent>,
    pub nodes: Vec<Node>,
}

// Trait objects keep the derive away; kinds are the useful part anyway.
impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("workflow_id", &self.workflow_id)
            .field("instance_id", &self.instance_id)
            .field("intent", &self.intent.kind())
            .field("nodes", &self.nodes)
            .finish()
    }
}

/// An effect collected during traversal, tagged with its origin so the
/// intent-declares-run-effect invariant can be enforced at application time.
struct CollectedEffect {
    effect: Effect,
    owner_kind: &'static str,
    from_intent: bool,
}

impl Workflow {
    /// Root workflow under a freshly generated instance id. A workflow with
    /// zero nodes is fresh for its intent.
    pub fn new(ids: &dyn IdGenerator, workflow_id: impl Into<String>, intent: Box<dyn Intent>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            instance_id: ids.new_instance_id(),
            intent,
            nodes: Vec::new(),
        }
    }

    /// Nested workflow; carries no ids of its own.
    pub(crate) fn new_sub(intent: Box<dyn Intent>) -> Self {
        Self {
            workflow_id: String::new(),
            instance_id: String::new(),
            intent,
            nodes: Vec::new(),
        }
    }

    /// Advance the tree as far as one input allows.
    ///
    /// Returns `Ok(())` when at least one node was appended (or replaced)
    /// and the tree is now waiting for further input,
    /// [`WorkflowError::NoChange`] when the input produced no progress at
    /// all, and [`WorkflowError::Eof`] when the tree reached end of flow —
    /// the latter still counts as a change when steps were taken on the way
    /// there. Any other error aborts the call with the tree semantically
    /// unchanged (no new instance id is worth persisting).
    pub async fn accept(
        &mut self,
        deps: &Dependencies,
        input: Option<&dyn Input>,
    ) -> Result<(), WorkflowError> {
        let mut changed = false;
        let result = self.accept_inner(deps, input, &mut changed).await;
        if changed {
            self.instance_id = deps.ids.new_instance_id();
        }
        match result {
            Ok(()) if !changed => Err(WorkflowError::NoChange),
            other => other,
        }
    }

    async fn accept_inner(
        &mut self,
        deps: &Dependencies,
        input: Option<&dyn Input>,
        changed: &mut bool,
    ) -> Result<(), WorkflowError> {
        loop {
            let (path, edges) = self.derive_edges_located(deps).await?;

            let mut outcome = None;
            {
                let root = &*self;
                let flows = Workflows {
                    root,
                    nearest: root.workflow_at(&path),
                };
                for edge in &edges {
                    match edge.instantiate(deps, flows, input).await {
                        Ok(o) => {
                            outcome = Some(o);
                            break;
                        }
                        Err(WorkflowError::IncompatibleInput) => continue,
                        Err(err) => return Err(err),
                    }
                }
            }

            let Some(outcome) = outcome else {
                // No edge at the current decision point wants this input;
                // the cascade (if any) ends here.
                return Ok(());
            };

            match outcome {
                EdgeOutcome::SameNode => {
                    // The edge would consume this input indefinitely; stop.
                    *changed = true;
                    return Ok(());
                }
                EdgeOutcome::UpdateNode(node) => {
                    *changed = true;
                    {
                        let here = self.workflow_at_mut(&path);
                        match here.nodes.last_mut() {
                            Some(last) => *last = node,
                            None => panic!(
                                "edge returned UpdateNode for intent {} which has no nodes",
                                here.intent.kind()
                            ),
                        }
                    }
                    // The replacement is a fresh node; its run effects fire
                    // now, exactly as if it had been appended.
                    self.apply_last_node_run_effects(&path, deps).await?;
                    return Ok(());
                }
                EdgeOutcome::Node(node) => {
                    self.append_node(&path, node, deps).await?;
                    *changed = true;
                    // Same input, fresh edges: automatic transitions cascade
                    // until a genuine decision point.
                }
            }
        }
    }

    /// Locate the workflow level that can still derive edges, innermost
    /// first: descend along trailing sub-workflow nodes, ask the innermost
    /// last node, then fall back outward through the owning intents. All
    /// levels signalling end of branch means the whole tree is at end of
    /// flow.
    async fn derive_edges_located(
        &self,
        deps: &Dependencies,
    ) -> Result<(Vec<usize>, Vec<Box<dyn Edge>>), WorkflowError> {
        let mut chain: Vec<(Vec<usize>, &Workflow)> = Vec::new();
        let mut path = Vec::new();
        let mut current = self;
        chain.push((path.clone(), current));
        while let Some(Node::SubWorkflow(sub)) = current.nodes.last() {
            path.push(current.nodes.len() - 1);
            current = sub;
            chain.push((path.clone(), current));
        }

        for (depth, (level_path, level)) in chain.iter().enumerate().rev() {
            let innermost = depth == chain.len() - 1;
            let flows = Workflows {
                root: self,
                nearest: level,
            };

            if innermost {
                if let Some(Node::Simple(step)) = level.nodes.last() {
                    match step.derive_edges(deps, flows).await {
                        Ok(edges) => {
                            if edges.is_empty() {
                                panic!(
                                    "node {} derived zero edges without signalling end of flow",
                                    step.kind()
                                );
                            }
                            return Ok((level_path.clone(), edges));
                        }
                        Err(WorkflowError::Eof) => {}
                        Err(err) => return Err(err),
                    }
                }
            }

            match level.intent.derive_edges(deps, flows).await {
                Ok(edges) => {
                    if edges.is_empty() {
                        panic!(
                            "intent {} derived zero edges without signalling end of flow",
                            level.intent.kind()
                        );
                    }
                    return Ok((level_path.clone(), edges));
                }
                Err(WorkflowError::Eof) => {}
                Err(err) => return Err(err),
            }
        }

        Err(WorkflowError::Eof)
    }

    /// Whether the whole tree is at end of flow.
    pub async fn is_finished(&self, deps: &Dependencies) -> Result<bool, WorkflowError> {
        match self.derive_edges_located(deps).await {
            Ok(_) => Ok(false),
            Err(WorkflowError::Eof) => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// Append a node at the given level and immediately apply its run
    /// effects, depth-first for sub-workflow nodes.
    async fn append_node(
        &mut self,
        path: &[usize],
        node: Node,
        deps: &Dependencies,
    ) -> Result<(), WorkflowError> {
        self.workflow_at_mut(path).nodes.push(node);
        self.apply_last_node_run_effects(path, deps).await
    }

    async fn apply_last_node_run_effects(
        &self,
        path: &[usize],
        deps: &Dependencies,
    ) -> Result<(), WorkflowError> {
        let here = self.workflow_at(path);
        let Some(node) = here.nodes.last() else {
            unreachable!("caller just appended or replaced a node");
        };

        let mut collected = Vec::new();
        collect_node_effects(self, here, node, deps, &mut collected).await?;
        for entry in &collected {
            if let Effect::Run(action) = &entry.effect {
                action.apply(deps).await?;
            }
        }
        Ok(())
    }

    /// Re-apply the run effects of every existing node, in node order.
    ///
    /// Needed before reacting to fresh input: the in-memory tree is
    /// reconstructed from storage on every call, so external state derived
    /// from run effects has to be rebuilt. Run effects must therefore be
    /// idempotent. Panics if an intent declared a run effect.
    pub async fn apply_run_effects(&self, deps: &Dependencies) -> Result<(), WorkflowError> {
        let mut collected = Vec::new();
        collect_workflow_effects(self, self, deps, &mut collected).await?;
        for entry in &collected {
            match &entry.effect {
                Effect::Run(_) if entry.from_intent => panic!(
                    "intent {} declared a run effect, which is disallowed",
                    entry.owner_kind
                ),
                Effect::Run(action) => action.apply(deps).await?,
                Effect::OnCommit(_) => {}
            }
        }
        Ok(())
    }

    /// Apply every effect of the tree: all run effects in node order, then
    /// all on-commit effects in post-order — a workflow's nodes (depth
    /// first, left to right) before its own intent. Called exactly once,
    /// when the workflow is finalized at end of flow.
    pub async fn apply_all_effects(&self, deps: &Dependencies) -> Result<(), WorkflowError> {
        self.apply_run_effects(deps).await?;

        let mut collected = Vec::new();
        collect_workflow_effects(self, self, deps, &mut collected).await?;
        for entry in &collected {
            if let Effect::OnCommit(action) = &entry.effect {
                action.apply(deps).await?;
            }
        }
        Ok(())
    }

    /// Read-only projection of the tree: `{kind, data}` per intent and node
    /// with `data` computed on demand. The only shape exposed across the
    /// engine boundary.
    pub async fn to_output(&self, deps: &Dependencies) -> Result<WorkflowOutput, WorkflowError> {
        output_of(self, self, deps).await
    }

    /// First direct simple node of concrete type `T`, if any.
    #[must_use]
    pub fn find_node<T: NodeSimple>(&self) -> Option<&T> {
        self.nodes.iter().find_map(|node| match node {
            Node::Simple(step) => step.as_any().downcast_ref::<T>(),
            Node::SubWorkflow(_) => None,
        })
    }

    /// Direct sub-workflows whose intent is of concrete type `T`.
    #[must_use]
    pub fn find_sub_workflows<T: Intent>(&self) -> Vec<&Workflow> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::SubWorkflow(sub) if sub.intent.as_any().is::<T>() => Some(sub),
                _ => None,
            })
            .collect()
    }

    fn workflow_at(&self, path: &[usize]) -> &Workflow {
        let mut current = self;
        for &index in path {
            match &current.nodes[index] {
                Node::SubWorkflow(sub) => current = sub,
                Node::Simple(step) => panic!(
                    "workflow path addresses simple node {} as a sub-workflow",
                    step.kind()
                ),
            }
        }
        current
    }

    fn workflow_at_mut(&mut self, path: &[usize]) -> &mut Workflow {
        let mut current = self;
        for &index in path {
            match &mut current.nodes[index] {
                Node::SubWorkflow(sub) => current = sub,
                Node::Simple(step) => panic!(
                    "workflow path addresses simple node {} as a sub-workflow",
                    step.kind()
                ),
            }
        }
        current
    }
}

/// Collect the effects of one node, recursing depth-first through
/// sub-workflow nodes. Intents are not visited: this is the append-time
/// traversal, and intents cannot contribute run effects.
fn collect_node_effects<'a>(
    root: &'a Workflow,
    owner: &'a Workflow,
    node: &'a Node,
    deps: &'a Dependencies,
    out: &'a mut Vec<CollectedEffect>,
) -> BoxFuture<'a, Result<(), WorkflowError>> {
    Box::pin(async move {
        match node {
            Node::Simple(step) => {
                let flows = Workflows {
                    root,
                    nearest: owner,
                };
                for effect in step.effects(deps, flows).await? {
                    out.push(CollectedEffect {
                        effect,
                        owner_kind: step.kind(),
                        from_intent: false,
                    });
                }
            }
            Node::SubWorkflow(sub) => {
                for child in &sub.nodes {
                    collect_node_effects(root, sub, child, deps, &mut *out).await?;
                }
            }
        }
        Ok(())
    })
}

/// Collect every effect of a workflow in traversal order: nodes first
/// (depth-first, left to right), then the owning intent. Gives commit
/// effects their children-before-intent ordering for free.
fn collect_workflow_effects<'a>(
    root: &'a Workflow,
    workflow: &'a Workflow,
    deps: &'a Dependencies,
    out: &'a mut Vec<CollectedEffect>,
) -> BoxFuture<'a, Result<(), WorkflowError>> {
    Box::pin(async move {
        for node in &workflow.nodes {
            match node {
                Node::Simple(step) => {
                    let flows = Workflows {
                        root,
                        nearest: workflow,
                    };
                    for effect in step.effects(deps, flows).await? {
                        out.push(CollectedEffect {
                            effect,
                            owner_kind: step.kind(),
                            from_intent: false,
                        });
                    }
                }
                Node::SubWorkflow(sub) => {
                    collect_workflow_effects(root, sub, deps, &mut *out).await?;
                }
            }
        }

        let flows = Workflows {
            root,
            nearest: workflow,
        };
        for effect in workflow.intent.effects(deps, flows).await? {
            out.push(CollectedEffect {
                effect,
                owner_kind: workflow.intent.kind(),
                from_intent: true,
            });
        }
        Ok(())
    })
}

fn output_of<'a>(
    root: &'a Workflow,
    workflow: &'a Workflow,
    deps: &'a Dependencies,
) -> BoxFuture<'a, Result<WorkflowOutput, WorkflowError>> {
    Box::pin(async move {
        let flows = Workflows {
            root,
            nearest: workflow,
        };

        let intent = KindData {
            kind: workflow.intent.kind().to_string(),
            data: workflow.intent.output_data(deps, flows).await?,
        };

        let mut nodes = Vec::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            match node {
                Node::Simple(step) => nodes.push(NodeOutput::Simple {
                    simple: KindData {
                        kind: step.kind().to_string(),
                        data: step.output_data(deps, flows).await?,
                    },
                }),
                Node::SubWorkflow(sub) => nodes.push(NodeOutput::SubWorkflow {
                    workflow: Box::new(output_of(root, sub, deps).await?),
                }),
            }
        }

        Ok(WorkflowOutput {
            workflow_id: workflow.workflow_id.clone(),
            instance_id: workflow.instance_id.clone(),
            intent,
            nodes,
        })
    })
}
