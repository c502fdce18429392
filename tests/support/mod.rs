//! A simplified signup flow used across the integration tests.
//!
//! The root intent collects a login id, delegates OTP verification to a
//! sub-workflow, then creates the user. All collaborators (OTP issuing,
//! user storage) live behind [`SignupWorld`], registered as a dependency
//! extension.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use fluo::{
    input_as, Dependencies, Edge, EdgeOutcome, Effect, EffectAction, IdGenerator, Input, Intent,
    Node, NodeSimple, RandomIdGenerator, RegisteredInput, RegisteredIntent, RegisteredNode,
    Registry, SystemClock, WorkflowError, Workflows,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid otp")]
pub struct InvalidOtp;

/// Fake collaborators shared by edges and effects. OTP issuance counts
/// every call; the sent map is keyed by login id so re-recording the same
/// node's OTP on replay is a no-op.
#[derive(Default)]
pub struct SignupWorld {
    state: Mutex<WorldState>,
}

#[derive(Default)]
struct WorldState {
    otps_issued: u32,
    otps_sent: BTreeMap<String, String>,
    users: BTreeSet<String>,
    verified: BTreeSet<String>,
}

impl SignupWorld {
    fn state(&self) -> MutexGuard<'_, WorldState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn issue_otp(&self) -> String {
        let mut state = self.state();
        state.otps_issued += 1;
        format!("otp-{}", state.otps_issued)
    }

    pub fn otps_issued(&self) -> u32 {
        self.state().otps_issued
    }

    pub fn record_otp_sent(&self, login_id: &str, otp: &str) {
        self.state()
            .otps_sent
            .insert(login_id.to_string(), otp.to_string());
    }

    pub fn otp_sent_to(&self, login_id: &str) -> Option<String> {
        self.state().otps_sent.get(login_id).cloned()
    }

    pub fn ensure_user(&self, user_id: &str) {
        self.state().users.insert(user_id.to_string());
    }

    pub fn users(&self) -> Vec<String> {
        self.state().users.iter().cloned().collect()
    }

    pub fn mark_verified(&self, login_id: &str) {
        self.state().verified.insert(login_id.to_string());
    }

    pub fn verified(&self) -> Vec<String> {
        self.state().verified.iter().cloned().collect()
    }
}

fn world(deps: &Dependencies) -> Arc<SignupWorld> {
    deps.get::<SignupWorld>()
        .expect("SignupWorld registered in test dependencies")
}

// Inputs

#[derive(Deserialize)]
pub struct InputLoginId {
    pub login_id: String,
}

impl Input for InputLoginId {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

impl RegisteredInput for InputLoginId {
    const KIND: &'static str = "take_login_id";
}

#[derive(Deserialize)]
pub struct InputOtp {
    pub otp: String,
}

impl Input for InputOtp {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

impl RegisteredInput for InputOtp {
    const KIND: &'static str = "take_otp";
}

#[derive(Deserialize)]
pub struct InputResendOtp;

impl Input for InputResendOtp {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

impl RegisteredInput for InputResendOtp {
    const KIND: &'static str = "resend_otp";
}

// Root intent: take a login id, verify it in a sub-workflow, create the
// user.

#[derive(Serialize, Deserialize)]
pub struct IntentSignup;

#[async_trait]
impl Intent for IntentSignup {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn data(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }

    async fn derive_edges(
        &self,
        _deps: &Dependencies,
        flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError> {
        match flows.nearest.nodes.len() {
            0 => Ok(vec![Box::new(EdgeTakeLoginId)]),
            1 => {
                let login_id = flows
                    .nearest
                    .find_sub_workflows::<IntentAddLoginId>()
                    .first()
                    .and_then(|sub| sub.intent.as_any().downcast_ref::<IntentAddLoginId>())
                    .map(|intent| intent.login_id.clone())
                    .ok_or(WorkflowError::Eof)?;
                Ok(vec![Box::new(EdgeCreateUser { login_id })])
            }
            _ => Err(WorkflowError::Eof),
        }
    }

    async fn effects(
        &self,
        _deps: &Dependencies,
        flows: Workflows<'_>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        let verified = flows
            .nearest
            .find_sub_workflows::<IntentAddLoginId>()
            .first()
            .and_then(|sub| sub.find_node::<NodeLoginIdVerified>())
            .map(|node| node.login_id.clone());
        match verified {
            Some(login_id) => Ok(vec![Effect::on_commit(MarkVerified { login_id })]),
            None => Ok(Vec::new()),
        }
    }
}

impl RegisteredIntent for IntentSignup {
    const KIND: &'static str = "signup";
}

// Sub-workflow intent: send an OTP to the login id and wait for it back.

#[derive(Serialize, Deserialize)]
pub struct IntentAddLoginId {
    pub login_id: String,
}

#[async_trait]
impl Intent for IntentAddLoginId {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn data(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }

    async fn derive_edges(
        &self,
        _deps: &Dependencies,
        flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError> {
        if flows.nearest.nodes.is_empty() {
            Ok(vec![Box::new(EdgeSendOtp {
                login_id: self.login_id.clone(),
            })])
        } else {
            Err(WorkflowError::Eof)
        }
    }
}

impl RegisteredIntent for IntentAddLoginId {
    const KIND: &'static str = "add_login_id";
}

// Nodes

#[derive(Serialize, Deserialize)]
pub struct NodeVerifyLoginId {
    pub login_id: String,
    pub otp: String,
}

#[async_trait]
impl NodeSimple for NodeVerifyLoginId {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn data(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }

    async fn derive_edges(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError> {
        Ok(vec![
            Box::new(EdgeCheckOtp {
                login_id: self.login_id.clone(),
                expected: self.otp.clone(),
            }),
            Box::new(EdgeResendOtp {
                login_id: self.login_id.clone(),
            }),
        ])
    }

    async fn effects(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        Ok(vec![Effect::run(SendOtp {
            login_id: self.login_id.clone(),
            otp: self.otp.clone(),
        })])
    }

    async fn output_data(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Value, WorkflowError> {
        // The pending OTP never crosses the engine boundary.
        Ok(json!({ "login_id": self.login_id, "otp_sent": true }))
    }
}

impl RegisteredNode for NodeVerifyLoginId {
    const KIND: &'static str = "verify_login_id";
}

#[derive(Serialize, Deserialize)]
pub struct NodeLoginIdVerified {
    pub login_id: String,
}

#[async_trait]
impl NodeSimple for NodeLoginIdVerified {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn data(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }

    async fn derive_edges(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError> {
        Err(WorkflowError::Eof)
    }
}

impl RegisteredNode for NodeLoginIdVerified {
    const KIND: &'static str = "login_id_verified";
}

#[derive(Serialize, Deserialize)]
pub struct NodeUserCreated {
    pub user_id: String,
}

#[async_trait]
impl NodeSimple for NodeUserCreated {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn data(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }

    async fn derive_edges(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Box<dyn Edge>>, WorkflowError> {
        Err(WorkflowError::Eof)
    }

    async fn effects(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        Ok(vec![Effect::run(EnsureUser {
            user_id: self.user_id.clone(),
        })])
    }
}

impl RegisteredNode for NodeUserCreated {
    const KIND: &'static str = "user_created";
}

// Edges

struct EdgeTakeLoginId;

#[async_trait]
impl Edge for EdgeTakeLoginId {
    async fn instantiate(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
        input: Option<&dyn Input>,
    ) -> Result<EdgeOutcome, WorkflowError> {
        let input = input_as::<InputLoginId>(input).ok_or(WorkflowError::IncompatibleInput)?;
        Ok(EdgeOutcome::Node(Node::sub_workflow(IntentAddLoginId {
            login_id: input.login_id.clone(),
        })))
    }
}

/// Matches any input: sending the OTP is an automatic transition taken as
/// part of the same accept cycle that collected the login id.
struct EdgeSendOtp {
    login_id: String,
}

#[async_trait]
impl Edge for EdgeSendOtp {
    async fn instantiate(
        &self,
        deps: &Dependencies,
        _flows: Workflows<'_>,
        _input: Option<&dyn Input>,
    ) -> Result<EdgeOutcome, WorkflowError> {
        let otp = world(deps).issue_otp();
        Ok(EdgeOutcome::Node(Node::simple(NodeVerifyLoginId {
            login_id: self.login_id.clone(),
            otp,
        })))
    }
}

struct EdgeCheckOtp {
    login_id: String,
    expected: String,
}

#[async_trait]
impl Edge for EdgeCheckOtp {
    async fn instantiate(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
        input: Option<&dyn Input>,
    ) -> Result<EdgeOutcome, WorkflowError> {
        let input = input_as::<InputOtp>(input).ok_or(WorkflowError::IncompatibleInput)?;
        if input.otp != self.expected {
            return Err(WorkflowError::domain(InvalidOtp));
        }
        Ok(EdgeOutcome::Node(Node::simple(NodeLoginIdVerified {
            login_id: self.login_id.clone(),
        })))
    }
}

struct EdgeResendOtp {
    login_id: String,
}

#[async_trait]
impl Edge for EdgeResendOtp {
    async fn instantiate(
        &self,
        deps: &Dependencies,
        _flows: Workflows<'_>,
        input: Option<&dyn Input>,
    ) -> Result<EdgeOutcome, WorkflowError> {
        input_as::<InputResendOtp>(input).ok_or(WorkflowError::IncompatibleInput)?;
        let otp = world(deps).issue_otp();
        Ok(EdgeOutcome::UpdateNode(Node::simple(NodeVerifyLoginId {
            login_id: self.login_id.clone(),
            otp,
        })))
    }
}

/// Matches any input: once the login id is verified, user creation follows
/// automatically.
struct EdgeCreateUser {
    login_id: String,
}

#[async_trait]
impl Edge for EdgeCreateUser {
    async fn instantiate(
        &self,
        _deps: &Dependencies,
        _flows: Workflows<'_>,
        _input: Option<&dyn Input>,
    ) -> Result<EdgeOutcome, WorkflowError> {
        Ok(EdgeOutcome::Node(Node::simple(NodeUserCreated {
            user_id: format!("user-{}", self.login_id),
        })))
    }
}

// Effect actions

struct SendOtp {
    login_id: String,
    otp: String,
}

#[async_trait]
impl EffectAction for SendOtp {
    async fn apply(&self, deps: &Dependencies) -> Result<(), WorkflowError> {
        world(deps).record_otp_sent(&self.login_id, &self.otp);
        Ok(())
    }
}

struct EnsureUser {
    user_id: String,
}

#[async_trait]
impl EffectAction for EnsureUser {
    async fn apply(&self, deps: &Dependencies) -> Result<(), WorkflowError> {
        world(deps).ensure_user(&self.user_id);
        Ok(())
    }
}

struct MarkVerified {
    login_id: String,
}

#[async_trait]
impl EffectAction for MarkVerified {
    async fn apply(&self, deps: &Dependencies) -> Result<(), WorkflowError> {
        world(deps).mark_verified(&self.login_id);
        Ok(())
    }
}

// Harness

pub fn signup_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_intent::<IntentSignup>();
    registry.register_intent::<IntentAddLoginId>();
    registry.register_node::<NodeVerifyLoginId>();
    registry.register_node::<NodeLoginIdVerified>();
    registry.register_node::<NodeUserCreated>();
    registry.register_input::<InputLoginId>();
    registry.register_input::<InputOtp>();
    registry.register_input::<InputResendOtp>();
    registry
}

pub fn signup_deps(seed: u64) -> Arc<Dependencies> {
    let ids: Arc<dyn IdGenerator> = Arc::new(RandomIdGenerator::seeded(seed));
    let mut deps = Dependencies::new(Arc::new(SystemClock), ids);
    deps.insert(SignupWorld::default());
    Arc::new(deps)
}

pub fn world_of(deps: &Dependencies) -> Arc<SignupWorld> {
    world(deps)
}

pub async fn feed(
    workflow: &mut fluo::Workflow,
    deps: &Dependencies,
    input: &dyn Input,
) -> Result<(), WorkflowError> {
    workflow.accept(deps, Some(input)).await
}
