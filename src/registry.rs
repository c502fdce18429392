//! Kind registry: string discriminator to concrete type.
//!
//! Every intent, node and input type a deployment uses is registered once
//! at startup; deserialization looks the kind up to allocate the right
//! concrete type before decoding its data. The registry is passed
//! explicitly wherever decoding happens — there is no global table.
//! Registering the same kind twice is a wiring bug and panics.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WorkflowError;
use crate::input::Input;
use crate::intent::Intent;
use crate::node::NodeSimple;

/// Implemented by intents that can be reconstructed from a persisted
/// `{kind, data}` pair.
pub trait RegisteredIntent: Intent + DeserializeOwned {
    const KIND: &'static str;
}

/// Implemented by simple nodes that can be reconstructed from a persisted
/// `{kind, data}` pair.
pub trait RegisteredNode: NodeSimple + DeserializeOwned {
    const KIND: &'static str;
}

/// Implemented by inputs that arrive over the wire as `{kind, data}`.
pub trait RegisteredInput: Input + DeserializeOwned {
    const KIND: &'static str;
}

type IntentDecoder = fn(Value) -> Result<Box<dyn Intent>, serde_json::Error>;
type NodeDecoder = fn(Value) -> Result<Box<dyn NodeSimple>, serde_json::Error>;
type InputDecoder = fn(Value) -> Result<Box<dyn Input>, serde_json::Error>;

#[derive(Default)]
pub struct Registry {
    intents: HashMap<&'static str, IntentDecoder>,
    nodes: HashMap<&'static str, NodeDecoder>,
    inputs: HashMap<&'static str, InputDecoder>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_intent<T: RegisteredIntent>(&mut self) {
        if self.intents.insert(T::KIND, decode_intent::<T>).is_some() {
            panic!("duplicate intent kind: {}", T::KIND);
        }
    }

    pub fn register_node<T: RegisteredNode>(&mut self) {
        if self.nodes.insert(T::KIND, decode_node::<T>).is_some() {
            panic!("duplicate node kind: {}", T::KIND);
        }
    }

    pub fn register_input<T: RegisteredInput>(&mut self) {
        if self.inputs.insert(T::KIND, decode_input::<T>).is_some() {
            panic!("duplicate input kind: {}", T::KIND);
        }
    }

    pub fn decode_intent(&self, kind: &str, data: Value) -> Result<Box<dyn Intent>, WorkflowError> {
        let decode = self.intents.get(kind).ok_or_else(|| WorkflowError::UnknownKind {
            family: "intent",
            kind: kind.to_string(),
        })?;
        Ok(decode(data)?)
    }

    pub fn decode_node(&self, kind: &str, data: Value) -> Result<Box<dyn NodeSimple>, WorkflowError> {
        let decode = self.nodes.get(kind).ok_or_else(|| WorkflowError::UnknownKind {
            family: "node",
            kind: kind.to_string(),
        })?;
        Ok(decode(data)?)
    }

    pub fn decode_input(&self, kind: &str, data: Value) -> Result<Box<dyn Input>, WorkflowError> {
        let decode = self.inputs.get(kind).ok_or_else(|| WorkflowError::UnknownKind {
            family: "input",
            kind: kind.to_string(),
        })?;
        Ok(decode(data)?)
    }
}

fn decode_intent<T: RegisteredIntent>(data: Value) -> Result<Box<dyn Intent>, serde_json::Error> {
    Ok(Box::new(serde_json::from_value::<T>(data)?))
}

fn decode_node<T: RegisteredNode>(data: Value) -> Result<Box<dyn NodeSimple>, serde_json::Error> {
    Ok(Box::new(serde_json::from_value::<T>(data)?))
}

fn decode_input<T: RegisteredInput>(data: Value) -> Result<Box<dyn Input>, serde_json::Error> {
    Ok(Box::new(serde_json::from_value::<T>(data)?))
}
