//! Session record paired with a root workflow.
//!
//! One session per root workflow, created alongside it and deleted when the
//! workflow finishes or expires. The session owns the stable workflow id;
//! the workflow adopts it at construction.

use serde::{Deserialize, Serialize};

use crate::ids::IdGenerator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub workflow_id: String,
    pub client_id: String,
}

impl Session {
    pub fn new(ids: &dyn IdGenerator, client_id: impl Into<String>) -> Self {
        Self {
            workflow_id: ids.new_workflow_id(),
            client_id: client_id.into(),
        }
    }

    #[must_use]
    pub fn to_output(&self) -> SessionOutput {
        SessionOutput {
            workflow_id: self.workflow_id.clone(),
            client_id: self.client_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutput {
    pub workflow_id: String,
    pub client_id: String,
}
