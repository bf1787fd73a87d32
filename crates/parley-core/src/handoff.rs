//! Task handoff
//!
//! Hands a resolved state to the downstream task service exactly once per
//! call. There is no cross-request idempotency: a client retrying a READY
//! turn can create a duplicate task. Every handoff logs a fingerprint of
//! `(tenant, action, parameters)` so duplicates can be spotted.

use crate::error::HandoffError;
use crate::types::CallerIdentity;
use parley_dialogue::ConversationState;
use parley_schema::{ActionKind, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Task creation request sent downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Action to run
    pub action: ActionKind,
    /// Canonical parameter values
    pub parameters: BTreeMap<String, ParamValue>,
    /// Tenant scope
    pub tenant_id: String,
    /// Requesting user
    pub user_id: String,
}

impl TaskRequest {
    /// Build from a state
    #[must_use]
    pub fn from_state(state: &ConversationState, caller: &CallerIdentity) -> Self {
        Self {
            action: state.action(),
            parameters: state.parameter_map(),
            tenant_id: caller.tenant_id.clone(),
            user_id: caller.user_id.clone(),
        }
    }

    /// Short hex fingerprint of tenant, action and parameters
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.tenant_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.action.as_str().as_bytes());
        hasher.update(&[0]);
        // BTreeMap keeps keys ordered, so the encoding is stable
        if let Ok(encoded) = serde_json::to_vec(&self.parameters) {
            hasher.update(&encoded);
        }
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }
}

/// Downstream acknowledgement, passed to the user verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAcknowledgement {
    /// Id of the created task
    pub task_id: String,
    /// Message to show the user
    pub acknowledgement_message: String,
}

/// Downstream task execution service
#[async_trait::async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Create the task
    ///
    /// # Errors
    /// `HandoffError::Execution` with the collaborator's message.
    async fn execute(&self, request: &TaskRequest) -> Result<TaskAcknowledgement, HandoffError>;
}

/// Hands resolved states to a [`TaskExecutor`]
#[derive(Clone)]
pub struct TaskHandoff {
    executor: Arc<dyn TaskExecutor>,
}

impl std::fmt::Debug for TaskHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandoff").finish_non_exhaustive()
    }
}

impl TaskHandoff {
    /// Create handoff over an executor
    #[must_use]
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self { executor }
    }

    /// Hand off a READY state
    ///
    /// # Errors
    /// `NotReady` if parameters are missing; `Execution` on downstream failure.
    pub async fn hand_off(
        &self,
        state: &ConversationState,
        caller: &CallerIdentity,
    ) -> Result<TaskAcknowledgement, HandoffError> {
        if !state.is_complete() {
            return Err(HandoffError::NotReady(
                state
                    .missing_parameters()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            ));
        }
        self.dispatch(state, caller).await
    }

    /// Hand off whatever has been collected, ready or not
    ///
    /// # Errors
    /// `Execution` on downstream failure.
    pub async fn hand_off_partial(
        &self,
        state: &ConversationState,
        caller: &CallerIdentity,
    ) -> Result<TaskAcknowledgement, HandoffError> {
        self.dispatch(state, caller).await
    }

    async fn dispatch(
        &self,
        state: &ConversationState,
        caller: &CallerIdentity,
    ) -> Result<TaskAcknowledgement, HandoffError> {
        let request = TaskRequest::from_state(state, caller);
        let fingerprint = request.fingerprint();
        tracing::info!(
            action = %request.action,
            tenant = %request.tenant_id,
            fingerprint = %fingerprint,
            complete = state.is_complete(),
            "handing off task"
        );

        match self.executor.execute(&request).await {
            Ok(ack) => {
                tracing::info!(task_id = %ack.task_id, fingerprint = %fingerprint, "task created");
                Ok(ack)
            }
            Err(err) => {
                tracing::error!(error = %err, fingerprint = %fingerprint, "task execution failed");
                Err(err)
            }
        }
    }
}
