//! Opaque context codec
//!
//! The conversation state lives on the client. It travels as an envelope
//! `{version, state, seal}` where `seal` is a BLAKE3 keyed hash of the
//! caller's tenant and the state's JSON encoding. Anything that does not
//! verify for the opening tenant, or that breaks the state invariants, is
//! rejected.

use crate::error::ContextError;
use parley_dialogue::ConversationState;
use parley_schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope version written by this codec
pub const CONTEXT_VERSION: u32 = 1;

const KEY_CONTEXT: &str = "parley conversation context seal v1";

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    version: u32,
    state: ConversationState,
    seal: String,
}

/// Seals and opens client-held contexts
#[derive(Clone)]
pub struct ContextCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for ContextCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCodec").finish_non_exhaustive()
    }
}

impl ContextCodec {
    /// Create codec from the server's context secret
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret),
        }
    }

    fn digest(&self, state: &ConversationState, tenant: &str) -> Result<blake3::Hash, ContextError> {
        let encoded = serde_json::to_vec(state).map_err(|e| ContextError::Encode(e.to_string()))?;
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        // length prefix keeps tenant and state bytes apart
        hasher.update(&(tenant.len() as u64).to_le_bytes());
        hasher.update(tenant.as_bytes());
        hasher.update(&encoded);
        Ok(hasher.finalize())
    }

    /// Wrap a state into an envelope sealed for one tenant
    ///
    /// # Errors
    /// `ContextError::Encode` if the state cannot be serialized.
    pub fn seal(&self, state: &ConversationState, tenant: &str) -> Result<Value, ContextError> {
        let seal = self.digest(state, tenant)?.to_hex().to_string();
        let envelope = Envelope {
            version: CONTEXT_VERSION,
            state: state.clone(),
            seal,
        };
        serde_json::to_value(envelope).map_err(|e| ContextError::Encode(e.to_string()))
    }

    /// Open an envelope and verify it for a tenant
    ///
    /// # Errors
    /// `Malformed`, `UnsupportedVersion`, `BadSeal` (also for a context
    /// sealed for another tenant), or `Inconsistent` when the state does not
    /// match its action's schema.
    pub fn open(
        &self,
        context: &Value,
        registry: &SchemaRegistry,
        tenant: &str,
    ) -> Result<ConversationState, ContextError> {
        let version = context
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| ContextError::Malformed("missing version".to_string()))?;
        if version != u64::from(CONTEXT_VERSION) {
            return Err(ContextError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }

        let envelope: Envelope = serde_json::from_value(context.clone())
            .map_err(|e| ContextError::Malformed(e.to_string()))?;
        let claimed = blake3::Hash::from_hex(envelope.seal.as_bytes())
            .map_err(|_| ContextError::BadSeal)?;
        // blake3::Hash equality is constant-time
        if self.digest(&envelope.state, tenant)? != claimed {
            return Err(ContextError::BadSeal);
        }

        let schema = registry
            .get(envelope.state.action())
            .map_err(|e| ContextError::Inconsistent(e.into()))?;
        envelope.state.check(schema)?;
        Ok(envelope.state)
    }
}
