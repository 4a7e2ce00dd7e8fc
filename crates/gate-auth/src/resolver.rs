//! Credential to caller identity.

use std::sync::Arc;

use gate_core::SharedClock;
use gate_store::{KvStore, StoreHandle};
use tracing::{debug, warn};

use crate::claims::{ClaimVerifier, Unverified, parse_credential};
use crate::error::IdentityError;
use crate::record::{UserContext, UserRecord, user_key};

/// Turns bearer credentials into [`UserContext`]s.
///
/// Credential problems are errors. Store problems are not: when the user
/// record cannot be read, the context is built from the claims alone and the
/// caller is treated as a standard, non-VIP user.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    store: StoreHandle,
    verifier: Arc<dyn ClaimVerifier>,
    clock: SharedClock,
}

impl IdentityResolver {
    /// Create a resolver that trusts claims without checking signatures.
    pub fn new(store: StoreHandle, clock: SharedClock) -> Self {
        Self {
            store,
            verifier: Arc::new(Unverified),
            clock,
        }
    }

    /// Replace the signature policy.
    pub fn with_verifier(mut self, verifier: Arc<dyn ClaimVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Whether signatures are actually checked.
    pub fn is_verifying(&self) -> bool {
        self.verifier.is_enforcing()
    }

    /// Resolve a raw credential.
    ///
    /// Expired or malformed credentials are rejected before any store access.
    pub async fn resolve(&self, credential: &str) -> Result<UserContext, IdentityError> {
        let claims = parse_credential(credential, self.verifier.as_ref(), self.clock.unix())?;

        let Some(user_id) = claims.user_id.as_deref() else {
            debug!("credential has no user id, using claims-only identity");
            return Ok(UserContext::from_claims(None, claims.email.as_deref()));
        };

        match self.lookup(user_id).await {
            Ok(Some(record)) => Ok(UserContext::from_record(
                record,
                user_id,
                claims.email.as_deref(),
            )),
            Ok(None) => {
                debug!(user_id, "user record not found, using claims-only identity");
                Ok(UserContext::from_claims(Some(user_id), claims.email.as_deref()))
            }
            Err(reason) => {
                warn!(user_id, %reason, "user lookup failed, using claims-only identity");
                Ok(UserContext::from_claims(Some(user_id), claims.email.as_deref()))
            }
        }
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<UserRecord>, String> {
        let raw = self
            .store
            .get(&user_key(user_id))
            .await
            .map_err(|e| e.to_string())?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(|e| format!("corrupt user record: {e}")))
            .transpose()
    }
}
