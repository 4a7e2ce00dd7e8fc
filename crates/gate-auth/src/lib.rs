//! Identity resolution and quota accounting for quota-gate.
//!
//! - [`IdentityResolver`] turns a bearer credential into a [`UserContext`],
//!   consulting the user record in the store and falling back to the claims
//!   when the store cannot answer.
//! - [`QuotaLedger`] keeps monthly consumption counters per user and per
//!   (user, channel).
//! - [`UserAdmin`] implements the operator views and overwrites.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use gate_auth::{IdentityResolver, encode_unsigned};
//! use gate_core::SystemClock;
//! use gate_store::{MemoryStore, StoreHandle};
//!
//! # async fn example() -> Result<(), gate_auth::IdentityError> {
//! let store = StoreHandle::memory(Arc::new(MemoryStore::new()));
//! let resolver = IdentityResolver::new(store, SystemClock::shared());
//!
//! let token = encode_unsigned(&serde_json::json!({"userId": "42", "email": "ann@example.com"}));
//! let user = resolver.resolve(&token).await?;
//! assert_eq!(user.username, "ann");
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod claims;
pub mod cli;
mod error;
pub mod quota;
mod record;
mod resolver;

pub use admin::{BatchOutcome, BatchUsageUpdate, UsageUpdate, UserAdmin, UserInfo, VipUpdate};
pub use claims::{
    ClaimVerifier, Claims, CredentialParts, Hs256Verifier, Unverified, encode_unsigned,
    parse_credential,
};
pub use cli::UserArgs;
pub use error::{AdminError, IdentityError, LedgerError};
pub use quota::{Admit, DebitOutcome, QuotaLedger, QuotaRecord, QuotaTxn, quota_key};
pub use record::{Classification, IdentitySource, UserContext, UserRecord, user_key};
pub use resolver::IdentityResolver;
