//! Identity, ledger and administration error types.

use gate_store::StoreError;

/// Why a credential could not be turned into an identity.
///
/// Every variant is an authentication failure from the caller's point of
/// view; store problems never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Not a three-segment token, or the payload does not decode.
    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),

    /// The `exp` claim lies in the past.
    #[error("credential has expired")]
    ExpiredCredential,

    /// Neither `userId` nor `email` is present.
    #[error("credential carries neither a user id nor an email")]
    MissingIdentity,

    /// Signature verification is enabled and the signature does not match.
    #[error("credential signature is invalid")]
    InvalidSignature,
}

impl IdentityError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedCredential(_) => "malformed_credential",
            Self::ExpiredCredential => "expired_credential",
            Self::MissingIdentity => "missing_identity",
            Self::InvalidSignature => "invalid_signature",
        }
    }
}

/// Quota ledger failure.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode quota record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// User administration failure.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// No record exists under `user:{id}`.
    #[error("user {0} not found")]
    UserNotFound(String),

    /// The stored record is not valid JSON.
    #[error("record {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    /// The request itself is unusable.
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("failed to encode user record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
