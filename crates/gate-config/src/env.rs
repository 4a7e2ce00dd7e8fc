//! Environment inputs.

use std::collections::BTreeMap;

use gate_core::env::{
    DIAGNOSTIC_VARS, MONTHLY_QUOTA_VAR, SIGNING_SECRET_VAR, STORE_TOKEN_VARS, STORE_URL_VARS,
    first_non_empty, process_env,
};
use tracing::warn;

use crate::Config;

/// Values read from the environment, already resolved by precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvInputs {
    pub store_url: Option<String>,
    pub store_token: Option<String>,
    pub signing_secret: Option<String>,
    /// Only positive integers are accepted.
    pub monthly_quota: Option<i64>,
}

impl EnvInputs {
    /// Read from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Read through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let monthly_quota = first_non_empty(&lookup, &[MONTHLY_QUOTA_VAR]).and_then(|raw| {
            match raw.parse::<i64>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    warn!(var = MONTHLY_QUOTA_VAR, "ignoring non-positive or non-numeric value");
                    None
                }
            }
        });
        Self {
            store_url: first_non_empty(&lookup, &STORE_URL_VARS),
            store_token: first_non_empty(&lookup, &STORE_TOKEN_VARS),
            signing_secret: first_non_empty(&lookup, &[SIGNING_SECRET_VAR]),
            monthly_quota,
        }
    }
}

/// Overlay environment inputs onto a loaded config.
pub fn apply_env(config: &mut Config, env: &EnvInputs) {
    if let Some(v) = &env.store_url {
        config.store.url = Some(v.clone());
    }
    if let Some(v) = &env.store_token {
        config.store.token = Some(v.clone());
    }
    if let Some(v) = &env.signing_secret {
        config.identity.signing_secret = Some(v.clone());
    }
    if let Some(v) = env.monthly_quota {
        config.quota.monthly_quota = v;
    }
}

/// Presence of each diagnostic variable. Values are never included.
pub fn env_presence<F>(lookup: F) -> BTreeMap<&'static str, bool>
where
    F: Fn(&str) -> Option<String>,
{
    DIAGNOSTIC_VARS
        .iter()
        .map(|name| {
            let set = lookup(name).is_some_and(|v| !v.trim().is_empty());
            (*name, set)
        })
        .collect()
}
