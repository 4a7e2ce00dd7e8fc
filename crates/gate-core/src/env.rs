//! Environment input names.
//!
//! Lists are in precedence order: the first non-empty variable wins.

/// Store connection URL.
pub const STORE_URL_VARS: [&str; 3] = [
    "EXTERNAL_USER_REDIS_URL",
    "UPSTASH_REDIS_REST_URL",
    "REDIS_CONN_STRING",
];
/// Store access token (REST transport only).
pub const STORE_TOKEN_VARS: [&str; 2] = ["EXTERNAL_USER_REDIS_TOKEN", "UPSTASH_REDIS_REST_TOKEN"];
/// Shared credential signing secret.
pub const SIGNING_SECRET_VAR: &str = "EXTERNAL_USER_JWT_SECRET";
/// Default monthly quota override.
pub const MONTHLY_QUOTA_VAR: &str = "EXTERNAL_USER_MONTHLY_QUOTA";

/// Variables whose presence is reported by the status endpoint.
pub const DIAGNOSTIC_VARS: [&str; 7] = [
    "UPSTASH_REDIS_REST_URL",
    "UPSTASH_REDIS_REST_TOKEN",
    "EXTERNAL_USER_REDIS_URL",
    "EXTERNAL_USER_REDIS_TOKEN",
    "REDIS_CONN_STRING",
    SIGNING_SECRET_VAR,
    MONTHLY_QUOTA_VAR,
];

/// First variable in `names` with a non-blank value.
pub fn first_non_empty<F>(lookup: F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_owned())
        .find(|v| !v.is_empty())
}

/// Look up a variable in the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
