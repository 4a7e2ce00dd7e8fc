//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub listen: Option<String>,
    /// Override store URL (redis:// or https://)
    #[arg(long)]
    pub store_url: Option<String>,
    /// Override per-operation store timeout (milliseconds)
    #[arg(long)]
    pub store_timeout_ms: Option<u64>,
    /// Override default monthly quota for standard users
    #[arg(long)]
    pub monthly_quota: Option<i64>,
    /// Override the credential header name
    #[arg(long)]
    pub credential_header: Option<String>,
    /// Require valid HS256 signatures on credentials
    #[arg(long)]
    pub verify_signature: Option<bool>,
    /// Override the username treated as administrator
    #[arg(long)]
    pub admin_username: Option<String>,
    /// Override channel counter cleanup interval (seconds)
    #[arg(long)]
    pub rate_limit_cleanup_secs: Option<u64>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override log format (pretty/json/compact)
    #[arg(long)]
    pub log_format: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    }
    if let Some(v) = &overrides.store_url {
        config.store.url = Some(v.clone());
    }
    if let Some(v) = overrides.store_timeout_ms {
        config.store.timeout_ms = v;
    }
    if let Some(v) = overrides.monthly_quota {
        config.quota.monthly_quota = v;
    }
    if let Some(v) = &overrides.credential_header {
        config.identity.credential_header = v.clone();
    }
    if let Some(v) = overrides.verify_signature {
        config.identity.verify_signature = v;
    }
    if let Some(v) = &overrides.admin_username {
        config.identity.admin_username = v.clone();
    }
    if let Some(v) = overrides.rate_limit_cleanup_secs {
        config.rate_limit.cleanup_interval_secs = v;
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.log_format {
        config.logging.format = Some(v.clone());
    }
}
