//! Configuration validation logic.

use std::collections::HashSet;

use crate::Config;
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Validation("server.listen is empty".into()));
    }
    if config.store.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "store.timeout_ms must be > 0".into(),
        ));
    }
    if config.store.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "store.connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.identity.credential_header.trim().is_empty() {
        return Err(ConfigError::Validation(
            "identity.credential_header is empty".into(),
        ));
    }
    if config.identity.verify_signature
        && config
            .identity
            .signing_secret
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "identity.verify_signature requires identity.signing_secret".into(),
        ));
    }
    if config.quota.monthly_quota <= 0 {
        return Err(ConfigError::Validation(
            "quota.monthly_quota must be > 0".into(),
        ));
    }
    if config.quota.lock_stripes == 0 {
        return Err(ConfigError::Validation(
            "quota.lock_stripes must be > 0".into(),
        ));
    }
    if config.rate_limit.cleanup_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "rate_limit.cleanup_interval_secs must be > 0".into(),
        ));
    }

    let mut seen = HashSet::new();
    for channel in &config.channels {
        if !seen.insert(channel.id) {
            return Err(ConfigError::Validation(format!(
                "channels: duplicate id {}",
                channel.id
            )));
        }
        if channel.is_multi_key && channel.multi_key_size == 0 {
            return Err(ConfigError::Validation(format!(
                "channels[{}]: multi_key_size must be > 0",
                channel.id
            )));
        }
    }

    if let Some(format) = &config.logging.format
        && !matches!(format.as_str(), "json" | "pretty" | "compact")
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of json, pretty, compact (got {format})"
        )));
    }
    if let Some(output) = &config.logging.output
        && !matches!(output.as_str(), "stdout" | "stderr")
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be stdout or stderr (got {output})"
        )));
    }
    Ok(())
}
