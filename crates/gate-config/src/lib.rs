//! Configuration for quota-gate.
//!
//! Layers, lowest to highest precedence:
//! 1. serde defaults (an empty or missing file is valid)
//! 2. a `.json`/`.jsonc`, `.yaml`/`.yml` or `.toml` file
//! 3. environment inputs ([`EnvInputs`])
//! 4. command-line overrides ([`CliOverrides`])
//!
//! [`resolve_config`] applies all layers and validates the result.

mod cli;
mod defaults;
mod env;
mod loader;
mod types;
mod validate;

use std::path::Path;

pub use cli::{CliOverrides, apply_overrides};
pub use env::{EnvInputs, apply_env, env_presence};
pub use loader::{ConfigError, ConfigFormat, load_config};
pub use types::*;
pub use validate::validate_config;

/// Load, layer and validate configuration.
pub fn resolve_config(
    path: Option<&Path>,
    env: &EnvInputs,
    overrides: &CliOverrides,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env(&mut config, env);
    apply_overrides(&mut config, overrides);
    validate_config(&config)?;
    Ok(config)
}
