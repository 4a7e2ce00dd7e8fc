//! Shared state handed to every request.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::HeaderName;
use gate_auth::{Hs256Verifier, IdentityResolver, QuotaLedger, UserAdmin};
use gate_config::{Config, env_presence};
use gate_core::SharedClock;
use gate_core::env::process_env;
use gate_store::{StoreKind, StoreStatus};
use serde::Serialize;
use tracing::{info, warn};

use crate::channels::{ChannelDirectory, MemoryChannelDirectory};
use crate::error::ServerError;
use crate::rate_limit::ChannelRateLimiter;

/// Components that need the store. Absent when the store is disabled.
#[derive(Debug)]
pub struct AdmissionCore {
    pub resolver: IdentityResolver,
    pub ledger: QuotaLedger,
    pub users: UserAdmin,
    pub store_kind: StoreKind,
}

/// Request-independent admission settings.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub credential_header: HeaderName,
    pub admin_username: String,
    pub monthly_quota: i64,
}

/// Startup diagnostics for the status endpoint. Never carries secret values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub enabled: bool,
    pub store_configured: bool,
    pub store_type: &'static str,
    pub jwt_configured: bool,
    pub signature_verified: bool,
    pub monthly_quota: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    pub diag_store_url_set: bool,
    pub diag_store_token_set: bool,
    pub diag_jwt_secret_set: bool,
    pub diag_env_vars: BTreeMap<&'static str, bool>,
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub(crate) core: Option<Arc<AdmissionCore>>,
    pub(crate) rate_limiter: Arc<ChannelRateLimiter>,
    pub(crate) channels: Arc<dyn ChannelDirectory>,
    pub(crate) policy: Arc<AdmissionPolicy>,
    pub(crate) clock: SharedClock,
    pub(crate) status: Arc<StatusReport>,
    pub(crate) admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Assemble state from validated configuration and the startup store
    /// outcome. Channels are seeded from `config.channels`.
    pub fn new(config: &Config, store: StoreStatus, clock: SharedClock) -> Result<Self, ServerError> {
        let channels = Arc::new(MemoryChannelDirectory::from_config(&config.channels));
        Self::with_directory(config, store, clock, channels)
    }

    /// Like [`AppState::new`], with channels served by `channels`.
    pub fn with_directory(
        config: &Config,
        store: StoreStatus,
        clock: SharedClock,
        channels: Arc<dyn ChannelDirectory>,
    ) -> Result<Self, ServerError> {
        let credential_header = HeaderName::from_bytes(config.identity.credential_header.as_bytes())
            .map_err(|e| ServerError::Header(format!("{}: {e}", config.identity.credential_header)))?;

        let verifier = match (&config.identity.signing_secret, config.identity.verify_signature) {
            (Some(secret), true) => Some(Arc::new(Hs256Verifier::new(secret))),
            _ => None,
        };

        let core = store.handle().map(|handle| {
            let mut resolver = IdentityResolver::new(handle.clone(), clock.clone());
            if let Some(verifier) = verifier.clone() {
                resolver = resolver.with_verifier(verifier);
            }
            let ledger = QuotaLedger::new(handle.clone(), clock.clone(), config.quota.lock_stripes);
            let users = UserAdmin::new(
                handle.clone(),
                ledger.clone(),
                clock.clone(),
                config.quota.monthly_quota,
            );
            Arc::new(AdmissionCore {
                resolver,
                ledger,
                users,
                store_kind: handle.kind(),
            })
        });

        match &core {
            Some(core) if !core.resolver.is_verifying() => {
                warn!("credential signatures are not verified, claims are trusted as presented");
            }
            Some(core) => info!(store = core.store_kind.label(), "admission enabled"),
            None => warn!(
                reason = %store.disabled_reason().map(ToString::to_string).unwrap_or_default(),
                "store unavailable, every admission will be refused"
            ),
        }

        let url = config.store.url.as_deref().unwrap_or_default();
        let store_type = match &core {
            Some(core) => core.store_kind.label(),
            None => StoreKind::from_url(url).unwrap_or(StoreKind::Rest).label(),
        };
        let token_set = config.store.token.as_deref().is_some_and(|t| !t.is_empty());
        let store_configured = core.is_some()
            || match StoreKind::from_url(url) {
                Some(StoreKind::Native) => true,
                Some(_) => token_set,
                None => false,
            };
        let status = StatusReport {
            enabled: core.is_some(),
            store_configured,
            store_type,
            jwt_configured: config.identity.signing_secret.is_some(),
            signature_verified: verifier.is_some(),
            monthly_quota: config.quota.monthly_quota,
            disabled_reason: store.disabled_reason().map(ToString::to_string),
            diag_store_url_set: !url.is_empty(),
            diag_store_token_set: token_set,
            diag_jwt_secret_set: config.identity.signing_secret.is_some(),
            diag_env_vars: env_presence(process_env),
        };

        Ok(Self {
            core,
            rate_limiter: Arc::new(ChannelRateLimiter::new(clock.clone())),
            channels,
            policy: Arc::new(AdmissionPolicy {
                credential_header,
                admin_username: config.identity.admin_username.clone(),
                monthly_quota: config.quota.monthly_quota,
            }),
            clock,
            status: Arc::new(status),
            admin_token: config
                .admin
                .token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(Arc::from),
        })
    }

    /// Replace the environment presence map reported by the status endpoint.
    pub fn with_env_presence(mut self, presence: BTreeMap<&'static str, bool>) -> Self {
        Arc::make_mut(&mut self.status).diag_env_vars = presence;
        self
    }

    /// Whether requests can be admitted at all.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.core.is_some()
    }

    pub fn rate_limiter(&self) -> &Arc<ChannelRateLimiter> {
        &self.rate_limiter
    }

    pub fn status(&self) -> &StatusReport {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use gate_core::SystemClock;
    use gate_store::{DisabledReason, MemoryStore, StoreHandle};

    use super::*;

    #[test]
    fn test_disabled_store_reports_reason() {
        let mut config = Config::default();
        config.store.url = Some("https://kv.example.io".into());
        let state = AppState::new(
            &config,
            StoreStatus::Disabled(DisabledReason::MissingToken),
            SystemClock::shared(),
        )
        .unwrap();
        assert!(!state.is_enabled());
        let status = state.status();
        assert!(!status.enabled);
        assert!(!status.store_configured);
        assert_eq!(status.store_type, "upstash");
        assert!(status.diag_store_url_set);
        assert!(status.disabled_reason.as_deref().unwrap().contains("token"));
    }

    #[test]
    fn test_ready_store_enables_admission() {
        let mut config = Config::default();
        config.store.url = Some("redis://127.0.0.1:6379".into());
        config.identity.signing_secret = Some("s3cret".into());
        let store = StoreHandle::memory(Arc::new(MemoryStore::new()));
        let state = AppState::new(&config, StoreStatus::Ready(store), SystemClock::shared())
            .unwrap()
            .with_env_presence(BTreeMap::new());
        let status = state.status();
        assert!(status.enabled);
        assert!(status.store_configured);
        assert!(status.jwt_configured);
        assert!(!status.signature_verified);
        assert!(status.disabled_reason.is_none());
        assert!(status.diag_env_vars.is_empty());
    }

    #[test]
    fn test_injected_store_counts_as_configured() {
        let store = StoreHandle::memory(Arc::new(MemoryStore::new()));
        let state =
            AppState::new(&Config::default(), StoreStatus::Ready(store), SystemClock::shared())
                .unwrap();
        let status = state.status();
        assert!(status.enabled);
        assert!(status.store_configured);
        assert_eq!(status.store_type, "memory");
        assert!(!status.diag_store_url_set);
    }

    #[tokio::test]
    async fn test_injected_channel_directory_is_used_as_is() {
        let mut config = Config::default();
        config.channels = vec![gate_config::ChannelConfig {
            id: 5,
            name: "from-config".into(),
            is_multi_key: false,
            multi_key_size: 1,
            rate_limit_rpm: 1,
            rate_limit_rpd: 0,
            rate_limit_enabled: true,
        }];
        let directory = Arc::new(MemoryChannelDirectory::new(std::iter::empty()));
        let state = AppState::with_directory(
            &config,
            StoreStatus::Disabled(DisabledReason::NotConfigured),
            SystemClock::shared(),
            directory.clone(),
        )
        .unwrap();
        assert!(state.channels.get(5).await.unwrap().is_none());

        directory.replace_all(config.channels.iter().map(crate::channels::Channel::from_config));
        assert_eq!(state.channels.get(5).await.unwrap().unwrap().name, "from-config");
    }

    #[test]
    fn test_invalid_credential_header() {
        let mut config = Config::default();
        config.identity.credential_header = "bad header".into();
        let result = AppState::new(
            &config,
            StoreStatus::Disabled(DisabledReason::NotConfigured),
            SystemClock::shared(),
        );
        assert!(matches!(result, Err(ServerError::Header(_))));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let state = AppState::new(
            &Config::default(),
            StoreStatus::Disabled(DisabledReason::NotConfigured),
            SystemClock::shared(),
        )
        .unwrap();
        let json = serde_json::to_value(state.status()).unwrap();
        assert_eq!(json["enabled"], false);
        assert!(json.get("monthlyQuota").is_some());
        assert!(json.get("diagEnvVars").is_some());
        assert_eq!(json["disabledReason"], "store url not configured");
    }
}
