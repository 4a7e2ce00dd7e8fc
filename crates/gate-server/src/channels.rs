//! Channel records consumed by rate admission and the admin API.

use std::collections::BTreeMap;
use std::ops::Range;

use async_trait::async_trait;
use gate_config::ChannelConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::rate_limit::RateLimits;

/// Rate-limit settings of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub rate_limit_rpm: u32,
    pub rate_limit_rpd: u32,
    pub rate_limit_enabled: bool,
}

impl ChannelSettings {
    #[inline]
    pub fn limits(&self) -> RateLimits {
        RateLimits::new(self.rate_limit_rpm, self.rate_limit_rpd)
    }
}

/// An upstream target as seen by admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub is_multi_key: bool,
    pub multi_key_size: u32,
    pub settings: ChannelSettings,
}

impl Channel {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            is_multi_key: config.is_multi_key,
            multi_key_size: config.multi_key_size,
            settings: ChannelSettings {
                rate_limit_rpm: config.rate_limit_rpm,
                rate_limit_rpd: config.rate_limit_rpd,
                rate_limit_enabled: config.rate_limit_enabled,
            },
        }
    }

    /// Key slots in use: one per configured key, or just slot 0.
    pub fn key_slots(&self) -> Range<u32> {
        if self.is_multi_key {
            0..self.multi_key_size.max(1)
        } else {
            0..1
        }
    }

    #[inline]
    pub fn rate_limited(&self) -> bool {
        self.settings.rate_limit_enabled
    }
}

/// Partial settings update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub rate_limit_rpm: Option<u32>,
    pub rate_limit_rpd: Option<u32>,
    pub rate_limit_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(&self, settings: &mut ChannelSettings) {
        if let Some(rpm) = self.rate_limit_rpm {
            settings.rate_limit_rpm = rpm;
        }
        if let Some(rpd) = self.rate_limit_rpd {
            settings.rate_limit_rpd = rpd;
        }
        if let Some(enabled) = self.rate_limit_enabled {
            settings.rate_limit_enabled = enabled;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rate_limit_rpm.is_none()
            && self.rate_limit_rpd.is_none()
            && self.rate_limit_enabled.is_none()
    }
}

/// Source of channel records.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Channel>, ChannelError>;

    /// All channels, ordered by id.
    async fn list(&self) -> Result<Vec<Channel>, ChannelError>;

    /// Channels for the given ids; unknown ids are skipped.
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Channel>, ChannelError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(channel) = self.get(*id).await? {
                out.push(channel);
            }
        }
        Ok(out)
    }

    async fn update_settings(
        &self,
        id: i64,
        patch: &SettingsPatch,
    ) -> Result<Channel, ChannelError>;
}

/// Channel directory held in memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct MemoryChannelDirectory {
    channels: RwLock<BTreeMap<i64, Channel>>,
}

impl MemoryChannelDirectory {
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: RwLock::new(channels.into_iter().map(|c| (c.id, c)).collect()),
        }
    }

    pub fn from_config(configs: &[ChannelConfig]) -> Self {
        Self::new(configs.iter().map(Channel::from_config))
    }

    /// Swap in a new channel set, discarding runtime settings changes.
    pub fn replace_all(&self, channels: impl IntoIterator<Item = Channel>) {
        *self.channels.write() = channels.into_iter().map(|c| (c.id, c)).collect();
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

#[async_trait]
impl ChannelDirectory for MemoryChannelDirectory {
    async fn get(&self, id: i64) -> Result<Option<Channel>, ChannelError> {
        Ok(self.channels.read().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Channel>, ChannelError> {
        Ok(self.channels.read().values().cloned().collect())
    }

    async fn update_settings(
        &self,
        id: i64,
        patch: &SettingsPatch,
    ) -> Result<Channel, ChannelError> {
        let mut channels = self.channels.write();
        let channel = channels.get_mut(&id).ok_or(ChannelError::NotFound(id))?;
        patch.apply(&mut channel.settings);
        Ok(channel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: i64, multi: Option<u32>) -> Channel {
        Channel {
            id,
            name: format!("ch-{id}"),
            is_multi_key: multi.is_some(),
            multi_key_size: multi.unwrap_or(0),
            settings: ChannelSettings {
                rate_limit_rpm: 60,
                rate_limit_rpd: 1000,
                rate_limit_enabled: true,
            },
        }
    }

    #[test]
    fn test_key_slots() {
        assert_eq!(channel(1, None).key_slots(), 0..1);
        assert_eq!(channel(2, Some(3)).key_slots(), 0..3);
        assert_eq!(channel(3, Some(0)).key_slots(), 0..1);
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut settings = channel(1, None).settings;
        SettingsPatch {
            rate_limit_rpm: Some(10),
            rate_limit_rpd: None,
            rate_limit_enabled: Some(false),
        }
        .apply(&mut settings);
        assert_eq!(settings.rate_limit_rpm, 10);
        assert_eq!(settings.rate_limit_rpd, 1000);
        assert!(!settings.rate_limit_enabled);
        assert!(SettingsPatch::default().is_empty());
    }

    #[tokio::test]
    async fn test_memory_directory() {
        let dir = MemoryChannelDirectory::new([channel(2, None), channel(1, Some(2))]);
        let ids: Vec<_> = dir.list().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let many = dir.get_many(&[2, 99, 1]).await.unwrap();
        assert_eq!(many.len(), 2);

        let updated = dir
            .update_settings(
                2,
                &SettingsPatch {
                    rate_limit_rpd: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.settings.rate_limit_rpd, 5);
        assert_eq!(dir.get(2).await.unwrap().unwrap().settings.rate_limit_rpd, 5);

        assert!(matches!(
            dir.update_settings(99, &SettingsPatch::default()).await,
            Err(ChannelError::NotFound(99))
        ));

        dir.replace_all([channel(7, None)]);
        assert_eq!(dir.len(), 1);
        assert!(dir.get(2).await.unwrap().is_none());
    }

    #[test]
    fn test_from_config() {
        let config = ChannelConfig {
            id: 4,
            name: "openai".into(),
            is_multi_key: true,
            multi_key_size: 3,
            rate_limit_rpm: 20,
            rate_limit_rpd: 0,
            rate_limit_enabled: true,
        };
        let channel = Channel::from_config(&config);
        assert_eq!(channel.settings.limits(), RateLimits::new(20, 0));
        assert_eq!(channel.key_slots(), 0..3);
    }
}
