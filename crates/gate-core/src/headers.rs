//! Header names on the admission surface.
//!
//! Request headers are injected by the upstream channel selector; response
//! headers are attached to every admitted request.

/// Numeric channel id selected for the request.
pub const CHANNEL_ID: &str = "X-Channel-Id";
/// Human-readable channel name, echoed in quota rejections.
pub const CHANNEL_NAME: &str = "X-Channel-Name";
/// `"false"` disables quota accounting for the channel.
pub const CHANNEL_QUOTA_ENABLED: &str = "X-Channel-Quota-Enabled";
/// Per-channel monthly limit override; `-1` means unlimited.
pub const CHANNEL_QUOTA_LIMIT: &str = "X-Channel-Quota-Limit";
/// Key slot within a multi-key channel, defaults to `0`.
pub const CHANNEL_KEY_INDEX: &str = "X-Channel-Key-Index";

/// One of `vip`, `disabled`, `unlimited`, `active`.
pub const QUOTA_STATUS: &str = "X-Quota-Status";
/// Admissions counted this month, including the current one.
pub const QUOTA_USED: &str = "X-Quota-Used";
/// Effective monthly limit, `-1` when not limited.
pub const QUOTA_TOTAL: &str = "X-Quota-Total";
/// Remaining admissions this month, `-1` when not limited.
pub const QUOTA_REMAINING: &str = "X-Quota-Remaining";
