//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `gate_core::defaults`.

use gate_core::defaults;

/// Generate default value functions that forward to gate_core::defaults constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_shutdown_timeout_secs      => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
    default_store_timeout_ms           => DEFAULT_STORE_TIMEOUT_MS: u64,
    default_store_connect_timeout_secs => DEFAULT_STORE_CONNECT_TIMEOUT_SECS: u64,
    default_scan_count                 => DEFAULT_SCAN_COUNT: u32,
    default_monthly_quota              => DEFAULT_MONTHLY_QUOTA: i64,
    default_lock_stripes               => DEFAULT_LOCK_STRIPES: usize,
    default_rate_limit_cleanup_secs    => DEFAULT_RATE_LIMIT_CLEANUP_SECS: u64,
}

default_string_fns! {
    default_listen            => DEFAULT_LISTEN,
    default_credential_header => DEFAULT_CREDENTIAL_HEADER,
    default_admin_username    => DEFAULT_ADMIN_USERNAME,
}

pub(crate) fn default_multi_key_size() -> u32 {
    1
}
