//! CLI module for gate-auth.
//!
//! Operates directly against the configured store, without a running server.
//! It can be used either as the standalone `gate-user` binary or as the
//! `user` subcommand of the main quota-gate CLI.
//!
//! # Usage
//!
//! ```bash
//! # Show one user with this month's usage
//! gate-user show u-42
//!
//! # List every user
//! gate-user list --format json
//!
//! # Grant VIP for 30 days, then revoke it
//! gate-user vip u-42 --days 30
//! gate-user vip u-42 --off
//!
//! # Reset a user's usage on channel 3
//! gate-user quota u-42 --reset --channel 3
//! ```

use clap::{ArgGroup, Args, Parser, Subcommand};
use gate_core::env::{STORE_TOKEN_VARS, STORE_URL_VARS, first_non_empty, process_env};
use gate_core::{DEFAULT_LOCK_STRIPES, DEFAULT_MONTHLY_QUOTA, SystemClock};
use gate_store::{ConnectOptions, StoreStatus, connect};
use tabled::{Table, Tabled};
use time::OffsetDateTime;

use crate::admin::{UsageUpdate, UserAdmin, UserInfo, VipUpdate};
use crate::quota::QuotaLedger;

/// User administration CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gate-user",
    version,
    about = "Inspect and manage quota-gate users"
)]
pub struct UserArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: UserCommands,
}

/// Store selection shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Store URL (`redis://...` or `https://...`). Falls back to
    /// UPSTASH_REDIS_REST_URL, then REDIS_CONN_STRING.
    #[arg(long, env = "EXTERNAL_USER_REDIS_URL", global = true)]
    pub store_url: Option<String>,

    /// Store access token for REST URLs. Falls back to UPSTASH_REDIS_REST_TOKEN.
    #[arg(long, env = "EXTERNAL_USER_REDIS_TOKEN", global = true, hide_env_values = true)]
    pub store_token: Option<String>,

    /// Monthly quota shown for non-VIP users.
    #[arg(
        long,
        env = "EXTERNAL_USER_MONTHLY_QUOTA",
        default_value_t = DEFAULT_MONTHLY_QUOTA,
        global = true
    )]
    pub monthly_quota: i64,
}

/// User CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommands {
    /// Show one user.
    Show {
        /// User ID.
        user_id: String,
    },

    /// List all users.
    List {
        /// Output format (table, json).
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Grant, extend or revoke VIP.
    Vip {
        /// User ID.
        user_id: String,

        /// VIP for this many days from now.
        #[arg(short, long, group = "expiry")]
        days: Option<u32>,

        /// VIP until this unix timestamp.
        #[arg(short, long, group = "expiry")]
        expires_at: Option<i64>,

        /// Revoke VIP.
        #[arg(long, conflicts_with = "expiry")]
        off: bool,
    },

    /// Overwrite this month's usage.
    #[command(group(ArgGroup::new("target").required(true).args(["used", "reset"])))]
    Quota {
        /// User ID.
        user_id: String,

        /// New used count.
        #[arg(short, long)]
        used: Option<u64>,

        /// Reset usage to zero.
        #[arg(short, long)]
        reset: bool,

        /// Channel-scoped record instead of the global one.
        #[arg(short, long)]
        channel: Option<i64>,
    },
}

/// User row for display.
#[derive(Tabled)]
struct UserDisplay {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "VIP Until")]
    vip: String,
    #[tabled(rename = "Used")]
    used: u64,
    #[tabled(rename = "Quota")]
    total: String,
    #[tabled(rename = "Month")]
    month: String,
}

impl From<&UserInfo> for UserDisplay {
    fn from(u: &UserInfo) -> Self {
        Self {
            id: u.id.clone(),
            username: or_dash(&u.username),
            email: or_dash(&u.email),
            vip: if u.is_vip {
                format_timestamp(u.vip_expires_at)
            } else {
                "-".to_string()
            },
            used: u.quota_used,
            total: if u.quota_total < 0 {
                "Unlimited".to_string()
            } else {
                u.quota_total.to_string()
            },
            month: or_dash(&u.month_key),
        }
    }
}

fn or_dash(s: &str) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

/// Format unix seconds as a UTC date and time.
fn format_timestamp(ts: i64) -> String {
    if ts <= 0 {
        return "Never".to_string();
    }
    match OffsetDateTime::from_unix_timestamp(ts) {
        Ok(t) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02} UTC",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute()
        ),
        Err(_) => ts.to_string(),
    }
}

/// Run the user CLI with the given arguments.
///
/// This is the main entry point for the user CLI, used by both the
/// standalone binary and the unified quota-gate CLI.
pub async fn run(args: UserArgs) -> Result<(), Box<dyn std::error::Error>> {
    let admin = open_admin(&args.store).await?;

    match args.command {
        UserCommands::Show { user_id } => {
            let info = admin.user_info(&user_id).await?;
            println!("{}", Table::new([UserDisplay::from(&info)]));
        }
        UserCommands::List { format } => {
            let users = admin.list_users().await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&users)?),
                "table" => {
                    if users.is_empty() {
                        println!("No users found.");
                    } else {
                        println!("{}", Table::new(users.iter().map(UserDisplay::from)));
                        println!("Total: {}", users.len());
                    }
                }
                other => return Err(format!("Unknown format: {other}").into()),
            }
        }
        UserCommands::Vip {
            user_id,
            days,
            expires_at,
            off,
        } => {
            let update = VipUpdate {
                is_vip: !off,
                vip_expires_at: expires_at.unwrap_or(0),
                vip_days: days.map_or(0, i64::from),
            };
            if update.is_vip && update.vip_days == 0 && update.vip_expires_at == 0 {
                return Err("Specify --days, --expires-at, or --off".into());
            }
            let doc = admin.set_vip(&user_id, &update).await?;
            let expires = doc
                .get("vipExpiresAt")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            if update.is_vip {
                println!("VIP granted to {user_id} until {}.", format_timestamp(expires));
            } else {
                println!("VIP revoked for {user_id}.");
            }
        }
        UserCommands::Quota {
            user_id,
            used,
            reset,
            channel,
        } => {
            let update = UsageUpdate {
                used_count: used.unwrap_or(0),
                reset,
                channel_id: channel,
            };
            let record = admin.set_usage(&user_id, &update).await?;
            println!(
                "Usage for {user_id} set to {} ({}).",
                record.used_count, record.month_key
            );
        }
    }
    Ok(())
}

async fn open_admin(args: &StoreArgs) -> Result<UserAdmin, Box<dyn std::error::Error>> {
    let url = args
        .store_url
        .clone()
        .or_else(|| first_non_empty(process_env, &STORE_URL_VARS[1..]));
    let token = args
        .store_token
        .clone()
        .or_else(|| first_non_empty(process_env, &STORE_TOKEN_VARS[1..]));

    let handle = match connect(url.as_deref(), token.as_deref(), ConnectOptions::default()).await
    {
        StoreStatus::Ready(handle) => handle,
        StoreStatus::Disabled(reason) => return Err(format!("Store unavailable: {reason}").into()),
    };

    let clock = SystemClock::shared();
    let ledger = QuotaLedger::new(handle.clone(), clock.clone(), DEFAULT_LOCK_STRIPES);
    Ok(UserAdmin::new(handle, ledger, clock, args.monthly_quota))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_quota_reset() {
        let args = UserArgs::try_parse_from([
            "gate-user",
            "--store-url",
            "redis://localhost",
            "quota",
            "u-1",
            "--reset",
            "--channel",
            "3",
        ])
        .unwrap();
        assert_eq!(args.store.store_url.as_deref(), Some("redis://localhost"));
        match args.command {
            UserCommands::Quota {
                reset, channel, used, ..
            } => {
                assert!(reset);
                assert_eq!(channel, Some(3));
                assert_eq!(used, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quota_requires_a_target() {
        assert!(UserArgs::try_parse_from(["gate-user", "quota", "u-1"]).is_err());
    }

    #[test]
    fn test_vip_off_conflicts_with_days() {
        assert!(
            UserArgs::try_parse_from(["gate-user", "vip", "u-1", "--days", "3", "--off"]).is_err()
        );
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(0), "Never");
        assert_eq!(format_timestamp(1_704_067_200), "2024-01-01 00:00 UTC");
    }
}
