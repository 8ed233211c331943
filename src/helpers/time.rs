use chrono::Utc;
use tokio::time::Instant;

use crate::utils::constants::DEFAULT_GRACE_SECONDS;

pub fn get_grace_seconds(grace_seconds_settings: Option<u64>) -> u64 {
    grace_seconds_settings.unwrap_or(DEFAULT_GRACE_SECONDS)
}

pub fn now_u64() -> u64 {
    u64::try_from(now_i64()).unwrap_or_default()
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}
