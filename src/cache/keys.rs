/// Buy-now session key prefix
const BUY_NOW_PREFIX: &str = "buy_now:";

/// Rate limit counter prefix
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Buy-now sessions live for one hour
pub const BUY_NOW_TTL_SECS: u64 = 3600;

pub fn buy_now_key(session_id: &str) -> String {
    format!("{}{}", BUY_NOW_PREFIX, session_id)
}

pub fn rate_limit_key(ip: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, ip)
}
