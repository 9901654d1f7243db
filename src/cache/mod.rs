// Short-lived state kept in Redis

pub mod buy_now;
pub mod keys;

pub use buy_now::{BuyNowCacheOperations, BuyNowItem, BuyNowSession};
