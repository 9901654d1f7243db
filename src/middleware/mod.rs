mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{
    Identity, require_admin, require_user, require_user_or_admin, require_vendor,
    require_vendor_or_admin,
};
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, rate_limit};
