mod handler;
pub(crate) mod model;

pub use handler::{get_recently_viewed, save_recently_viewed};
