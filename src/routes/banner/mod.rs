mod handler;
pub(crate) mod model;

pub use handler::{add_banner, delete_banner, edit_banner, get_banners};
