mod handler;
pub(crate) mod model;

pub use handler::{add_to_cart, get_user_cart, remove_item_from_cart, update_cart};
