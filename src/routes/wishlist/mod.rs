mod handler;
pub(crate) mod model;

pub use handler::{
    add_to_wishlist, check_wishlist, clear_wishlist, get_user_wishlist, remove_from_wishlist,
};
