mod handler;
pub(crate) mod model;

pub use handler::{
    change_password, delete_address, get_user, get_user_by_id, get_users, login, signup,
    update_user, update_user_address, update_user_password,
};
