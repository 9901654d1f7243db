mod handler;
pub(crate) mod model;

pub use handler::{add_feedback, get_feedback_by_product, get_feedback_by_user};
