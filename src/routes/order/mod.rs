mod handler;
pub(crate) mod model;

pub use handler::{
    buy_now, create_order, get_buy_now, get_order_by_id, get_total_orders, get_user_orders,
    query_orders, update_order,
};
