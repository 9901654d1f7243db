mod handler;
pub(crate) mod model;

pub use handler::{
    get_daily_orders, get_monthly_orders, get_order_by_category, get_top_selling_by_subcategory,
    get_top_selling_products, get_total_revenue, get_yearly_orders,
};
