mod handler;
pub(crate) mod model;

pub(crate) use handler::search_page;
pub use handler::{
    add_product, change_status, change_stock_status, check_duplicate_product, edit_product,
    get_best_sellers, get_daily_offers, get_discounted_products, get_filters, get_products,
    get_products_by_category, get_products_by_id, get_products_by_main_menu,
    get_products_by_query, import_product, save_images, upload_image,
};
