mod handler;
pub(crate) mod model;

pub use handler::{
    add_offers, delete_dynamic_offer, delete_offer, delete_product_from_offer, get_active_offer,
    get_all_offers, get_dynamic_offers, get_offers, import_offer, update_offer_status,
    update_offers,
};
