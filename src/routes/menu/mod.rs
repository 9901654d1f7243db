mod handler;
pub(crate) mod model;

pub use handler::{
    add_category, add_section, add_subcategory, get_menu_by_id, get_menus,
    get_subcategories_by_id, update_categories, update_menus, update_section,
    update_subcategories,
};
