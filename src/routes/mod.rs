pub mod analytics;
pub mod banner;
pub mod cart;
pub mod feedback;
pub mod menu;
pub mod offer;
pub mod order;
pub mod product;
pub mod recently_viewed;
pub mod user;
pub mod vendor;
pub mod wishlist;
