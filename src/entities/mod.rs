//! Database entities for the MuscleZone catalog, orders and storefront settings.

pub mod announcement;
pub mod category;
pub mod hero_banner;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod user;

pub use announcement::Entity as Announcement;
pub use category::Entity as Category;
pub use hero_banner::Entity as HeroBanner;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use user::Entity as User;
