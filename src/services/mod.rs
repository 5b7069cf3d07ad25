pub mod catalog;
pub mod orders;
pub mod settings;
pub mod users;

pub use catalog::CatalogService;
pub use orders::OrderService;
pub use settings::SettingsService;
pub use users::UserService;
