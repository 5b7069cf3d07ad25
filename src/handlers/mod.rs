pub mod auth;
pub mod categories;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;
pub mod settings;
