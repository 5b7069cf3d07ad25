//! Catalog normalization: turns flat raw listings into canonical products
//! with size/flavor variants, and parses the bulk-load file format.

pub mod grouper;
pub mod loader;

pub use grouper::{group_listings, GroupedProduct, GroupedVariant, RawListing};
pub use loader::{parse_bulk_payload, CategoryRecord};
