//! Variant grouper.
//!
//! Supplement listings arrive as independent SKU-like rows whose display
//! names embed the pack size ("Gold Standard Whey 1KG", "Gold Standard Whey
//! 2KG"). Grouping strips a fixed vocabulary of trailing quantity/unit
//! tokens from the name, keys the remainder by brand, and collapses every
//! listing that lands on the same key into one canonical product with one
//! variant per listing.
//!
//! The suffix vocabulary is a hand-tuned heuristic: names using units
//! outside it will not merge, and two unrelated products that share a brand
//! and a truncated base name will merge. Both behaviors are kept as-is so
//! existing catalog identities stay stable across reloads.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Trailing "<number> <unit>..." suffixes, e.g. " 60 Caps (Unflavoured)".
static UNIT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s\d+\s*(KG|GM|Caps|Tabs|Gummies|Srv|Softgels|LBS).*").expect("valid regex")
});

/// Composite forms with no space before the unit, e.g. " 1KG Chocolate".
static COMPOSITE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s(1KG|2KG|3KG|300GM|500GM).*").expect("valid regex"));

/// Shorter vocabulary used when deriving the product type label.
static TYPE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s\d+\s*(KG|GM).*").expect("valid regex"));

const DEFAULT_DISCOUNT: Decimal = dec!(20);
const DEFAULT_TAX: Decimal = dec!(18);
const MRP_MARKUP: Decimal = dec!(1.25);
const PLACEHOLDER_IMAGE_COUNT: u32 = 5;

/// One ungrouped catalog row from the bulk-load file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawListing {
    pub brand: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub image_urls: Vec<String>,
    pub is_bestseller: bool,
    pub product_type: String,
    /// Pack size label, e.g. "1KG" or "60 Caps".
    pub quantity: String,
    pub flavors: Vec<String>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub stock: i32,
}

impl Default for RawListing {
    fn default() -> Self {
        Self {
            brand: String::new(),
            name: String::new(),
            description: None,
            category_id: String::new(),
            image_urls: Vec::new(),
            is_bestseller: false,
            product_type: String::new(),
            quantity: String::new(),
            flavors: Vec::new(),
            price: Decimal::ZERO,
            mrp: None,
            discount: None,
            tax: None,
            stock: 0,
        }
    }
}

/// A size/flavor variant produced by grouping, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedVariant {
    pub quantity_label: String,
    pub flavor: Option<String>,
    pub price: Decimal,
    pub mrp: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub stock: i32,
    pub sku: String,
    pub position: i32,
}

/// A canonical product produced by grouping. `id` is the group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedProduct {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub description: String,
    pub category_id: String,
    pub image_urls: Vec<String>,
    pub is_bestseller: bool,
    pub product_type: String,
    pub variants: Vec<GroupedVariant>,
}

/// Strips the quantity/unit suffix from a display name, keeping the leading
/// descriptive portion.
pub fn base_name(display_name: &str) -> String {
    let stripped = UNIT_SUFFIX.replace(display_name, "");
    let stripped = COMPOSITE_SUFFIX.replace(&stripped, "");
    stripped.trim().to_string()
}

/// Deterministic grouping key: lowercase brand + base name with every
/// non-alphanumeric character mapped to an underscore.
pub fn group_key(brand: &str, base: &str) -> String {
    format!("{}_{}", brand, base)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn product_type_label(raw: &str) -> String {
    TYPE_SUFFIX.replace(raw, "").trim().to_string()
}

pub(crate) fn default_mrp(price: Decimal) -> Decimal {
    (price * MRP_MARKUP).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Deterministic stand-in image for listings that ship without one, so the
/// same product always gets the same placeholder across reloads.
fn placeholder_image(key: &str) -> String {
    let n = key.bytes().map(u32::from).sum::<u32>() % PLACEHOLDER_IMAGE_COUNT + 1;
    format!("/p{}.jpeg", n)
}

pub(crate) fn variant_sku(key: &str, quantity_label: &str, position: i32) -> String {
    let label: String = quantity_label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("{}_{}_{}", key, label, position).to_lowercase()
}

/// Groups flat listings into canonical products with attached variants.
///
/// Products are emitted in first-encounter order of their group key and
/// variants preserve input encounter order, so the output is deterministic
/// for a given input sequence. Listings missing a required field (blank
/// brand, display name, quantity label or category, or a non-positive
/// price) are logged and skipped rather than failing the whole batch.
pub fn group_listings(listings: &[RawListing]) -> Vec<GroupedProduct> {
    let mut products: Vec<GroupedProduct> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for listing in listings {
        if listing.brand.trim().is_empty()
            || listing.name.trim().is_empty()
            || listing.quantity.trim().is_empty()
            || listing.category_id.trim().is_empty()
            || listing.price <= Decimal::ZERO
        {
            warn!(
                name = %listing.name,
                brand = %listing.brand,
                price = %listing.price,
                "skipping listing with missing or invalid required fields"
            );
            continue;
        }

        let base = base_name(&listing.name);
        let key = group_key(&listing.brand, &base);

        let idx = *index_by_key.entry(key.clone()).or_insert_with(|| {
            let description = listing.description.clone().unwrap_or_else(|| {
                format!(
                    "Premium {} by {}. High quality supplements for your fitness goals.",
                    base, listing.brand
                )
            });
            let image_urls = if listing.image_urls.is_empty() {
                vec![placeholder_image(&key)]
            } else {
                listing.image_urls.clone()
            };

            products.push(GroupedProduct {
                id: key.clone(),
                name: base.clone(),
                brand: listing.brand.clone(),
                description,
                category_id: listing.category_id.clone(),
                image_urls,
                is_bestseller: listing.is_bestseller,
                product_type: product_type_label(&listing.product_type),
                variants: Vec::new(),
            });
            products.len() - 1
        });

        let product = &mut products[idx];
        let position = product.variants.len() as i32;
        product.variants.push(GroupedVariant {
            quantity_label: listing.quantity.clone(),
            flavor: listing.flavors.first().cloned(),
            price: listing.price,
            mrp: listing.mrp.unwrap_or_else(|| default_mrp(listing.price)),
            discount: listing.discount.unwrap_or(DEFAULT_DISCOUNT),
            tax: listing.tax.unwrap_or(DEFAULT_TAX),
            stock: listing.stock,
            sku: variant_sku(&key, &listing.quantity, position),
            position,
        });
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn listing(brand: &str, name: &str, quantity: &str, price: Decimal) -> RawListing {
        RawListing {
            brand: brand.into(),
            name: name.into(),
            category_id: "protein".into(),
            product_type: "Whey Protein".into(),
            quantity: quantity.into(),
            price,
            stock: 10,
            ..RawListing::default()
        }
    }

    #[test_case("Gold Standard Whey 1KG", "Gold Standard Whey"; "spaced kg")]
    #[test_case("Gold Standard Whey 1KG Chocolate", "Gold Standard Whey"; "kg with flavor tail")]
    #[test_case("Creatine Monohydrate 300GM", "Creatine Monohydrate"; "composite gm")]
    #[test_case("Fish Oil 60 Softgels", "Fish Oil"; "softgels")]
    #[test_case("Multivitamin 90 Tabs", "Multivitamin"; "tabs")]
    #[test_case("Omega 3 60 Caps", "Omega 3"; "caps")]
    #[test_case("Pre Workout 30 Srv Fruit Punch", "Pre Workout"; "servings")]
    #[test_case("Plain Name Without Units", "Plain Name Without Units"; "no suffix")]
    fn base_name_strips_unit_suffixes(input: &str, expected: &str) {
        assert_eq!(base_name(input), expected);
    }

    #[test]
    fn group_key_is_lowercase_alphanumeric() {
        assert_eq!(
            group_key("ON", "Gold Standard Whey"),
            "on_gold_standard_whey"
        );
        assert_eq!(group_key("MB's", "Raw+"), "mb_s_raw_");
    }

    #[test]
    fn same_brand_and_base_name_collapse_into_one_product() {
        let listings = vec![
            listing("ON", "Gold Standard 1KG", "1KG", dec!(3000)),
            listing("ON", "Gold Standard 2KG", "2KG", dec!(5500)),
        ];

        let products = group_listings(&listings);
        assert_eq!(products.len(), 1);

        let product = &products[0];
        assert_eq!(product.name, "Gold Standard");
        assert_eq!(product.brand, "ON");
        assert_eq!(product.variants.len(), 2);
        assert_eq!(product.variants[0].price, dec!(3000));
        assert_eq!(product.variants[1].price, dec!(5500));
    }

    #[test]
    fn distinct_brand_or_base_name_never_merge() {
        let listings = vec![
            listing("ON", "Gold Standard 1KG", "1KG", dec!(3000)),
            listing("MuscleBlaze", "Gold Standard 1KG", "1KG", dec!(2000)),
            listing("ON", "Serious Mass 3KG", "3KG", dec!(4000)),
        ];

        let products = group_listings(&listings);
        assert_eq!(products.len(), 3);
    }

    #[test]
    fn products_and_variants_keep_encounter_order() {
        let listings = vec![
            listing("B", "Beta 1KG", "1KG", dec!(100)),
            listing("A", "Alpha 1KG", "1KG", dec!(200)),
            listing("B", "Beta 2KG", "2KG", dec!(150)),
        ];

        let products = group_listings(&listings);
        assert_eq!(products[0].id, "b_beta");
        assert_eq!(products[1].id, "a_alpha");
        assert_eq!(products[0].variants[0].quantity_label, "1KG");
        assert_eq!(products[0].variants[1].quantity_label, "2KG");
    }

    #[test]
    fn grouping_is_idempotent() {
        let listings = vec![
            listing("ON", "Gold Standard 1KG", "1KG", dec!(3000)),
            listing("ON", "Gold Standard 2KG", "2KG", dec!(5500)),
            listing("GNC", "Fish Oil 60 Softgels", "60 Softgels", dec!(800)),
        ];

        let first = group_listings(&listings);
        let second = group_listings(&listings);
        assert_eq!(first, second);
    }

    #[test]
    fn defaults_applied_to_missing_pricing_fields() {
        let mut entry = listing("ON", "Gold Standard 1KG", "1KG", dec!(3000));
        entry.mrp = None;
        entry.discount = None;
        entry.tax = None;

        let products = group_listings(&[entry]);
        let variant = &products[0].variants[0];
        assert_eq!(variant.mrp, dec!(3750));
        assert_eq!(variant.discount, dec!(20));
        assert_eq!(variant.tax, dec!(18));
    }

    #[test]
    fn default_mrp_rounds_half_up() {
        // 1234 * 1.25 = 1542.5 rounds away from zero.
        assert_eq!(default_mrp(dec!(1234)), dec!(1543));
        assert_eq!(default_mrp(dec!(3000)), dec!(3750));
    }

    #[test]
    fn explicit_pricing_fields_win_over_defaults() {
        let mut entry = listing("ON", "Gold Standard 1KG", "1KG", dec!(3000));
        entry.mrp = Some(dec!(4200));
        entry.discount = Some(dec!(10));
        entry.tax = Some(dec!(5));

        let products = group_listings(&[entry]);
        let variant = &products[0].variants[0];
        assert_eq!(variant.mrp, dec!(4200));
        assert_eq!(variant.discount, dec!(10));
        assert_eq!(variant.tax, dec!(5));
    }

    #[test]
    fn first_flavor_wins() {
        let mut entry = listing("ON", "Gold Standard 1KG", "1KG", dec!(3000));
        entry.flavors = vec!["Chocolate".into(), "Vanilla".into()];

        let products = group_listings(&[entry]);
        assert_eq!(
            products[0].variants[0].flavor.as_deref(),
            Some("Chocolate")
        );
    }

    #[test]
    fn skus_are_unique_within_a_product() {
        let listings = vec![
            listing("ON", "Gold Standard 1KG", "1 KG", dec!(3000)),
            listing("ON", "Gold Standard 2KG", "2 KG", dec!(5500)),
        ];

        let products = group_listings(&listings);
        let skus: Vec<_> = products[0].variants.iter().map(|v| &v.sku).collect();
        assert_eq!(skus, vec!["on_gold_standard_1kg_0", "on_gold_standard_2kg_1"]);
    }

    #[test]
    fn listings_without_brand_or_name_are_skipped() {
        let mut missing_brand = listing("", "Gold Standard 1KG", "1KG", dec!(3000));
        missing_brand.brand = "  ".into();
        let missing_name = listing("ON", "", "1KG", dec!(3000));
        let good = listing("ON", "Gold Standard 1KG", "1KG", dec!(3000));

        let products = group_listings(&[missing_brand, missing_name, good]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].variants.len(), 1);
    }

    #[test]
    fn listings_with_missing_or_invalid_fields_are_skipped() {
        let no_price = listing("ON", "Gold Standard 1KG", "1KG", dec!(0));
        let negative_price = listing("ON", "Serious Mass 3KG", "3KG", dec!(-1));
        let blank_quantity = listing("ON", "Opti-Men 90 Tabs", "  ", dec!(900));
        let mut blank_category = listing("ON", "Fish Oil 60 Softgels", "60 Softgels", dec!(800));
        blank_category.category_id = "  ".into();
        let good = listing("ON", "Gold Standard 1KG", "1KG", dec!(3000));

        let products = group_listings(&[
            no_price,
            negative_price,
            blank_quantity,
            blank_category,
            good,
        ]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].variants.len(), 1);
        assert_eq!(products[0].variants[0].price, dec!(3000));
    }

    #[test]
    fn decoded_listing_without_price_never_becomes_purchasable() {
        // A sparse row decodes (absent fields default) but must not survive
        // grouping as a zero-priced variant.
        let sparse: RawListing = serde_json::from_str(
            r#"{"brand": "ON", "name": "Gold Standard 1KG", "quantity": "1KG"}"#,
        )
        .unwrap();
        assert_eq!(sparse.price, Decimal::ZERO);

        let products = group_listings(&[sparse]);
        assert!(products.is_empty());
    }

    #[test]
    fn missing_images_get_deterministic_placeholder() {
        let entry = listing("ON", "Gold Standard 1KG", "1KG", dec!(3000));
        let first = group_listings(std::slice::from_ref(&entry));
        let second = group_listings(std::slice::from_ref(&entry));
        assert_eq!(first[0].image_urls, second[0].image_urls);
        assert!(first[0].image_urls[0].starts_with("/p"));
    }

    proptest::proptest! {
        #[test]
        fn base_name_is_idempotent(name in "[ -~]{0,40}") {
            let once = base_name(&name);
            proptest::prop_assert_eq!(base_name(&once), once);
        }

        #[test]
        fn group_key_alphabet_is_closed(brand in "[ -~]{0,20}", base in "[ -~]{0,20}") {
            let key = group_key(&brand, &base);
            proptest::prop_assert!(key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }
    }

    #[test]
    fn shared_truncated_base_names_merge_silently() {
        // Known heuristic limitation: different products that strip to the
        // same brand + base name collapse into one entry.
        let listings = vec![
            listing("ON", "Isolate 1KG", "1KG", dec!(4000)),
            listing("ON", "Isolate 2KG Zero Carb", "2KG", dec!(7000)),
        ];

        let products = group_listings(&listings);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].variants.len(), 2);
    }
}
