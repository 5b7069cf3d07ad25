//! Bulk catalog payload parser.
//!
//! The load file carries two JSON arrays separated by at least one blank
//! line: categories first, raw listings second. Rows that fail to decode
//! are logged and dropped so one bad entry never sinks a whole reload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::grouper::RawListing;
use crate::errors::ServiceError;

static SECTION_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// One category row from the bulk payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Splits and decodes the two-section bulk payload.
///
/// Fails only on structural problems (missing section, section is not a
/// JSON array); individual malformed rows are skipped with a warning.
pub fn parse_bulk_payload(
    payload: &str,
) -> Result<(Vec<CategoryRecord>, Vec<RawListing>), ServiceError> {
    let mut sections = SECTION_SEPARATOR.splitn(payload.trim(), 2);
    let category_section = sections.next().unwrap_or("");
    let listing_section = sections.next().ok_or_else(|| {
        ServiceError::ValidationError(
            "bulk payload must contain two JSON arrays separated by a blank line".into(),
        )
    })?;

    let categories = decode_section::<CategoryRecord>(category_section, "category")?;
    let listings = decode_section::<RawListing>(listing_section, "listing")?;

    Ok((categories, listings))
}

fn decode_section<T: serde::de::DeserializeOwned>(
    section: &str,
    kind: &str,
) -> Result<Vec<T>, ServiceError> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(section).map_err(|e| {
        ServiceError::ValidationError(format!("{} section is not a JSON array: {}", kind, e))
    })?;

    let mut decoded = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<T>(row) {
            Ok(item) => decoded.push(item),
            Err(e) => warn!(kind, index = i, error = %e, "skipping undecodable bulk row"),
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    const PAYLOAD: &str = r#"[
  {"id": "protein", "name": "Protein", "imageUrl": "/cat-protein.png"},
  {"id": "vitamins", "name": "Vitamins"}
]

[
  {"brand": "ON", "name": "Gold Standard Whey 1KG", "categoryId": "protein",
   "quantity": "1KG", "price": 3000, "stock": 12},
  {"brand": "ON", "name": "Gold Standard Whey 2KG", "categoryId": "protein",
   "quantity": "2KG", "price": 5500, "stock": 4}
]"#;

    #[test]
    fn parses_both_sections() {
        let (categories, listings) = parse_bulk_payload(PAYLOAD).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].id, "protein");
        assert_eq!(categories[1].image_url, None);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].price, dec!(3000));
    }

    #[test]
    fn multiple_blank_lines_still_split_once() {
        let payload = "[]\n\n\n  \n[{\"brand\": \"ON\", \"name\": \"X 1KG\", \"price\": 1}]";
        let (categories, listings) = parse_bulk_payload(payload).unwrap();
        assert!(categories.is_empty());
        assert_eq!(listings.len(), 1);
    }

    #[test]
    fn missing_second_section_is_rejected() {
        let err = parse_bulk_payload("[]").unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn non_array_section_is_rejected() {
        let err = parse_bulk_payload("{\"id\": \"x\"}\n\n[]").unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn undecodable_rows_are_skipped() {
        let payload = r#"[{"id": "protein", "name": "Protein"}, {"name": "no id"}]

[{"brand": "ON", "name": "X 1KG", "price": 1}, {"brand": "ON", "name": "Y", "price": "not a number"}]"#;
        let (categories, listings) = parse_bulk_payload(payload).unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "X 1KG");
    }
}
