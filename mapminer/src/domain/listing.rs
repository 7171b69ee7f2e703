use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::business::BusinessRecord;

/// The normalized record handed to the dataset, one per accepted identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessListing {
    pub business_name: String,
    pub address: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub category: Option<String>,
    pub source_url: String,
    pub search_term: String,
    pub scraped_at: DateTime<Utc>,
}

impl BusinessListing {
    pub fn from_record(record: BusinessRecord, search_term: &str, scraped_at: DateTime<Utc>) -> Self {
        BusinessListing {
            business_name: record.name.trim().to_string(),
            address: non_blank(record.address),
            website: non_blank(record.website),
            phone: non_blank(record.phone),
            rating: record.rating,
            review_count: record.review_count.and_then(|n| i32::try_from(n).ok()),
            category: non_blank(record.category),
            source_url: record.identity_key,
            search_term: search_term.to_string(),
            scraped_at,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::BusinessListing;
    use crate::domain::business::BusinessRecord;

    #[test]
    fn blank_fields_become_null_and_names_are_camel_case() {
        let mut record = BusinessRecord::new(
            "https://www.google.com/maps/place/Joe's",
            " Joe's Pizza ",
        );
        record.address = Some("   ".to_string());
        record.category = Some("Pizza restaurant".to_string());
        record.review_count = Some(87);

        let scraped_at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let listing = BusinessListing::from_record(record, "pizza in nyc", scraped_at);
        let json = serde_json::to_value(&listing).unwrap();

        assert_eq!(json["businessName"], "Joe's Pizza");
        assert!(json["address"].is_null());
        assert!(json["phone"].is_null());
        assert!(json["website"].is_null());
        assert!(json["rating"].is_null());
        assert_eq!(json["reviewCount"], 87);
        assert_eq!(json["category"], "Pizza restaurant");
        assert_eq!(json["sourceUrl"], "https://www.google.com/maps/place/Joe's");
        assert_eq!(json["searchTerm"], "pizza in nyc");
        assert_eq!(json["scrapedAt"], "2026-10-19T12:00:00Z");
    }
}
