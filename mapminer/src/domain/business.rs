use serde::{Deserialize, Serialize};

/// A place card as seen on the results feed or the detail view.
///
/// `identity_key` is the canonical detail-view URL and never changes after the
/// record is built. Every other field may still be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub identity_key: String,
    pub name: String,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub category: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl BusinessRecord {
    pub fn new(identity_key: impl Into<String>, name: impl Into<String>) -> Self {
        BusinessRecord {
            identity_key: identity_key.into(),
            name: name.into(),
            address: None,
            rating: None,
            review_count: None,
            category: None,
            phone: None,
            website: None,
        }
    }

    /// True once every field the detail view can provide is populated.
    pub fn has_detail_fields(&self) -> bool {
        self.phone.is_some()
            && self.website.is_some()
            && self.rating.is_some()
            && self.review_count.is_some()
    }
}
