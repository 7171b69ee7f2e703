use serde::{Deserialize, Serialize};

use super::business::BusinessRecord;

/// Which fields a record must carry before it can skip the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub phone: bool,
    pub website: bool,
}

pub enum Route {
    Emit(BusinessRecord),
    Enrich(BusinessRecord),
}

impl Requirements {
    pub fn is_complete(&self, record: &BusinessRecord) -> bool {
        (!self.phone || record.phone.is_some()) && (!self.website || record.website.is_some())
    }

    pub fn route(&self, record: BusinessRecord) -> Route {
        match self.is_complete(&record) {
            true => Route::Emit(record),
            false => Route::Enrich(record),
        }
    }
}
