pub mod business_db;
pub mod diagnostic_db;
pub mod progress_db;
