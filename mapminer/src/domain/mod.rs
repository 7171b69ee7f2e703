pub mod business;
pub mod completeness;
pub mod label;
pub mod listing;
pub mod search_task;
