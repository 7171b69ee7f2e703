pub mod app;
pub mod business_route;
pub mod default_route;
pub mod progress_route;
pub mod scrape_route;

pub use app::*;
