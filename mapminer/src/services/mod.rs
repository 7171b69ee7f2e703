pub mod crawl_context;
pub mod data_persistance;
pub mod detail_enricher;
pub mod detail_scraper;
pub mod droid;
pub mod list_extractor;
pub mod list_scraper;
pub mod page;
pub mod record_sink;
pub mod retry;
pub mod task_registry;

pub use crawl_context::*;
pub use data_persistance::*;
pub use detail_enricher::*;
pub use detail_scraper::*;
pub use droid::*;
pub use list_extractor::*;
pub use list_scraper::*;
pub use page::{Page, PageDiagnostics};
pub use record_sink::*;
pub use retry::*;
pub use task_registry::*;
