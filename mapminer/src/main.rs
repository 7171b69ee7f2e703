use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_web::web;
use env_logger::Env;
use mapminer::{
    configuration::get_configuration,
    domain::completeness::Requirements,
    services::{
        data_persistance_handler, detail_scraper_handler, list_scraper_handler,
        register_search_terms, CrawlContext, DetailRequest, DiagnosticsSink, DroidPool,
        ListRequest, ListRequestSender, PersistantData, RecordSink, TaskRegistry,
    },
    startup::run,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");
    if let Err(e) = configuration.scrape.validate() {
        panic!("Invalid scrape configuration: {}", e);
    }

    let pool_options = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(15 * 60)) // 15 minutes
        .max_lifetime(None);

    let connection_pool = pool_options.connect_lazy_with(configuration.database.with_db());
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to run database migrations.");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;

    let (persistant_data_sender, persistant_data_receiver) =
        mpsc::unbounded_channel::<PersistantData>();
    let (list_sender, list_receiver) = mpsc::unbounded_channel::<ListRequest>();
    let (detail_sender, detail_receiver) = mpsc::unbounded_channel::<DetailRequest>();

    let droids = DroidPool::new(
        configuration.webdriver.clone(),
        configuration.crawler.clone(),
    );
    droids.warm_up().await;

    let context = Arc::new(CrawlContext {
        droids,
        scrape: configuration.scrape.clone(),
        crawler: configuration.crawler.clone(),
        sink: RecordSink {
            sender: persistant_data_sender.clone(),
        },
        diagnostics: DiagnosticsSink {
            sender: persistant_data_sender,
        },
    });

    // Spawn backgound tasks
    let pool_clone = connection_pool.clone();
    tokio::spawn(async move { data_persistance_handler(persistant_data_receiver, pool_clone).await });

    let list_clone = list_sender.clone();
    let detail_clone = detail_sender.clone();
    let context_clone = context.clone();
    tokio::spawn(async move {
        list_scraper_handler(list_receiver, list_clone, detail_clone, context_clone).await
    });

    tokio::spawn(async move { detail_scraper_handler(detail_receiver, detail_sender, context).await });

    let registry = web::Data::new(TaskRegistry::default());
    let scrape = &configuration.scrape;
    match scrape.search_terms.is_empty() {
        true => log::warn!("No search terms configured, waiting for POST /scrape"),
        false => {
            let queued = register_search_terms(
                &connection_pool,
                &registry,
                &list_sender,
                &scrape.search_terms,
                scrape.target_count_per_term,
                Requirements {
                    phone: scrape.require_phone,
                    website: scrape.require_website,
                },
            )
            .await;
            log::info!("Queued {} configured search terms: {:?}", queued.len(), queued);
        }
    }

    run(
        listener,
        connection_pool,
        registry,
        ListRequestSender {
            sender: list_sender,
        },
        configuration.scrape,
    )?
    .await
}
