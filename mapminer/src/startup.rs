use std::net::TcpListener;

use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};
use sqlx::PgPool;

use crate::{
    configuration::ScrapeSettings,
    routes::{business_route, dashboard_route, default_route, progress_route, scrape_route},
    services::{ListRequestSender, TaskRegistry},
};

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    registry: Data<TaskRegistry>,
    list_request_sender: ListRequestSender,
    scrape_settings: ScrapeSettings,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let list_request_sender = web::Data::new(list_request_sender);
    let scrape_settings = web::Data::new(scrape_settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(scrape_route::scrape)
            .service(progress_route::progress)
            .service(business_route::businesses)
            .service(web::scope("/app").service(dashboard_route::dashboard))
            .app_data(db_pool.clone())
            .app_data(registry.clone())
            .app_data(list_request_sender.clone())
            .app_data(scrape_settings.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
