use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::dal::business_db;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BusinessQuery {
    search_term: String,
}

#[get("/businesses")]
async fn businesses(pool: web::Data<PgPool>, query: web::Query<BusinessQuery>) -> HttpResponse {
    match business_db::get_listings_for_term(&pool, query.search_term.trim()).await {
        Ok(listings) => HttpResponse::Ok().json(listings),
        Err(e) => {
            log::error!(
                "Error reading listings for '{}' from db: {:?}",
                query.search_term,
                e
            );
            HttpResponse::InternalServerError().body("Could not read listings")
        }
    }
}
