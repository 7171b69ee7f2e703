use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    configuration::ScrapeSettings,
    domain::completeness::Requirements,
    services::{normalize_terms, register_search_terms, ListRequestSender, TaskRegistry},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeBody {
    search_terms: Vec<String>,
    target_count_per_term: Option<u32>,
    require_phone: Option<bool>,
    require_website: Option<bool>,
}

impl ScrapeBody {
    /// Target and requirements, falling back to the configured ones.
    fn resolve(&self, settings: &ScrapeSettings) -> Result<(u32, Requirements), String> {
        let target = self
            .target_count_per_term
            .unwrap_or(settings.target_count_per_term);
        if target == 0 {
            return Err("targetCountPerTerm must be greater than 0".to_string());
        }
        if normalize_terms(&self.search_terms).is_empty() {
            return Err("searchTerms must contain at least one non-empty term".to_string());
        }

        let requirements = Requirements {
            phone: self.require_phone.unwrap_or(settings.require_phone),
            website: self.require_website.unwrap_or(settings.require_website),
        };
        Ok((target, requirements))
    }
}

#[post("/scrape")]
async fn scrape(
    body: web::Json<ScrapeBody>,
    pool: web::Data<PgPool>,
    registry: web::Data<TaskRegistry>,
    list_request_sender: web::Data<ListRequestSender>,
    settings: web::Data<ScrapeSettings>,
) -> HttpResponse {
    let (target, requirements) = match body.resolve(&settings) {
        Ok(resolved) => resolved,
        Err(message) => return HttpResponse::BadRequest().body(message),
    };

    let queued = register_search_terms(
        &pool,
        &registry,
        &list_request_sender.sender,
        &body.search_terms,
        target,
        requirements,
    )
    .await;

    HttpResponse::Ok().json(queued)
}
