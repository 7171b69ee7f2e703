use actix_web::{get, web, HttpResponse};

use crate::services::TaskRegistry;

#[get("/progress")]
async fn progress(registry: web::Data<TaskRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(registry.progress().await)
}
