use actix_web::{get, web, HttpResponse};
use askama::Template;
use sqlx::PgPool;

use crate::{
    dal::progress_db::{self, ProgressRow},
    services::{TaskProgress, TaskRegistry},
};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    tasks: Vec<TaskProgress>,
    stored: Vec<ProgressRow>,
}

#[get("/dashboard")]
async fn dashboard(registry: web::Data<TaskRegistry>, pool: web::Data<PgPool>) -> HttpResponse {
    let tasks = registry.progress().await;
    let stored = progress_db::get_all(&pool).await.unwrap_or_else(|e| {
        log::error!("Error reading search progress from db: {:?}", e);
        vec![]
    });

    match (DashboardTemplate { tasks, stored }).render() {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(e) => {
            log::error!("Failed to render dashboard: {:?}", e);
            HttpResponse::InternalServerError().body("Could not render dashboard")
        }
    }
}
