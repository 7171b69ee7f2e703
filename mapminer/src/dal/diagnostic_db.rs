use sqlx::{postgres::PgQueryResult, PgPool};

use crate::services::DiagnosticSnapshot;

pub async fn insert_snapshot(
    pool: &PgPool,
    snapshot: &DiagnosticSnapshot,
) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        insert into diagnostic_snapshot
            (label, page_title, page_url, screenshot, created_at)
        values
            ($1, $2, $3, $4, $5)
        ",
    )
    .bind(&snapshot.label)
    .bind(&snapshot.page.title)
    .bind(&snapshot.page.url)
    .bind(&snapshot.page.screenshot)
    .bind(snapshot.captured_at)
    .execute(pool)
    .await
}
