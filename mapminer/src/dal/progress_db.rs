use sqlx::{postgres::PgQueryResult, PgPool};

pub struct ProgressRow {
    pub search_term: String,
    pub emitted_count: i32,
}

/// Returns the persisted emitted count, creating the row at zero if missing.
pub async fn get_or_init(pool: &PgPool, search_term: &str) -> Result<i32, sqlx::Error> {
    sqlx::query(
        r"
        insert into search_progress
            (search_term, emitted_count)
        values
            ($1, 0)
        on conflict (search_term) do nothing
        ",
    )
    .bind(search_term)
    .execute(pool)
    .await?;

    sqlx::query_scalar::<_, i32>(
        r"
        select
            emitted_count
        from
            search_progress
        where
            search_term = $1
        ",
    )
    .bind(search_term)
    .fetch_one(pool)
    .await
}

pub async fn increment(pool: &PgPool, search_term: &str) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        insert into search_progress
            (search_term, emitted_count)
        values
            ($1, 1)
        on conflict (search_term) do update set
            emitted_count = search_progress.emitted_count + 1,
            updated_at = now()
        ",
    )
    .bind(search_term)
    .execute(pool)
    .await
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<ProgressRow>, sqlx::Error> {
    let rows: Vec<(String, i32)> = sqlx::query_as(
        r"
        select
            search_term,
            emitted_count
        from
            search_progress
        order by updated_at desc
        ",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(search_term, emitted_count)| ProgressRow {
            search_term,
            emitted_count,
        })
        .collect())
}
