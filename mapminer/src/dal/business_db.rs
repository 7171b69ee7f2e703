use chrono::{DateTime, Utc};
use sqlx::{postgres::PgQueryResult, PgPool};

use crate::domain::listing::BusinessListing;

pub async fn insert_listing(
    pool: &PgPool,
    listing: &BusinessListing,
) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        insert into business_listing
            (business_name, address, website, phone, rating, review_count,
             category, source_url, search_term, scraped_at)
        values
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        on conflict (search_term, source_url) do nothing
        ",
    )
    .bind(&listing.business_name)
    .bind(&listing.address)
    .bind(&listing.website)
    .bind(&listing.phone)
    .bind(listing.rating)
    .bind(listing.review_count)
    .bind(&listing.category)
    .bind(&listing.source_url)
    .bind(&listing.search_term)
    .bind(listing.scraped_at)
    .execute(pool)
    .await
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    business_name: String,
    address: Option<String>,
    website: Option<String>,
    phone: Option<String>,
    rating: Option<f64>,
    review_count: Option<i32>,
    category: Option<String>,
    source_url: String,
    search_term: String,
    scraped_at: DateTime<Utc>,
}

impl From<ListingRow> for BusinessListing {
    fn from(row: ListingRow) -> Self {
        BusinessListing {
            business_name: row.business_name,
            address: row.address,
            website: row.website,
            phone: row.phone,
            rating: row.rating,
            review_count: row.review_count,
            category: row.category,
            source_url: row.source_url,
            search_term: row.search_term,
            scraped_at: row.scraped_at,
        }
    }
}

pub async fn get_listings_for_term(
    pool: &PgPool,
    search_term: &str,
) -> Result<Vec<BusinessListing>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ListingRow>(
        r"
        select
            business_name,
            address,
            website,
            phone,
            rating,
            review_count,
            category,
            source_url,
            search_term,
            scraped_at
        from
            business_listing
        where
            search_term = $1
        order by scraped_at
        ",
    )
    .bind(search_term)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(BusinessListing::from).collect())
}

pub async fn get_source_urls_for_term(
    pool: &PgPool,
    search_term: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r"
        select
            source_url
        from
            business_listing
        where
            search_term = $1
        ",
    )
    .bind(search_term)
    .fetch_all(pool)
    .await
}
