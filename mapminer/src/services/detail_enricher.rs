use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{
    domain::{business::BusinessRecord, label},
    error::ScrapeError,
};

use super::Page;

const PHONE_SELECTORS: [&str; 4] = [
    r#"button[data-item-id*="phone"]"#,
    r#"a[href^="tel:"]"#,
    r#"button[aria-label*="phone" i]"#,
    r#"div[data-section-id="pn0"]"#,
];

const WEBSITE_SELECTORS: [&str; 3] = [
    r#"a[data-item-id="authority"]"#,
    r#"a[href*="http"][data-item-id*="website"]"#,
    r#"a[aria-label*="website" i]"#,
];

static PHONE: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(&PHONE_SELECTORS));
static WEBSITE: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(&WEBSITE_SELECTORS));
static RATING: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[role="img"][aria-label*="star" i]"#).unwrap());
static REVIEWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"button[aria-label*="review" i]"#).unwrap());

fn parse_all(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub dom_timeout: Duration,
    pub settle_delay: Duration,
}

/// Text, else href, else aria-label, whichever is non-empty first.
fn element_label(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<String>();
    if !text.trim().is_empty() {
        return Some(text);
    }
    let value = element.value();
    value
        .attr("href")
        .or_else(|| value.attr("aria-label"))
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

pub fn phone_from(document: &Html) -> Option<String> {
    PHONE.iter().find_map(|selector| {
        document
            .select(selector)
            .next()
            .and_then(element_label)
            .and_then(|text| label::phone_number(&text))
    })
}

pub fn website_from(document: &Html, page_url: &Url) -> Option<String> {
    WEBSITE.iter().find_map(|selector| {
        let href = document.select(selector).next()?.value().attr("href")?;
        let href = page_url.join(href).ok()?;
        match href.scheme().starts_with("http") {
            true => Some(label::unwrap_redirect(&href)),
            false => None,
        }
    })
}

pub fn rating_from(document: &Html) -> Option<f64> {
    document
        .select(&RATING)
        .next()?
        .value()
        .attr("aria-label")
        .and_then(label::leading_decimal)
}

pub fn review_count_from(document: &Html) -> Option<u32> {
    let text = document.select(&REVIEWS).next()?.text().collect::<String>();
    label::leading_integer(&text)
}

/// Fills the fields that are still empty. Populated fields are never touched.
pub fn fill_missing_fields(record: &mut BusinessRecord, document: &Html, page_url: &Url) {
    if record.phone.is_none() {
        record.phone = phone_from(document);
        log::debug!("Phone for {}: {:?}", record.name, record.phone);
    }
    if record.website.is_none() {
        record.website = website_from(document, page_url);
        log::debug!("Website for {}: {:?}", record.name, record.website);
    }
    if record.rating.is_none() {
        record.rating = rating_from(document);
    }
    if record.review_count.is_none() {
        record.review_count = review_count_from(document);
    }
}

fn fill_from_source(record: &mut BusinessRecord, source: &str, page_url: &Url) {
    let document = Html::parse_document(source);
    fill_missing_fields(record, &document, page_url);
}

async fn try_enrich<P: Page + ?Sized>(
    page: &P,
    record: &mut BusinessRecord,
    options: &EnrichOptions,
) -> Result<(), ScrapeError> {
    let page_url = Url::parse(&record.identity_key).map_err(|e| ScrapeError::Enrichment {
        identity_key: record.identity_key.clone(),
        source: e.into(),
    })?;

    if let Err(e) = page.wait_until_settled(options.dom_timeout).await {
        log::warn!("Detail page for {} did not settle: {:?}", record.name, e);
    }
    tokio::time::sleep(options.settle_delay).await;

    let source = page
        .content()
        .await
        .map_err(|source| ScrapeError::Enrichment {
            identity_key: record.identity_key.clone(),
            source,
        })?;
    fill_from_source(record, &source, &page_url);
    Ok(())
}

/// Fills what the detail view offers. Never fails: on error the record comes
/// back with whatever was filled so far.
pub async fn enrich<P: Page + ?Sized>(
    page: &P,
    mut record: BusinessRecord,
    options: &EnrichOptions,
) -> BusinessRecord {
    if record.has_detail_fields() {
        return record;
    }

    if let Err(e) = try_enrich(page, &mut record, options).await {
        log::warn!("{}", e);
    }
    record
}
