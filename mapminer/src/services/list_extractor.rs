use std::{collections::HashSet, time::Duration};

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{
    configuration::{CrawlerSettings, ScrapeSettings},
    domain::{business::BusinessRecord, label},
    error::ScrapeError,
};

use super::{DiagnosticsSink, Page};

/// Candidates for the scrollable results feed, most specific layout first.
pub const CONTAINER_SELECTORS: [&str; 4] = [
    r#"div[role="feed"]"#,
    r#"div[role="main"]"#,
    "div.m6QErb.DxyBCb.kA9KIf.dS8AEf",
    r#"[aria-label*="Results"]"#,
];

const LISTING_LINK: &str = r#"a[href*="/maps/place/"]"#;
const NAME_SELECTORS: [&str; 4] = [
    r#"div[role="heading"]"#,
    "[aria-label]",
    "div.fontHeadlineSmall",
    "div.fontHeadlineLarge",
];
const CARD_ASCENT_LIMIT: usize = 4;
const CARD_CLASS: &str = "Nv2PK";
const DEGRADED_ANCHOR_LIMIT: usize = 20;
const SHORT_TEXT_LEN: usize = 50;
const STREET_TOKENS: [&str; 5] = ["St", "Ave", "Rd", "Blvd", ","];
const CATEGORY_SEPARATOR: char = '·';

static LISTING_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(LISTING_LINK).unwrap());
static NAME_SELECTOR_LIST: Lazy<Vec<Selector>> = Lazy::new(|| {
    NAME_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static STAR_LABEL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[role="img"][aria-label*="star" i]"#).unwrap());
static DIV_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());

/// A parsed snapshot of the results page.
pub struct ListingDocument {
    pub html: Html,
    pub base: Url,
    pub container: &'static str,
}

impl ListingDocument {
    pub fn parse(source: &str, base: &Url, container: &'static str) -> Self {
        ListingDocument {
            html: Html::parse_document(source),
            base: base.clone(),
            container,
        }
    }
}

pub type Strategy = fn(&ListingDocument) -> Vec<BusinessRecord>;

/// Tried in order, the first non-empty result wins.
pub const STRATEGIES: [(&str, Strategy); 2] = [
    ("feed cards", feed_card_strategy),
    ("bare links", bare_link_strategy),
];

pub fn run_strategies(document: &ListingDocument) -> Vec<BusinessRecord> {
    for (name, strategy) in STRATEGIES.iter() {
        let candidates = strategy(document);
        log::debug!("Strategy '{}' found {} businesses", name, candidates.len());
        if !candidates.is_empty() {
            return candidates;
        }
    }
    vec![]
}

// Keeps the parsed document out of the async state machine.
fn extract_candidates(source: &str, base: &Url, container: &'static str) -> Vec<BusinessRecord> {
    run_strategies(&ListingDocument::parse(source, base, container))
}

/// Reads every place card inside the results feed.
pub fn feed_card_strategy(document: &ListingDocument) -> Vec<BusinessRecord> {
    let css = format!("{} {}", document.container, LISTING_LINK);
    let selector = match Selector::parse(&css) {
        Ok(selector) => selector,
        Err(e) => {
            log::warn!("Invalid feed selector {}: {:?}", css, e);
            return vec![];
        }
    };

    document
        .html
        .select(&selector)
        .filter_map(|anchor| card_record(document, anchor))
        .collect()
}

/// Only the listing links, named by their aria-label.
pub fn bare_link_strategy(document: &ListingDocument) -> Vec<BusinessRecord> {
    document
        .html
        .select(&LISTING_LINK_SELECTOR)
        .take(DEGRADED_ANCHOR_LIMIT)
        .filter_map(|anchor| {
            let name = anchor.value().attr("aria-label")?.trim();
            if name.chars().count() < 2 {
                return None;
            }
            let identity_key = identity_key(&document.base, anchor.value().attr("href")?)?;
            Some(BusinessRecord::new(identity_key, name))
        })
        .collect()
}

fn card_record(document: &ListingDocument, anchor: ElementRef) -> Option<BusinessRecord> {
    let card = enclosing_card(anchor)?;

    let name = NAME_SELECTOR_LIST
        .iter()
        .find_map(|selector| {
            card.select(selector)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
        .or_else(|| {
            anchor
                .value()
                .attr("aria-label")
                .map(|label| label.trim().to_string())
                .filter(|label| !label.is_empty())
        })?;

    let identity_key = identity_key(&document.base, anchor.value().attr("href")?)?;
    let mut record = BusinessRecord::new(identity_key, name);

    if let Some(star_label) = card
        .select(&STAR_LABEL_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("aria-label"))
    {
        record.rating = label::star_rating(star_label);
        record.review_count = label::review_count(star_label);
    }

    for div in card.select(&DIV_SELECTOR).filter(|div| is_leaf_div(*div)) {
        let text = element_text(div);
        if text.is_empty() || text == record.name {
            continue;
        }
        let has_digit = text.chars().any(|c| c.is_ascii_digit());

        if record.category.is_none()
            && (text.contains(CATEGORY_SEPARATOR) || text.chars().count() < SHORT_TEXT_LEN)
            && !has_digit
        {
            record.category = text
                .split(CATEGORY_SEPARATOR)
                .next()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
        }

        if record.address.is_none() && has_digit && STREET_TOKENS.iter().any(|t| text.contains(t)) {
            record.address = Some(text);
        }
    }

    Some(record)
}

/// Nearest ancestor that looks like a place card, else the fourth one up.
fn enclosing_card(anchor: ElementRef) -> Option<ElementRef> {
    let mut card = None;
    for ancestor in anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(CARD_ASCENT_LIMIT)
    {
        card = Some(ancestor);
        let element = ancestor.value();
        if element.attr("role") == Some("article") || element.classes().any(|c| c == CARD_CLASS) {
            break;
        }
    }
    card
}

/// Wrapper divs repeat their children's text, only leaves carry one field.
fn is_leaf_div(div: ElementRef) -> bool {
    !div.children()
        .filter_map(ElementRef::wrap)
        .any(|child| child.value().name() == "div")
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Canonical detail-view URL for a listing link.
pub fn identity_key(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    Converged,
    AttemptCeiling,
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub records: Vec<BusinessRecord>,
    pub stop_reason: StopReason,
    pub rounds: u32,
}

#[derive(Default)]
struct ScrollState {
    attempt_count: u32,
    no_new_results_streak: u32,
    seen_identity_keys: HashSet<String>,
}

impl ScrollState {
    /// Appends unseen candidates without growing past `target`, returns how many.
    fn merge(
        &mut self,
        candidates: Vec<BusinessRecord>,
        records: &mut Vec<BusinessRecord>,
        target: usize,
    ) -> usize {
        let before = records.len();
        for candidate in candidates {
            if records.len() >= target {
                break;
            }
            if self.seen_identity_keys.insert(candidate.identity_key.clone()) {
                records.push(candidate);
            }
        }
        records.len() - before
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub max_scroll_attempts: u32,
    pub no_new_results_limit: u32,
    pub scroll_delay: Duration,
    pub selector_timeout: Duration,
}

impl ExtractOptions {
    pub fn new(scrape: &ScrapeSettings, crawler: &CrawlerSettings) -> Self {
        ExtractOptions {
            max_scroll_attempts: scrape.max_scroll_attempts,
            no_new_results_limit: scrape.no_new_results_limit,
            scroll_delay: scrape.scroll_delay(),
            selector_timeout: crawler.selector_timeout(),
        }
    }
}

pub async fn locate_results_container<P: Page + ?Sized>(
    page: &P,
    timeout: Duration,
    diagnostics: &DiagnosticsSink,
) -> Result<&'static str, ScrapeError> {
    for selector in CONTAINER_SELECTORS {
        if page.wait_for_selector(selector, timeout).await {
            log::info!("Found results feed with selector: {}", selector);
            return Ok(selector);
        }
        log::debug!("Selector {} not found, trying next", selector);
    }

    let snapshot = page.diagnostics().await;
    let error = ScrapeError::ExtractionUnavailable {
        url: snapshot.url.clone(),
        title: snapshot.title.clone(),
        tried: CONTAINER_SELECTORS.iter().join(", "),
    };
    diagnostics.record("results-feed-missing", snapshot);
    Err(error)
}

/// Scrolls the results feed until `target` listings are collected, the feed
/// stops producing new ones, or the attempt ceiling is hit.
pub async fn extract_listings<P: Page + ?Sized>(
    page: &P,
    base: &Url,
    target: u32,
    options: &ExtractOptions,
    diagnostics: &DiagnosticsSink,
) -> Result<ExtractionOutcome, ScrapeError> {
    let container = locate_results_container(page, options.selector_timeout, diagnostics).await?;
    let target = target as usize;

    let mut state = ScrollState::default();
    let mut records: Vec<BusinessRecord> = Vec::new();
    let mut rounds = 0;

    let stop_reason = loop {
        if state.attempt_count >= options.max_scroll_attempts {
            break StopReason::AttemptCeiling;
        }
        rounds += 1;

        let candidates = match page.content().await {
            Ok(source) => extract_candidates(&source, base, container),
            Err(e) => {
                log::warn!("Could not read results page, counting as empty round: {:?}", e);
                vec![]
            }
        };
        let added = state.merge(candidates, &mut records, target);

        if state.attempt_count == 0 && records.is_empty() {
            log::warn!("First round found 0 businesses, capturing diagnostics");
            diagnostics.record("no-results", page.diagnostics().await);
        }

        if added == 0 {
            state.no_new_results_streak += 1;
            if state.no_new_results_streak >= options.no_new_results_limit {
                log::info!(
                    "No new results after {} rounds, stopping",
                    state.no_new_results_streak
                );
                break StopReason::Converged;
            }
        } else {
            state.no_new_results_streak = 0;
            log::debug!(
                "Extracted {} new businesses (total: {}/{})",
                added,
                records.len(),
                target
            );
        }

        if records.len() >= target {
            log::info!("Reached target of {} businesses", target);
            break StopReason::TargetReached;
        }

        if let Err(e) = page.scroll_by_viewport(container).await {
            log::warn!("Scrolling results feed failed, continuing: {:?}", e);
        }
        tokio::time::sleep(options.scroll_delay).await;
        state.attempt_count += 1;
    };

    records.truncate(target);
    log::info!(
        "Scroll complete: {} businesses after {} scroll attempts ({:?})",
        records.len(),
        state.attempt_count,
        stop_reason
    );

    Ok(ExtractionOutcome {
        records,
        stop_reason,
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use url::Url;

    use super::*;
    use crate::services::{page::fake::FakePage, PersistantData};

    fn base() -> Url {
        Url::parse("https://www.google.com/maps/search/coffee").unwrap()
    }

    fn options(max_scroll_attempts: u32) -> ExtractOptions {
        ExtractOptions {
            max_scroll_attempts,
            no_new_results_limit: 3,
            scroll_delay: Duration::ZERO,
            selector_timeout: Duration::ZERO,
        }
    }

    fn sink() -> (DiagnosticsSink, mpsc::UnboundedReceiver<PersistantData>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (DiagnosticsSink { sender }, receiver)
    }

    fn card(slug: &str, name: &str) -> String {
        format!(
            r#"<div role="article" class="Nv2PK">
                <a class="hfpxzc" aria-label="{name}" href="/maps/place/{slug}/data=!4m7"></a>
                <div class="fontHeadlineSmall">{name}</div>
                <span role="img" aria-label="4.6 stars 1,234 Reviews"></span>
                <div>Coffee shop · $$</div>
                <div>123 Main St, Austin</div>
            </div>"#
        )
    }

    fn feed(cards: &[(&str, &str)]) -> String {
        let body: String = cards.iter().map(|(slug, name)| card(slug, name)).collect();
        format!(r#"<html><body><div role="feed">{body}</div></body></html>"#)
    }

    #[test]
    fn feed_card_fields_are_read() {
        let document = ListingDocument::parse(
            &feed(&[("Blue+Bottle", "Blue Bottle Coffee")]),
            &base(),
            CONTAINER_SELECTORS[0],
        );
        let records = feed_card_strategy(&document);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(
            record.identity_key,
            "https://www.google.com/maps/place/Blue+Bottle/data=!4m7"
        );
        assert_eq!(record.name, "Blue Bottle Coffee");
        assert_eq!(record.rating, Some(4.6));
        assert_eq!(record.review_count, Some(1234));
        assert_eq!(record.category.as_deref(), Some("Coffee shop"));
        assert_eq!(record.address.as_deref(), Some("123 Main St, Austin"));
        assert_eq!(record.phone, None);
        assert_eq!(record.website, None);
    }

    #[test]
    fn nested_wrappers_do_not_swallow_category_and_address() {
        let source = r#"<div role="feed"><div role="article" class="Nv2PK">
            <div class="bfdHYd">
                <a href="/maps/place/Blue+Bottle" aria-label="Blue Bottle"></a>
                <div class="lI9IFe">
                    <div class="fontHeadlineSmall">Blue Bottle</div>
                    <div class="W4Efsd">
                        <div>Coffee shop · $$</div>
                        <div>123 Main St, Austin</div>
                    </div>
                </div>
            </div>
        </div></div>"#;
        let document = ListingDocument::parse(source, &base(), CONTAINER_SELECTORS[0]);
        let records = feed_card_strategy(&document);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Blue Bottle");
        assert_eq!(records[0].category.as_deref(), Some("Coffee shop"));
        assert_eq!(records[0].address.as_deref(), Some("123 Main St, Austin"));
    }

    #[test]
    fn heading_role_wins_over_headline_class() {
        let source = r#"<div role="feed"><div role="article">
            <a href="/maps/place/x" aria-label="Link label"></a>
            <div role="heading">Heading Name</div>
            <div class="fontHeadlineSmall">Headline Name</div>
        </div></div>"#;
        let document = ListingDocument::parse(source, &base(), CONTAINER_SELECTORS[0]);
        let records = feed_card_strategy(&document);

        assert_eq!(records[0].name, "Heading Name");
    }

    #[test]
    fn anchor_label_is_last_name_fallback() {
        let source = r#"<div role="feed"><div role="article">
            <a href="/maps/place/x" aria-label="Only The Link"></a>
        </div></div>"#;
        let document = ListingDocument::parse(source, &base(), CONTAINER_SELECTORS[0]);
        let records = feed_card_strategy(&document);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Only The Link");
    }

    #[test]
    fn bare_links_cap_at_twenty_and_skip_short_labels() {
        let mut anchors: String = (0..25)
            .map(|i| format!(r#"<a href="/maps/place/p{i}" aria-label="Place {i}"></a>"#))
            .collect();
        anchors.insert_str(0, r#"<a href="/maps/place/short" aria-label="X"></a>"#);
        let document = ListingDocument::parse(&anchors, &base(), CONTAINER_SELECTORS[0]);

        let records = bare_link_strategy(&document);

        assert_eq!(records.len(), 19);
        assert!(records.iter().all(|r| r.address.is_none() && r.rating.is_none()));
        assert_eq!(records[0].name, "Place 0");
    }

    #[test]
    fn identity_key_drops_fragment() {
        assert_eq!(
            identity_key(&base(), "/maps/place/A#reviews").as_deref(),
            Some("https://www.google.com/maps/place/A")
        );
    }

    #[tokio::test]
    async fn converges_below_target_after_three_empty_rounds() {
        let page = FakePage::new(vec![
            feed(&[("a", "Alpha"), ("b", "Bravo")]),
            feed(&[("a", "Alpha"), ("b", "Bravo"), ("c", "Charlie")]),
            feed(&[("a", "Alpha"), ("b", "Bravo"), ("c", "Charlie")]),
        ]);
        let (diagnostics, _receiver) = sink();

        let outcome = extract_listings(&page, &base(), 5, &options(50), &diagnostics)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.rounds, 5);
        assert_eq!(page.scroll_count(), 4);

        let keys: HashSet<_> = outcome.records.iter().map(|r| &r.identity_key).collect();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn stops_as_soon_as_target_is_reached() {
        let page = FakePage::new(vec![feed(&[("a", "Alpha"), ("b", "Bravo"), ("c", "Charlie")])]);
        let (diagnostics, _receiver) = sink();

        let outcome = extract_listings(&page, &base(), 2, &options(50), &diagnostics)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(page.scroll_count(), 0);
    }

    #[tokio::test]
    async fn attempt_ceiling_stops_a_feed_that_keeps_growing() {
        let page = FakePage::new(vec![
            feed(&[("a", "Alpha")]),
            feed(&[("b", "Bravo")]),
            feed(&[("c", "Charlie")]),
        ]);
        let (diagnostics, _receiver) = sink();

        let outcome = extract_listings(&page, &base(), 10, &options(2), &diagnostics)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::AttemptCeiling);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn bare_links_fill_in_when_feed_cards_are_missing() {
        let anchors: String = (0..25)
            .map(|i| format!(r#"<a href="/maps/place/p{i}" aria-label="Place {i}"></a>"#))
            .collect();
        let source =
            format!(r#"<html><body><div role="feed"></div><div>{anchors}</div></body></html>"#);
        let page = FakePage::new(vec![source]);
        let (diagnostics, _receiver) = sink();

        let outcome = extract_listings(&page, &base(), 50, &options(50), &diagnostics)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 20);
        assert!(outcome.records.iter().all(|r| r.category.is_none()));
        assert_eq!(outcome.stop_reason, StopReason::Converged);
    }

    #[tokio::test]
    async fn missing_feed_fails_with_diagnostics() {
        let page = FakePage::new(vec![]).without_container();
        let (diagnostics, mut receiver) = sink();

        let result = extract_listings(&page, &base(), 5, &options(50), &diagnostics).await;

        match result {
            Err(ScrapeError::ExtractionUnavailable { title, tried, .. }) => {
                assert_eq!(title, "Google Maps");
                assert!(tried.contains(r#"div[role="feed"]"#));
            }
            other => panic!("expected ExtractionUnavailable, got {:?}", other),
        }
        match receiver.try_recv() {
            Ok(PersistantData::Diagnostics(snapshot)) => {
                assert_eq!(snapshot.label, "results-feed-missing");
                assert!(!snapshot.page.screenshot.is_empty());
            }
            other => panic!("expected diagnostics, got {:?}", other),
        }
        assert_eq!(page.content_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_page_converges_instead_of_failing() {
        let page = FakePage::new(vec![]).failing();
        let (diagnostics, mut receiver) = sink();

        let outcome = extract_listings(&page, &base(), 5, &options(50), &diagnostics)
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert!(matches!(
            receiver.try_recv(),
            Ok(PersistantData::Diagnostics(ref s)) if s.label == "no-results"
        ));
    }

    #[tokio::test]
    async fn failed_scrolls_still_converge() {
        let page = FakePage::new(vec![feed(&[("a", "Alpha"), ("b", "Bravo")])]).failing_scroll();
        let (diagnostics, _receiver) = sink();

        let outcome = extract_listings(&page, &base(), 5, &options(50), &diagnostics)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.rounds, 4);
        assert_eq!(page.scroll_count(), 3);
    }
}
