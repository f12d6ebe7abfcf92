//! Contact scraping: e-mails and company metadata from the page HTML.
//!
//! Runs an independent `reqwest` fetch under its own deadline — it does not
//! reuse the browser capture, so a capture-hostile page can still yield
//! contact data and vice versa. The scraper never fails the pipeline:
//! timeouts, HTTP errors, and parse failures all degrade to an empty
//! [`ScrapedContact`] with a warning, because contact info is an enrichment,
//! not the deliverable.

use crate::config::AnalysisConfig;
use crate::output::ScrapedContact;
use crate::pipeline::normalize::NormalizedUrl;
use crate::pipeline::probe::PROBE_USER_AGENT;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// Russian legal-entity prefixes as they appear in footers: `ООО «Ромашка»`.
static RE_LEGAL_RU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:ООО|ИП|АО|ЗАО|ПАО|ОАО)\s+["«]?[^"»\n<]{2,60}"#).unwrap());

/// English legal-entity suffixes: `Acme Widgets LLC`.
static RE_LEGAL_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9&.\- ]{2,50}\s(?:LLC|Ltd|Inc|GmbH|Corp)\b").unwrap()
});

static SEL_MAILTO: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="mailto:"]"#).unwrap());
static SEL_OG_SITE_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:site_name"]"#).unwrap());
static SEL_META_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="author"]"#).unwrap());
static SEL_META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_FOOTER: Lazy<Selector> = Lazy::new(|| Selector::parse("footer").unwrap());

#[derive(Debug, Error)]
enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Fetch and scrape the target page. Infallible by design.
pub async fn scrape(url: &NormalizedUrl, config: &AnalysisConfig) -> ScrapedContact {
    match try_scrape(url, config).await {
        Ok(contact) => {
            debug!(
                "scraped {} emails, company: {:?}",
                contact.emails.len(),
                contact.company_name
            );
            contact
        }
        Err(e) => {
            warn!("contact scrape failed for {}: {e}", url.as_str());
            ScrapedContact::default()
        }
    }
}

async fn try_scrape(
    url: &NormalizedUrl,
    config: &AnalysisConfig,
) -> Result<ScrapedContact, ScrapeError> {
    let client = reqwest::Client::builder()
        .user_agent(PROBE_USER_AGENT)
        .timeout(Duration::from_secs(config.scrape_timeout_secs))
        .build()?;

    let html = client
        .get(url.as_str())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    Ok(extract_contact(&html))
}

/// Pure extraction over an HTML document.
pub fn extract_contact(html: &str) -> ScrapedContact {
    let document = Html::parse_document(html);

    let mut emails: BTreeSet<String> = BTreeSet::new();

    // Body text: anything shaped like an address.
    let body_text: String = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    for m in RE_EMAIL.find_iter(&body_text) {
        emails.insert(m.as_str().to_string());
    }

    // mailto: links, stripped of ?subject=… suffixes.
    for link in document.select(&SEL_MAILTO) {
        if let Some(href) = link.value().attr("href") {
            let address = href
                .trim_start_matches("mailto:")
                .split('?')
                .next()
                .unwrap_or("")
                .trim();
            if address.contains('@') {
                emails.insert(address.to_string());
            }
        }
    }

    // The regex and the mailto filter both require '@', but keep the
    // invariant explicit at the boundary.
    emails.retain(|e| e.contains('@'));

    let company_name = meta_content(&document, &SEL_OG_SITE_NAME)
        .or_else(|| meta_content(&document, &SEL_META_AUTHOR))
        .or_else(|| title_first_segment(&document))
        .or_else(|| footer_legal_entity(&document));

    ScrapedContact {
        emails,
        company_name,
        page_title: element_text(&document, &SEL_TITLE),
        description: meta_content(&document, &SEL_META_DESCRIPTION),
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn element_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First `<title>` segment before a `|` or `-` separator.
fn title_first_segment(document: &Html) -> Option<String> {
    element_text(document, &SEL_TITLE).and_then(|title| {
        title
            .split(['|', '-'])
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Legal-entity pattern search in footer text; last resort only.
fn footer_legal_entity(document: &Html) -> Option<String> {
    let footer = document.select(&SEL_FOOTER).next()?;
    let text: String = footer.text().collect::<Vec<_>>().join(" ");
    RE_LEGAL_RU
        .find(&text)
        .or_else(|| RE_LEGAL_EN.find(&text))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_mailto_and_body_emails_deduplicated() {
        let html = r#"<html><head><title>Example</title></head><body>
            <a href="mailto:sales@example.com">Write to sales</a>
            <p>contact us at info@example.com or info@example.com</p>
            </body></html>"#;
        let contact = extract_contact(html);
        let expected: BTreeSet<String> = ["sales@example.com", "info@example.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(contact.emails, expected);
    }

    #[test]
    fn dedup_is_case_sensitive() {
        let html = r#"<body>Info@Example.com and info@example.com</body>"#;
        let contact = extract_contact(html);
        assert_eq!(contact.emails.len(), 2);
    }

    #[test]
    fn mailto_subject_suffix_is_stripped() {
        let html = r#"<a href="mailto:hello@example.com?subject=Hi%20there">mail</a>"#;
        let contact = extract_contact(html);
        assert!(contact.emails.contains("hello@example.com"));
    }

    #[test]
    fn company_prefers_og_site_name() {
        let html = r#"<html><head>
            <meta property="og:site_name" content="Acme Widgets">
            <meta name="author" content="Somebody Else">
            <title>Acme | Home</title>
            </head><body><footer>ООО «Ромашка»</footer></body></html>"#;
        let contact = extract_contact(html);
        assert_eq!(contact.company_name.as_deref(), Some("Acme Widgets"));
    }

    #[test]
    fn company_falls_back_to_author_then_title() {
        let html = r#"<head><meta name="author" content="The Author"><title>T | X</title></head>"#;
        assert_eq!(
            extract_contact(html).company_name.as_deref(),
            Some("The Author")
        );

        let html = r#"<head><title>Widget Shop | Best widgets online</title></head>"#;
        assert_eq!(
            extract_contact(html).company_name.as_deref(),
            Some("Widget Shop")
        );
    }

    #[test]
    fn company_last_resort_is_footer_legal_entity() {
        let html = r#"<html><head></head><body>
            <footer>© 2024 ООО «Ромашка» Все права защищены</footer>
            </body></html>"#;
        let contact = extract_contact(html);
        let name = contact.company_name.expect("footer entity expected");
        assert!(name.starts_with("ООО"), "got: {name}");
    }

    #[test]
    fn empty_page_degrades_to_default() {
        let contact = extract_contact("<html><body></body></html>");
        assert_eq!(contact, ScrapedContact::default());
    }

    #[test]
    fn captures_title_and_description() {
        let html = r#"<head><title>Shop</title>
            <meta name="description" content="Fine goods since 1890"></head>"#;
        let contact = extract_contact(html);
        assert_eq!(contact.page_title.as_deref(), Some("Shop"));
        assert_eq!(
            contact.description.as_deref(),
            Some("Fine goods since 1890")
        );
    }

    #[tokio::test]
    async fn network_failure_degrades_to_empty_contact() {
        use crate::pipeline::normalize::normalize;
        // Refused port; scrape must swallow the error.
        let url = normalize("http://127.0.0.1:1").unwrap();
        let config = AnalysisConfig::default();
        let contact = scrape(&url, &config).await;
        assert_eq!(contact, ScrapedContact::default());
    }
}
