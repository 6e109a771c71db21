use crate::result::NormalizedJob;
use crate::site::SiteProfile;
use scraper::{ElementRef, Html, Selector};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;
use tracing::{debug, error, warn};

/// One way of reading a value out of a listing card.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// Attribute on the card root itself.
    OwnAttr(&'static str),
    /// Attribute on the first descendant matching the selector that carries it.
    Attr(&'static str, &'static str),
    /// Whitespace-collapsed text of the first matching descendant with any text.
    Text(&'static str),
}

/// Card root layouts, tried in order. The first that matches anything wins for the whole page.
pub const CARD_ROOTS: &[&str] = &["div.job_seen_beacon", "td.resultContent", "div.cardOutline"];

pub const EXTERNAL_ID: &[Probe] = &[
    Probe::OwnAttr("data-jk"),
    Probe::Attr("a", "data-jk"),
    Probe::Attr("h2 a", "data-jk"),
];

pub const TITLE: &[Probe] = &[
    Probe::Attr("h2.jobTitle span[title]", "title"),
    Probe::Text("h2.jobTitle span"),
    Probe::Attr("a[data-jk] span[title]", "title"),
];

pub const COMPANY: &[Probe] = &[
    Probe::Text(r#"span[data-testid="company-name"]"#),
    Probe::Text(r#"[data-testid="company-name"]"#),
    Probe::Text("span.companyName"),
    Probe::Text("span.companyName a"),
];

pub const LOCATION: &[Probe] = &[
    Probe::Text(r#"div[data-testid="text-location"]"#),
    Probe::Text("div.companyLocation"),
];

pub const SALARY: &[Probe] = &[
    Probe::Text("div.metadata div.salary-snippet-container"),
    Probe::Text("div.salary-snippet-container"),
];

pub const DESCRIPTION: &[Probe] = &[
    Probe::Text("div.job-snippet"),
    Probe::Text(r#"[data-testid="jobsnippet_footer"]"#),
];

pub const LINK: &[Probe] = &[Probe::Attr("h2.jobTitle a", "href")];

/// Free-text metadata entries that get classified into salary, job type or benefits.
pub const METADATA: &[&str] = &[
    "div.metadata",
    r#"[data-testid="attribute_snippet_testid"]"#,
    "ul.metadataContainer li",
    "span.attribute_snippet",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '£', '€', '¥', '₹'];

const PERIOD_UNITS: &[&str] = &[
    "year", "yr", "annum", "annual", "month", "week", "day", "hour", "hr",
];

pub const JOB_TYPE_VOCABULARY: &[&str] = &[
    "full-time",
    "full time",
    "part-time",
    "part time",
    "contract",
    "temporary",
    "internship",
    "permanent",
    "freelance",
    "seasonal",
    "per diem",
    "apprenticeship",
    "volunteer",
    "remote",
    "hybrid",
];

/// A card missing one of the fields a job cannot exist without.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("incomplete listing: id={external_id:?}, title={title:?}, company={company_name:?}")]
pub struct Incomplete {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub salary: Option<String>,
    pub job_type: Option<String>,
    pub benefits: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Salary,
    JobType,
    Benefit,
}

/// Everything one results page produced.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub jobs: Vec<NormalizedJob>,
    pub cards_found: usize,
    pub incomplete: usize,
    pub card_selector: Option<&'static str>,
}

pub struct ListingExtractor {
    site: SiteProfile,
}

impl ListingExtractor {
    pub fn new(site: SiteProfile) -> Self {
        Self { site }
    }

    /// Parse a results page and extract every complete listing on it.
    pub fn extract_page(&self, html: &str, page_url: &str) -> PageExtraction {
        let document = Html::parse_document(html);
        let (card_selector, cards) = find_cards(&document);

        let mut extraction = PageExtraction {
            cards_found: cards.len(),
            card_selector,
            ..Default::default()
        };

        if cards.is_empty() {
            warn!("No job cards found on {}", page_url);
            return extraction;
        }
        debug!(
            "Found {} job cards on {} using {}",
            cards.len(),
            page_url,
            card_selector.unwrap_or("-")
        );

        for card in cards {
            match catch_unwind(AssertUnwindSafe(|| self.extract(card, page_url))) {
                Ok(Ok(job)) => extraction.jobs.push(job),
                Ok(Err(incomplete)) => {
                    debug!("Skipping {}", incomplete);
                    extraction.incomplete += 1;
                }
                Err(_) => {
                    error!("Panic while extracting a job card on {}", page_url);
                    extraction.incomplete += 1;
                }
            }
        }

        extraction
    }

    /// Extract one card into a normalized job.
    pub fn extract(&self, node: ElementRef<'_>, page_url: &str) -> Result<NormalizedJob, Incomplete> {
        let external_id = first_match(node, EXTERNAL_ID);
        let title = first_match(node, TITLE);
        let company_name = first_match(node, COMPANY);

        let (external_id, title, company_name) = match (external_id, title, company_name) {
            (Some(id), Some(title), Some(company)) => (id, title, company),
            (external_id, title, company_name) => {
                return Err(Incomplete {
                    external_id,
                    title,
                    company_name,
                });
            }
        };

        let explicit_salary = first_match(node, SALARY);
        let metadata = classify_metadata(
            metadata_tokens(node)
                .into_iter()
                .filter(|token| Some(token) != explicit_salary.as_ref()),
        );

        let url = self
            .site
            .view_job_url(&external_id)
            .or_else(|| first_match(node, LINK).and_then(|href| self.site.resolve(&href)))
            .unwrap_or_else(|| page_url.to_string());

        Ok(NormalizedJob {
            external_id,
            title,
            company_name,
            location: first_match(node, LOCATION).unwrap_or_default(),
            job_type: metadata.job_type.unwrap_or_default(),
            salary: explicit_salary.or(metadata.salary),
            benefits: metadata.benefits,
            description: first_match(node, DESCRIPTION),
            url,
        })
    }
}

/// Detect the card layout of a page.
pub fn find_cards(document: &Html) -> (Option<&'static str>, Vec<ElementRef<'_>>) {
    for css in CARD_ROOTS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let cards: Vec<ElementRef<'_>> = document.select(&selector).collect();
        if !cards.is_empty() {
            return (Some(css), cards);
        }
    }
    (None, Vec::new())
}

/// Evaluate probes in order and return the first non-empty value.
pub fn first_match(node: ElementRef<'_>, probes: &[Probe]) -> Option<String> {
    probes.iter().find_map(|probe| run_probe(node, probe))
}

fn run_probe(node: ElementRef<'_>, probe: &Probe) -> Option<String> {
    let value = match *probe {
        Probe::OwnAttr(attr) => node.value().attr(attr).map(collapse_whitespace),
        Probe::Attr(css, attr) => {
            let selector = Selector::parse(css).ok()?;
            node.select(&selector)
                .find_map(|el| el.value().attr(attr))
                .map(collapse_whitespace)
        }
        Probe::Text(css) => {
            let selector = Selector::parse(css).ok()?;
            node.select(&selector)
                .map(element_text)
                .find(|text| !text.is_empty())
        }
    };
    value.filter(|v| !v.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Metadata entries of a card in document order, without repeats.
///
/// Only innermost entries count: a container whose descendants are entries
/// themselves would merge their texts into one token.
pub fn metadata_tokens(node: ElementRef<'_>) -> Vec<String> {
    let selectors: Vec<Selector> = METADATA
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .collect();
    let is_entry = |el: &ElementRef<'_>| selectors.iter().any(|selector| selector.matches(el));

    let mut tokens: Vec<String> = Vec::new();
    for el in node.descendants().filter_map(ElementRef::wrap) {
        if !is_entry(&el) {
            continue;
        }
        let wraps_entry = el
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .any(|inner| is_entry(&inner));
        if wraps_entry {
            continue;
        }

        let text = element_text(el);
        if !text.is_empty() && !tokens.contains(&text) {
            tokens.push(text);
        }
    }
    tokens
}

pub fn classify_token(token: &str) -> MetadataKind {
    let lower = token.to_lowercase();

    let has_currency = lower.chars().any(|c| CURRENCY_SYMBOLS.contains(&c));
    let has_period = PERIOD_UNITS.iter().any(|unit| lower.contains(unit));
    if has_currency && has_period {
        return MetadataKind::Salary;
    }

    if JOB_TYPE_VOCABULARY.iter().any(|term| lower.contains(term)) {
        return MetadataKind::JobType;
    }

    MetadataKind::Benefit
}

/// Single greedy pass: every token lands in exactly one category, repeats are comma-joined.
pub fn classify_metadata<I>(tokens: I) -> Metadata
where
    I: IntoIterator<Item = String>,
{
    let mut metadata = Metadata::default();
    for token in tokens {
        let slot = match classify_token(&token) {
            MetadataKind::Salary => &mut metadata.salary,
            MetadataKind::JobType => &mut metadata.job_type,
            MetadataKind::Benefit => &mut metadata.benefits,
        };
        match slot {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&token);
            }
            None => *slot = Some(token),
        }
    }
    metadata
}
