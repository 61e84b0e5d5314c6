use crate::result::Extracted;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Paragraphs shorter than this (in characters) are treated as boilerplate.
pub const DEFAULT_MIN_PARAGRAPH_LENGTH: usize = 40;

/// class/id fragments that usually mark the main content block, in priority order.
const CONTENT_MARKERS: &[&str] = &["article", "post", "entry", "content", "story"];

static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static TWITTER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="twitter:title"]"#).unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
static BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section, main").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub min_paragraph_length: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            min_paragraph_length: DEFAULT_MIN_PARAGRAPH_LENGTH,
        }
    }
}

/// Pulls a headline and readable body out of an article page.
///
/// Extraction is best effort and never fails. Pages without a recognisable
/// content container produce an empty body instead of whole-page text.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    min_paragraph_length: usize,
}

impl ContentExtractor {
    pub fn new() -> Self {
        Self::from_settings(&ExtractorSettings::default())
    }

    pub fn from_settings(settings: &ExtractorSettings) -> Self {
        Self {
            min_paragraph_length: settings.min_paragraph_length,
        }
    }

    pub fn with_min_paragraph_length(mut self, length: usize) -> Self {
        self.min_paragraph_length = length;
        self
    }

    pub fn extract(&self, html: &str) -> Extracted {
        let document = Html::parse_document(html);

        let headline = find_headline(&document).unwrap_or_default();
        let body = find_container(&document)
            .map(|container| self.collect_paragraphs(container))
            .unwrap_or_default();

        Extracted { headline, body }
    }

    fn collect_paragraphs(&self, container: ElementRef<'_>) -> String {
        container
            .select(&PARAGRAPH)
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|text| text.chars().count() >= self.min_paragraph_length)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract with default settings.
pub fn extract(html: &str) -> Extracted {
    ContentExtractor::new().extract(html)
}

fn find_headline(document: &Html) -> Option<String> {
    let meta_content = |selector: &Selector| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string)
    };
    let element_text = |selector: &Selector| {
        document
            .select(selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty())
    };

    meta_content(&OG_TITLE)
        .or_else(|| meta_content(&TWITTER_TITLE))
        .or_else(|| element_text(&TITLE))
        .or_else(|| element_text(&H1).map(|text| collapse_whitespace(&text)))
}

fn find_container(document: &Html) -> Option<ElementRef<'_>> {
    if let Some(article) = document.select(&ARTICLE).next() {
        return Some(article);
    }

    CONTENT_MARKERS.iter().find_map(|marker| {
        document.select(&BLOCKS).find(|el| {
            let attrs = el.value();
            [attrs.attr("class"), attrs.attr("id")]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase().contains(marker))
        })
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
