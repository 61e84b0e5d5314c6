use crate::error::FetchFailure;
use crate::result::FeedEntry;
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

const UNTITLED: &str = "Untitled";
const MAX_ENTITY_LEN: usize = 32;

static ALTERNATE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedFormat {
    /// RSS 2.0: `<rss><channel><item>`
    Rss,
    /// RSS 1.0: `<rdf:RDF>` with `<item>` beside `<channel>`
    Rdf,
    Atom,
}

impl FeedFormat {
    fn from_root(root: &BytesStart<'_>) -> Result<Self, FetchFailure> {
        match root.local_name().as_ref() {
            b"rss" => Ok(FeedFormat::Rss),
            b"RDF" => Ok(FeedFormat::Rdf),
            b"feed" => Ok(FeedFormat::Atom),
            other => Err(FetchFailure::Parse(format!(
                "unsupported feed root element <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn entry_tag(&self) -> &'static [u8] {
        match self {
            FeedFormat::Rss | FeedFormat::Rdf => b"item",
            FeedFormat::Atom => b"entry",
        }
    }
}

/// Entry children we read. Matching is on the qualified name, so extension
/// elements such as `media:title` never shadow the core ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    Summary,
    Content,
    Published,
    Updated,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"guid" | b"id" => Some(Field::Guid),
            b"description" | b"summary" => Some(Field::Summary),
            b"content" => Some(Field::Content),
            b"pubDate" | b"published" | b"dc:date" => Some(Field::Published),
            b"updated" => Some(Field::Updated),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct OpenField {
    field: Field,
    text: String,
    depth: usize,
}

#[derive(Debug)]
struct HrefLink {
    rel: Option<String>,
    href: String,
}

/// An `<item>`/`<entry>` being collected. The first value of each field wins.
#[derive(Debug, Default)]
struct RawEntry {
    depth: usize,
    title: Option<String>,
    link: Option<String>,
    href_links: Vec<HrefLink>,
    guid: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

impl RawEntry {
    fn open(depth: usize, about: Option<String>) -> Self {
        Self {
            depth,
            guid: about,
            ..Self::default()
        }
    }

    fn set(&mut self, field: Field, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        if slot.is_none() {
            *slot = Some(text.to_string());
        }
    }

    /// The `alternate` href link, or the first href link.
    fn primary_href(&self) -> Option<&str> {
        self.href_links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.href_links.first())
            .map(|l| l.href.as_str())
    }

    fn into_entry(self, base: Option<&Url>) -> Option<FeedEntry> {
        let link = self
            .link
            .as_deref()
            .and_then(|raw| absolute_http_link(raw, base))
            .or_else(|| {
                self.primary_href()
                    .and_then(|href| absolute_http_link(href, base))
            })
            .or_else(|| {
                self.guid
                    .as_deref()
                    .and_then(|guid| absolute_http_link(guid, None))
            })?;

        Some(FeedEntry {
            title: entry_title(self.title.as_deref()),
            link,
            summary: self
                .summary
                .as_deref()
                .or(self.content.as_deref())
                .and_then(clean_summary),
            published: self
                .published
                .as_deref()
                .or(self.updated.as_deref())
                .and_then(parse_timestamp),
        })
    }
}

/// Parse an RSS 2.0, RSS 1.0 or Atom document into entries.
///
/// Entries are read one at a time from the XML event stream. Relative links
/// are resolved against `feed_url` and entries without an http(s) link are
/// dropped. HTML entities and stray `&` are tolerated. If the document turns
/// malformed part way through, the entries completed so far are returned.
pub fn parse_feed(feed_url: &str, xml: &str) -> Result<Vec<FeedEntry>, FetchFailure> {
    let base = Url::parse(feed_url).ok();
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.expand_empty_elements = true;
    config.check_end_names = false;

    let mut format: Option<FeedFormat> = None;
    let mut entries = Vec::new();
    let mut unusable = 0usize;
    let mut entry: Option<RawEntry> = None;
    let mut field: Option<OpenField> = None;
    let mut depth = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if format.is_none() || entries.is_empty() => {
                return Err(FetchFailure::Parse(format!("malformed XML: {}", e)));
            }
            Err(e) => {
                warn!(
                    "Feed {} is malformed after {} entries, keeping those: {}",
                    feed_url,
                    entries.len(),
                    e
                );
                break;
            }
        };

        match event {
            Event::Start(element) => {
                depth += 1;
                let Some(kind) = format else {
                    format = Some(FeedFormat::from_root(&element)?);
                    continue;
                };

                let name = element.name();
                match entry.as_mut() {
                    None => {
                        if name.as_ref() == kind.entry_tag() {
                            entry = Some(RawEntry::open(depth, attr_value(&element, b"rdf:about")));
                        }
                    }
                    Some(raw) => {
                        if field.is_none()
                            && depth == raw.depth + 1
                            && let Some(found) = Field::from_name(name.as_ref())
                        {
                            if found == Field::Link
                                && let Some(href) = attr_value(&element, b"href")
                            {
                                raw.href_links.push(HrefLink {
                                    rel: attr_value(&element, b"rel"),
                                    href,
                                });
                            }
                            field = Some(OpenField {
                                field: found,
                                text: String::new(),
                                depth,
                            });
                        }
                    }
                }
            }
            Event::Text(text) => {
                if let Some(open) = field.as_mut() {
                    open.text.push_str(&unescape_lenient(&String::from_utf8_lossy(&text)));
                }
            }
            Event::CData(cdata) => {
                if let Some(open) = field.as_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::End(_) => {
                if field.as_ref().is_some_and(|open| open.depth == depth)
                    && let Some(open) = field.take()
                    && let Some(raw) = entry.as_mut()
                {
                    raw.set(open.field, &open.text);
                }
                if entry.as_ref().is_some_and(|raw| raw.depth == depth)
                    && let Some(raw) = entry.take()
                {
                    match raw.into_entry(base.as_ref()) {
                        Some(parsed) => entries.push(parsed),
                        None => unusable += 1,
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => {
                if format.is_none() {
                    return Err(FetchFailure::Parse("empty feed document".to_string()));
                }
                break;
            }
            _ => {}
        }
    }

    debug!(
        "Parsed {} entries from {} ({} without a usable link)",
        entries.len(),
        feed_url,
        unusable
    );
    Ok(entries)
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| unescape_lenient(&String::from_utf8_lossy(&attr.value)))
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    resolve_predefined_entity(entity).or_else(|| resolve_html5_entity(entity))
}

/// Resolve XML and HTML5 entity references. Anything that is not a known
/// reference, such as a bare `&`, is kept as written.
fn unescape_lenient(raw: &str) -> String {
    if let Ok(text) = unescape_with(raw, resolve_entity) {
        return text.into_owned();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let reference = match rest.find(';') {
            Some(end)
                if end <= MAX_ENTITY_LEN
                    && !rest[1..end].contains(|c: char| c == '&' || c.is_whitespace()) =>
            {
                Some(&rest[..=end])
            }
            _ => None,
        };
        let resolved = reference.and_then(|candidate| {
            unescape_with(candidate, resolve_entity)
                .ok()
                .map(|text| (text.into_owned(), candidate.len()))
        });

        match resolved {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entry_title(title: Option<&str>) -> String {
    title
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn absolute_http_link(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Feed summaries are often HTML fragments; keep only their text.
fn clean_summary(raw: &str) -> Option<String> {
    let fragment = Html::parse_fragment(raw);
    let text = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// RFC 2822 (RSS), RFC 3339 (Atom) or a bare `YYYY-MM-DDTHH:MM:SS` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Find feeds advertised through `<link rel="alternate">` tags on a page.
///
/// Returns absolute URLs in document order without duplicates.
pub fn discover_feeds(page_url: &str, html: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut feeds = Vec::new();

    for element in document.select(&ALTERNATE_LINK) {
        let attrs = element.value();
        let is_alternate = attrs
            .attr("rel")
            .map(|rel| {
                rel.split_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("alternate"))
            })
            .unwrap_or(false);
        if !is_alternate {
            continue;
        }

        let link_type = attrs.attr("type").unwrap_or_default().to_lowercase();
        if !link_type.starts_with("application/rss")
            && !link_type.contains("atom")
            && !link_type.contains("xml")
        {
            continue;
        }

        if let Some(href) = attrs.attr("href")
            && let Some(feed) = absolute_http_link(href, Some(&base))
            && seen.insert(feed.clone())
        {
            feeds.push(feed);
        }
    }

    feeds
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Garage Trade News</title>
    <item>
      <title>MOT testers face new rules&nbsp;in 2025</title>
      <link>https://trade.example.com/news/mot-rules</link>
      <description><![CDATA[<p>The DVSA has <b>confirmed</b> changes.</p>]]></description>
      <pubDate>Tue, 04 Mar 2025 09:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Relative link item</title>
      <link>/news/relative</link>
    </item>
    <item>
      <title>No link item</title>
    </item>
    <item>
      <link>mailto:editor@example.com</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>EV Workshop Blog</title>
  <entry>
    <title type="text">Training for hybrid repairs</title>
    <link rel="self" href="https://blog.example.org/entries/1.atom"/>
    <link rel="alternate" href="https://blog.example.org/2025/hybrid-training"/>
    <summary>Technicians need new skills.</summary>
    <updated>2025-02-01T12:00:00Z</updated>
  </entry>
  <entry>
    <link href="https://blog.example.org/2025/untitled"/>
    <content type="html">&lt;p&gt;Body text&lt;/p&gt;</content>
    <published>2025-01-15T08:00:00+01:00</published>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let entries = parse_feed("https://trade.example.com/feed", RSS).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "MOT testers face new rules in 2025");
        assert_eq!(first.link, "https://trade.example.com/news/mot-rules");
        assert_eq!(first.summary.as_deref(), Some("The DVSA has confirmed changes."));
        assert_eq!(
            first.published.unwrap().to_rfc3339(),
            "2025-03-04T09:30:00+00:00"
        );

        assert_eq!(entries[1].link, "https://trade.example.com/news/relative");
        assert!(entries[1].published.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let entries = parse_feed("https://blog.example.org/feed.atom", ATOM).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Training for hybrid repairs");
        assert_eq!(entries[0].link, "https://blog.example.org/2025/hybrid-training");
        assert_eq!(entries[0].summary.as_deref(), Some("Technicians need new skills."));
        assert!(entries[0].published.is_some());

        assert_eq!(entries[1].title, "Untitled");
        assert_eq!(entries[1].summary.as_deref(), Some("Body text"));
        assert_eq!(
            entries[1].published.unwrap().to_rfc3339(),
            "2025-01-15T07:00:00+00:00"
        );
    }

    #[test]
    fn test_empty_channel() {
        let xml = r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;
        assert!(parse_feed("https://example.com/rss", xml).unwrap().is_empty());
    }

    #[test]
    fn test_non_feed_documents_are_parse_failures() {
        let err = parse_feed("https://example.com/", "<html><body></body></html>").unwrap_err();
        assert_eq!(err.kind(), "parse");

        let err = parse_feed("https://example.com/", "").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_extension_elements_do_not_clash() {
        let xml = r#"<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <item>
      <title>Good one</title>
      <media:title>Media</media:title>
      <dc:creator>Desk</dc:creator>
      <link>https://example.com/news/good-one</link>
      <source url="https://wire.example.com/"><title>Nested</title></source>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.com/news/second</link>
    </item>
  </channel>
</rss>"#;

        let entries = parse_feed("https://example.com/rss", xml).unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Good one", "Second"]);
    }

    #[test]
    fn test_stray_ampersand_and_html_entities_are_tolerated() {
        let xml = r#"<rss version="2.0"><channel>
  <item>
    <title>Caf&eacute; opens for drivers</title>
    <link>https://example.com/news/cafe</link>
  </item>
  <item>
    <title>Tyres & Brakes &amp; more</title>
    <link>https://example.com/news/tyres?a=1&b=2</link>
  </item>
</channel></rss>"#;

        let entries = parse_feed("https://example.com/rss", xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Café opens for drivers");
        assert_eq!(entries[1].title, "Tyres & Brakes & more");
        assert_eq!(entries[1].link, "https://example.com/news/tyres?a=1&b=2");
    }

    #[test]
    fn test_rss_1_0_items_beside_channel() {
        let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://example.com/">
    <title>Workshop Digest</title>
  </channel>
  <item rdf:about="https://example.com/news/rdf-one">
    <title>First RDF item</title>
    <link>https://example.com/news/rdf-one</link>
    <dc:date>2025-03-01T10:00:00Z</dc:date>
  </item>
  <item rdf:about="https://example.com/news/rdf-two">
    <title>Second RDF item</title>
  </item>
</rdf:RDF>"#;

        let entries = parse_feed("https://example.com/index.rdf", xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "First RDF item");
        assert!(entries[0].published.is_some());
        assert_eq!(entries[1].link, "https://example.com/news/rdf-two");
    }

    #[test]
    fn test_broken_tail_keeps_complete_entries() {
        let xml = r#"<rss version="2.0"><channel>
  <item>
    <title>Complete</title>
    <link>https://example.com/news/complete</link>
  </item>
  <item>
    <title>Cut off"#;

        let entries = parse_feed("https://example.com/rss", xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Complete");
    }

    #[test]
    fn test_unescape_lenient() {
        assert_eq!(unescape_lenient("a &amp; b"), "a & b");
        assert_eq!(unescape_lenient("Caf&eacute;"), "Café");
        assert_eq!(unescape_lenient("R&D &pound;5"), "R&D £5");
        assert_eq!(unescape_lenient("&#8217;s & &bogus;"), "\u{2019}s & &bogus;");
        assert_eq!(unescape_lenient("trailing &"), "trailing &");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("Mon, 06 Jan 2025 10:00:00 +0000").is_some());
        assert!(parse_timestamp("2025-01-06T10:00:00Z").is_some());
        assert!(parse_timestamp("2025-01-06T10:00:00").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn test_discover_feeds() {
        let html = r#"<html><head>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            <link rel="alternate" type="application/atom+xml" href="https://example.com/atom">
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            <link rel="alternate" hreflang="fr" href="/fr/">
            <link rel="stylesheet" type="text/css" href="/style.css">
            <link rel="Alternate" type="text/xml" href="mailto:nope@example.com">
        </head><body></body></html>"#;

        let feeds = discover_feeds("https://example.com/news/", html);
        assert_eq!(
            feeds,
            vec!["https://example.com/feed.xml", "https://example.com/atom"]
        );
    }

    #[test]
    fn test_discover_feeds_none_advertised() {
        let feeds = discover_feeds("https://example.com/", "<html><head></head></html>");
        assert!(feeds.is_empty());
    }
}
