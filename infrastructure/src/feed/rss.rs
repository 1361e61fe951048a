//! RSS / Atom topic source
//!
//! Fetches a feed over HTTP and turns its newest entries into conversation
//! topics. RSS 2.0 `<item>` and Atom `<entry>` elements are both understood.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parlor_application::{TopicSource, TopicSourceError};
use parlor_domain::{
    Topic,
    string::{one_line, truncate_chars},
};
use quick_xml::{Reader, events::Event};
use regex::Regex;
use tracing::{debug, info};

/// Summaries are cut to this many characters
pub const SUMMARY_MAX_CHARS: usize = 200;

const TAG_PATTERN: &str = "<[^>]*>";

/// One feed entry before it becomes a topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<FixedOffset>>,
}

/// Field currently being read inside an entry
#[derive(Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    Date,
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"description" | b"summary" => Some(Field::Description),
        b"content" | b"content:encoded" => Some(Field::Content),
        b"pubDate" | b"published" | b"updated" | b"dc:date" => Some(Field::Date),
        _ => None,
    }
}

fn is_entry(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

#[derive(Default)]
struct Draft {
    title: String,
    link: String,
    description: String,
    content: String,
    date: String,
}

impl Draft {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
            Field::Date => &mut self.date,
        };
        target.push_str(text);
    }

    fn finish(self) -> FeedEntry {
        let description = if self.description.trim().is_empty() {
            self.content
        } else {
            self.description
        };
        FeedEntry {
            title: one_line(&self.title),
            link: self.link.trim().to_string(),
            description: one_line(&description),
            published: parse_date(self.date.trim()),
        }
    }
}

/// RFC 2822 (RSS) or RFC 3339 (Atom) timestamps
fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

/// Atom links carry the URL in `href`; prefer `rel="alternate"` or no rel.
fn atom_href(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut alternate = true;
    for a in e.attributes().flatten() {
        let value = a.unescape_value().unwrap_or_default().to_string();
        match a.key.as_ref() {
            b"href" => href = Some(value),
            b"rel" => alternate = value == "alternate",
            _ => {}
        }
    }
    href.filter(|_| alternate)
}

/// Parse every entry of an RSS or Atom document, in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, TopicSourceError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut draft: Option<Draft> = None;
    // Element depth below the entry, and the field being read with the depth it opened at.
    let mut depth = 0usize;
    let mut field: Option<(Field, usize)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if is_entry(name.as_ref()) && draft.is_none() {
                    draft = Some(Draft::default());
                    depth = 0;
                    field = None;
                } else if let Some(d) = draft.as_mut() {
                    depth += 1;
                    match field {
                        // Inline markup inside a field: keep its text, separate the words.
                        Some((f, _)) => d.push(f, " "),
                        None => {
                            field = field_for(name.as_ref()).map(|f| (f, depth));
                            if name.as_ref() == b"link" && d.link.is_empty() {
                                if let Some(href) = atom_href(&e) {
                                    d.link = href;
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(d) = draft.as_mut() {
                    match field {
                        Some((f, _)) => d.push(f, " "),
                        None => {
                            if e.name().as_ref() == b"link" && d.link.is_empty() {
                                if let Some(href) = atom_href(&e) {
                                    d.link = href;
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(d), Some((f, _))) = (draft.as_mut(), field) {
                    d.push(f, &t.unescape().unwrap_or_default());
                }
            }
            Ok(Event::CData(t)) => {
                if let (Some(d), Some((f, _))) = (draft.as_mut(), field) {
                    d.push(f, &String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                if depth == 0 {
                    if is_entry(e.name().as_ref()) {
                        if let Some(d) = draft.take() {
                            entries.push(d.finish());
                        }
                    }
                    field = None;
                } else {
                    if let (Some(d), Some((f, opened_at))) = (draft.as_mut(), field) {
                        if opened_at == depth {
                            field = None;
                        } else {
                            d.push(f, " ");
                        }
                    }
                    depth -= 1;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TopicSourceError::Parse(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Newest first (undated entries after dated ones, in feed order), at most
/// `limit` entries (`0` means all), with plain-text truncated summaries.
pub fn select_topics(
    mut entries: Vec<FeedEntry>,
    limit: usize,
) -> Result<Vec<Topic>, TopicSourceError> {
    let tags = Regex::new(TAG_PATTERN).map_err(|e| TopicSourceError::Parse(e.to_string()))?;

    // Stable sort keeps feed order among equal keys.
    entries.sort_by(|a, b| match (a.published, b.published) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let take = if limit == 0 { entries.len() } else { limit };
    Ok(entries
        .into_iter()
        .take(take)
        .map(|entry| {
            let plain = tags.replace_all(&entry.description, "");
            Topic::new(
                entry.title,
                truncate_chars(plain.trim(), SUMMARY_MAX_CHARS),
                entry.link,
            )
        })
        .collect())
}

/// Topic source backed by an RSS or Atom feed
pub struct RssTopicSource {
    client: reqwest::Client,
    url: String,
    limit: usize,
}

impl RssTopicSource {
    pub fn new(url: impl Into<String>, limit: usize) -> Self {
        Self::with_client(reqwest::Client::new(), url, limit)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, limit: usize) -> Self {
        Self {
            client,
            url: url.into(),
            limit,
        }
    }

    fn fetch_error(&self, reason: impl ToString) -> TopicSourceError {
        TopicSourceError::Fetch {
            url: self.url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl TopicSource for RssTopicSource {
    async fn fetch(&self) -> Result<Vec<Topic>, TopicSourceError> {
        debug!("Fetching feed {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("User-Agent", concat!("parlor/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| self.fetch_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.fetch_error(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await.map_err(|e| self.fetch_error(e))?;
        let topics = select_topics(parse_feed(&body)?, self.limit)?;

        info!("Fetched {} topic(s) from {}", topics.len(), self.url);
        Ok(topics)
    }
}
