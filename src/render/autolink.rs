//! Extended autolinks: bare `https://…`, `http://…` and `www.…` in text.

use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};
use regex::Regex;

/// URL candidate; trailing punctuation is trimmed afterwards.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+").unwrap());

/// Strip trailing punctuation the way GFM does, keeping balanced `)`.
fn trim_trailing(candidate: &str) -> &str {
    let mut end = candidate.len();
    loop {
        let slice = &candidate[..end];
        let Some(last) = slice.chars().last() else {
            return slice;
        };
        let strip = match last {
            '?' | '!' | '.' | ',' | ':' | '*' | '_' | '~' | '\'' | '"' | ';' => true,
            ')' => slice.matches(')').count() > slice.matches('(').count(),
            _ => false,
        };
        if !strip {
            return slice;
        }
        end -= last.len_utf8();
    }
}

/// Split one text run into text and link events.
fn split_text(text: &str) -> Option<Vec<Event<'static>>> {
    let mut out = Vec::new();
    let mut cursor = 0;

    for found in URL_RE.find_iter(text) {
        let url = trim_trailing(found.as_str());
        // `www.` alone is not a link
        if url.len() <= 4 || url.eq_ignore_ascii_case("www.") {
            continue;
        }
        let start = found.start();
        let end = start + url.len();
        if start > cursor {
            out.push(Event::Text(CowStr::from(text[cursor..start].to_string())));
        }
        let href = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(href),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(Event::Text(CowStr::from(url.to_string())));
        out.push(Event::End(TagEnd::Link));
        cursor = end;
    }

    if out.is_empty() {
        return None;
    }
    if cursor < text.len() {
        out.push(Event::Text(CowStr::from(text[cursor..].to_string())));
    }
    Some(out)
}

/// Turn bare URLs in plain text into links.
///
/// Text inside links, images and code blocks is left alone. Expects
/// adjacent text events to be merged already.
pub fn link_bare_urls<'a>(events: Vec<Event<'a>>) -> Vec<Event<'a>> {
    let mut out = Vec::with_capacity(events.len());
    let mut depth = 0usize;

    for event in events {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_)) => depth += 1,
            Event::End(TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock) => {
                depth = depth.saturating_sub(1)
            }
            Event::Text(text) if depth == 0 => {
                if let Some(split) = split_text(text) {
                    out.extend(split);
                    continue;
                }
            }
            _ => {}
        }
        out.push(event);
    }
    out
}
