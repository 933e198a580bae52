//! Heading identifiers and outline extraction.

use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd};
use rustc_hash::FxHashSet;
use serde::Serialize;

/// One heading in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}

/// GitHub-style heading slug.
///
/// Lowercases, keeps alphanumerics, `-` and `_`, turns spaces into `-`, and
/// drops everything else.
pub fn slugify(text: &str) -> String {
    text.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .filter_map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('-'),
            _ => None,
        })
        .collect()
}

/// Hands out unique ids within one document (`a`, `a-1`, `a-2`, ...).
#[derive(Default)]
struct IdAllocator {
    used: FxHashSet<String>,
}

impl IdAllocator {
    fn reserve(&mut self, id: &str) {
        self.used.insert(id.to_string());
    }

    fn allocate(&mut self, base: String) -> String {
        if base.is_empty() {
            return base;
        }
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Assign ids to every heading and return the outline.
///
/// Explicit `{#id}` attributes are kept; other headings get a unique slug of
/// their text. Headings whose text is empty after trimming get no id and no
/// outline entry.
pub fn assign_heading_ids(events: &mut [Event<'_>]) -> Vec<TocEntry> {
    // Explicit ids win over generated ones, wherever they appear
    let mut ids = IdAllocator::default();
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            ids.reserve(id);
        }
    }

    let mut toc = Vec::new();
    let mut index = 0;
    while index < events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[index] else {
            index += 1;
            continue;
        };
        let level = level_number(*level);

        let mut raw = String::new();
        let mut end = index + 1;
        while end < events.len() {
            match &events[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(text) | Event::Code(text) => raw.push_str(text),
                Event::SoftBreak | Event::HardBreak => raw.push(' '),
                _ => {}
            }
            end += 1;
        }

        let title = collapse_whitespace(&raw);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[index] {
            let resolved = match id {
                Some(explicit) => explicit.to_string(),
                None => {
                    let generated = ids.allocate(slugify(&title));
                    if !generated.is_empty() {
                        *id = Some(CowStr::from(generated.clone()));
                    }
                    generated
                }
            };
            if !title.is_empty() {
                toc.push(TocEntry {
                    level,
                    id: resolved,
                    title,
                });
            }
        }
        index = end + 1;
    }
    toc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{Options, Parser, html};

    fn outline(src: &str) -> (Vec<TocEntry>, String) {
        let mut events: Vec<Event> =
            Parser::new_ext(src, Options::ENABLE_HEADING_ATTRIBUTES).collect();
        let toc = assign_heading_ids(&mut events);
        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        (toc, out)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("API: v2.0 (beta)!"), "api-v20-beta");
        assert_eq!(slugify("snake_case-ok"), "snake_case-ok");
        assert_eq!(slugify("Ünïcode Title"), "ünïcode-title");
    }

    #[test]
    fn test_toc_and_ids() {
        let (toc, html) = outline("# Intro\n\n## Setup `cargo`\n\n## Setup cargo\n");
        assert_eq!(
            toc,
            vec![
                TocEntry { level: 1, id: "intro".into(), title: "Intro".into() },
                TocEntry { level: 2, id: "setup-cargo".into(), title: "Setup cargo".into() },
                TocEntry { level: 2, id: "setup-cargo-1".into(), title: "Setup cargo".into() },
            ]
        );
        assert!(html.contains(r#"<h1 id="intro">Intro</h1>"#), "{html}");
        assert!(html.contains(r#"<h2 id="setup-cargo-1">"#), "{html}");
    }

    #[test]
    fn test_explicit_id_and_collision() {
        let (toc, _) = outline("# Usage {#usage}\n\n## Usage\n");
        assert_eq!(toc[0].id, "usage");
        assert_eq!(toc[1].id, "usage-1");
    }

    #[test]
    fn test_empty_heading_skipped() {
        let (toc, _) = outline("#\n\n## Real\n");
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].title, "Real");
    }

    #[test]
    fn test_setext_line_break_becomes_space() {
        let (toc, _) = outline("Multi\n  line   title\n===\n");
        assert_eq!(toc[0].title, "Multi line title");
        assert_eq!(toc[0].level, 1);
    }
}
