//! Fenced code blocks: class-based syntax highlighting and diagrams.
//!
//! Highlighting emits `hl-` prefixed scope classes only, never inline
//! styles, so the output survives sanitization. The matching stylesheet is
//! generated once from a bundled theme by [`theme_css`].

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::utils::html::escape;

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

/// Theme used for the generated stylesheet.
const THEME: &str = "InspiredGitHub";

/// First word of a fence info string (`rust,ignore` → `rust`).
fn fence_language(info: &str) -> &str {
    info.split([' ', '\t', ',', '{'])
        .next()
        .unwrap_or("")
        .trim()
}

/// Highlight `code` as `lang`. `None` when the language is unknown.
pub fn highlight_code(code: &str, lang: &str) -> Option<String> {
    let syntax = SYNTAXES.find_syntax_by_token(lang)?;
    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .ok()?;
    }
    Some(generator.finalize())
}

/// Stylesheet for the `hl-` classes.
pub fn theme_css() -> String {
    let themes = ThemeSet::load_defaults();
    themes
        .themes
        .get(THEME)
        .and_then(|theme| css_for_theme_with_class_style(theme, CLASS_STYLE).ok())
        .unwrap_or_default()
}

/// Render one fenced block to HTML, or `None` to keep the default output.
fn render_block(lang: &str, code: &str, highlight: bool) -> Option<String> {
    if lang.eq_ignore_ascii_case("mermaid") {
        return Some(format!("<div class=\"mermaid\">{}</div>\n", escape(code)));
    }
    if !highlight || lang.is_empty() {
        return None;
    }
    let body = highlight_code(code, lang)?;
    Some(format!(
        "<pre class=\"highlight\"><code class=\"language-{}\">{}</code></pre>\n",
        escape(lang),
        body
    ))
}

/// Replace fenced code blocks by diagram containers or highlighted HTML.
pub fn render_code_blocks<'a>(events: Vec<Event<'a>>, highlight: bool) -> Vec<Event<'a>> {
    let mut out: Vec<Event<'a>> = Vec::with_capacity(events.len());
    let mut pending: Option<(String, Vec<Event<'a>>)> = None;

    for event in events {
        if let Some((lang, buffered)) = pending.as_mut() {
            let is_end = matches!(event, Event::End(TagEnd::CodeBlock));
            buffered.push(event);
            if !is_end {
                continue;
            }

            let code: String = buffered
                .iter()
                .filter_map(|e| match e {
                    Event::Text(text) => Some(&**text),
                    _ => None,
                })
                .collect();
            match render_block(lang, &code, highlight) {
                Some(html) => out.push(Event::Html(CowStr::from(html))),
                None => out.append(buffered),
            }
            pending = None;
            continue;
        }

        if let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) = &event {
            let lang = fence_language(info).to_string();
            pending = Some((lang, vec![event]));
            continue;
        }
        out.push(event);
    }

    // Unterminated block: emit what was buffered
    if let Some((_, buffered)) = pending {
        out.extend(buffered);
    }
    out
}
