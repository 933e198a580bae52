//! Allow-list HTML sanitization of rendered documents.
//!
//! Starts from ammonia's user-generated-content defaults and adds what the
//! renderer itself emits: heading ids, highlight classes, link targets and
//! task-list checkboxes. Anything else is removed, not escaped.

use std::borrow::Cow;
use std::sync::LazyLock;

use ammonia::Builder;

/// URL schemes allowed in `href`/`src`. Relative URLs pass through.
const URL_SCHEMES: [&str; 4] = ["http", "https", "mailto", "tel"];

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
const CLASSED: [&str; 4] = ["div", "pre", "code", "span"];

static POLICY: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::default();
    for tag in HEADINGS {
        builder.add_tag_attributes(tag, ["id"]);
    }
    for tag in CLASSED {
        builder.add_tag_attributes(tag, ["class"]);
    }
    builder
        .add_tags(["input"])
        .add_tag_attributes("input", ["type", "checked", "disabled"])
        .add_tag_attributes("a", ["href", "rel", "target", "title"])
        .add_tag_attributes("img", ["src", "alt", "title"])
        .url_schemes(URL_SCHEMES.into_iter().collect())
        // `rel` is an allowed attribute, so ammonia must not manage it
        .link_rel(None)
        .attribute_filter(|element, attribute, value| match (element, attribute) {
            ("input", "type") if !value.eq_ignore_ascii_case("checkbox") => None,
            ("a", "target") if value != "_blank" => None,
            _ => Some(Cow::Borrowed(value)),
        });
    builder
});

/// Sanitize rendered HTML.
pub fn sanitize(html: &str) -> String {
    POLICY.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_and_handlers() {
        let out = sanitize(r#"<p onclick="x()">hi</p><script>alert(1)</script><img src="a.png" onerror="y()">"#);
        assert!(!out.contains("<script"), "{out}");
        assert!(!out.contains("alert(1)"), "{out}");
        assert!(!out.contains("onclick"), "{out}");
        assert!(!out.contains("onerror"), "{out}");
        assert!(out.contains(r#"<img src="a.png">"#), "{out}");
    }

    #[test]
    fn test_strips_disallowed_schemes() {
        let out = sanitize(r#"<a href="javascript:alert(1)">x</a><a href="tel:+1">t</a>"#);
        assert!(!out.contains("javascript"), "{out}");
        assert!(out.contains(r#"href="tel:+1""#), "{out}");
    }

    #[test]
    fn test_keeps_rendering_attributes() {
        let src = concat!(
            r#"<h2 id="setup">Setup</h2>"#,
            r#"<pre class="highlight"><code class="language-rust"><span class="hl-source">x</span></code></pre>"#,
            r#"<a href="/repo/a.png" target="_blank" rel="noopener">a</a>"#,
            r#"<div class="mermaid">graph</div>"#,
            r#"<p style="color:red" class="lead">p</p>"#,
        );
        let out = sanitize(src);
        assert!(out.contains(r#"<h2 id="setup">"#), "{out}");
        assert!(out.contains(r#"<code class="language-rust">"#), "{out}");
        assert!(out.contains(r#"<span class="hl-source">"#), "{out}");
        assert!(out.contains(r#"target="_blank""#), "{out}");
        assert!(out.contains(r#"rel="noopener""#), "{out}");
        assert!(out.contains(r#"<div class="mermaid">"#), "{out}");
        assert!(!out.contains("style="), "{out}");
        assert!(!out.contains("lead"), "{out}");
    }

    #[test]
    fn test_task_list_checkbox() {
        let out = sanitize(r#"<li><input disabled="" type="checkbox" checked=""> done</li>"#);
        assert!(out.contains(r#"type="checkbox""#), "{out}");
        let out = sanitize(r#"<input type="text" value="x">"#);
        assert!(!out.contains("type="), "{out}");
    }
}
