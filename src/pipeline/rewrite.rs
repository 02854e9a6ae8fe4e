//! Rewriting: swap remote image links for local paths.
//!
//! [`apply`] is a pure function of the original text and the replacement
//! map. Each matched text is rebuilt once and then substituted everywhere it
//! occurs, so repeated references to the same image are all updated.
//!
//! ## Reassembly rules
//!
//! * `![alt](url "title")` → `![alt](local "title")`; alt and title verbatim.
//! * `<img ...>` → `<img src="local" ...>`: `src` comes first, every `src`
//!   attribute of the original (any case) is dropped, all other attributes
//!   follow in their original order and exactly as written (quote style,
//!   unquoted and bare attributes included). A closing `/>` is kept.

use crate::pipeline::coordinate::ReplacementMap;
use crate::pipeline::extract::RE_MARKDOWN_IMAGE;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Whole tag. Group 1: attribute text, 2: optional self-closing slash.
static RE_IMG_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)^<img(.*?)(/?)\s*>$"#).unwrap());

/// One attribute: `name`, `name="v"`, `name='v'` or `name=v`. Group 1: name.
static RE_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'=<>/]+)(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?"#).unwrap()
});

/// Apply `map` to `original`. Returns the text unchanged when the map is empty.
pub fn apply(original: &str, map: &ReplacementMap) -> String {
    let mut text = original.to_string();
    for (matched, local) in map {
        match rebuild(matched, local) {
            Some(new) => text = text.replace(matched.as_str(), &new),
            None => debug!("Unrecognised reference text left as-is: {}", matched),
        }
    }
    text
}

/// The replacement for one matched reference.
fn rebuild(matched: &str, local: &str) -> Option<String> {
    if matched.starts_with("![") {
        rebuild_markdown(matched, local)
    } else {
        rebuild_tag(matched, local)
    }
}

fn rebuild_markdown(matched: &str, local: &str) -> Option<String> {
    let caps = RE_MARKDOWN_IMAGE.captures(matched)?;
    let alt = caps.get(1).map_or("", |m| m.as_str());
    let title = caps.get(3).map_or("", |m| m.as_str());
    Some(format!("![{alt}]({local}{title})"))
}

fn rebuild_tag(matched: &str, local: &str) -> Option<String> {
    let caps = RE_IMG_PARTS.captures(matched)?;
    let attrs = caps.get(1).map_or("", |m| m.as_str());
    let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());

    let mut parts = vec![format!(r#"src="{local}""#)];
    parts.extend(
        RE_ATTRIBUTE
            .captures_iter(attrs)
            .filter(|a| !a[1].eq_ignore_ascii_case("src"))
            .map(|a| a[0].to_string()),
    );

    let close = if self_closing { " />" } else { ">" };
    Some(format!("<img {}{}", parts.join(" "), close))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> ReplacementMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_is_identity() {
        let text = "# Doc\n![a](https://x/a.png)\n";
        assert_eq!(apply(text, &ReplacementMap::new()), text);
    }

    #[test]
    fn markdown_keeps_alt() {
        let m = map(&[("![cat](http://x/a.png)", "images/a_0123456789ab.png")]);
        assert_eq!(
            apply("see ![cat](http://x/a.png) here", &m),
            "see ![cat](images/a_0123456789ab.png) here"
        );
    }

    #[test]
    fn markdown_keeps_title() {
        let m = map(&[(r#"![cat](http://x/a.png "A cat")"#, "images/a.png")]);
        assert_eq!(
            apply(r#"![cat](http://x/a.png "A cat")"#, &m),
            r#"![cat](images/a.png "A cat")"#
        );
    }

    #[test]
    fn markdown_url_with_space_is_replaced_whole() {
        let m = map(&[("![a](https://x.com/my pic.png)", "images/my_pic_0123456789ab.png")]);
        assert_eq!(
            apply("![a](https://x.com/my pic.png)", &m),
            "![a](images/my_pic_0123456789ab.png)"
        );
    }

    #[test]
    fn markdown_keeps_single_quoted_title() {
        let m = map(&[("![a](https://x/a.png 'T')", "images/a.png")]);
        assert_eq!(apply("![a](https://x/a.png 'T')", &m), "![a](images/a.png 'T')");
    }

    #[test]
    fn markdown_empty_alt() {
        let m = map(&[("![](http://x/a.png)", "images/a.png")]);
        assert_eq!(apply("![](http://x/a.png)", &m), "![](images/a.png)");
    }

    #[test]
    fn tag_puts_src_first_and_keeps_order() {
        let m = map(&[(
            r#"<img src="http://x/a.png" alt="cat" title="t">"#,
            "images/a_0123456789ab.png",
        )]);
        assert_eq!(
            apply(r#"<img src="http://x/a.png" alt="cat" title="t">"#, &m),
            r#"<img src="images/a_0123456789ab.png" alt="cat" title="t">"#
        );
    }

    #[test]
    fn tag_src_moves_to_front() {
        let m = map(&[(r#"<img width="10" SRC='http://x/a.png' alt='c'>"#, "images/a.png")]);
        assert_eq!(
            apply(r#"<img width="10" SRC='http://x/a.png' alt='c'>"#, &m),
            r#"<img src="images/a.png" width="10" alt='c'>"#
        );
    }

    #[test]
    fn tag_never_duplicates_src() {
        let tag = r#"<img src="http://x/a.png" alt="a" src="http://x/b.png">"#;
        let out = apply(tag, &map(&[(tag, "images/a.png")]));
        assert_eq!(out.matches("src=").count(), 1, "got {out}");
    }

    #[test]
    fn tag_keeps_bare_and_unquoted_attributes() {
        let tag = r#"<img loading=lazy src="http://x/a.png" decoding="async" hidden>"#;
        let out = apply(tag, &map(&[(tag, "images/a.png")]));
        assert_eq!(
            out,
            r#"<img src="images/a.png" loading=lazy decoding="async" hidden>"#
        );
    }

    #[test]
    fn tag_keeps_self_closing() {
        let tag = r#"<img src="http://x/a.png" alt="a"/>"#;
        let out = apply(tag, &map(&[(tag, "images/a.png")]));
        assert_eq!(out, r#"<img src="images/a.png" alt="a" />"#);
    }

    #[test]
    fn tag_keeps_data_src() {
        let tag = r#"<img data-src="http://x/lazy.png" src="http://x/a.png">"#;
        let out = apply(tag, &map(&[(tag, "images/a.png")]));
        assert_eq!(out, r#"<img src="images/a.png" data-src="http://x/lazy.png">"#);
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let text = "![a](http://x/a.png)\nmiddle\n![a](http://x/a.png)";
        let out = apply(text, &map(&[("![a](http://x/a.png)", "images/a.png")]));
        assert_eq!(out, "![a](images/a.png)\nmiddle\n![a](images/a.png)");
    }

    #[test]
    fn unrelated_text_is_untouched() {
        let text = "before ![x](http://x/x.png) ![y](http://x/y.png) after";
        let out = apply(text, &map(&[("![x](http://x/x.png)", "images/x.png")]));
        assert_eq!(out, "before ![x](images/x.png) ![y](http://x/y.png) after");
    }
}
