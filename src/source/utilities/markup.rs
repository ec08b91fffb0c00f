//! Minimal anchor-tag extraction for fields that embed an entity name in markup.

use crate::utils::normalize_inline_whitespace;

/// Visible text and target of the first hyperlink found in a markup fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Visible anchor text, tags stripped and whitespace collapsed.
    pub text: String,
    /// `href` target; empty when the fragment has no link.
    pub href: String,
}

/// Extract the first `<a href=...>text</a>` from `markup`.
///
/// When no anchor with an `href` attribute is present, the raw text is passed
/// through unchanged with an empty link.
pub fn extract_first_link(markup: &str) -> ExtractedLink {
    find_first_anchor(markup).unwrap_or_else(|| ExtractedLink {
        text: markup.to_string(),
        href: String::new(),
    })
}

fn find_first_anchor(markup: &str) -> Option<ExtractedLink> {
    let lower = markup.to_ascii_lowercase();
    let mut search_from = 0usize;
    while let Some(offset) = lower[search_from..].find("<a") {
        let tag_start = search_from + offset;
        let after_name = tag_start + 2;
        search_from = after_name;
        // `<abbr>` and friends share the prefix.
        let is_anchor = lower[after_name..]
            .chars()
            .next()
            .is_some_and(|ch| ch.is_whitespace() || ch == '>');
        if !is_anchor {
            continue;
        }
        let tag_end = after_name + lower[after_name..].find('>')?;
        let Some(href) = attribute_value(&markup[after_name..tag_end], "href") else {
            continue;
        };
        let body_start = tag_end + 1;
        let body_end = lower[body_start..]
            .find("</a")
            .map(|rel| body_start + rel)
            .unwrap_or(markup.len());
        return Some(ExtractedLink {
            text: normalize_inline_whitespace(strip_tags(&markup[body_start..body_end])),
            href,
        });
    }
    None
}

/// Read a quoted or bare attribute value from the inside of a start tag.
fn attribute_value(attributes: &str, name: &str) -> Option<String> {
    let lower = attributes.to_ascii_lowercase();
    let mut search_from = 0usize;
    while let Some(offset) = lower[search_from..].find(name) {
        let start = search_from + offset;
        search_from = start + name.len();
        let preceded_ok = start == 0
            || lower[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace);
        let rest = attributes[start + name.len()..].trim_start();
        if !preceded_ok || !rest.starts_with('=') {
            continue;
        }
        let value = rest[1..].trim_start();
        let mut chars = value.chars();
        return match chars.next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &value[1..];
                let end = inner.find(quote).unwrap_or(inner.len());
                Some(inner[..end].to_string())
            }
            Some(_) => {
                let end = value
                    .find(|ch: char| ch.is_whitespace() || ch == '>')
                    .unwrap_or(value.len());
                Some(value[..end].to_string())
            }
            None => None,
        };
    }
    None
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_link_from_leaderboard_cell() {
        let cell = concat!(
            r#"<a target="_blank" href="https://huggingface.co/org/model-7b" "#,
            r#"style="color: var(--link-text-color);">org/model-7b</a>  "#,
            r#"<a target="_blank" href="https://huggingface.co/datasets/details" style="x">📑</a>"#,
        );
        let link = extract_first_link(cell);
        assert_eq!(link.text, "org/model-7b");
        assert_eq!(link.href, "https://huggingface.co/org/model-7b");
    }

    #[test]
    fn passes_plain_text_through_with_empty_link() {
        let link = extract_first_link("org/plain-model");
        assert_eq!(link.text, "org/plain-model");
        assert_eq!(link.href, "");
    }

    #[test]
    fn handles_single_quotes_bare_values_and_nested_tags() {
        let link = extract_first_link("<A HREF='https://a.example'><b>Bold</b>   name</A>");
        assert_eq!(link.text, "Bold name");
        assert_eq!(link.href, "https://a.example");

        let link = extract_first_link("<a href=https://b.example>bare</a>");
        assert_eq!(link.href, "https://b.example");
        assert_eq!(link.text, "bare");
    }

    #[test]
    fn ignores_anchors_without_href_and_lookalike_tags() {
        let link = extract_first_link(concat!(
            r#"<abbr title="x">skip</abbr><a name="top">no</a>"#,
            r#"<a data-href="x" href="https://c.example">yes</a>"#,
        ));
        assert_eq!(link.text, "yes");
        assert_eq!(link.href, "https://c.example");
    }

    #[test]
    fn unterminated_anchor_takes_remaining_text() {
        let link = extract_first_link(r#"<a href="https://d.example">dangling"#);
        assert_eq!(link.text, "dangling");
        assert_eq!(link.href, "https://d.example");
    }
}
