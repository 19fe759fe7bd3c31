//! HTML-to-text conversion for message bodies.

/// Block-level tags that start a new line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "tr", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "table",
    "blockquote", "pre", "hr", "section", "article", "header", "footer",
];

/// Convert HTML to plain text.
///
/// - Keeps link targets: `<a href="url">text</a>` becomes `"text (url)"`
/// - Drops images, table markup (cell text is kept) and emphasis markup
/// - Removes scripts, styles and the document head
/// - Decodes named and numeric entities
/// - Trims lines and keeps at most one blank line between blocks
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();
    for tag in ["script", "style", "head", "title"] {
        text = remove_tag_block(&text, tag);
    }

    let mut out = String::with_capacity(text.len());
    let mut links: Vec<(Option<String>, usize)> = Vec::new();
    let mut rest = text.as_str();

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            // Unterminated tag: treat the remainder as text.
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let tag = &after[..close];
        rest = &after[close + 1..];

        if tag.starts_with('!') {
            continue; // comments and doctype
        }
        let closing = tag.starts_with('/');
        let name = tag_name(tag);

        match name.as_str() {
            "a" if !closing => links.push((attribute(tag, "href"), out.len())),
            "a" => {
                if let Some((Some(href), start)) = links.pop() {
                    let label = out[start..].trim();
                    let href = href.trim();
                    if !href.is_empty() && !href.starts_with('#') && label != href {
                        out.push_str(" (");
                        out.push_str(href);
                        out.push(')');
                    }
                }
            }
            "br" => out.push('\n'),
            "li" if !closing => out.push_str("\n- "),
            "td" | "th" => out.push(' '),
            n if BLOCK_TAGS.contains(&n) && !out.ends_with('\n') => out.push('\n'),
            _ => {}
        }
    }
    out.push_str(rest);

    normalize_lines(&decode_entities(&out))
}

/// Lowercase tag name from the inside of `<...>`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Value of a quoted or bare attribute inside a tag.
fn attribute(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(pos) = lower[search_from..].find(name) {
        let start = search_from + pos;
        search_from = start + name.len();
        let preceded_ok = start == 0
            || lower[..start]
                .chars()
                .last()
                .is_some_and(char::is_whitespace);
        let after = lower[search_from..].trim_start();
        if !preceded_ok || !after.starts_with('=') {
            continue;
        }
        let value_start = tag.len() - after.len() + 1;
        let value = tag[value_start..].trim_start();
        return match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].split(q).next().map(str::to_string),
            Some(_) => value
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .map(str::to_string),
            None => None,
        };
    }
    None
}

/// Decode common named entities and all numeric entities.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity_char(&candidate[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "laquo" => '«',
        "raquo" => '»',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "copy" => '©',
        "reg" => '®',
        "euro" => '€',
        _ => return None,
    })
}

/// Collapse horizontal whitespace, trim lines, keep at most one blank line.
fn normalize_lines(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut prev_was_blank = true;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(&collapsed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }
    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = html.to_ascii_lowercase();
    let mut result = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(found) = lower[pos..].find(&open) {
        let start = pos + found;
        // Require a tag boundary so "<header" does not match "<head".
        let boundary = lower[start + open.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == '>' || c == '/' || c.is_whitespace());
        if !boundary {
            result.push_str(&html[pos..start + open.len()]);
            pos = start + open.len();
            continue;
        }
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_drops_emphasis() {
        assert_eq!(html_to_text("<p>Hi <b>there</b></p>"), "Hi there");
    }

    #[test]
    fn test_html_to_text_paragraphs() {
        let text = html_to_text("<p>Hello <i>world</i></p><p>Second paragraph</p>");
        assert_eq!(text, "Hello world\nSecond paragraph");
    }

    #[test]
    fn test_html_to_text_keeps_link_targets() {
        let text = html_to_text(r#"See <a href="https://example.com/x">the report</a>."#);
        assert_eq!(text, "See the report (https://example.com/x).");
    }

    #[test]
    fn test_html_to_text_link_equal_to_label() {
        let text = html_to_text(r#"<a href='https://a.io'>https://a.io</a>"#);
        assert_eq!(text, "https://a.io");
    }

    #[test]
    fn test_html_to_text_drops_images_and_table_markup() {
        let html = r#"<img src="logo.png" alt="Logo"><table><tr><td>A</td><td>B</td></tr></table>"#;
        assert_eq!(html_to_text(html), "A B");
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(
            html_to_text("Tom &amp; Jerry &lt;3&gt; &#1055;&#x440;"),
            "Tom & Jerry <3> Пр"
        );
        assert_eq!(html_to_text("AT&T rocks"), "AT&T rocks");
    }

    #[test]
    fn test_html_to_text_removes_scripts_and_head() {
        let html = "<html><head><title>T</title></head><body>Before<script>alert('x')</script>After</body></html>";
        assert_eq!(html_to_text(html), "BeforeAfter");
    }

    #[test]
    fn test_html_to_text_collapses_blank_lines() {
        let html = "<div>One</div><br><br><br><div>Two</div>";
        assert_eq!(html_to_text(html), "One\n\nTwo");
    }

    #[test]
    fn test_remove_tag_block_respects_boundary() {
        let html = "<header>Keep</header><head>drop</head>";
        assert_eq!(remove_tag_block(html, "head"), "<header>Keep</header>");
    }
}
