//! HTML serialization and parsing.
//!
//! The parser is the document environment's `innerHTML`: it applies the
//! normalizations a browser applies to markup that is invalid for its
//! context. The cases that matter here:
//!
//! - block content closes an open `<p>`, and a stray `</p>` creates an empty
//!   paragraph, so `<p><div></div></p>` becomes `<p></p><div></div><p></p>`
//! - rows directly inside `<table>` get an implied `<tbody>`
//! - an open `<li>` closes when the next `<li>` starts
//! - adjacent text merges into one text node
//!
//! It is not a complete HTML5 tree builder.

use super::document::{Document, NodeId, NodeKind};
use super::flags::{element_kind, ElementKind};

// =============================================================================
// Serialization
// =============================================================================

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

/// Opening tag text, e.g. `<div class="box">`.
pub fn start_tag(tag: &str, attrs: &[(String, String)]) -> String {
    let mut out = format!("<{tag}");
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    out
}

/// Closing tag text, empty for void elements.
pub fn end_tag(tag: &str) -> String {
    if element_kind(tag).contains(ElementKind::VOID) {
        String::new()
    } else {
        format!("</{tag}>")
    }
}

/// Serialize a node, including itself. Fragments serialize as their children.
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

/// Serialize a node's children.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for &child in doc.children(id) {
        write_node(doc, child, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        None => {}
        Some(NodeKind::Fragment) => {
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        Some(NodeKind::Element { tag, attrs }) => {
            out.push_str(&start_tag(tag, attrs));
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str(&end_tag(tag));
        }
        Some(NodeKind::Text(content)) => out.push_str(&escape_text(content)),
        Some(NodeKind::Comment(content)) => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Comment(String),
    Start {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    End(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->").unwrap_or(after.len());
            tokens.push(Token::Comment(after[..end].to_string()));
            rest = after.get(end + 3..).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            tokens.push(Token::End(after[..end].trim().to_ascii_lowercase()));
            rest = after.get(end + 1..).unwrap_or("");
        } else if let Some(after) = rest
            .strip_prefix('<')
            .filter(|after| after.starts_with(|c: char| c.is_ascii_alphabetic()))
        {
            let (token, remaining) = start_tag_token(after);
            tokens.push(token);
            rest = remaining;
        } else {
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            let end = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
            tokens.push(Token::Text(decode_entities(&rest[..end])));
            rest = &rest[end..];
        }
    }
    tokens
}

/// Parse `tag attr="v" ...>` (the `<` already consumed).
fn start_tag_token(input: &str) -> (Token, &str) {
    let name_end = input
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(input.len());
    let tag = input[..name_end].to_ascii_lowercase();
    let mut rest = &input[name_end..];
    let mut attrs = Vec::new();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(after) = rest.strip_prefix("/>") {
            rest = after;
            break;
        }
        if let Some(after) = rest.strip_prefix('>') {
            rest = after;
            break;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        if name_end == 0 {
            // Lone '/' or stray '='.
            rest = &rest[1..];
            continue;
        }
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let mut value = String::new();
        if let Some(after) = rest.strip_prefix('=') {
            let after = after.trim_start();
            let (raw, remaining) = match after.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after[1..];
                    let close = body.find(quote).unwrap_or(body.len());
                    (&body[..close], body.get(close + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after
                        .find(|c: char| c.is_whitespace() || c == '>')
                        .unwrap_or(after.len());
                    (&after[..end], &after[end..])
                }
            };
            value = decode_entities(raw);
            rest = remaining;
        }
        if !attrs.iter().any(|(existing, _): &(String, String)| *existing == name) {
            attrs.push((name, value));
        }
    }

    (Token::Start { tag, attrs }, rest)
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];
        let decoded = candidate.find(';').and_then(|semi| {
            let name = &candidate[..semi];
            let c = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    out
}

// =============================================================================
// Tree building
// =============================================================================

/// Parse `html` and append the resulting nodes to `parent`.
pub fn parse_into(doc: &mut Document, parent: NodeId, html: &str) {
    // stack[0] is the context node and is never popped.
    let mut stack = vec![parent];

    for token in tokenize(html) {
        match token {
            Token::Text(text) => append_text(doc, current(&stack), &text),
            Token::Comment(content) => {
                let node = doc.create_comment(&content);
                doc.append_child(current(&stack), node);
            }
            Token::Start { tag, attrs } => start_element(doc, &mut stack, tag, attrs),
            Token::End(tag) => end_element(doc, &mut stack, &tag),
        }
    }
}

/// Parse `html` into a new fragment.
pub fn parse_fragment(doc: &mut Document, html: &str) -> NodeId {
    let fragment = doc.create_fragment();
    parse_into(doc, fragment, html);
    fragment
}

/// Serialize `html` the way the environment would after parsing it.
pub fn normalize(html: &str) -> String {
    let mut doc = Document::new();
    let fragment = parse_fragment(&mut doc, html);
    inner_html(&doc, fragment)
}

fn current(stack: &[NodeId]) -> NodeId {
    stack[stack.len() - 1]
}

fn append_text(doc: &mut Document, parent: NodeId, text: &str) {
    if let Some(last) = doc.last_child(parent) {
        if let Some(NodeKind::Text(existing)) = doc.kind(last) {
            let merged = format!("{existing}{text}");
            doc.set_text(last, &merged);
            return;
        }
    }
    let node = doc.create_text(text);
    doc.append_child(parent, node);
}

fn push_element(doc: &mut Document, stack: &mut Vec<NodeId>, tag: &str, attrs: Vec<(String, String)>) {
    let node = doc.create_element_with(tag, attrs);
    doc.append_child(current(stack), node);
    if !element_kind(tag).contains(ElementKind::VOID) {
        stack.push(node);
    }
}

/// Index in `stack` of the innermost open `tag` reachable without crossing
/// a scope boundary.
fn in_scope(doc: &Document, stack: &[NodeId], tag: &str) -> Option<usize> {
    for (index, &node) in stack.iter().enumerate().skip(1).rev() {
        let open = doc.tag(node).unwrap_or("");
        if open == tag {
            return Some(index);
        }
        if element_kind(open).contains(ElementKind::SCOPE) {
            return None;
        }
    }
    None
}

fn start_element(doc: &mut Document, stack: &mut Vec<NodeId>, tag: String, attrs: Vec<(String, String)>) {
    let kind = element_kind(&tag);

    if kind.contains(ElementKind::CLOSES_P) {
        if let Some(index) = in_scope(doc, stack, "p") {
            stack.truncate(index);
        }
    }
    if tag == "li" {
        if let Some(index) = in_scope(doc, stack, "li") {
            stack.truncate(index);
        }
    }

    let open = doc.tag(current(stack)).unwrap_or("").to_string();
    let open_kind = element_kind(&open);
    match tag.as_str() {
        "tr" if open == "table" => push_element(doc, stack, "tbody", Vec::new()),
        _ if kind.contains(ElementKind::TABLE_CELL) => {
            if open == "table" {
                push_element(doc, stack, "tbody", Vec::new());
                push_element(doc, stack, "tr", Vec::new());
            } else if open_kind.contains(ElementKind::TABLE_SECTION) {
                push_element(doc, stack, "tr", Vec::new());
            }
        }
        _ => {}
    }

    push_element(doc, stack, &tag, attrs);
}

fn end_element(doc: &mut Document, stack: &mut Vec<NodeId>, tag: &str) {
    if let Some(index) = in_scope(doc, stack, tag) {
        stack.truncate(index);
        return;
    }
    // A `</p>` with no open paragraph produces an empty one.
    if tag == "p" {
        let node = doc.create_element("p");
        doc.append_child(current(stack), node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(html: &str) -> String {
        normalize(html)
    }

    #[test]
    fn test_valid_markup_is_stable() {
        let html = r#"<div class="box"><span>hi</span><!--if--><b>x</b><!--/if--></div>"#;
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn test_void_elements() {
        assert_eq!(roundtrip("<p>a<br>b<input disabled=\"\"></p>"), "<p>a<br>b<input disabled=\"\"></p>");
        assert_eq!(roundtrip("<br/>"), "<br>");
    }

    #[test]
    fn test_block_in_paragraph_is_split() {
        assert_eq!(roundtrip("<p><div></div></p>"), "<p></p><div></div><p></p>");
    }

    #[test]
    fn test_table_gets_tbody() {
        assert_eq!(
            roundtrip("<table><tr><td></td></tr></table>"),
            "<table><tbody><tr><td></td></tr></tbody></table>"
        );
        assert_eq!(
            roundtrip("<table><td>x</td></table>"),
            "<table><tbody><tr><td>x</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_list_items_close() {
        assert_eq!(roundtrip("<ul><li>a<li>b</ul>"), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42; &bogus;"), "a & b <c> AB &bogus;");
        assert_eq!(roundtrip("<i title=\"&quot;q&quot;\">&lt;</i>"), "<i title=\"&quot;q&quot;\">&lt;</i>");
    }

    #[test]
    fn test_attributes_parse() {
        let tokens = tokenize("<a href='x' data-n=3 hidden>");
        assert_eq!(
            tokens,
            vec![Token::Start {
                tag: "a".into(),
                attrs: vec![
                    ("href".into(), "x".into()),
                    ("data-n".into(), "3".into()),
                    ("hidden".into(), String::new()),
                ],
            }]
        );
    }

    #[test]
    fn test_adjacent_text_merges() {
        let mut doc = Document::new();
        let fragment = parse_fragment(&mut doc, "a&amp;b");
        assert_eq!(doc.children(fragment).len(), 1);
        assert_eq!(doc.text(doc.children(fragment)[0]), Some("a&b"));
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        assert_eq!(roundtrip("<span>x</div></span>"), "<span>x</span>");
    }

    #[test]
    fn test_text_escaping() {
        let mut doc = Document::new();
        let fragment = doc.create_fragment();
        let text = doc.create_text("1 < 2 & 3");
        doc.append_child(fragment, text);
        assert_eq!(inner_html(&doc, fragment), "1 &lt; 2 &amp; 3");
    }
}
