//! HTML content-model flags used by the parser and serializer.

bitflags::bitflags! {
    /// How the HTML tree builder treats an element.
    ///
    /// Combine with bitwise OR: `ElementKind::CLOSES_P | ElementKind::SCOPE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ElementKind: u8 {
        const NONE = 0;
        /// No children and no end tag (`br`, `img`, `input`, ...).
        const VOID = 1 << 0;
        /// A start tag closes an open `<p>` (block-level content).
        const CLOSES_P = 1 << 1;
        /// Bounds the search for an open element to close.
        const SCOPE = 1 << 2;
        /// `tbody`, `thead`, `tfoot`.
        const TABLE_SECTION = 1 << 3;
        /// `td`, `th`.
        const TABLE_CELL = 1 << 4;
    }
}

/// Classify a lowercase tag name.
pub fn element_kind(tag: &str) -> ElementKind {
    match tag {
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
        | "source" | "track" | "wbr" => {
            if tag == "hr" {
                ElementKind::VOID | ElementKind::CLOSES_P
            } else {
                ElementKind::VOID
            }
        }
        "address" | "article" | "aside" | "blockquote" | "details" | "div" | "dl" | "fieldset"
        | "figcaption" | "figure" | "footer" | "form" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        | "header" | "main" | "menu" | "nav" | "ol" | "p" | "pre" | "section" | "ul" => {
            ElementKind::CLOSES_P
        }
        "table" => ElementKind::CLOSES_P | ElementKind::SCOPE,
        "tbody" | "thead" | "tfoot" => ElementKind::TABLE_SECTION,
        "td" | "th" => ElementKind::TABLE_CELL | ElementKind::SCOPE,
        "button" | "caption" | "html" | "template" | "object" | "marquee" | "applet" => {
            ElementKind::SCOPE
        }
        _ => ElementKind::NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kind() {
        assert!(element_kind("br").contains(ElementKind::VOID));
        assert!(element_kind("hr").contains(ElementKind::VOID | ElementKind::CLOSES_P));
        assert!(element_kind("div").contains(ElementKind::CLOSES_P));
        assert!(element_kind("table").contains(ElementKind::SCOPE));
        assert!(element_kind("tbody").contains(ElementKind::TABLE_SECTION));
        assert!(element_kind("td").contains(ElementKind::TABLE_CELL));
        assert_eq!(element_kind("span"), ElementKind::NONE);
    }
}
