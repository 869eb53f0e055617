//! C6 (HTML branch): DOM walk producing `StructuredElement`s, `mainText`,
//! images, and links (spec §4.6).

use scraper::{ElementRef, Html, Selector};
use url::Url;

use webchunk_common::types::{ElementKind, ImageRef, LinkRef, StructuredElement};

use crate::raw::RawExtraction;

const SURROUNDING_CHARS: usize = 200;

/// Space-separated class/id tokens treated as boilerplate containers, in
/// addition to tag-level removal of script/style/nav/footer/aside.
const BOILERPLATE_TOKENS: &[&str] = &[
    "nav", "navbar", "navigation", "sidebar", "menu", "breadcrumb", "breadcrumbs", "advertisement", "ad", "ads",
    "social", "share", "sharing", "cookie", "cookies", "cookie-banner", "cookie-consent", "banner", "popup", "modal",
];

fn is_boilerplate(el: ElementRef) -> bool {
    let tag = el.value().name();
    if matches!(tag, "script" | "style" | "noscript" | "nav" | "footer" | "aside") {
        return true;
    }
    if el.value().attr("aria-hidden") == Some("true") || el.value().attr("hidden").is_some() {
        return true;
    }
    for attr in ["class", "id"] {
        if let Some(value) = el.value().attr(attr) {
            if value.to_ascii_lowercase().split_whitespace().any(|t| BOILERPLATE_TOKENS.contains(&t)) {
                return true;
            }
        }
    }
    false
}

pub fn extract_html(body: &str, source_url: &str) -> RawExtraction {
    let document = Html::parse_document(body);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let root = document.root_element();
    let mut ctx = WalkCtx {
        main_text: String::new(),
        images: Vec::new(),
        links: Vec::new(),
        source_url: source_url.to_string(),
        block_count: 0,
    };
    let elements = ctx.walk_children(root);

    RawExtraction {
        main_text: ctx.main_text,
        elements,
        images: ctx.images,
        links: ctx.links,
        title,
    }
}

struct WalkCtx {
    main_text: String,
    images: Vec<ImageRef>,
    links: Vec<LinkRef>,
    source_url: String,
    /// Count of block boundaries opened so far, including ones (like an
    /// empty `ul`/`table` container) that haven't pushed any text of their
    /// own yet. Drives the `"\n\n"` separator instead of `main_text`
    /// emptiness, so a container's reserved position always precedes its
    /// first child's even when the container is the very first thing on
    /// the page.
    block_count: usize,
}

impl WalkCtx {
    fn walk_children(&mut self, parent: ElementRef) -> Vec<StructuredElement> {
        let mut out = Vec::new();
        for child in parent.children().filter_map(ElementRef::wrap) {
            if is_boilerplate(child) {
                continue;
            }
            if let Some(built) = self.visit(child) {
                out.push(built);
            }
        }
        out
    }

    /// Returns `Some(element)` for tags that become a `StructuredElement`
    /// node; container tags are flattened by recursing and returning
    /// `None` (their children are appended directly to the parent's list
    /// at the call site via `flatten_into`).
    fn visit(&mut self, el: ElementRef) -> Option<StructuredElement> {
        let tag = el.value().name();
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<u8>().ok();
                let text = self.collect_inline(el);
                let position = self.push_text_block(&text);
                Some(StructuredElement {
                    kind: ElementKind::Header,
                    content: text,
                    level,
                    attributes: Default::default(),
                    position,
                    children: Vec::new(),
                })
            }
            "p" => {
                let text = self.collect_inline(el);
                if text.trim().is_empty() {
                    return None;
                }
                let position = self.push_text_block(&text);
                Some(StructuredElement::leaf(ElementKind::Paragraph, text, position))
            }
            "ul" | "ol" => {
                if !el.children().filter_map(ElementRef::wrap).any(|c| c.value().name() == "li") {
                    return None;
                }
                let position = self.reserve_block_position();
                let children = self.collect_list_items(el);
                if children.is_empty() {
                    return None;
                }
                Some(StructuredElement {
                    kind: ElementKind::List,
                    content: String::new(),
                    level: None,
                    attributes: Default::default(),
                    position,
                    children,
                })
            }
            "table" => {
                let position = self.reserve_block_position();
                let children = self.collect_rows(el);
                Some(StructuredElement {
                    kind: ElementKind::Table,
                    content: String::new(),
                    level: None,
                    attributes: Default::default(),
                    position,
                    children,
                })
            }
            "pre" => {
                let text = el.text().collect::<String>();
                let position = self.push_text_block(&text);
                Some(StructuredElement::leaf(ElementKind::CodeBlock, text, position))
            }
            "blockquote" => {
                let text = self.collect_inline(el);
                let position = self.push_text_block(&text);
                Some(StructuredElement::leaf(ElementKind::Blockquote, text, position))
            }
            "hr" => {
                let position = self.main_text.len();
                Some(StructuredElement::leaf(ElementKind::Divider, "", position))
            }
            "img" => {
                self.record_image(el);
                None
            }
            "a" => {
                self.record_link(el);
                None
            }
            _ => {
                // Container: flatten children into the parent's list.
                let flattened = self.walk_children(el);
                if flattened.is_empty() {
                    None
                } else if flattened.len() == 1 {
                    Some(flattened.into_iter().next().unwrap())
                } else {
                    // Can't return >1 node from `visit`; stash as Other wrapper.
                    Some(StructuredElement {
                        kind: ElementKind::Other,
                        content: String::new(),
                        level: None,
                        attributes: Default::default(),
                        position: self.main_text.len(),
                        children: flattened,
                    })
                }
            }
        }
    }

    fn collect_list_items(&mut self, list: ElementRef) -> Vec<StructuredElement> {
        let mut items = Vec::new();
        for li in list.children().filter_map(ElementRef::wrap) {
            if li.value().name() != "li" {
                continue;
            }
            let text = self.collect_inline(li);
            let position = self.push_text_block(&text);
            items.push(StructuredElement::leaf(ElementKind::ListItem, text, position));
        }
        items
    }

    fn collect_rows(&mut self, table: ElementRef) -> Vec<StructuredElement> {
        let mut rows = Vec::new();
        for row_container in table.children().filter_map(ElementRef::wrap) {
            let candidates: Vec<ElementRef> = if matches!(row_container.value().name(), "thead" | "tbody" | "tfoot") {
                row_container.children().filter_map(ElementRef::wrap).collect()
            } else {
                vec![row_container]
            };
            for tr in candidates {
                if tr.value().name() != "tr" {
                    continue;
                }
                let position = self.reserve_block_position();
                let mut cells = Vec::new();
                for cell in tr.children().filter_map(ElementRef::wrap) {
                    if !matches!(cell.value().name(), "td" | "th") {
                        continue;
                    }
                    let text = self.collect_inline(cell);
                    let cell_position = self.push_text_block(&text);
                    cells.push(StructuredElement::leaf(ElementKind::TableCell, text, cell_position));
                }
                rows.push(StructuredElement {
                    kind: ElementKind::TableRow,
                    content: String::new(),
                    level: None,
                    attributes: Default::default(),
                    position,
                    children: cells,
                });
            }
        }
        rows
    }

    /// Flattens inline text runs under `el`, recording links/images found
    /// along the way, without creating block-level `StructuredElement`s.
    fn collect_inline(&mut self, el: ElementRef) -> String {
        let mut text = String::new();
        self.collect_inline_into(el, &mut text);
        collapse_whitespace(&text)
    }

    fn collect_inline_into(&mut self, el: ElementRef, out: &mut String) {
        for node in el.children() {
            if let Some(child_el) = ElementRef::wrap(node) {
                if is_boilerplate(child_el) {
                    continue;
                }
                match child_el.value().name() {
                    "img" => self.record_image(child_el),
                    "a" => {
                        self.record_link_in(child_el, out);
                    }
                    "br" => out.push(' '),
                    _ => self.collect_inline_into(child_el, out),
                }
            } else if let Some(text_node) = node.value().as_text() {
                out.push_str(text_node);
            }
        }
    }

    fn record_link_in(&mut self, a: ElementRef, out: &mut String) {
        let text = a.text().collect::<String>();
        out.push_str(&text);
        self.push_link(a, &text);
    }

    fn record_link(&mut self, a: ElementRef) {
        let text = a.text().collect::<String>();
        self.push_link(a, &text);
    }

    fn push_link(&mut self, a: ElementRef, text: &str) {
        let Some(href) = a.value().attr("href") else { return };
        let position = self.main_text.len();
        let is_anchor = href.starts_with('#');
        let is_email = href.starts_with("mailto:");
        let is_phone = href.starts_with("tel:");
        let is_internal = !is_anchor
            && Url::parse(&self.source_url)
                .ok()
                .zip(Url::parse(href).ok().or_else(|| Url::parse(&self.source_url).ok()?.join(href).ok()))
                .map(|(base, target)| base.host_str() == target.host_str())
                .unwrap_or(true);

        self.links.push(LinkRef {
            href: href.to_string(),
            text: text.trim().to_string(),
            is_internal,
            is_anchor,
            is_email,
            is_phone,
            position,
        });
    }

    fn record_image(&mut self, img: ElementRef) {
        let Some(src) = img.value().attr("src") else { return };
        let position = self.main_text.len();
        let surrounding_text: String = self.main_text.chars().rev().take(SURROUNDING_CHARS).collect::<Vec<_>>().into_iter().rev().collect();
        self.images.push(ImageRef {
            src: src.to_string(),
            alt: img.value().attr("alt").map(str::to_string),
            title: img.value().attr("title").map(str::to_string),
            position,
            surrounding_text,
        });
    }

    /// Appends `text` to `mainText` with a blank-line block separator,
    /// returning the position at which it starts.
    fn push_text_block(&mut self, text: &str) -> usize {
        let position = self.reserve_block_position();
        self.main_text.push_str(text);
        position
    }

    /// Opens a new block boundary and returns the position it starts at,
    /// without pushing any content of its own. Used both by `push_text_block`
    /// and by container elements (list, table, table row) whose own
    /// `position` must precede their first child's — tracked via
    /// `block_count` rather than `main_text.is_empty()` so a container that
    /// is the very first thing on the page still reserves a distinct, lower
    /// position than the child that flushes into it next.
    fn reserve_block_position(&mut self) -> usize {
        if self.block_count > 0 {
            self.main_text.push_str("\n\n");
        }
        self.block_count += 1;
        self.main_text.len()
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head><title>Sample</title></head>
<body>
  <nav>skip me</nav>
  <h1>Welcome</h1>
  <p>First paragraph with a <a href="/about">link</a>.</p>
  <ul><li>one</li><li>two</li></ul>
  <table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>
  <img src="/pic.png" alt="a pic">
  <footer>bye</footer>
</body></html>"#;

    #[test]
    fn extracts_title_headings_and_skips_boilerplate() {
        let result = extract_html(PAGE, "https://example.com/page");
        assert_eq!(result.title.as_deref(), Some("Sample"));
        assert!(!result.main_text.contains("skip me"));
        assert!(!result.main_text.contains("bye"));
        assert!(result.main_text.contains("Welcome"));
    }

    #[test]
    fn collects_images_and_links() {
        let result = extract_html(PAGE, "https://example.com/page");
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.images[0].src, "/pic.png");
        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].is_internal);
    }

    #[test]
    fn builds_list_and_table_structure() {
        let result = extract_html(PAGE, "https://example.com/page");
        let has_list = result.elements.iter().any(|e| e.kind == ElementKind::List && e.children.len() == 2);
        let has_table = result
            .elements
            .iter()
            .any(|e| e.kind == ElementKind::Table && e.children.len() == 2);
        assert!(has_list, "expected a List element with 2 items");
        assert!(has_table, "expected a Table element with 2 rows");
    }
}
