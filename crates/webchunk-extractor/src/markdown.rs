//! C6 (Markdown branch): CommonMark walk producing the same
//! `StructuredElement`/`mainText`/images/links shape as the HTML branch
//! (spec §4.6).

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use webchunk_common::types::{ElementKind, ImageRef, LinkRef, StructuredElement};

use crate::raw::RawExtraction;

pub fn extract_markdown(body: &str, _source_url: &str) -> RawExtraction {
    let mut ctx = MarkdownWalker::new();
    ctx.run(body);
    ctx.finish()
}

struct MarkdownWalker {
    main_text: String,
    elements: Vec<StructuredElement>,
    images: Vec<ImageRef>,
    links: Vec<LinkRef>,
    title: Option<String>,

    current_text: String,
    heading_level: Option<u8>,
    in_code_block: bool,
    code_block: String,
    in_list_item: bool,
    list_items: Vec<Vec<StructuredElement>>,
    in_table: bool,
    table_rows: Vec<Vec<String>>,
    table_row: Vec<String>,
    in_table_cell: bool,
    in_blockquote: bool,
    pending_image: Option<(String, String)>,
}

impl MarkdownWalker {
    fn new() -> Self {
        Self {
            main_text: String::new(),
            elements: Vec::new(),
            images: Vec::new(),
            links: Vec::new(),
            title: None,
            current_text: String::new(),
            heading_level: None,
            in_code_block: false,
            code_block: String::new(),
            in_list_item: false,
            list_items: Vec::new(),
            in_table: false,
            table_rows: Vec::new(),
            table_row: Vec::new(),
            in_table_cell: false,
            in_blockquote: false,
            pending_image: None,
        }
    }

    fn run(&mut self, body: &str) {
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(body, options);
        for event in parser {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.push_text(&code),
            Event::SoftBreak => self.current_text.push(' '),
            Event::HardBreak => self.current_text.push('\n'),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.heading_level = Some(heading_level_to_u8(level));
                self.current_text.clear();
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = true;
                self.code_block.clear();
            }
            Tag::List(_) => {
                self.list_items.push(Vec::new());
            }
            Tag::Item => {
                self.in_list_item = true;
                self.current_text.clear();
            }
            Tag::Table(_) => {
                self.in_table = true;
                self.table_rows.clear();
            }
            Tag::TableHead | Tag::TableRow => {
                self.table_row.clear();
            }
            Tag::TableCell => {
                self.in_table_cell = true;
                self.current_text.clear();
            }
            Tag::BlockQuote(_) => {
                self.in_blockquote = true;
                self.current_text.clear();
            }
            Tag::Paragraph => {
                if !self.in_list_item && !self.in_table {
                    self.current_text.clear();
                }
            }
            Tag::Link { dest_url, .. } => {
                self.pending_image = Some((dest_url.to_string(), String::new()));
            }
            Tag::Image { dest_url, .. } => {
                self.pending_image = Some((dest_url.to_string(), String::new()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(level) => {
                let text = self.current_text.trim().to_string();
                if heading_level_to_u8(level) == 1 && self.title.is_none() {
                    self.title = Some(text.clone());
                }
                let position = self.push_block(&text);
                self.elements.push(StructuredElement {
                    kind: ElementKind::Header,
                    content: text,
                    level: self.heading_level,
                    attributes: Default::default(),
                    position,
                    children: Vec::new(),
                });
                self.heading_level = None;
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                let code = std::mem::take(&mut self.code_block);
                let position = self.push_block(&code);
                self.elements.push(StructuredElement::leaf(ElementKind::CodeBlock, code, position));
            }
            TagEnd::List(_) => {
                if let Some(items) = self.list_items.pop() {
                    if !items.is_empty() {
                        let position = self.main_text.len();
                        self.elements.push(StructuredElement {
                            kind: ElementKind::List,
                            content: String::new(),
                            level: None,
                            attributes: Default::default(),
                            position,
                            children: items,
                        });
                    }
                }
            }
            TagEnd::Item => {
                self.in_list_item = false;
                let text = self.current_text.trim().to_string();
                let position = self.push_block(&text);
                let item = StructuredElement::leaf(ElementKind::ListItem, text, position);
                if let Some(items) = self.list_items.last_mut() {
                    items.push(item);
                }
            }
            TagEnd::Table => {
                self.in_table = false;
                if !self.table_rows.is_empty() {
                    let position = self.main_text.len();
                    let rows = self
                        .table_rows
                        .drain(..)
                        .map(|row| {
                            let cells = row
                                .into_iter()
                                .map(|cell| StructuredElement::leaf(ElementKind::TableCell, cell, 0))
                                .collect();
                            StructuredElement {
                                kind: ElementKind::TableRow,
                                content: String::new(),
                                level: None,
                                attributes: Default::default(),
                                position,
                                children: cells,
                            }
                        })
                        .collect();
                    self.elements.push(StructuredElement {
                        kind: ElementKind::Table,
                        content: String::new(),
                        level: None,
                        attributes: Default::default(),
                        position,
                        children: rows,
                    });
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                self.table_rows.push(std::mem::take(&mut self.table_row));
            }
            TagEnd::TableCell => {
                self.in_table_cell = false;
                self.table_row.push(self.current_text.trim().to_string());
            }
            TagEnd::BlockQuote(_) => {
                self.in_blockquote = false;
                let text = self.current_text.trim().to_string();
                let position = self.push_block(&text);
                self.elements.push(StructuredElement::leaf(ElementKind::Blockquote, text, position));
            }
            TagEnd::Paragraph => {
                if !self.in_list_item && !self.in_table && !self.in_blockquote {
                    let text = self.current_text.trim().to_string();
                    if !text.is_empty() {
                        let position = self.push_block(&text);
                        self.elements.push(StructuredElement::leaf(ElementKind::Paragraph, text, position));
                    }
                }
            }
            TagEnd::Link => {
                if let Some((dest, text)) = self.pending_image.take() {
                    let position = self.main_text.len();
                    self.links.push(LinkRef {
                        href: dest.clone(),
                        text: text.trim().to_string(),
                        is_internal: !dest.starts_with("http"),
                        is_anchor: dest.starts_with('#'),
                        is_email: dest.starts_with("mailto:"),
                        is_phone: dest.starts_with("tel:"),
                        position,
                    });
                }
            }
            TagEnd::Image => {
                if let Some((src, alt)) = self.pending_image.take() {
                    let position = self.main_text.len();
                    self.images.push(ImageRef {
                        src,
                        alt: if alt.is_empty() { None } else { Some(alt) },
                        title: None,
                        position,
                        surrounding_text: tail(&self.main_text, 200),
                    });
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, buf)) = self.pending_image.as_mut() {
            buf.push_str(text);
        }
        if self.in_code_block {
            self.code_block.push_str(text);
        } else {
            self.current_text.push_str(text);
        }
    }

    /// Appends a finished block to `mainText` with a blank-line separator.
    fn push_block(&mut self, text: &str) -> usize {
        if text.is_empty() {
            return self.main_text.len();
        }
        if !self.main_text.is_empty() {
            self.main_text.push_str("\n\n");
        }
        let position = self.main_text.len();
        self.main_text.push_str(text);
        position
    }

    fn finish(self) -> RawExtraction {
        RawExtraction {
            main_text: self.main_text,
            elements: self.elements,
            images: self.images,
            links: self.links,
            title: self.title,
        }
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    text.chars().rev().take(max_chars).collect::<Vec<_>>().into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headings_paragraphs_and_title() {
        let md = "# Title\n\nFirst paragraph.\n\n## Section\n\nSecond paragraph.\n";
        let result = extract_markdown(md, "https://example.com/doc");
        assert_eq!(result.title.as_deref(), Some("Title"));
        assert!(result.main_text.contains("First paragraph."));
        let headers: Vec<_> = result.elements.iter().filter(|e| e.kind == ElementKind::Header).collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].level, Some(2));
    }

    #[test]
    fn extracts_list_and_code_block() {
        let md = "- one\n- two\n\n```rust\nfn main() {}\n```\n";
        let result = extract_markdown(md, "https://example.com/doc");
        let list = result.elements.iter().find(|e| e.kind == ElementKind::List).unwrap();
        assert_eq!(list.children.len(), 2);
        let code = result.elements.iter().find(|e| e.kind == ElementKind::CodeBlock).unwrap();
        assert!(code.content.contains("fn main"));
    }

    #[test]
    fn extracts_table_structure() {
        let md = "| A | B |\n|---|---|\n| 1 | 2 |\n";
        let result = extract_markdown(md, "https://example.com/doc");
        let table = result.elements.iter().find(|e| e.kind == ElementKind::Table).unwrap();
        assert_eq!(table.children.len(), 2);
        assert_eq!(table.children[0].children.len(), 2);
    }
}
