//! C4 (sitemap slice): sitemaps.org 0.90 parsing, with one level of
//! sitemap-index flattening (spec §4.4).

use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub priority: Option<f32>,
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    UrlSet(Vec<SitemapEntry>),
    /// Nested sitemap URLs from a `<sitemapindex>`; the caller is expected
    /// to fetch and parse each one (flattened one level, per spec).
    Index(Vec<String>),
}

pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut is_index = false;
    let mut entries = Vec::new();
    let mut index_urls = Vec::new();

    let mut in_loc = false;
    let mut in_priority = false;
    let mut in_lastmod = false;
    let mut cur_loc: Option<String> = None;
    let mut cur_priority: Option<f32> = None;
    let mut cur_lastmod: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(&e.name().as_ref()).as_str() {
                "sitemapindex" => is_index = true,
                "loc" => in_loc = true,
                "priority" => in_priority = true,
                "lastmod" => in_lastmod = true,
                "url" | "sitemap" => {
                    cur_loc = None;
                    cur_priority = None;
                    cur_lastmod = None;
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default().to_string();
                if in_loc {
                    cur_loc = Some(text);
                } else if in_priority {
                    cur_priority = text.parse().ok();
                } else if in_lastmod {
                    cur_lastmod = Some(text);
                }
            }
            Ok(Event::End(e)) => match local_name(&e.name().as_ref()).as_str() {
                "loc" => in_loc = false,
                "priority" => in_priority = false,
                "lastmod" => in_lastmod = false,
                "url" => {
                    if let Some(loc) = cur_loc.take() {
                        entries.push(SitemapEntry {
                            url: loc,
                            priority: cur_priority.take(),
                            lastmod: cur_lastmod.take(),
                        });
                    }
                }
                "sitemap" => {
                    if let Some(loc) = cur_loc.take() {
                        index_urls.push(loc);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if is_index {
        SitemapDocument::Index(index_urls)
    } else {
        SitemapDocument::UrlSet(entries)
    }
}

fn local_name(qname: &&[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/a</loc><priority>0.8</priority><lastmod>2024-01-01</lastmod></url>
  <url><loc>https://example.com/b</loc></url>
</urlset>"#;
        let doc = parse_sitemap(xml);
        match doc {
            SitemapDocument::UrlSet(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].url, "https://example.com/a");
                assert_eq!(entries[0].priority, Some(0.8));
                assert_eq!(entries[1].priority, None);
            }
            _ => panic!("expected urlset"),
        }
    }

    #[test]
    fn parses_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap1.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap2.xml</loc></sitemap>
</sitemapindex>"#;
        let doc = parse_sitemap(xml);
        match doc {
            SitemapDocument::Index(urls) => assert_eq!(urls.len(), 2),
            _ => panic!("expected index"),
        }
    }
}
