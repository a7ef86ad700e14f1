//! HTTP fetch and DOM text extraction.
//!
//! Extraction walks paragraphs, headings, and list items in source order and
//! flattens each into one plain-text block. `script` and `style` subtrees are
//! skipped everywhere. The whole-page text is captured alongside the blocks
//! so the chunker can fall back to it when no block-level text exists.

use std::sync::OnceLock;
use std::time::Duration;

use ego_tree::NodeRef;
use reqwest::Client;
use scraper::{Html, Selector, node::Node};
use tracing::debug;
use url::Url;

use crate::types::SearchError;

/// Plain text extracted from one source document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Ordered text blocks, one per matched DOM element, already
    /// whitespace-normalized and non-empty.
    pub blocks: Vec<String>,
    /// The whole page flattened to text, used as the chunker's fallback.
    pub full_text: String,
}

impl Document {
    /// True when the page yielded no text at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.full_text.is_empty()
    }
}

fn block_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        Selector::parse("p, h1, h2, h3, li").expect("static selector is valid")
    })
}

/// Fetches `url` and extracts its text. Non-2xx responses and transport
/// failures surface as [`SearchError::Fetch`] with whatever status detail is
/// available.
pub async fn fetch_document(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<Document, SearchError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| SearchError::Fetch {
            status: None,
            detail: format!("request to {url} failed: {err}"),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SearchError::Fetch {
            status: Some(status.as_u16()),
            detail: format!("request to {url} returned {status}"),
        });
    }

    let html = response.text().await.map_err(|err| SearchError::Fetch {
        status: Some(status.as_u16()),
        detail: format!("failed to read response body from {url}: {err}"),
    })?;

    let document = extract_document(&html);
    debug!(
        url = %url,
        blocks = document.blocks.len(),
        bytes = html.len(),
        "fetched and extracted document"
    );
    Ok(document)
}

/// Extracts text blocks and the whole-page fallback text from raw HTML.
pub fn extract_document(html: &str) -> Document {
    let dom = Html::parse_document(html);

    let mut blocks = Vec::new();
    for element in dom.select(block_selector()) {
        let mut raw = String::new();
        collect_text(*element, &mut raw);
        let text = normalize_whitespace(&raw);
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    let mut raw = String::new();
    collect_text(dom.tree.root(), &mut raw);
    let full_text = normalize_whitespace(&raw);

    Document { blocks, full_text }
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            Node::Element(element) if matches!(element.name(), "script" | "style") => {}
            Node::Element(_) => collect_text(child, out),
            _ => {}
        }
    }
}

fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_blocks_in_source_order() {
        let html = r#"
            <html><body>
                <h1>Title</h1>
                <p>First paragraph.</p>
                <ul><li>Item one</li><li>Item two</li></ul>
                <p>Last paragraph.</p>
            </body></html>
        "#;
        let document = extract_document(html);
        assert_eq!(
            document.blocks,
            vec![
                "Title",
                "First paragraph.",
                "Item one",
                "Item two",
                "Last paragraph.",
            ]
        );
    }

    #[test]
    fn skips_script_and_style_content() {
        let html = r#"
            <html><head><style>p { color: red; }</style></head><body>
                <p>Visible <script>var hidden = true;</script> text</p>
            </body></html>
        "#;
        let document = extract_document(html);
        assert_eq!(document.blocks, vec!["Visible text"]);
        assert!(!document.full_text.contains("hidden"));
        assert!(!document.full_text.contains("color"));
    }

    #[test]
    fn full_text_covers_elements_outside_block_selectors() {
        let html = "<html><body><div>Only a div here.</div></body></html>";
        let document = extract_document(html);
        assert!(document.blocks.is_empty());
        assert_eq!(document.full_text, "Only a div here.");
    }

    #[test]
    fn empty_page_yields_empty_document() {
        let document = extract_document("<html><body></body></html>");
        assert!(document.is_empty());
    }

    #[test]
    fn collapses_internal_whitespace() {
        let html = "<p>spread \n   across\t lines</p>";
        let document = extract_document(html);
        assert_eq!(document.blocks, vec!["spread across lines"]);
    }
}
