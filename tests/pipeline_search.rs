//! End-to-end pipeline tests with deterministic collaborators.
//!
//! The page fetch runs against an httpmock server; embeddings come from the
//! deterministic mock provider and the index is the in-process
//! implementation, so runs need no external services.

use std::sync::Arc;

use httpmock::{Method::GET, MockServer};

use pagesift::chunking::BpeTokenizer;
use pagesift::embeddings::MockEmbeddingProvider;
use pagesift::index::MemoryIndex;
use pagesift::types::SearchError;
use pagesift::{SearchConfig, SearchPipeline};

fn make_pipeline(index: Arc<MemoryIndex>) -> SearchPipeline {
    SearchPipeline::builder()
        .tokenizer(Arc::new(BpeTokenizer::new().unwrap()))
        .embedder(Arc::new(MockEmbeddingProvider::new(384)))
        .index(index)
        .config(SearchConfig::default())
        .build()
        .unwrap()
}

async fn serve_page(server: &MockServer, path: &str, body: &str) {
    server
        .mock_async(|when, then| {
            when.method(GET).path(path.to_string());
            then.status(200)
                .header("content-type", "text/html")
                .body(body.to_string());
        })
        .await;
}

#[tokio::test]
async fn query_ranks_the_matching_paragraph_first() {
    let server = MockServer::start_async().await;
    serve_page(
        &server,
        "/doc",
        "<html><body>\
         <p>A short paragraph.</p>\
         <p>Another short paragraph about cats.</p>\
         </body></html>",
    )
    .await;

    let pipeline = make_pipeline(Arc::new(MemoryIndex::new()));
    let results = pipeline.search(&server.url("/doc"), "cats").await.unwrap();

    assert!(!results.is_empty());
    assert!(results.len() <= 10);
    assert!(results[0].text.contains("cats"));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score, "results not ranked descending");
    }
}

#[tokio::test]
async fn non_success_status_surfaces_as_fetch_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not here");
        })
        .await;

    let pipeline = make_pipeline(Arc::new(MemoryIndex::new()));
    let result = pipeline.search(&server.url("/missing"), "anything").await;

    match result {
        Err(SearchError::Fetch { status, .. }) => assert_eq!(status, Some(404)),
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn page_without_text_is_an_empty_document_error() {
    let server = MockServer::start_async().await;
    serve_page(&server, "/blank", "<html><body></body></html>").await;

    let pipeline = make_pipeline(Arc::new(MemoryIndex::new()));
    let result = pipeline.search(&server.url("/blank"), "anything").await;

    assert!(matches!(result, Err(SearchError::EmptyDocument)));
}

#[tokio::test]
async fn text_outside_block_elements_is_searchable_via_fallback() {
    let server = MockServer::start_async().await;
    serve_page(
        &server,
        "/divs",
        "<html><body><div>slow loris climbs trees</div></body></html>",
    )
    .await;

    let pipeline = make_pipeline(Arc::new(MemoryIndex::new()));
    let results = pipeline.search(&server.url("/divs"), "loris").await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].text.contains("loris"));
}

#[tokio::test]
async fn index_holds_only_the_most_recent_document() {
    let server = MockServer::start_async().await;
    serve_page(
        &server,
        "/first",
        "<html><body><p>first page content</p><p>more first page</p></body></html>",
    )
    .await;
    serve_page(
        &server,
        "/second",
        "<html><body><p>second page content</p></body></html>",
    )
    .await;

    let index = Arc::new(MemoryIndex::new());
    let pipeline = make_pipeline(index.clone());

    pipeline.search(&server.url("/first"), "content").await.unwrap();
    assert_eq!(index.len(), 2);

    let results = pipeline.search(&server.url("/second"), "content").await.unwrap();
    assert_eq!(index.len(), 1);
    assert!(results.iter().all(|r| !r.text.contains("first")));
}

#[tokio::test]
async fn result_count_is_capped_at_top_k() {
    let server = MockServer::start_async().await;
    let paragraphs: String = (0..15)
        .map(|i| format!("<p>paragraph number {i} with filler words</p>"))
        .collect();
    serve_page(&server, "/many", &format!("<html><body>{paragraphs}</body></html>")).await;

    let pipeline = make_pipeline(Arc::new(MemoryIndex::new()));
    let results = pipeline
        .search(&server.url("/many"), "filler words")
        .await
        .unwrap();

    assert_eq!(results.len(), 10);
}
