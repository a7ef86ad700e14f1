//! Server binary: wires the tokenizer, embedding client, and Milvus index
//! into a pipeline and serves `/search`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use pagesift::chunking::BpeTokenizer;
use pagesift::embeddings::HttpEmbeddingProvider;
use pagesift::index::MilvusIndex;
use pagesift::server::router;
use pagesift::{SearchConfig, SearchPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SearchConfig::from_env()?;

    let client = reqwest::Client::builder().build()?;
    let tokenizer = Arc::new(BpeTokenizer::new()?);
    let embedder = Arc::new(HttpEmbeddingProvider::new(
        client.clone(),
        config.embedding_endpoint.clone(),
        config.embedding_model.clone(),
        config.embedding_dim,
    ));
    let index = Arc::new(MilvusIndex::connect(client.clone(), &config).await?);

    let bind_addr = config.bind_addr.clone();
    let pipeline = Arc::new(
        SearchPipeline::builder()
            .client(client)
            .tokenizer(tokenizer)
            .embedder(embedder)
            .index(index)
            .config(config)
            .build()?,
    );

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}
