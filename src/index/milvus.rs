//! Milvus vector index client over the REST v2 API.
//!
//! The collection schema matches the reference deployment: an auto-assigned
//! Int64 primary key, a fixed-dimension float vector, and a bounded VarChar
//! text field, with an IVF_FLAT index over the vector field. One connection
//! probe with bounded retry happens at construction; the client is then
//! reused across requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use super::{IndexHit, VectorIndex, connect_with_retry};
use crate::config::SearchConfig;
use crate::types::SearchError;

const VECTOR_FIELD: &str = "embedding";
const TEXT_FIELD: &str = "text";

/// Milvus-backed [`VectorIndex`].
pub struct MilvusIndex {
    client: Client,
    base: String,
    collection: String,
    dimension: usize,
    metric: &'static str,
    nlist: u32,
    nprobe: u32,
    max_text_chars: usize,
}

/// Standard Milvus REST response envelope.
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct HasCollection {
    has: bool,
}

#[derive(Deserialize)]
struct SearchRow {
    distance: f32,
    #[serde(default)]
    text: String,
}

impl MilvusIndex {
    /// Probes the service and returns a ready client.
    ///
    /// The probe is retried up to `config.connect_attempts` times with
    /// `config.connect_backoff` between tries; exhaustion surfaces
    /// [`SearchError::IndexUnavailable`] with the final cause.
    pub async fn connect(client: Client, config: &SearchConfig) -> Result<Self, SearchError> {
        let base = config.milvus_endpoint.trim_end_matches('/').to_string();

        let probe_url = format!("{base}/v2/vectordb/collections/list");
        connect_with_retry(config.connect_attempts, config.connect_backoff, || {
            let client = client.clone();
            let probe_url = probe_url.clone();
            async move {
                let response = client
                    .post(&probe_url)
                    .json(&json!({}))
                    .send()
                    .await
                    .map_err(|err| err.to_string())?;
                let status = response.status();
                if !status.is_success() {
                    return Err(format!("probe returned {status}"));
                }
                Ok(())
            }
        })
        .await?;

        info!(endpoint = %base, "connected to vector index service");
        Ok(Self {
            client,
            base,
            collection: config.collection_name.clone(),
            dimension: config.embedding_dim,
            metric: config.metric.as_str(),
            nlist: config.index_nlist,
            nprobe: config.query_nprobe,
            max_text_chars: config.max_text_chars,
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<Option<T>, SearchError> {
        let url = format!("{}{path}", self.base);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| SearchError::Index(format!("{path} request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Index(format!(
                "{path} returned {status}: {body}"
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| SearchError::Index(format!("{path} returned malformed body: {err}")))?;
        if envelope.code != 0 {
            return Err(SearchError::Index(format!(
                "{path} failed with code {}: {}",
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }
        Ok(envelope.data)
    }

    async fn has_collection(&self) -> Result<bool, SearchError> {
        let data: Option<HasCollection> = self
            .post(
                "/v2/vectordb/collections/has",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        Ok(data.is_some_and(|d| d.has))
    }

    async fn create_collection(&self) -> Result<(), SearchError> {
        let body = create_collection_body(
            &self.collection,
            self.dimension,
            self.max_text_chars,
            self.metric,
            self.nlist,
        );
        self.post::<Value>("/v2/vectordb/collections/create", body)
            .await?;
        Ok(())
    }

    async fn has_index(&self) -> Result<bool, SearchError> {
        let data: Option<Vec<String>> = self
            .post(
                "/v2/vectordb/indexes/list",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        Ok(data.is_some_and(|names| !names.is_empty()))
    }

    async fn create_index(&self) -> Result<(), SearchError> {
        let body = json!({
            "collectionName": self.collection,
            "indexParams": [index_params(self.metric, self.nlist)],
        });
        self.post::<Value>("/v2/vectordb/indexes/create", body)
            .await?;
        Ok(())
    }

    async fn load(&self) -> Result<(), SearchError> {
        self.post::<Value>(
            "/v2/vectordb/collections/load",
            json!({ "collectionName": self.collection }),
        )
        .await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SearchError> {
        self.post::<Value>(
            "/v2/vectordb/collections/flush",
            json!({ "collectionName": self.collection }),
        )
        .await?;
        Ok(())
    }
}

fn create_collection_body(
    collection: &str,
    dimension: usize,
    max_text_chars: usize,
    metric: &str,
    nlist: u32,
) -> Value {
    json!({
        "collectionName": collection,
        "schema": {
            "autoId": true,
            "enableDynamicField": false,
            "fields": [
                {
                    "fieldName": "id",
                    "dataType": "Int64",
                    "isPrimary": true,
                },
                {
                    "fieldName": VECTOR_FIELD,
                    "dataType": "FloatVector",
                    "elementTypeParams": { "dim": dimension },
                },
                {
                    "fieldName": TEXT_FIELD,
                    "dataType": "VarChar",
                    "elementTypeParams": { "max_length": max_text_chars },
                },
            ],
        },
        "indexParams": [index_params(metric, nlist)],
    })
}

fn index_params(metric: &str, nlist: u32) -> Value {
    json!({
        "fieldName": VECTOR_FIELD,
        "indexName": format!("{VECTOR_FIELD}_idx"),
        "indexType": "IVF_FLAT",
        "metricType": metric,
        "params": { "nlist": nlist },
    })
}

#[async_trait]
impl VectorIndex for MilvusIndex {
    async fn ensure_collection(&self) -> Result<(), SearchError> {
        if !self.has_collection().await? {
            info!(collection = %self.collection, dimension = self.dimension, "creating collection");
            self.create_collection().await?;
        } else if !self.has_index().await? {
            info!(collection = %self.collection, "collection exists without an index, building it");
            self.create_index().await?;
        }
        self.load().await
    }

    async fn reset(&self) -> Result<(), SearchError> {
        // Unconditional full clear: the collection only ever holds one
        // document's chunks.
        self.post::<Value>(
            "/v2/vectordb/entities/delete",
            json!({ "collectionName": self.collection, "filter": "id >= 0" }),
        )
        .await?;
        self.flush().await
    }

    async fn insert(&self, chunks: &[String], embeddings: &[Vec<f32>]) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::BatchMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| json!({ VECTOR_FIELD: embedding, TEXT_FIELD: chunk }))
            .collect();
        self.post::<Value>(
            "/v2/vectordb/entities/insert",
            json!({ "collectionName": self.collection, "data": rows }),
        )
        .await?;
        self.flush().await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError> {
        let body = json!({
            "collectionName": self.collection,
            "data": [embedding],
            "annsField": VECTOR_FIELD,
            "limit": k,
            "outputFields": [TEXT_FIELD],
            "searchParams": {
                "metricType": self.metric,
                "params": { "nprobe": self.nprobe },
            },
        });
        let rows: Option<Vec<SearchRow>> =
            self.post("/v2/vectordb/entities/search", body).await?;

        Ok(rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| IndexHit {
                text: row.text,
                score: row.distance,
            })
            .collect())
    }
}
