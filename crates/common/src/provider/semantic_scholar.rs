//! Semantic Scholar Graph API client
//!
//! One lookup is a single `GET /paper/{id}` with nested `citations.*` and
//! `references.*` fields, so a node costs exactly one upstream request.
//! Identifiers returned to callers are qualified as `arxiv:<id>` when the
//! paper has an arXiv id and `s2:<paperId>` otherwise.

use super::{parse_paper_id, CitationLookup, CitationProvider, IdNamespace, PaperRef, PaperSearch, SearchResults};
use crate::config::ProviderConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER_NAME: &str = "semantic_scholar";

const LOOKUP_FIELDS: &str = "paperId,externalIds,title,year,citationCount,\
citations.paperId,citations.externalIds,citations.title,citations.year,citations.citationCount,\
references.paperId,references.externalIds,references.title,references.year,references.citationCount";

/// Paper record as returned by the Graph API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    #[serde(default)]
    external_ids: Option<HashMap<String, serde_json::Value>>,
    title: Option<String>,
    year: Option<i32>,
    citation_count: Option<u64>,
    #[serde(default)]
    citations: Option<Vec<S2Paper>>,
    #[serde(default)]
    references: Option<Vec<S2Paper>>,
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<u64>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

impl S2Paper {
    /// Qualified identifier for this record, if it has one
    fn qualified_id(&self) -> Option<String> {
        let arxiv = self
            .external_ids
            .as_ref()
            .and_then(|ids| ids.get("ArXiv"))
            .and_then(|v| v.as_str());

        match (arxiv, self.paper_id.as_deref()) {
            (Some(arxiv), _) => Some(format!("arxiv:{}", arxiv)),
            (None, Some(paper_id)) => Some(format!("s2:{}", paper_id)),
            (None, None) => None,
        }
    }

    fn to_ref(&self) -> Option<PaperRef> {
        Some(PaperRef {
            id: self.qualified_id()?,
            title: self.title.clone(),
            citation_count: self.citation_count.unwrap_or(0),
            year: self.year,
        })
    }

    fn into_lookup(self, requested_id: &str) -> CitationLookup {
        let paper = self.to_ref().unwrap_or_else(|| PaperRef {
            id: requested_id.to_string(),
            title: self.title.clone(),
            citation_count: self.citation_count.unwrap_or(0),
            year: self.year,
        });

        // Entries without a paperId are unresolved references; skip them
        let citing = self
            .citations
            .unwrap_or_default()
            .iter()
            .filter_map(S2Paper::to_ref)
            .collect();
        let references = self
            .references
            .unwrap_or_default()
            .iter()
            .filter_map(S2Paper::to_ref)
            .collect();

        CitationLookup { paper, citing, references }
    }
}

/// Map a qualified identifier to the form the Graph API expects
pub(crate) fn to_s2_id(paper_id: &str) -> String {
    match parse_paper_id(paper_id) {
        (IdNamespace::ArXiv, id) => format!("ARXIV:{}", id),
        (IdNamespace::Doi, id) => format!("DOI:{}", id),
        (IdNamespace::SemanticScholar, id) | (IdNamespace::Raw, id) => id.to_string(),
    }
}

/// Classify a non-success status into a retry decision.
///
/// `paper_id` is set for single-paper lookups and `None` for searches.
fn classify_status(status: StatusCode, paper_id: Option<&str>, body: &str) -> backoff::Error<AppError> {
    match (status, paper_id) {
        // The Graph API answers 400 for identifiers it cannot parse
        (StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST, Some(id)) => {
            backoff::Error::permanent(AppError::PaperNotFound { id: id.to_string() })
        }
        (StatusCode::BAD_REQUEST, None) => {
            backoff::Error::permanent(AppError::invalid_field("query", body.to_string()))
        }
        (s, _) if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            backoff::Error::transient(unavailable(format!("HTTP {}: {}", status, body)))
        }
        _ => backoff::Error::permanent(unavailable(format!("HTTP {}: {}", status, body))),
    }
}

fn unavailable(message: String) -> AppError {
    AppError::ProviderUnavailable {
        provider: PROVIDER_NAME.to_string(),
        message,
    }
}

/// Semantic Scholar citation provider
pub struct SemanticScholarProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    retry_base_delay: Duration,
    limiter: DefaultDirectRateLimiter,
}

impl SemanticScholarProvider {
    /// Create a new provider from configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("citeforge/{}", crate::VERSION))
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_base_delay)
            .with_max_interval(self.retry_base_delay.max(Duration::from_secs(8)))
            .with_max_elapsed_time(None)
            .build()
    }

    /// GET with rate limiting and bounded retries
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        paper_id: Option<&str>,
    ) -> Result<T> {
        let mut attempt = 0u32;
        let max_retries = self.max_retries;

        retry(self.retry_policy(), || {
            attempt += 1;
            let attempt = attempt;
            async move {
                self.limiter.until_ready().await;

                match self.send_once(url, query, paper_id).await {
                    Ok(value) => Ok(value),
                    Err(backoff::Error::Transient { err, .. }) if attempt <= max_retries => {
                        warn!(
                            attempt,
                            max_retries,
                            error = %err,
                            "Semantic Scholar request failed, retrying"
                        );
                        Err(backoff::Error::transient(err))
                    }
                    Err(backoff::Error::Transient { err, .. }) => Err(backoff::Error::permanent(err)),
                    Err(permanent) => Err(permanent),
                }
            }
        })
        .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        paper_id: Option<&str>,
    ) -> std::result::Result<T, backoff::Error<AppError>> {
        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                backoff::Error::transient(AppError::from(e))
            } else {
                backoff::Error::permanent(AppError::from(e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, paper_id, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| backoff::Error::permanent(AppError::from(e)))
    }
}

#[async_trait]
impl CitationProvider for SemanticScholarProvider {
    async fn lookup_citations(&self, paper_id: &str) -> Result<CitationLookup> {
        let url = format!("{}/paper/{}", self.base_url, to_s2_id(paper_id));
        debug!(paper_id, url = %url, "Looking up citations");

        let result = self
            .get_json::<S2Paper>(&url, &[("fields", LOOKUP_FIELDS.to_string())], Some(paper_id))
            .await
            .map(|paper| paper.into_lookup(paper_id));

        metrics::record_lookup(PROVIDER_NAME, result.is_ok());
        result
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl PaperSearch for SemanticScholarProvider {
    async fn search(&self, query: &str, limit: usize, fields: &[String]) -> Result<SearchResults> {
        let url = format!("{}/paper/search", self.base_url);
        let params = [
            ("query", query.to_string()),
            ("limit", limit.to_string()),
            ("fields", fields.join(",")),
        ];

        let response: S2SearchResponse = self.get_json(&url, &params, None).await?;
        debug!(query, count = response.data.len(), "Semantic Scholar search complete");

        Ok(SearchResults {
            total: response.total,
            papers: response.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const ATTENTION_BODY: &str = r#"{
        "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
        "externalIds": {"ArXiv": "1706.03762", "DBLP": "conf/nips/VaswaniSPUJGKP17", "CorpusId": 13756489},
        "title": "Attention is All you Need",
        "year": 2017,
        "citationCount": 120000,
        "citations": [
            {"paperId": "df2b0e26d0599ce3e70df8a9da02e51594e0e992",
             "externalIds": {"ArXiv": "1810.04805"},
             "title": "BERT", "year": 2019, "citationCount": 90000},
            {"paperId": null, "externalIds": null, "title": "Unresolved", "year": null, "citationCount": null}
        ],
        "references": [
            {"paperId": "fa72afa9b2cbc8f0d7b05d52548906610ffbb9c5",
             "externalIds": {"DOI": "10.1162/neco.1997.9.8.1735"},
             "title": "Long Short-Term Memory", "year": 1997, "citationCount": null}
        ]
    }"#;

    #[test]
    fn test_to_s2_id() {
        assert_eq!(to_s2_id("arxiv:1706.03762"), "ARXIV:1706.03762");
        assert_eq!(to_s2_id("doi:10.1162/neco.1997.9.8.1735"), "DOI:10.1162/neco.1997.9.8.1735");
        assert_eq!(to_s2_id("s2:204e3073"), "204e3073");
        assert_eq!(to_s2_id("204e3073"), "204e3073");
    }

    #[test]
    fn test_lookup_parsing() {
        let paper: S2Paper = serde_json::from_str(ATTENTION_BODY).unwrap();
        let lookup = paper.into_lookup("arxiv:1706.03762");

        assert_eq!(lookup.paper.id, "arxiv:1706.03762");
        assert_eq!(lookup.paper.citation_count, 120000);

        // Unresolved citation without a paperId is dropped
        assert_eq!(lookup.citing.len(), 1);
        assert_eq!(lookup.citing[0].id, "arxiv:1810.04805");
        assert_eq!(lookup.citing[0].year, Some(2019));

        assert_eq!(lookup.references.len(), 1);
        assert_eq!(lookup.references[0].id, "s2:fa72afa9b2cbc8f0d7b05d52548906610ffbb9c5");
        assert_eq!(lookup.references[0].citation_count, 0);
    }

    #[test]
    fn test_missing_relations() {
        let paper: S2Paper = serde_json::from_str(
            r#"{"paperId": "abc", "title": "Lonely", "citationCount": 3, "citations": null}"#,
        )
        .unwrap();
        let lookup = paper.into_lookup("s2:abc");

        assert_eq!(lookup.paper.id, "s2:abc");
        assert!(lookup.citing.is_empty());
        assert!(lookup.references.is_empty());
    }

    #[test]
    fn test_status_classification() {
        let not_found = classify_status(StatusCode::NOT_FOUND, Some("arxiv:0000.0000"), "");
        assert!(matches!(
            not_found,
            backoff::Error::Permanent(AppError::PaperNotFound { .. })
        ));

        let throttled = classify_status(StatusCode::TOO_MANY_REQUESTS, Some("x"), "slow down");
        assert!(matches!(
            throttled,
            backoff::Error::Transient { err: AppError::ProviderUnavailable { .. }, .. }
        ));

        let forbidden = classify_status(StatusCode::FORBIDDEN, Some("x"), "bad key");
        assert!(matches!(
            forbidden,
            backoff::Error::Permanent(AppError::ProviderUnavailable { .. })
        ));

        let bad_query = classify_status(StatusCode::BAD_REQUEST, None, "query too long");
        assert!(matches!(
            bad_query,
            backoff::Error::Permanent(AppError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_provider_construction() {
        let config = ProviderConfig {
            base_url: "http://localhost:9/graph/v1/".to_string(),
            requests_per_second: 0,
            ..ProviderConfig::default()
        };
        let provider = SemanticScholarProvider::new(&config).unwrap();

        assert_eq!(provider.base_url, "http://localhost:9/graph/v1");
        assert_eq!(provider.name(), "semantic_scholar");
    }

    /// Serves `/paper/{id}`, answering `status` for the first `failures` hits
    async fn spawn_upstream(status: StatusCode, failures: u32) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        let app = Router::new().route(
            "/paper/{id}",
            get(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        (status, "upstream says no".to_string())
                    } else {
                        (StatusCode::OK, ATTENTION_BODY.to_string())
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), hits)
    }

    fn fast_provider(base_url: String, max_retries: u32) -> SemanticScholarProvider {
        SemanticScholarProvider::new(&ProviderConfig {
            base_url,
            max_retries,
            requests_per_second: 1000,
            retry_base_delay_ms: 5,
            timeout_secs: 5,
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let (base_url, hits) = spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, 2).await;
        let provider = fast_provider(base_url, 3);

        let lookup = provider.lookup_citations("arxiv:1706.03762").await.unwrap();
        assert_eq!(lookup.paper.id, "arxiv:1706.03762");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_throttling() {
        let (base_url, hits) = spawn_upstream(StatusCode::TOO_MANY_REQUESTS, 1).await;
        let provider = fast_provider(base_url, 1);

        assert!(provider.lookup_citations("arxiv:1706.03762").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (base_url, hits) = spawn_upstream(StatusCode::BAD_GATEWAY, u32::MAX).await;
        let provider = fast_provider(base_url, 2);

        let err = provider.lookup_citations("arxiv:1706.03762").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ProviderUnavailable);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let (base_url, hits) = spawn_upstream(StatusCode::NOT_FOUND, u32::MAX).await;
        let provider = fast_provider(base_url, 3);

        let err = provider.lookup_citations("s2:missing").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PaperNotFound);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9/graph/v1".to_string(),
            max_retries: 0,
            timeout_secs: 2,
            ..ProviderConfig::default()
        };
        let provider = SemanticScholarProvider::new(&config).unwrap();

        let err = provider.lookup_citations("arxiv:1706.03762").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ProviderUnavailable);
    }
}
