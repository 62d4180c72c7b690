//! Tool handlers
//!
//! Every tool takes a JSON object of arguments and answers with a JSON object
//! carrying `"success": true`, or a structured error.

use axum::{extract::State, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use validator::{Validate, ValidationErrors};

use crate::AppState;
use citeforge_common::{
    errors::{AppError, Result},
    metrics,
};

pub const ANALYZE_CITATIONS: &str = "analyze_citations";
pub const SEARCH_SEMANTIC_SCHOLAR: &str = "search_semantic_scholar";

/// `analyze_citations` arguments
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeCitationsRequest {
    #[validate(length(min = 1, max = 256))]
    pub paper_id: String,

    #[serde(default = "default_depth")]
    #[validate(range(min = 1, max = 3))]
    pub depth: u32,

    /// Overall deadline; falls back to the configured expansion timeout
    #[validate(range(min = 1))]
    pub timeout_ms: Option<u64>,
}

/// `search_semantic_scholar` arguments
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    #[serde(default = "default_search_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,

    #[serde(default = "default_search_fields")]
    #[validate(length(min = 1))]
    pub fields: Vec<String>,
}

fn default_depth() -> u32 { 1 }
fn default_search_limit() -> usize { 10 }
fn default_search_fields() -> Vec<String> {
    ["title", "authors", "abstract", "citationCount", "year"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

/// Generic tool invocation
#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool catalogue entry
#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Serialize)]
pub struct ToolList {
    pub tools: Vec<ToolDefinition>,
}

/// Tools exposed to the agent host
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ANALYZE_CITATIONS,
            description: "Analyze citation relationships and paper influence by expanding \
                          the citation graph around a paper.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "Paper identifier: arxiv:<id>, doi:<doi>, s2:<id> or a Semantic Scholar paper ID"
                    },
                    "depth": {
                        "type": "integer",
                        "description": "Citation graph depth (1-3)",
                        "minimum": 1,
                        "maximum": 3,
                        "default": 1
                    },
                    "timeout_ms": {
                        "type": "integer",
                        "description": "Overall deadline in milliseconds; must be below the server request timeout",
                        "minimum": 1
                    }
                },
                "required": ["paper_id"]
            }),
        },
        ToolDefinition {
            name: SEARCH_SEMANTIC_SCHOLAR,
            description: "Search Semantic Scholar for papers with citation counts and influence metrics.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum results (1-100)",
                        "minimum": 1,
                        "maximum": 100,
                        "default": 10
                    },
                    "fields": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Fields to retrieve: title, authors, abstract, citationCount, influentialCitationCount, year, venue",
                        "default": default_search_fields()
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}

/// Deserialize and validate tool arguments
fn parse_arguments<T: DeserializeOwned + Validate>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };

    let request: T = serde_json::from_value(arguments).map_err(|e| AppError::InvalidArgument {
        message: e.to_string(),
        field: None,
    })?;

    request.validate().map_err(|e| AppError::InvalidArgument {
        message: e.to_string(),
        field: first_invalid_field(&e),
    })?;

    Ok(request)
}

fn first_invalid_field(errors: &ValidationErrors) -> Option<String> {
    let field_errors = errors.field_errors();
    let mut fields: Vec<&str> = field_errors.keys().map(|k| k.as_ref()).collect();
    fields.sort_unstable();
    fields.first().map(|f| f.to_string())
}

/// Run `analyze_citations`
pub async fn run_analyze_citations(state: &AppState, arguments: Value) -> Result<Value> {
    let request: AnalyzeCitationsRequest = parse_arguments(arguments)?;

    // The deadline has to expire before the server's request timeout
    let request_timeout = state.config.request_timeout();
    let deadline = match request.timeout_ms.map(Duration::from_millis) {
        Some(deadline) if deadline >= request_timeout => {
            return Err(AppError::invalid_field(
                "timeout_ms",
                format!(
                    "timeout_ms must be below the server request timeout of {}ms",
                    request_timeout.as_millis()
                ),
            ));
        }
        Some(deadline) => deadline,
        None => state.config.expansion_timeout(),
    };

    let start = Instant::now();
    let result = state
        .expander
        .expand_with_deadline(&request.paper_id, request.depth, deadline)
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    match &result {
        Ok(graph) => metrics::record_expansion(elapsed, request.depth, "success", graph.node_count()),
        Err(e) => metrics::record_expansion(elapsed, request.depth, e.kind().as_str(), 0),
    }

    let graph = result?;

    tracing::info!(
        paper_id = %request.paper_id,
        depth = request.depth,
        nodes = graph.node_count(),
        influential_citations = graph.influential_citations(),
        "Citation analysis complete"
    );

    Ok(json!({
        "success": true,
        "citation_graph": serde_json::to_value(&graph)?,
    }))
}

/// Run `search_semantic_scholar`
pub async fn run_search(state: &AppState, arguments: Value) -> Result<Value> {
    let request: SearchRequest = parse_arguments(arguments)?;

    tracing::info!(query = %request.query, limit = request.limit, "Searching Semantic Scholar");

    let results = state
        .search
        .search(&request.query, request.limit, &request.fields)
        .await?;

    Ok(json!({
        "success": true,
        "query": request.query,
        "count": results.papers.len(),
        "total": results.total,
        "papers": results.papers,
    }))
}

/// Dispatch a call by tool name
pub async fn dispatch(state: &AppState, name: &str, arguments: Value) -> Result<Value> {
    let result = match name {
        ANALYZE_CITATIONS => run_analyze_citations(state, arguments).await,
        SEARCH_SEMANTIC_SCHOLAR => run_search(state, arguments).await,
        other => Err(AppError::invalid_field("name", format!("Unknown tool: {}", other))),
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };
    metrics::record_tool_call(name, outcome);

    result
}

/// List available tools
pub async fn list_tools() -> Json<ToolList> {
    Json(ToolList {
        tools: tool_definitions(),
    })
}

/// Invoke a tool by name
pub async fn call_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> Result<Json<Value>> {
    dispatch(&state, &call.name, call.arguments).await.map(Json)
}

/// Analyze the citation graph of a paper
pub async fn analyze_citations(
    State(state): State<AppState>,
    Json(arguments): Json<Value>,
) -> Result<Json<Value>> {
    dispatch(&state, ANALYZE_CITATIONS, arguments).await.map(Json)
}

/// Search Semantic Scholar
pub async fn search_semantic_scholar(
    State(state): State<AppState>,
    Json(arguments): Json<Value>,
) -> Result<Json<Value>> {
    dispatch(&state, SEARCH_SEMANTIC_SCHOLAR, arguments).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{state_with, StaticSearch};
    use citeforge_citation::mock::{MockCitationProvider, MockFailure};
    use citeforge_common::{ErrorKind, PaperRef};
    use std::sync::Arc;

    fn provider() -> Arc<MockCitationProvider> {
        Arc::new(
            MockCitationProvider::new()
                .with_paper(PaperRef::new("arxiv:1706.03762").with_title("Attention Is All You Need"))
                .with_paper(PaperRef::new("arxiv:1810.04805").with_citation_count(90))
                .with_citation("arxiv:1810.04805", "arxiv:1706.03762"),
        )
    }

    #[test]
    fn test_tool_catalogue() {
        let names: Vec<_> = tool_definitions().iter().map(|t| t.name).collect();
        assert_eq!(names, vec![ANALYZE_CITATIONS, SEARCH_SEMANTIC_SCHOLAR]);

        let analyze = &tool_definitions()[0];
        assert_eq!(analyze.input_schema["required"], json!(["paper_id"]));
        assert_eq!(analyze.input_schema["properties"]["depth"]["default"], 1);
    }

    #[tokio::test]
    async fn test_analyze_defaults_to_depth_one() {
        let state = state_with(provider());
        let response = run_analyze_citations(&state, json!({"paper_id": "arxiv:1706.03762"}))
            .await
            .unwrap();

        let graph = &response["citation_graph"];
        assert_eq!(response["success"], true);
        assert_eq!(graph["depth_requested"], 1);
        assert_eq!(graph["root_id"], "arxiv:1706.03762");
        assert_eq!(graph["total_nodes"], 2);
        assert_eq!(graph["influential_citations"], 90);
        assert_eq!(graph["nodes"][0]["title"], "Attention Is All You Need");
    }

    #[tokio::test]
    async fn test_analyze_rejects_bad_arguments() {
        let state = state_with(provider());

        let err = run_analyze_citations(&state, json!({"depth": 2})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        for depth in [0, 4] {
            let err = run_analyze_citations(&state, json!({"paper_id": "x", "depth": depth}))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(matches!(err, AppError::InvalidArgument { field: Some(ref f), .. } if f == "depth"));
        }

        let err = run_analyze_citations(&state, json!({"paper_id": "  "})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_analyze_root_failure() {
        let failing = Arc::new(
            MockCitationProvider::new()
                .with_citation("a", "b")
                .with_failure("a", MockFailure::Unavailable),
        );
        let state = state_with(failing);

        let err = run_analyze_citations(&state, json!({"paper_id": "a"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);

        let err = run_analyze_citations(&state, json!({"paper_id": "nope"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PaperNotFound);
    }

    #[tokio::test]
    async fn test_analyze_timeout() {
        let slow = Arc::new(
            MockCitationProvider::new()
                .with_citation("a", "b")
                .with_latency(Duration::from_millis(200)),
        );
        let state = state_with(slow);

        let err = run_analyze_citations(&state, json!({"paper_id": "a", "timeout_ms": 20}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_analyze_rejects_deadline_beyond_request_timeout() {
        let mut state = state_with(provider());
        let mut config = (*state.config).clone();
        config.server.request_timeout_secs = 1;
        state.config = Arc::new(config);

        let err = run_analyze_citations(&state, json!({"paper_id": "arxiv:1706.03762", "timeout_ms": 5000}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument { field: Some(ref f), .. } if f == "timeout_ms"));

        let response = run_analyze_citations(&state, json!({"paper_id": "arxiv:1706.03762", "timeout_ms": 999}))
            .await
            .unwrap();
        assert_eq!(response["success"], true);
    }

    #[tokio::test]
    async fn test_search_defaults() {
        let mut state = state_with(provider());
        state.search = Arc::new(StaticSearch);

        let response = run_search(&state, json!({"query": "transformers"})).await.unwrap();
        assert_eq!(response["count"], 1);
        assert_eq!(response["papers"][0]["limit"], 10);
        assert_eq!(response["papers"][0]["fields"], "title,authors,abstract,citationCount,year");

        let err = run_search(&state, json!({"query": "x", "limit": 101})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let state = state_with(provider());
        let err = dispatch(&state, "download_paper", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
