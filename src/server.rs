//! MCP stdio server: bridges the engine's operations to the MCP JSON-RPC
//! protocol over stdin/stdout, grounded on the teacher's `McpBridge`
//! (`crates/context-harness/src/mcp.rs`). Unlike the teacher, there is no
//! separate tool-registry abstraction: each MCP tool name dispatches
//! directly to one engine operation.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};
use serde_json::json;

use crate::retrieval::{ask, get, hybrid, lexical, vector, RetrievalInput};
use crate::Engine;

#[derive(Clone)]
pub struct McpServer {
    engine: Arc<Engine>,
}

impl McpServer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    fn tool_defs() -> Vec<Tool> {
        let tools: &[(&str, &str)] = &[
            ("search", "Lexical (BM25) search over the indexed corpus."),
            ("vsearch", "Vector similarity search over the indexed corpus."),
            ("query", "Hybrid search: BM25 + vector fused with RRF, optional rerank."),
            ("ask", "Hybrid retrieval plus a grounded, citation-bound answer."),
            ("get", "Fetch a document's canonical markdown by ref."),
            ("multi_get", "Fetch several documents (or a URI glob) at once."),
            ("ls", "List documents in a collection or URI prefix."),
        ];
        tools
            .iter()
            .map(|(name, description)| Tool {
                name: Cow::Borrowed(*name),
                title: None,
                description: Some(Cow::Borrowed(*description)),
                input_schema: Arc::new(serde_json::Map::new()),
                output_schema: None,
                annotations: Some(ToolAnnotations::new().read_only(true)),
                execution: None,
                icons: None,
                meta: None,
            })
            .collect()
    }

    async fn dispatch(&self, name: &str, params: serde_json::Value) -> Result<serde_json::Value, String> {
        match name {
            "search" => {
                let input = retrieval_input_from(&params)?;
                let results = lexical::search(&self.engine.store, &input).await.map_err(|e| e.to_string())?;
                Ok(json!({ "results": results }))
            }
            "vsearch" => {
                let input = retrieval_input_from(&params)?;
                let port = self.engine.models.embedding_port().await.map_err(|e| e.to_string())?;
                let results = vector::vsearch(&self.engine.store, port.as_ref(), &input)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(json!({ "results": results }))
            }
            "query" => {
                let input = retrieval_input_from(&params)?;
                let port = self.engine.models.embedding_port().await.map_err(|e| e.to_string())?;
                let results = hybrid::query(&self.engine.store, port.as_ref(), None, None, &input)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(json!({ "results": results }))
            }
            "ask" => {
                let input = retrieval_input_from(&params)?;
                let port = self.engine.models.embedding_port().await.map_err(|e| e.to_string())?;
                let response = ask::ask(&self.engine.store, port.as_ref(), None, None, &input)
                    .await
                    .map_err(|e| e.to_string())?;
                serde_json::to_value(response).map_err(|e| e.to_string())
            }
            "get" => {
                let raw_ref = params
                    .get("ref")
                    .and_then(|v| v.as_str())
                    .ok_or("missing 'ref'")?;
                let from = params.get("from").and_then(|v| v.as_i64());
                let limit = params.get("limit").and_then(|v| v.as_i64());
                let line_numbers = params.get("lineNumbers").and_then(|v| v.as_bool()).unwrap_or(false);
                let response = get::get(&self.engine.store, raw_ref, from, limit, line_numbers)
                    .await
                    .map_err(|e| e.to_string())?;
                serde_json::to_value(response).map_err(|e| e.to_string())
            }
            "multi_get" => {
                let refs: Vec<String> = params
                    .get("refs")
                    .and_then(|v| v.as_array())
                    .ok_or("missing 'refs'")?
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect();
                let max_bytes = params.get("maxBytes").and_then(|v| v.as_u64()).map(|v| v as usize);
                let response = get::multi_get(&self.engine.store, &refs, max_bytes)
                    .await
                    .map_err(|e| e.to_string())?;
                serde_json::to_value(response).map_err(|e| e.to_string())
            }
            "ls" => {
                let scope = params.get("scope").and_then(|v| v.as_str());
                let limit = params.get("limit").and_then(|v| v.as_i64()).unwrap_or(100);
                let offset = params.get("offset").and_then(|v| v.as_i64()).unwrap_or(0);
                let entries = get::ls(&self.engine.store, scope, limit, offset).await.map_err(|e| e.to_string())?;
                Ok(json!({ "entries": entries }))
            }
            other => Err(format!("no tool registered with name: {other}")),
        }
    }
}

fn retrieval_input_from(params: &serde_json::Value) -> Result<RetrievalInput, String> {
    let query_text = params
        .get("queryText")
        .and_then(|v| v.as_str())
        .ok_or("missing 'queryText'")?
        .to_string();
    Ok(RetrievalInput {
        query_text,
        limit: params.get("limit").and_then(|v| v.as_u64()).unwrap_or(20) as usize,
        min_score: params.get("minScore").and_then(|v| v.as_f64()),
        collection_filter: params.get("collectionFilter").and_then(|v| v.as_str()).map(String::from),
        language_hint: params.get("languageHint").and_then(|v| v.as_str()).map(String::from),
        full: params.get("full").and_then(|v| v.as_bool()).unwrap_or(false),
        line_numbers: params.get("lineNumbers").and_then(|v| v.as_bool()).unwrap_or(false),
    })
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "gno".to_string(),
                title: Some("GNO".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "GNO — local knowledge index and retrieval. Use search/vsearch/query to find \
                 documents, ask for a grounded answer with citations, get/multi_get/ls to read \
                 the corpus directly."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(Self::tool_defs())))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match self.dispatch(&request.name, params).await {
            Ok(value) => {
                let text = serde_json::to_string_pretty(&value).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }
}

/// Serve the MCP protocol over stdin/stdout until the client disconnects.
pub async fn serve_stdio(engine: Arc<Engine>) -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let server = McpServer::new(engine);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
