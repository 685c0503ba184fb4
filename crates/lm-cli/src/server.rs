use std::sync::Arc;

use lm_core::{
    ContinuityStore, EvidenceEvent, EvidenceToken, Partition, QueryEngine, export_json,
    import_json,
};
use lm_store::Store;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use uuid::Uuid;

const DEFAULT_RECENT_TOKENS: usize = 20;

/// Memory and its SQLite store sit behind separate locks.
///
/// `memory` is a read/write lock: query tools share it, `lm_ingest`,
/// `lm_tick` and `lm_import` take it exclusively. `Store` wraps a
/// `rusqlite::Connection`, which is `Send` but not `Sync`, so it gets its
/// own mutex. Lock order is always memory first, then store.
#[derive(Clone)]
pub struct LmServer {
    memory: Arc<RwLock<ContinuityStore>>,
    store: Arc<Mutex<Store>>,
    tool_router: ToolRouter<Self>,
}

impl LmServer {
    pub fn new(store: Store, memory: ContinuityStore) -> Self {
        Self {
            memory: Arc::new(RwLock::new(memory)),
            store: Arc::new(Mutex::new(store)),
            tool_router: Self::tool_router(),
        }
    }

    /// Save `memory` while the caller still holds it for reading.
    ///
    /// Writers downgrade their guard before calling this, so queries can run
    /// during the save but no other writer can slip in between the mutation
    /// and its write to disk. Failures are logged; memory stays authoritative.
    async fn persist(&self, memory: &RwLockReadGuard<'_, ContinuityStore>, after: &str) {
        let store = self.store.lock().await;
        if let Err(e) = store.save_memory(memory) {
            tracing::error!("failed to persist after {after}: {e}");
        }
    }

    fn stats_json(memory: &ContinuityStore) -> serde_json::Value {
        let counts = memory.counts();
        serde_json::json!({
            "nodes": counts.total(),
            "active": counts.active,
            "dormant": counts.dormant,
            "archived": counts.archived,
        })
    }
}

fn json_result(value: &impl serde::Serialize) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn parse_id(id: &str) -> Result<Uuid, McpError> {
    Uuid::parse_str(id.trim())
        .map_err(|_| McpError::invalid_params(format!("invalid node id '{id}'"), None))
}

fn parse_pattern(pattern: &[String]) -> Result<Vec<EvidenceToken>, McpError> {
    pattern
        .iter()
        .map(|s| {
            s.parse::<EvidenceToken>()
                .map_err(|e| McpError::invalid_params(e, None))
        })
        .collect()
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct IngestRequest {
    /// Evidence events in chronological order. Each object has `ts`, `price`,
    /// `type` (orderbook | trade | liquidation | price_crossing) and the
    /// fields of that type.
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TickRequest {
    /// Unix seconds to decay to (defaults to the current time)
    now: Option<f64>,
    /// Current market price; enables clean-break and no-reaction checks
    price: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NodesRequest {
    /// active, dormant or archived (defaults to active)
    partition: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PriceRangeRequest {
    low: f64,
    high: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NodeRequest {
    /// Node UUID
    id: String,
    /// Unix seconds at which to evaluate the decay state (defaults to now)
    now: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RecentTokensRequest {
    /// Node UUID
    id: String,
    /// Number of most recent tokens (default 20)
    n: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MotifsRequest {
    /// Node UUID
    id: String,
    /// Minimum occurrence count (default 1)
    min_count: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MotifSearchRequest {
    /// Token names, e.g. ["OB_APPEAR", "TRADE_EXEC"]
    pattern: Vec<String>,
    /// Minimum occurrence count (default 1)
    min_count: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ImportRequest {
    /// Full state JSON as produced by lm_export
    state: serde_json::Value,
}

#[tool_router]
impl LmServer {
    #[tool(
        description = "Record market evidence. Each event is routed to the band containing its price (liquidations: within 5 bps) or creates a new band when it qualifies. Invalid events are reported and leave memory untouched."
    )]
    async fn lm_ingest(
        &self,
        Parameters(req): Parameters<IngestRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut memory = self.memory.write().await;

        let mut outcomes = Vec::with_capacity(req.events.len());
        let mut rejected = Vec::new();
        for (i, raw) in req.events.into_iter().enumerate() {
            let event: EvidenceEvent = match serde_json::from_value(raw) {
                Ok(ev) => ev,
                Err(e) => {
                    rejected.push(serde_json::json!({"index": i, "error": e.to_string()}));
                    continue;
                }
            };
            match memory.ingest(&event) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!("event {i} rejected: {e}");
                    rejected.push(serde_json::json!({"index": i, "error": e.to_string()}));
                }
            }
        }

        let memory = memory.downgrade();
        if !outcomes.is_empty() {
            self.persist(&memory, "ingest").await;
        }

        json_result(&serde_json::json!({
            "outcomes": outcomes,
            "rejected": rejected,
            "stats": Self::stats_json(&memory),
        }))
    }

    #[tool(
        description = "Decay all non-archived nodes to a point in time and apply dormancy and archival. Returns counts and partition transitions."
    )]
    async fn lm_tick(
        &self,
        Parameters(req): Parameters<TickRequest>,
    ) -> Result<CallToolResult, McpError> {
        let now = req.now.unwrap_or_else(lm_core::time::now_unix_secs);
        if !now.is_finite() {
            return Err(McpError::invalid_params(
                "now must be a finite number of seconds".to_string(),
                None,
            ));
        }

        let mut memory = self.memory.write().await;
        let report = memory.tick(now, req.price);
        tracing::debug!(
            decayed = report.decayed,
            transitions = report.transitions.len(),
            "tick"
        );
        let memory = memory.downgrade();
        self.persist(&memory, "tick").await;

        json_result(&serde_json::json!({
            "report": report,
            "stats": Self::stats_json(&memory),
        }))
    }

    #[tool(description = "List nodes in one partition, ordered by first-seen time.")]
    async fn lm_nodes(
        &self,
        Parameters(req): Parameters<NodesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let partition = match req.partition.as_deref() {
            None => Partition::Active,
            Some(name) => Partition::parse(name).ok_or_else(|| {
                McpError::invalid_params(
                    format!("partition must be active, dormant or archived, got '{name}'"),
                    None,
                )
            })?,
        };
        let memory = self.memory.read().await;
        json_result(&QueryEngine::partition(&memory, partition))
    }

    #[tool(
        description = "List non-archived nodes whose band overlaps [low, high], ordered by price center."
    )]
    async fn lm_nodes_in_range(
        &self,
        Parameters(req): Parameters<PriceRangeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let memory = self.memory.read().await;
        json_result(&QueryEngine::nodes_in_price_range(
            &memory,
            req.low,
            req.high,
        ))
    }

    #[tool(
        description = "Full record of one node: counters, buffer metadata, motif statistics and decay state. Unknown ids return null."
    )]
    async fn lm_node(
        &self,
        Parameters(req): Parameters<NodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;
        let memory = self.memory.read().await;
        let Some(node) = QueryEngine::node(&memory, id) else {
            return json_result(&serde_json::Value::Null);
        };
        let now = req
            .now
            .unwrap_or_else(lm_core::time::now_unix_secs)
            .max(node.decayed_through);

        json_result(&serde_json::json!({
            "node": node,
            "partition": memory.partition_of(id),
            "buffer_metadata": QueryEngine::buffer_metadata(&memory, id),
            "motif_statistics": QueryEngine::motif_statistics(&memory, id),
            "decay_state": QueryEngine::decay_state(&memory, id, now),
        }))
    }

    #[tool(description = "Most recent evidence tokens of a node, oldest first.")]
    async fn lm_recent_tokens(
        &self,
        Parameters(req): Parameters<RecentTokensRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;
        let n = req.n.unwrap_or(DEFAULT_RECENT_TOKENS);
        let memory = self.memory.read().await;
        json_result(&QueryEngine::recent_tokens(&memory, id, n))
    }

    #[tool(
        description = "Motifs of a node with at least min_count occurrences, in lexicographic token order."
    )]
    async fn lm_motifs(
        &self,
        Parameters(req): Parameters<MotifsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;
        let memory = self.memory.read().await;
        json_result(&QueryEngine::motifs_with_min_count(
            &memory,
            id,
            req.min_count.unwrap_or(1),
        ))
    }

    #[tool(description = "Nodes whose motif index holds the given token pattern, by node id.")]
    async fn lm_nodes_with_motif(
        &self,
        Parameters(req): Parameters<MotifSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let pattern = parse_pattern(&req.pattern)?;
        let memory = self.memory.read().await;
        json_result(&QueryEngine::nodes_with_motif(
            &memory,
            &pattern,
            req.min_count.unwrap_or(1),
        ))
    }

    #[tool(
        description = "Partition counts, motif totals and storage size. Call for diagnostics."
    )]
    async fn lm_stats(&self) -> Result<CallToolResult, McpError> {
        let memory = self.memory.read().await;
        let mut stats = Self::stats_json(&memory);
        stats["motifs"] = serde_json::json!(QueryEngine::global_motif_statistics(&memory));
        // Memory read guard is still held, so the size matches these counts.
        let store = self.store.lock().await;
        match store.db_size() {
            Ok(size) => stats["db_size_bytes"] = serde_json::json!(size),
            Err(e) => tracing::warn!("failed to read db size: {e}"),
        }
        json_result(&stats)
    }

    #[tool(description = "Export the full memory state as versioned JSON.")]
    async fn lm_export(&self) -> Result<CallToolResult, McpError> {
        let memory = self.memory.read().await;
        let json = export_json(&memory)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Import a full memory state from lm_export JSON. Replaces current state.")]
    async fn lm_import(
        &self,
        Parameters(req): Parameters<ImportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let json_str = serde_json::to_string(&req.state)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let imported = import_json(&json_str)
            .map_err(|e| McpError::invalid_params(format!("invalid state JSON: {e}"), None))?;

        let mut memory = self.memory.write().await;
        *memory = imported;
        let memory = memory.downgrade();
        self.persist(&memory, "import").await;

        json_result(&serde_json::json!({
            "imported": true,
            "stats": Self::stats_json(&memory),
        }))
    }
}

#[tool_handler]
impl ServerHandler for LmServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Liquidity memory: a decaying record of which price bands have mattered.\n\n\
                 Feed evidence with lm_ingest in timestamp order and call lm_tick periodically \
                 (with the current price when known) to age memory. Query with lm_nodes, \
                 lm_nodes_in_range, lm_node, lm_recent_tokens, lm_motifs and lm_nodes_with_motif.\n\n\
                 Results are factual aggregates. They carry no direction, probability or ranking."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_server() -> LmServer {
        let store = Store::open_in_memory().unwrap();
        LmServer::new(store, ContinuityStore::default())
    }

    fn text_from_result(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_result(result: &CallToolResult) -> serde_json::Value {
        let text = text_from_result(result);
        serde_json::from_str(&text).expect("handler should return valid JSON")
    }

    fn trade(ts: f64, price: f64, volume_usd: f64) -> serde_json::Value {
        serde_json::json!({"ts": ts, "price": price, "type": "trade", "volume_usd": volume_usd})
    }

    async fn ingest(server: &LmServer, events: Vec<serde_json::Value>) -> serde_json::Value {
        let result = server
            .lm_ingest(Parameters(IngestRequest { events }))
            .await
            .unwrap();
        parse_result(&result)
    }

    async fn first_active_id(server: &LmServer) -> String {
        let nodes = parse_result(
            &server
                .lm_nodes(Parameters(NodesRequest { partition: None }))
                .await
                .unwrap(),
        );
        nodes[0]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_lm_stats_empty() {
        let server = make_server();
        let json = parse_result(&server.lm_stats().await.unwrap());
        assert_eq!(json["nodes"], 0);
        assert_eq!(json["active"], 0);
        assert_eq!(json["archived"], 0);
        assert!(json.get("db_size_bytes").is_some());
    }

    #[tokio::test]
    async fn test_lm_ingest_creates_then_routes() {
        let server = make_server();
        let json = ingest(
            &server,
            vec![trade(0.0, 42_000.0, 5_000.0), trade(5.0, 42_001.0, 500.0)],
        )
        .await;

        assert_eq!(json["outcomes"][0]["outcome"], "created");
        assert_eq!(json["outcomes"][1]["outcome"], "recorded");
        assert_eq!(json["stats"]["nodes"], 1);
        assert!(json["rejected"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lm_ingest_reports_bad_events() {
        let server = make_server();
        let json = ingest(
            &server,
            vec![
                serde_json::json!({"ts": 0.0, "price": 1.0, "type": "nonsense"}),
                trade(1.0, 42_000.0, -5.0),
                trade(2.0, 42_000.0, 5_000.0),
            ],
        )
        .await;

        let rejected = json["rejected"].as_array().unwrap();
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0]["index"], 0);
        assert_eq!(rejected[1]["index"], 1);
        assert_eq!(json["stats"]["nodes"], 1);
    }

    #[tokio::test]
    async fn test_lm_tick_moves_partitions() {
        let server = make_server();
        ingest(&server, vec![trade(0.0, 42_000.0, 5_000.0)]).await;

        // 0.65 * (1 - 0.0001 * 8000) = 0.13 < 0.15
        let json = parse_result(
            &server
                .lm_tick(Parameters(TickRequest {
                    now: Some(8_000.0),
                    price: None,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["report"]["decayed"], 1);
        assert_eq!(json["stats"]["dormant"], 1);
        assert_eq!(json["report"]["transitions"][0]["kind"], "dormant");
    }

    #[tokio::test]
    async fn test_lm_node_and_tokens() {
        let server = make_server();
        ingest(
            &server,
            vec![
                trade(0.0, 42_000.0, 5_000.0),
                trade(1.0, 42_000.0, 20_000.0),
            ],
        )
        .await;
        let id = first_active_id(&server).await;

        let node = parse_result(
            &server
                .lm_node(Parameters(NodeRequest {
                    id: id.clone(),
                    now: Some(1.0),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(node["partition"], "active");
        assert_eq!(node["buffer_metadata"]["len"], 2);
        assert_eq!(node["node"]["evidence"]["trade_count"], 2);

        let tokens = parse_result(
            &server
                .lm_recent_tokens(Parameters(RecentTokensRequest { id, n: Some(1) }))
                .await
                .unwrap(),
        );
        assert_eq!(tokens.as_array().unwrap().len(), 1);
        assert_eq!(tokens[0]["token"], "TRADE_VOLUME_HIGH");
    }

    #[tokio::test]
    async fn test_lm_node_unknown_id() {
        let server = make_server();
        let missing = Uuid::new_v4().to_string();
        let node = parse_result(
            &server
                .lm_node(Parameters(NodeRequest {
                    id: missing.clone(),
                    now: None,
                }))
                .await
                .unwrap(),
        );
        assert!(node.is_null());

        let tokens = parse_result(
            &server
                .lm_recent_tokens(Parameters(RecentTokensRequest {
                    id: missing.clone(),
                    n: None,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(tokens, serde_json::json!([]));

        let motifs = parse_result(
            &server
                .lm_motifs(Parameters(MotifsRequest {
                    id: missing,
                    min_count: None,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(motifs, serde_json::json!([]));

        // malformed ids are still a caller error
        let err = server
            .lm_node(Parameters(NodeRequest {
                id: "not-a-uuid".to_string(),
                now: None,
            }))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_lm_motifs_and_search() {
        let server = make_server();
        ingest(
            &server,
            vec![
                trade(0.0, 42_000.0, 5_000.0),
                trade(1.0, 42_000.0, 5_000.0),
                trade(2.0, 42_000.0, 5_000.0),
            ],
        )
        .await;
        let id = first_active_id(&server).await;

        let motifs = parse_result(
            &server
                .lm_motifs(Parameters(MotifsRequest {
                    id: id.clone(),
                    min_count: Some(1),
                }))
                .await
                .unwrap(),
        );
        assert!(!motifs.as_array().unwrap().is_empty());

        let found = parse_result(
            &server
                .lm_nodes_with_motif(Parameters(MotifSearchRequest {
                    pattern: vec!["TRADE_EXEC".into(), "TRADE_EXEC".into()],
                    min_count: None,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(found[0]["id"], id.as_str());

        let bad = server
            .lm_nodes_with_motif(Parameters(MotifSearchRequest {
                pattern: vec!["BUY_SIGNAL".into()],
                min_count: None,
            }))
            .await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_lm_nodes_in_range() {
        let server = make_server();
        ingest(
            &server,
            vec![trade(0.0, 42_000.0, 5_000.0), trade(1.0, 50_000.0, 5_000.0)],
        )
        .await;
        let json = parse_result(
            &server
                .lm_nodes_in_range(Parameters(PriceRangeRequest {
                    low: 41_000.0,
                    high: 43_000.0,
                }))
                .await
                .unwrap(),
        );
        let nodes = json.as_array().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["price_center"], 42_000.0);
    }

    #[tokio::test]
    async fn test_lm_nodes_bad_partition() {
        let server = make_server();
        let err = server
            .lm_nodes(Parameters(NodesRequest {
                partition: Some("hot".into()),
            }))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_lm_export_import_roundtrip() {
        let server = make_server();
        ingest(
            &server,
            vec![trade(0.0, 42_000.0, 5_000.0), trade(1.0, 50_000.0, 5_000.0)],
        )
        .await;
        let stats_before = parse_result(&server.lm_stats().await.unwrap());

        let exported = text_from_result(&server.lm_export().await.unwrap());
        let server2 = make_server();
        let import = parse_result(
            &server2
                .lm_import(Parameters(ImportRequest {
                    state: serde_json::from_str(&exported).unwrap(),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(import["imported"], true);

        let stats_after = parse_result(&server2.lm_stats().await.unwrap());
        assert_eq!(stats_before["nodes"], stats_after["nodes"]);
        assert_eq!(stats_before["motifs"], stats_after["motifs"]);
        assert_eq!(
            text_from_result(&server2.lm_export().await.unwrap())
                .lines()
                .filter(|l| !l.contains("\"timestamp\""))
                .collect::<Vec<_>>(),
            exported
                .lines()
                .filter(|l| !l.contains("\"timestamp\""))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_lm_import_rejects_garbage() {
        let server = make_server();
        let err = server
            .lm_import(Parameters(ImportRequest {
                state: serde_json::json!({"version": "9.0", "nodes": []}),
            }))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_ingest_persists_to_store() {
        let server = make_server();
        ingest(&server, vec![trade(0.0, 42_000.0, 5_000.0)]).await;
        let memory = server.memory.read().await;
        let loaded = server
            .store
            .lock()
            .await
            .load_memory(&lm_core::MemoryConfig::default())
            .unwrap();
        assert_eq!(loaded.entries(), memory.entries());
    }

    #[tokio::test]
    async fn test_readers_share_memory() {
        let server = make_server();
        ingest(&server, vec![trade(0.0, 42_000.0, 5_000.0)]).await;

        // two readers at once; a writer would block on the second guard
        let first = server.memory.read().await;
        let second = server.memory.try_read();
        assert!(second.is_ok());
        assert!(server.memory.try_write().is_err());
        drop(second);
        drop(first);

        let (a, b) = tokio::join!(server.lm_stats(), server.lm_export());
        assert_eq!(parse_result(&a.unwrap())["nodes"], 1);
        assert!(text_from_result(&b.unwrap()).contains("\"nodes\""));
    }

    #[test]
    fn test_server_is_shareable() {
        fn assert_handler<T: ServerHandler + Send + Sync + 'static>() {}
        assert_handler::<LmServer>();
    }

    #[test]
    fn test_tool_registration() {
        let server = make_server();
        let info = server.get_info();

        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }
}
