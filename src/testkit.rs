//! In-process fake index server for tests.
//!
//! Speaks the same endpoints as a real index node, keeps staged documents
//! apart from committed ones and records every request it serves. Rows are
//! validated against the header column count and a mismatching body is refused
//! as a whole, like the real bulk handler does.

use crate::topology::{Node, NodeDatabase, Role};

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::{get, post},
};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Document = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Update,
    Bulk,
    StreamFile,
    Ping,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    /// Request body, or the `stream.file` path for server-local ingestion.
    pub body: String,
}

/// Tracks how many requests are being served at once, across every server
/// sharing it.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct GaugeGuard(Arc<InFlightGauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

enum PendingOp {
    Add { id: String, document: Document },
    DeleteAll,
    DeleteBy { field: String, value: String },
}

pub struct FakeIndexState {
    committed: DashMap<String, Document>,
    pending: Mutex<Vec<PendingOp>>,
    requests: Mutex<Vec<RecordedRequest>>,
    gauge: Arc<InFlightGauge>,
    delay: Duration,
    refuse_all: AtomicBool,
}

impl FakeIndexState {
    fn record(&self, kind: RequestKind, body: &str) {
        self.requests.lock().unwrap().push(RecordedRequest {
            kind,
            body: body.to_string(),
        });
    }

    fn stage(&self, op: PendingOp) {
        self.pending.lock().unwrap().push(op);
    }

    fn commit(&self) {
        let ops: Vec<PendingOp> = self.pending.lock().unwrap().drain(..).collect();
        for op in ops {
            match op {
                PendingOp::Add { id, document } => {
                    self.committed.insert(id, document);
                }
                PendingOp::DeleteAll => self.committed.clear(),
                PendingOp::DeleteBy { field, value } => self
                    .committed
                    .retain(|_, doc| doc.get(&field) != Some(&value)),
            }
        }
    }

    fn stage_tsv(&self, body: &str) -> Result<usize, String> {
        let rows = parse_tsv(body)?;
        let count = rows.len();
        for (id, document) in rows {
            self.stage(PendingOp::Add { id, document });
        }
        Ok(count)
    }
}

fn parse_tsv(body: &str) -> Result<Vec<(String, Document)>, String> {
    let mut lines = body.lines();
    let header = lines
        .next()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| "missing header".to_string())?;
    let fields: Vec<&str> = header.split('\t').collect();

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        let values: Vec<&str> = line.split('\t').collect();
        if values.len() != fields.len() {
            return Err(format!(
                "line {}: expected {} values, found {}",
                n + 2,
                fields.len(),
                values.len()
            ));
        }
        if values[0].is_empty() {
            return Err(format!("line {}: missing {}", n + 2, fields[0]));
        }
        let document: Document = fields
            .iter()
            .zip(values.iter())
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect();
        rows.push((values[0].to_string(), document));
    }
    Ok(rows)
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_xml_command(state: &FakeIndexState, body: &str) -> Result<(), String> {
    let body = body.trim();
    if body.starts_with("<commit") || body == "<optimize/>" {
        state.commit();
        return Ok(());
    }

    let query = body
        .strip_prefix("<delete><query>")
        .and_then(|rest| rest.strip_suffix("</query></delete>"))
        .map(unescape_xml)
        .ok_or_else(|| format!("unsupported update body: {}", body))?;

    if query == "*:*" {
        state.stage(PendingOp::DeleteAll);
        return Ok(());
    }
    let (field, value) = query
        .split_once(':')
        .ok_or_else(|| format!("unsupported query: {}", query))?;
    state.stage(PendingOp::DeleteBy {
        field: field.to_string(),
        value: value.to_string(),
    });
    Ok(())
}

async fn handle_update(
    Extension(state): Extension<Arc<FakeIndexState>>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    let _guard = state.gauge.enter();
    tokio::time::sleep(state.delay).await;

    let bulk = params.contains_key("separator");
    state.record(
        if bulk {
            RequestKind::Bulk
        } else {
            RequestKind::Update
        },
        &body,
    );
    if state.refuse_all.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "refused".to_string());
    }

    let outcome = if bulk {
        state.stage_tsv(&body).map(|n| format!("staged {}", n))
    } else {
        parse_xml_command(&state, &body).map(|_| "ok".to_string())
    };
    match outcome {
        Ok(message) => (StatusCode::OK, message),
        Err(message) => (StatusCode::BAD_REQUEST, message),
    }
}

async fn handle_stream_file(
    Extension(state): Extension<Arc<FakeIndexState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let _guard = state.gauge.enter();
    let Some(path) = params.get("stream.file") else {
        return (StatusCode::BAD_REQUEST, "missing stream.file".to_string());
    };
    state.record(RequestKind::StreamFile, path);

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };
    match state.stage_tsv(&content) {
        Ok(n) => (StatusCode::OK, format!("staged {}", n)),
        Err(message) => (StatusCode::BAD_REQUEST, message),
    }
}

async fn handle_ping(Extension(state): Extension<Arc<FakeIndexState>>) -> (StatusCode, String) {
    state.record(RequestKind::Ping, "");
    if state.refuse_all.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "down".to_string());
    }
    (StatusCode::OK, "OK".to_string())
}

/// A fake node listening on an ephemeral local port until dropped.
pub struct FakeIndexServer {
    pub addr: SocketAddr,
    state: Arc<FakeIndexState>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeIndexServer {
    pub async fn start() -> Self {
        Self::start_with(Arc::new(InFlightGauge::default()), Duration::ZERO).await
    }

    /// Starts a server that holds each update request for `delay` and reports
    /// to a shared `gauge`.
    pub async fn start_with(gauge: Arc<InFlightGauge>, delay: Duration) -> Self {
        let state = Arc::new(FakeIndexState {
            committed: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            gauge,
            delay,
            refuse_all: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/solr/update", post(handle_update))
            .route("/solr/update/csv", get(handle_stream_file))
            .route("/solr/admin/ping", get(handle_ping))
            .layer(Extension(state.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Answer every following request with an error status.
    pub fn refuse_all(&self, refuse: bool) {
        self.state.refuse_all.store(refuse, Ordering::SeqCst);
    }

    pub fn committed_count(&self) -> usize {
        self.state.committed.len()
    }

    pub fn committed_ids(&self) -> BTreeSet<String> {
        self.state
            .committed
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn committed_document(&self, id: &str) -> Option<Document> {
        self.state.committed.get(id).map(|doc| doc.value().clone())
    }

    pub fn pending_count(&self) -> usize {
        self.state.pending.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_of(&self, kind: RequestKind) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

impl Drop for FakeIndexServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Topology over running fake servers: the first one is the master `node0`,
/// the others are slaves `node1..` replicating from it. A lone server is both.
pub fn database_for(servers: &[&FakeIndexServer]) -> Arc<NodeDatabase> {
    let nodes = servers
        .iter()
        .enumerate()
        .map(|(i, server)| {
            let mut node = if i == 0 {
                Node::new("127.0.0.1", server.port(), Role::Master, None)
            } else {
                Node::new("127.0.0.1", server.port(), Role::Slave, Some("node0"))
            };
            if servers.len() == 1 {
                node.roles.insert(Role::Slave);
            }
            node.name = format!("node{}", i);
            node
        })
        .collect();
    Arc::new(NodeDatabase::new(nodes).unwrap())
}

/// A local port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
