use std::{path::Path, sync::Arc};

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::debug;

use crate::{
    codec::{IdKey, JsonCodec, SerdeJsonCodec, decode, encode_document, encode_id},
    config::GraphConfig,
    errors::{GraphError, Result},
    metrics::{StoreMetrics, StoreMetricsSnapshot},
    schema::ensure_schema,
    statement::StatementHandle,
    trace::{TraceSink, TraceSlot},
    traversal::{Marker, TraversalFlags, TraversalQueryBuilder, TraversalRow},
};

use super::{
    stream::LazyRows,
    types::{EdgeDirection, Node, RawEdge},
};

const INSERT_NODE: &str = "INSERT INTO nodes (id, body) VALUES (?, ?)";
const SELECT_NODE: &str = "SELECT body FROM nodes WHERE id = ?";
const NODE_EXISTS: &str = "SELECT id FROM nodes WHERE id = ?";
const UPDATE_NODE: &str = "UPDATE nodes SET body = ? WHERE id = ?";
const DELETE_NODE: &str = "DELETE FROM nodes WHERE id = ?";
const COUNT_NODES: &str = "SELECT count(*) FROM nodes";

const INSERT_EDGE: &str = "INSERT INTO edges (source, target, properties) VALUES (?, ?, ?)";
const EDGE_EXISTS: &str =
    "SELECT 1 FROM edges WHERE source = ? AND target = ? AND properties = ?";
const UPDATE_EDGE: &str = "UPDATE edges SET properties = ? WHERE source = ? AND target = ?";
const DELETE_EDGE: &str = "DELETE FROM edges WHERE source = ? AND target = ?";
const COUNT_EDGES: &str = "SELECT count(*) FROM edges";

const DELETE_EDGES: &str = "DELETE FROM edges WHERE source = ?1 OR target = ?1";
const DELETE_OUTGOING_EDGES: &str = "DELETE FROM edges WHERE source = ?";
const DELETE_INCOMING_EDGES: &str = "DELETE FROM edges WHERE target = ?";

const SEARCH_EDGES: &str = "SELECT source, target, properties FROM edges \
     WHERE source = ?1 OR target = ?1 ORDER BY rowid";
const SEARCH_OUTGOING_EDGES: &str =
    "SELECT source, target, properties FROM edges WHERE source = ? ORDER BY rowid";
const SEARCH_INCOMING_EDGES: &str =
    "SELECT source, target, properties FROM edges WHERE target = ? ORDER BY rowid";

/// Graph of JSON documents stored in one SQLite database.
///
/// The store owns a single connection opened in serialized mode and takes no
/// locks of its own. Check-then-write operations (`insert_node_if_not_exists`,
/// `insert_edge_if_not_exists`, the affected-row check in `update_node`) are
/// therefore not atomic against other connections to the same file. Multi-step
/// deletes run without a transaction.
pub struct GraphStore<C: JsonCodec = SerdeJsonCodec> {
    conn: Connection,
    codec: C,
    queries: TraversalQueryBuilder,
    metrics: StoreMetrics,
    trace: TraceSlot,
}

impl GraphStore<SerdeJsonCodec> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, &GraphConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, cfg: &GraphConfig) -> Result<Self> {
        Self::with_codec(path, cfg, SerdeJsonCodec)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::in_memory_with_codec(SerdeJsonCodec)
    }
}

impl<C: JsonCodec> GraphStore<C> {
    pub fn with_codec<P: AsRef<Path>>(path: P, cfg: &GraphConfig, codec: C) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening graph store");
        let conn = Connection::open_with_flags(path, cfg.open_flags())
            .map_err(|e| GraphError::connection(e.to_string()))?;
        Self::from_connection(conn, cfg, codec)
    }

    pub fn in_memory_with_codec(codec: C) -> Result<Self> {
        let cfg = GraphConfig::default();
        let conn = Connection::open_in_memory_with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| GraphError::connection(e.to_string()))?;
        Self::from_connection(conn, &cfg, codec)
    }

    fn from_connection(conn: Connection, cfg: &GraphConfig, codec: C) -> Result<Self> {
        if let Some(timeout) = cfg.busy_timeout {
            conn.busy_timeout(timeout)
                .map_err(|e| GraphError::connection(e.to_string()))?;
        }
        for (key, value) in &cfg.pragma_settings {
            let pragma_sql = format!("PRAGMA {} = {}", key, value);
            match conn.execute(&pragma_sql, []) {
                Ok(_) => {}
                // Some PRAGMAs report their new value as a row.
                Err(rusqlite::Error::ExecuteReturnedResults) => {}
                Err(e) => {
                    return Err(GraphError::connection(format!(
                        "PRAGMA {} = {}: {}",
                        key, value, e
                    )));
                }
            }
        }
        ensure_schema(&conn)?;
        Ok(Self {
            conn,
            codec,
            queries: TraversalQueryBuilder::for_linked_engine(),
            metrics: StoreMetrics::default(),
            trace: TraceSlot::default(),
        })
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The underlying connection, for inspection alongside the store.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Registers `callback` to receive the expanded SQL of every statement the
    /// store executes, and of every produced row when `include_rows` is set.
    /// Replaces any previously registered callback. The callback is looked up on
    /// every step, so open [`LazyRows`] report to it from their next row on.
    pub fn trace<F>(&self, callback: F, include_rows: bool)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.trace
            .install(TraceSink::new(Arc::new(callback), include_rows));
    }

    pub fn clear_trace(&self) {
        self.trace.clear();
    }

    pub fn key<I: Serialize + ?Sized>(&self, id: &I) -> Result<IdKey> {
        encode_id(&self.codec, id)
    }

    pub fn insert_node<N: Node>(&self, node: &N) -> Result<()> {
        let key = self.key(&node.id())?;
        let body = encode_document(&self.codec, node)?;
        let mut stmt = self.prepare(INSERT_NODE)?;
        stmt.bind_text(key.as_str())?;
        stmt.bind_text(&body)?;
        stmt.execute()?;
        Ok(())
    }

    /// Inserts `node` unless a node with the same id exists. Returns whether a
    /// row was written. The probe and the insert are separate statements.
    pub fn insert_node_if_not_exists<N: Node>(&self, node: &N) -> Result<bool> {
        if self.node_exists(&node.id())? {
            return Ok(false);
        }
        self.insert_node(node)?;
        Ok(true)
    }

    pub fn node_exists<I: Serialize + ?Sized>(&self, id: &I) -> Result<bool> {
        let key = self.key(id)?;
        self.node_exists_by_key(&key)
    }

    pub fn node_exists_by_key(&self, key: &IdKey) -> Result<bool> {
        let mut stmt = self.prepare(NODE_EXISTS)?;
        stmt.bind_text(key.as_str())?;
        stmt.step()
    }

    pub fn get_node<N: Node, I: Serialize + ?Sized>(&self, id: &I) -> Result<Option<N>> {
        let key = self.key(id)?;
        self.get_node_by_key(&key)
    }

    pub fn get_node_by_key<N: Node>(&self, key: &IdKey) -> Result<Option<N>> {
        let mut stmt = self.prepare(SELECT_NODE)?;
        stmt.bind_text(key.as_str())?;
        if !stmt.step()? {
            return Ok(None);
        }
        match stmt.column_text(0) {
            Some(body) => decode(&self.codec, body.as_bytes()).map(Some),
            None => Err(GraphError::decoding(format!("node {key} has no body"))),
        }
    }

    /// Replaces the body of the node with `node`'s id.
    pub fn update_node<N: Node>(&self, node: &N) -> Result<()> {
        let key = self.key(&node.id())?;
        let body = encode_document(&self.codec, node)?;
        let mut stmt = self.prepare(UPDATE_NODE)?;
        stmt.bind_text(&body)?;
        stmt.bind_text(key.as_str())?;
        // The change count is read from the connection after the step, so a
        // write from another thread in between can be misattributed.
        if stmt.execute()? == 0 {
            debug!(id = %key, "update matched no node");
            return Err(GraphError::node_not_found(key.into_string()));
        }
        Ok(())
    }

    /// Removes every edge touching `id`, then the node row. The two deletes are
    /// not wrapped in a transaction.
    pub fn delete_node<I: Serialize + ?Sized>(&self, id: &I) -> Result<()> {
        let key = self.key(id)?;
        self.delete_edges_by_key(&key, EdgeDirection::Both)?;
        let mut stmt = self.prepare(DELETE_NODE)?;
        stmt.bind_text(key.as_str())?;
        stmt.execute()?;
        Ok(())
    }

    pub fn delete_node_of<N: Node>(&self, node: &N) -> Result<()> {
        self.delete_node(&node.id())
    }

    /// Inserts an edge without properties. Endpoints are not checked.
    pub fn insert_edge<S, T>(&self, source: &S, target: &T) -> Result<()>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        self.insert_edge_document(self.key(source)?, self.key(target)?, None)
    }

    pub fn insert_edge_with_properties<S, T, P>(
        &self,
        source: &S,
        target: &T,
        properties: &P,
    ) -> Result<()>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let properties = encode_document(&self.codec, properties)?;
        self.insert_edge_document(self.key(source)?, self.key(target)?, Some(&properties))
    }

    pub fn insert_edge_between<A: Node, B: Node>(&self, source: &A, target: &B) -> Result<()> {
        self.insert_edge(&source.id(), &target.id())
    }

    /// Inserts a property-less edge unless [`edge_exists`](Self::edge_exists)
    /// reports one. That probe never matches, so this always inserts.
    pub fn insert_edge_if_not_exists<S, T>(&self, source: &S, target: &T) -> Result<bool>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        if self.edge_exists(source, target)? {
            return Ok(false);
        }
        self.insert_edge(source, target)?;
        Ok(true)
    }

    /// Inserts the edge unless an edge with the same endpoints and properties exists.
    /// The probe and the insert are separate statements.
    pub fn insert_edge_with_properties_if_not_exists<S, T, P>(
        &self,
        source: &S,
        target: &T,
        properties: &P,
    ) -> Result<bool>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        if self.edge_exists_with(source, target, properties)? {
            return Ok(false);
        }
        self.insert_edge_with_properties(source, target, properties)?;
        Ok(true)
    }

    /// Probes for a property-less edge by comparing `properties` with a bound
    /// NULL. `NULL = NULL` is never true in SQL, so this reports `false` even
    /// when such an edge is stored.
    pub fn edge_exists<S, T>(&self, source: &S, target: &T) -> Result<bool>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        let (source, target) = (self.key(source)?, self.key(target)?);
        let mut stmt = self.prepare(EDGE_EXISTS)?;
        stmt.bind_text(source.as_str())?;
        stmt.bind_text(target.as_str())?;
        stmt.bind_null()?;
        stmt.step()
    }

    pub fn edge_exists_with<S, T, P>(&self, source: &S, target: &T, properties: &P) -> Result<bool>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let (source, target) = (self.key(source)?, self.key(target)?);
        let properties = encode_document(&self.codec, properties)?;
        let mut stmt = self.prepare(EDGE_EXISTS)?;
        stmt.bind_text(source.as_str())?;
        stmt.bind_text(target.as_str())?;
        stmt.bind_text(&properties)?;
        stmt.step()
    }

    /// Replaces the properties of every edge from `source` to `target`. Unlike
    /// [`update_node`](Self::update_node) a missing edge is not an error.
    pub fn update_edge<S, T, P>(&self, source: &S, target: &T, properties: &P) -> Result<()>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let properties = encode_document(&self.codec, properties)?;
        let (source, target) = (self.key(source)?, self.key(target)?);
        let mut stmt = self.prepare(UPDATE_EDGE)?;
        stmt.bind_text(&properties)?;
        stmt.bind_text(source.as_str())?;
        stmt.bind_text(target.as_str())?;
        stmt.execute()?;
        Ok(())
    }

    /// Deletes every edge from `source` to `target`, whatever its properties.
    pub fn delete_edge<S, T>(&self, source: &S, target: &T) -> Result<()>
    where
        S: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        let (source, target) = (self.key(source)?, self.key(target)?);
        let mut stmt = self.prepare(DELETE_EDGE)?;
        stmt.bind_text(source.as_str())?;
        stmt.bind_text(target.as_str())?;
        stmt.execute()?;
        Ok(())
    }

    pub fn delete_edges<I: Serialize + ?Sized>(&self, id: &I, direction: EdgeDirection) -> Result<()> {
        let key = self.key(id)?;
        self.delete_edges_by_key(&key, direction)
    }

    pub fn search_edges<I: Serialize + ?Sized>(
        &self,
        id: &I,
        direction: EdgeDirection,
    ) -> Result<Vec<RawEdge>> {
        self.search_edges_iter(id, direction)?.collect()
    }

    pub fn search_edges_of<N: Node>(&self, node: &N, direction: EdgeDirection) -> Result<Vec<RawEdge>> {
        self.search_edges(&node.id(), direction)
    }

    /// Lazily yields the edges of `id`, holding the statement until drained or dropped.
    pub fn search_edges_iter<I: Serialize + ?Sized>(
        &self,
        id: &I,
        direction: EdgeDirection,
    ) -> Result<LazyRows<'_, RawEdge>> {
        let key = self.key(id)?;
        let sql = match direction {
            EdgeDirection::Both => SEARCH_EDGES,
            EdgeDirection::Outgoing => SEARCH_OUTGOING_EDGES,
            EdgeDirection::Incoming => SEARCH_INCOMING_EDGES,
        };
        let mut stmt = self.prepare(sql)?;
        stmt.bind_text(key.as_str())?;
        Ok(LazyRows::new(stmt, raw_edge_from_row))
    }

    /// Ids reachable from `from`, seed first, each once.
    pub fn traverse<I: Serialize + ?Sized>(
        &self,
        from: &I,
        inbound: bool,
        outbound: bool,
    ) -> Result<Vec<IdKey>> {
        self.traverse_iter(from, inbound, outbound)?.collect()
    }

    pub fn traverse_from<N: Node>(&self, node: &N, inbound: bool, outbound: bool) -> Result<Vec<IdKey>> {
        self.traverse(&node.id(), inbound, outbound)
    }

    pub fn traverse_iter<I: Serialize + ?Sized>(
        &self,
        from: &I,
        inbound: bool,
        outbound: bool,
    ) -> Result<LazyRows<'_, IdKey>> {
        let stmt = self.traversal_statement(from, TraversalFlags::new(false, inbound, outbound))?;
        Ok(LazyRows::new(stmt, id_from_row))
    }

    /// Traversal rows with the seed body, the discovering edge of each reached
    /// id, and the body of each reached id.
    pub fn traverse_with_bodies<I: Serialize + ?Sized>(
        &self,
        from: &I,
        inbound: bool,
        outbound: bool,
    ) -> Result<Vec<TraversalRow>> {
        self.traverse_with_bodies_iter(from, inbound, outbound)?
            .collect()
    }

    pub fn traverse_with_bodies_iter<I: Serialize + ?Sized>(
        &self,
        from: &I,
        inbound: bool,
        outbound: bool,
    ) -> Result<LazyRows<'_, TraversalRow>> {
        let stmt = self.traversal_statement(from, TraversalFlags::new(true, inbound, outbound))?;
        Ok(LazyRows::new(stmt, traversal_row_from_row))
    }

    pub fn node_count(&self) -> Result<u64> {
        self.count(COUNT_NODES)
    }

    pub fn edge_count(&self) -> Result<u64> {
        self.count(COUNT_EDGES)
    }
}

impl<C: JsonCodec> GraphStore<C> {
    fn prepare(&self, sql: &str) -> Result<StatementHandle<'_>> {
        StatementHandle::prepare_observed(&self.conn, sql, Some(&self.metrics), Some(&self.trace))
    }

    fn insert_edge_document(
        &self,
        source: IdKey,
        target: IdKey,
        properties: Option<&str>,
    ) -> Result<()> {
        let mut stmt = self.prepare(INSERT_EDGE)?;
        stmt.bind_text(source.as_str())?;
        stmt.bind_text(target.as_str())?;
        stmt.bind_optional_text(properties)?;
        stmt.execute()?;
        Ok(())
    }

    fn delete_edges_by_key(&self, key: &IdKey, direction: EdgeDirection) -> Result<()> {
        let sql = match direction {
            EdgeDirection::Both => DELETE_EDGES,
            EdgeDirection::Outgoing => DELETE_OUTGOING_EDGES,
            EdgeDirection::Incoming => DELETE_INCOMING_EDGES,
        };
        let mut stmt = self.prepare(sql)?;
        stmt.bind_text(key.as_str())?;
        stmt.execute()?;
        Ok(())
    }

    fn traversal_statement<I: Serialize + ?Sized>(
        &self,
        from: &I,
        flags: TraversalFlags,
    ) -> Result<StatementHandle<'_>> {
        let sql = self.queries.build(flags)?;
        let key = self.key(from)?;
        let mut stmt = self.prepare(sql)?;
        stmt.bind_text(key.as_str())?;
        Ok(stmt)
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let mut stmt = self.prepare(sql)?;
        if !stmt.step()? {
            return Ok(0);
        }
        match stmt.column(0) {
            rusqlite::types::Value::Integer(n) => Ok(u64::try_from(n).unwrap_or(0)),
            other => Err(GraphError::decoding(format!(
                "expected an integer count, got {other:?}"
            ))),
        }
    }
}

fn required_text(stmt: &StatementHandle<'_>, index: usize) -> Result<String> {
    stmt.column_text(index).ok_or_else(|| {
        GraphError::decoding(format!("column {index} is NULL in `{}`", stmt.sql()))
    })
}

fn raw_edge_from_row(stmt: &StatementHandle<'_>) -> Result<RawEdge> {
    Ok(RawEdge {
        source: IdKey::from_canonical(required_text(stmt, 0)?),
        target: IdKey::from_canonical(required_text(stmt, 1)?),
        properties: stmt.column_text(2),
    })
}

fn id_from_row(stmt: &StatementHandle<'_>) -> Result<IdKey> {
    required_text(stmt, 0).map(IdKey::from_canonical)
}

fn traversal_row_from_row(stmt: &StatementHandle<'_>) -> Result<TraversalRow> {
    let marker_text = required_text(stmt, 1)?;
    let marker = Marker::parse(&marker_text).ok_or_else(|| {
        GraphError::decoding(format!("unknown traversal marker `{marker_text}`"))
    })?;
    Ok(TraversalRow {
        id: required_text(stmt, 0).map(IdKey::from_canonical)?,
        marker,
        document: stmt.column_text(2),
    })
}
