//! Recursive traversal queries.
//!
//! A traversal starts from one seed id (the query's only parameter) and expands
//! one hop at a time along `edges` until a round discovers nothing new. Each id is
//! reported once, seed first, in discovery order.
//!
//! With bodies the rows are `(id, marker, document)`: the seed's body row comes
//! first, then one `->`/`<-` row per discovered id carrying the properties of the
//! edge that discovered it, then one `()` body row per discovered id. The ids are
//! found by the same id-only recursion; the discovering edge is the first edge
//! linking an id to one reached before it, outbound edges ahead of inbound ones.
//!
//! The eight flag combinations are rendered once and cached.

use std::{fmt, sync::OnceLock};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    codec::{IdKey, JsonCodec, decode},
    errors::{GraphError, Result},
};

/// Engine versions in `sqlite3_libversion_number` form.
const MIN_RECURSIVE_CTE: i32 = 3_008_003;
const MIN_WINDOW_FUNCTIONS: i32 = 3_025_000;
const MIN_MULTI_RECURSIVE_SELECT: i32 = 3_034_000;

static QUERIES: OnceLock<[String; 8]> = OnceLock::new();

fn queries() -> &'static [String; 8] {
    QUERIES.get_or_init(|| std::array::from_fn(|index| render(TraversalFlags::from_index(index))))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraversalFlags {
    pub with_bodies: bool,
    pub inbound: bool,
    pub outbound: bool,
}

impl TraversalFlags {
    pub fn new(with_bodies: bool, inbound: bool, outbound: bool) -> Self {
        Self {
            with_bodies,
            inbound,
            outbound,
        }
    }

    pub fn index(self) -> usize {
        (self.with_bodies as usize) << 2 | (self.inbound as usize) << 1 | self.outbound as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self {
            with_bodies: index & 0b100 != 0,
            inbound: index & 0b010 != 0,
            outbound: index & 0b001 != 0,
        }
    }

    fn required_engine_version(self) -> i32 {
        let mut required = 0;
        if self.inbound || self.outbound {
            required = MIN_RECURSIVE_CTE;
        }
        if self.inbound && self.outbound {
            required = required.max(MIN_MULTI_RECURSIVE_SELECT);
        }
        if self.with_bodies {
            required = required.max(MIN_WINDOW_FUNCTIONS);
        }
        required
    }
}

/// Selects the traversal SQL for a set of flags, refusing engines that cannot run it.
#[derive(Clone, Copy, Debug)]
pub struct TraversalQueryBuilder {
    engine_version: i32,
}

impl TraversalQueryBuilder {
    pub fn new(engine_version: i32) -> Self {
        Self { engine_version }
    }

    pub fn for_linked_engine() -> Self {
        Self::new(rusqlite::version_number())
    }

    pub fn build(&self, flags: TraversalFlags) -> Result<&'static str> {
        let required = flags.required_engine_version();
        if self.engine_version < required {
            return Err(GraphError::template(format!(
                "traversal {flags:?} needs SQLite {} or newer, engine is {}",
                format_version(required),
                format_version(self.engine_version)
            )));
        }
        debug!(index = flags.index(), "selected traversal query");
        Ok(queries()[flags.index()].as_str())
    }
}

impl Default for TraversalQueryBuilder {
    fn default() -> Self {
        Self::for_linked_engine()
    }
}

fn format_version(version: i32) -> String {
    format!(
        "{}.{}.{}",
        version / 1_000_000,
        version / 1_000 % 1_000,
        version % 1_000
    )
}

fn render(flags: TraversalFlags) -> String {
    let mut sql = String::from("WITH RECURSIVE traverse(x) AS (\n  SELECT ?1");
    if flags.outbound {
        sql.push_str("\n  UNION\n  SELECT target FROM edges JOIN traverse ON source = x");
    }
    if flags.inbound {
        sql.push_str("\n  UNION\n  SELECT source FROM edges JOIN traverse ON target = x");
    }
    sql.push_str("\n)");
    if !flags.with_bodies {
        sql.push_str("\nSELECT x FROM traverse");
        return sql;
    }
    sql.push_str(
        ",
numbered(x, seq) AS (
  SELECT x, row_number() OVER () FROM traverse
)",
    );
    let expands = flags.outbound || flags.inbound;
    if expands {
        // Each id keeps the first edge that links it to an id numbered before it.
        let mut links = Vec::new();
        if flags.outbound {
            links.push(
                "  SELECT n.x, '->', e.properties, n.seq, p.seq, 0, e.rowid
    FROM numbered n
    JOIN edges e ON e.target = n.x
    JOIN numbered p ON p.x = e.source
    WHERE p.seq < n.seq AND n.x <> ?1",
            );
        }
        if flags.inbound {
            links.push(
                "  SELECT n.x, '<-', e.properties, n.seq, p.seq, 1, e.rowid
    FROM numbered n
    JOIN edges e ON e.source = n.x
    JOIN numbered p ON p.x = e.target
    WHERE p.seq < n.seq AND n.x <> ?1",
            );
        }
        sql.push_str(",\nlinks(x, y, obj, seq, via, dir, edge) AS (\n");
        sql.push_str(&links.join("\n  UNION ALL\n"));
        sql.push_str(
            "
),
discovered(x, y, obj, seq) AS (
  SELECT x, y, obj, seq FROM (
    SELECT x, y, obj, seq,
           row_number() OVER (PARTITION BY x ORDER BY via, dir, edge) AS pick
      FROM links
  )
  WHERE pick = 1
)",
        );
    }
    sql.push_str(
        "
SELECT x, y, obj FROM (
  SELECT n.x AS x, '()' AS y, b.body AS obj, 0 AS part, n.seq AS seq
    FROM numbered n LEFT JOIN nodes b ON b.id = n.x
    WHERE n.x = ?1",
    );
    if expands {
        sql.push_str(
            "
  UNION ALL
  SELECT x, y, obj, 1, seq FROM discovered
  UNION ALL
  SELECT n.x, '()', b.body, 2, n.seq
    FROM numbered n LEFT JOIN nodes b ON b.id = n.x
    WHERE n.x <> ?1",
        );
    }
    sql.push_str("\n)\nORDER BY part, seq");
    sql
}

/// How a traversal row relates to the traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    /// `()`: the row carries the node's own body.
    Node,
    /// `->`: discovered as the target of an edge; carries the edge properties.
    Outbound,
    /// `<-`: discovered as the source of an edge; carries the edge properties.
    Inbound,
}

impl Marker {
    pub fn as_str(self) -> &'static str {
        match self {
            Marker::Node => "()",
            Marker::Outbound => "->",
            Marker::Inbound => "<-",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "()" => Some(Marker::Node),
            "->" => Some(Marker::Outbound),
            "<-" => Some(Marker::Inbound),
            _ => None,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraversalRow {
    pub id: IdKey,
    pub marker: Marker,
    pub document: Option<String>,
}

impl TraversalRow {
    /// Decodes the row's document: a node body for `()`, edge properties otherwise.
    pub fn decode<T: DeserializeOwned, C: JsonCodec>(&self, codec: &C) -> Result<Option<T>> {
        self.document
            .as_deref()
            .map(|doc| decode(codec, doc.as_bytes()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_index_roundtrip_covers_all_variants() {
        for index in 0..8 {
            assert_eq!(TraversalFlags::from_index(index).index(), index);
        }
    }

    #[test]
    fn version_formatting() {
        assert_eq!(format_version(3_034_001), "3.34.1");
        assert_eq!(format_version(3_008_003), "3.8.3");
    }

    #[test]
    fn marker_parse_rejects_unknown_text() {
        assert_eq!(Marker::parse("->"), Some(Marker::Outbound));
        assert_eq!(Marker::parse("=>"), None);
    }
}
