//! Embedded graph of JSON documents on SQLite.
//!
//! Nodes live in a `nodes(id, body)` table and edges in an
//! `edges(source, target, properties)` table. Identifiers of any serializable
//! type are stored in a canonical text form (see [`codec`]), bodies and edge
//! properties as JSON documents. Reachability queries run as a single recursive
//! SQL statement (see [`traversal`]).
//!
//! ```rust,no_run
//! use docgraph::{EdgeDirection, GraphStore, Node};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Person {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Node for Person {
//!     type Id = String;
//!     fn id(&self) -> String {
//!         self.id.clone()
//!     }
//! }
//!
//! let store = GraphStore::open("people.db")?;
//! store.insert_node(&Person { id: "ada".into(), name: "Ada".into() })?;
//! store.insert_node(&Person { id: "alan".into(), name: "Alan".into() })?;
//! store.insert_edge_with_properties("ada", "alan", &serde_json::json!({ "knows": true }))?;
//!
//! let reachable = store.traverse("ada", false, true)?;
//! let edges = store.search_edges("alan", EdgeDirection::Incoming)?;
//! # Ok::<(), docgraph::GraphError>(())
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod graph;
pub mod metrics;
pub mod schema;
pub mod statement;
pub mod trace;
pub mod traversal;

pub use crate::codec::{IdKey, JsonCodec, SerdeJsonCodec};
pub use crate::config::{GraphConfig, open_graph};
pub use crate::errors::{CodecError, GraphError, Result};
pub use crate::graph::{Edge, EdgeDirection, GraphStore, LazyRows, Node, RawEdge};
pub use crate::metrics::StoreMetricsSnapshot;
pub use crate::statement::StatementHandle;
pub use crate::traversal::{Marker, TraversalFlags, TraversalQueryBuilder, TraversalRow};
