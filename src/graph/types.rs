use serde::{Serialize, de::DeserializeOwned};

use crate::{
    GraphStore,
    codec::{IdKey, JsonCodec, decode},
    errors::Result,
};

/// A value stored as one row of `nodes`. The whole value is the stored body.
pub trait Node: Serialize + DeserializeOwned {
    type Id: Serialize;

    fn id(&self) -> Self::Id;
}

/// Which edges of a node an operation looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeDirection {
    /// Edges where the node is the source or the target.
    #[default]
    Both,
    /// Edges where the node is the source.
    Outgoing,
    /// Edges where the node is the target.
    Incoming,
}

/// An edge with decoded properties.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge<P> {
    pub source: IdKey,
    pub target: IdKey,
    pub properties: Option<P>,
}

/// An edge as stored: canonical endpoint keys and the raw properties document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEdge {
    pub source: IdKey,
    pub target: IdKey,
    pub properties: Option<String>,
}

impl RawEdge {
    pub fn decode<P: DeserializeOwned, C: JsonCodec>(&self, codec: &C) -> Result<Edge<P>> {
        let properties = self
            .properties
            .as_deref()
            .map(|doc| decode(codec, doc.as_bytes()))
            .transpose()?;
        Ok(Edge {
            source: self.source.clone(),
            target: self.target.clone(),
            properties,
        })
    }

    pub fn source_node<N: Node, C: JsonCodec>(&self, store: &GraphStore<C>) -> Result<Option<N>> {
        store.get_node_by_key(&self.source)
    }

    pub fn target_node<N: Node, C: JsonCodec>(&self, store: &GraphStore<C>) -> Result<Option<N>> {
        store.get_node_by_key(&self.target)
    }
}
