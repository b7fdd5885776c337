mod store;
mod stream;
mod types;

pub use store::GraphStore;
pub use stream::LazyRows;
pub use types::{Edge, EdgeDirection, Node, RawEdge};
