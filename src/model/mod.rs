pub mod types;
pub mod graph;

pub use types::{EdgeId, EventTags, RmatsIsoform, VertexId};
pub use graph::{Edge, GraphError, SpliceGraph, Vertex, LEFT_SENTINEL, RIGHT_SENTINEL};
