//! splice_event_map
//!
//! Maps rMATS alternative-splicing events (A3SS, A5SS, SE, RI) onto the
//! DEXSeq exonic parts of one gene. The gene's splice graph is imported from
//! GraphML, one edge per exonic part is added, every event is walked across
//! the graph to collect the parts it overlaps, and the results are written as
//! updated event tables plus a diagram of the tagged graph.

pub mod annotation;
pub mod cli;
pub mod events;
pub mod export;
pub mod graphml;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod types;

pub use annotation::{FragmentBuilder, PartitionAnnotation};
pub use events::{EventResolver, EventTable, FragmentMap, ResolveOptions};
pub use model::{GraphError, SpliceGraph};
pub use pipeline::{run, PipelineConfig, RunSummary};
pub use types::{EventKind, Strand};
