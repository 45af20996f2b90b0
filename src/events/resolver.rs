use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;

use crate::events::io::{EventRecord, EventSpan, ExonSpan, OverhangSpan};
use crate::model::graph::{GraphError, SpliceGraph};
use crate::model::types::{RmatsIsoform, VertexId};
use crate::types::{Coord, EventKind, EventShape};

/// Prefix put in front of every exonic part number in a fragment list.
pub const FRAGMENT_PREFIX: &str = "E";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{kind} event '{id}': {source}")]
    Graph {
        kind: EventKind,
        id: String,
        #[source]
        source: GraphError,
    },

    #[error(
        "{kind} event '{id}' shares neither its start ({long_start}/{short_start}) nor its end ({long_end}/{short_end}) between isoforms"
    )]
    AmbiguousOverhang {
        kind: EventKind,
        id: String,
        long_start: Coord,
        long_end: Coord,
        short_start: Coord,
        short_end: Coord,
    },

    #[error("event '{id}' has a {found} span but {kind} events need the other shape")]
    ShapeMismatch {
        kind: EventKind,
        id: String,
        found: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Treat ambiguous overhang events as fatal instead of warning.
    pub strict_overhang: bool,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict_overhang(mut self, yes: bool) -> Self {
        self.strict_overhang = yes;
        self
    }
}

/// Event ID -> ordered fragment identifiers (`E001`, ...), in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentMap {
    order: Vec<String>,
    lists: HashMap<String, Vec<String>>,
}

impl FragmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fragments` to the list of `id`; a repeated ID extends its list.
    pub fn extend(&mut self, id: &str, fragments: Vec<String>) {
        match self.lists.get_mut(id) {
            Some(list) => {
                warn!("event ID '{id}' appears more than once; concatenating its fragments");
                list.extend(fragments);
            }
            None => {
                self.order.push(id.to_string());
                self.lists.insert(id.to_string(), fragments);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.lists.get(id).map(Vec::as_slice)
    }

    /// Comma-joined list; unknown IDs give `None`.
    pub fn joined(&self, id: &str) -> Option<String> {
        self.lists.get(id).map(|l| l.join(","))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// IDs in first-seen order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Maps rMATS events onto the fragment edges of a splice graph.
#[derive(Debug, Clone, Default)]
pub struct EventResolver {
    options: ResolveOptions,
}

impl EventResolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    /// Take the graph, resolve all `records` of `kind`, hand the graph back.
    pub fn resolve_owned(
        &self,
        mut graph: SpliceGraph,
        kind: EventKind,
        records: &[EventRecord],
    ) -> Result<(SpliceGraph, FragmentMap), ResolveError> {
        let map = self.resolve(&mut graph, kind, records)?;
        Ok((graph, map))
    }

    /// Resolve every record, tagging fragment edges with `kind`.
    pub fn resolve(
        &self,
        graph: &mut SpliceGraph,
        kind: EventKind,
        records: &[EventRecord],
    ) -> Result<FragmentMap, ResolveError> {
        let mut map = FragmentMap::new();
        for rec in records {
            let fragments = self.resolve_record(graph, kind, rec)?;
            debug!("{} {} -> [{}]", kind, rec.id, fragments.join(","));
            map.extend(&rec.id, fragments);
        }

        let mapped = map
            .ids()
            .filter(|id| map.get(id).map_or(false, |l| !l.is_empty()))
            .count();
        info!(
            "{}: resolved {} events, {} overlap at least one fragment",
            kind,
            records.len(),
            mapped
        );
        Ok(map)
    }

    /// Resolve a single record and return its fragment list.
    pub fn resolve_record(
        &self,
        graph: &mut SpliceGraph,
        kind: EventKind,
        rec: &EventRecord,
    ) -> Result<Vec<String>, ResolveError> {
        let graph_err = |source| ResolveError::Graph {
            kind,
            id: rec.id.clone(),
            source,
        };

        match rec.span {
            EventSpan::Overhang(span) => {
                if kind.shape() != EventShape::Overhang {
                    return Err(ResolveError::ShapeMismatch {
                        kind,
                        id: rec.id.clone(),
                        found: "long/short",
                    });
                }
                self.resolve_overhang(graph, kind, &rec.id, span)
            }
            EventSpan::FullFragment(span) => {
                if kind.shape() != EventShape::FullFragment {
                    return Err(ResolveError::ShapeMismatch {
                        kind,
                        id: rec.id.clone(),
                        found: "exon",
                    });
                }
                let (lo, hi) = full_fragment_bounds(graph, span).map_err(graph_err)?;
                Ok(walk_fragments(graph, kind, lo, hi))
            }
        }
    }

    fn resolve_overhang(
        &self,
        graph: &mut SpliceGraph,
        kind: EventKind,
        id: &str,
        span: OverhangSpan,
    ) -> Result<Vec<String>, ResolveError> {
        let graph_err = |source| ResolveError::Graph {
            kind,
            id: id.to_string(),
            source,
        };

        let ls = graph.vertex_id_at(span.long_start).map_err(graph_err)?;
        let le = graph.vertex_id_at(span.long_end).map_err(graph_err)?;
        let ss = graph.vertex_id_at(span.short_start).map_err(graph_err)?;
        let se = graph.vertex_id_at(span.short_end).map_err(graph_err)?;

        let long = graph.find_edge_within(ls, le).map_err(graph_err)?;
        let short = graph.find_edge_within(ss, se).map_err(graph_err)?;
        graph.edge_mut(long).rmats = Some(RmatsIsoform::Long);
        graph.edge_mut(short).rmats = Some(RmatsIsoform::Short);

        let shared_start = span.long_start == span.short_start;
        let shared_end = span.long_end == span.short_end;
        let (a, b) = match (shared_start, shared_end) {
            (true, false) => (se, le),
            (false, true) => (ls, ss),
            _ => {
                let err = ResolveError::AmbiguousOverhang {
                    kind,
                    id: id.to_string(),
                    long_start: span.long_start,
                    long_end: span.long_end,
                    short_start: span.short_start,
                    short_end: span.short_end,
                };
                if self.options.strict_overhang {
                    return Err(err);
                }
                warn!("{err}; no fragments recorded");
                return Ok(Vec::new());
            }
        };

        Ok(walk_fragments(graph, kind, a.min(b), a.max(b)))
    }
}

/// Ascending index range of a full-fragment event. Vertex order already
/// follows the transcript, so exonStart sits at the lower index on `+` and
/// exonEnd on `-`; the walk is the same on both strands.
fn full_fragment_bounds(
    graph: &SpliceGraph,
    span: ExonSpan,
) -> Result<(VertexId, VertexId), GraphError> {
    let start = graph.vertex_id_at(span.start)?;
    let end = graph.vertex_id_at(span.end)?;
    Ok((start.min(end), start.max(end)))
}

/// Visit every adjacent index pair `(i, i+1)` with `lo <= i < hi`, tag each
/// fragment edge of the pair and collect its prefixed identifier.
fn walk_fragments(graph: &mut SpliceGraph, kind: EventKind, lo: VertexId, hi: VertexId) -> Vec<String> {
    let mut out = Vec::new();
    for i in lo..hi {
        for e in graph.edges_within(i, i + 1) {
            let edge = graph.edge_mut(e);
            if !edge.is_fragment() {
                continue;
            }
            edge.tags.set(kind);
            out.push(format!("{FRAGMENT_PREFIX}{}", edge.dexseq_fragment));
        }
    }
    out
}
