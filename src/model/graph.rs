use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;

use crate::model::types::{EdgeId, EventTags, RmatsIsoform, VertexId};
use crate::types::{Coord, Strand};

/// Name of the sentinel vertex left of every coordinate.
pub const LEFT_SENTINEL: &str = "L";
/// Name of the sentinel vertex right of every coordinate.
pub const RIGHT_SENTINEL: &str = "R";

/// Errors raised by graph lookups and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("no vertex named '{name}' in the splice graph (graph and annotation disagree?)")]
    MissingVertex { name: String },

    #[error("vertex '{name}' already exists")]
    DuplicateVertex { name: String },

    #[error("no edge between vertices '{from}' and '{to}'")]
    MissingEdge { from: String, to: String },

    #[error("vertex index {index} out of range ({len} vertices)")]
    BadVertexIndex { index: VertexId, len: usize },

    #[error(
        "vertex order does not follow the {strand} strand: '{prev}' (index {prev_index}) is followed by '{next}' (index {next_index})"
    )]
    OrderViolation {
        strand: Strand,
        prev: String,
        prev_index: VertexId,
        next: String,
        next_index: VertexId,
    },
}

/// One genomic coordinate of the locus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    /// Stringified 1-based coordinate (or a sentinel name); unique.
    pub name: String,
    /// Display label, the node id of the interchange file.
    pub label: String,
}

impl Vertex {
    pub fn coord(&self) -> Option<Coord> {
        self.name.parse().ok()
    }
}

/// A contiguous segment between two coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    /// Exonic part number for partition edges, empty otherwise.
    pub dexseq_fragment: String,
    pub rmats: Option<RmatsIsoform>,
    pub tags: EventTags,
    /// Imported exon/intron marker, only read by rendering.
    pub ex_or_in: Option<String>,
    /// Remaining imported attributes, kept for export.
    pub attrs: BTreeMap<String, String>,
}

impl Edge {
    fn new(source: VertexId, target: VertexId) -> Self {
        Self {
            source,
            target,
            dexseq_fragment: String::new(),
            rmats: None,
            tags: EventTags::default(),
            ex_or_in: None,
            attrs: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn is_fragment(&self) -> bool {
        !self.dexseq_fragment.is_empty()
    }

    /// Both endpoints lie in `{a, b}`.
    #[inline]
    pub fn lies_within(&self, a: VertexId, b: VertexId) -> bool {
        (self.source == a || self.source == b) && (self.target == a || self.target == b)
    }
}

/// Directed multigraph of fragment boundaries for one gene.
///
/// Vertices live in an ordered array whose index order is the position along
/// the transcript; `name_to_id` resolves coordinates and `incident` holds the
/// edges touching each vertex in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SpliceGraph {
    pub gene: String,
    pub strand: Strand,
    vertices: Vec<Vertex>,
    name_to_id: HashMap<String, VertexId>,
    incident: Vec<Vec<EdgeId>>,
    edges: Vec<Edge>,
}

impl fmt::Display for SpliceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_frag = self.edges.iter().filter(|e| e.is_fragment()).count();
        let n_tagged = self.edges.iter().filter(|e| !e.tags.is_empty()).count();
        write!(
            f,
            "SpliceGraph: gene={}, strand={}, vertices={}, edges={}, fragment_edges={}, tagged_edges={}",
            if self.gene.is_empty() { "<unset>" } else { self.gene.as_str() },
            self.strand,
            self.vertices.len(),
            self.edges.len(),
            n_frag,
            n_tagged
        )
    }
}

impl SpliceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id]
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }

    /// Append a vertex. Names are unique.
    pub fn add_vertex(&mut self, name: &str, label: &str) -> Result<VertexId, GraphError> {
        if self.name_to_id.contains_key(name) {
            return Err(GraphError::DuplicateVertex {
                name: name.to_string(),
            });
        }
        let id = self.vertices.len();
        self.vertices.push(Vertex {
            name: name.to_string(),
            label: label.to_string(),
        });
        self.name_to_id.insert(name.to_string(), id);
        self.incident.push(Vec::new());
        Ok(id)
    }

    /// Insert a vertex at `index`, shifting later vertices (and the edge
    /// endpoints that refer to them) up by one.
    pub fn insert_vertex(
        &mut self,
        index: VertexId,
        name: &str,
        label: &str,
    ) -> Result<VertexId, GraphError> {
        let len = self.vertices.len();
        if index > len {
            return Err(GraphError::BadVertexIndex { index, len });
        }
        if self.name_to_id.contains_key(name) {
            return Err(GraphError::DuplicateVertex {
                name: name.to_string(),
            });
        }

        for id in self.name_to_id.values_mut() {
            if *id >= index {
                *id += 1;
            }
        }
        for e in &mut self.edges {
            if e.source >= index {
                e.source += 1;
            }
            if e.target >= index {
                e.target += 1;
            }
        }
        self.vertices.insert(
            index,
            Vertex {
                name: name.to_string(),
                label: label.to_string(),
            },
        );
        self.incident.insert(index, Vec::new());
        self.name_to_id.insert(name.to_string(), index);
        Ok(index)
    }

    /// Index at which `coord` belongs along the transcript: before the first
    /// coordinate that follows it on the graph's strand, or before the right
    /// sentinel, or at the end.
    pub fn transcript_position(&self, coord: Coord) -> VertexId {
        self.vertices
            .iter()
            .position(|v| {
                if v.name == RIGHT_SENTINEL {
                    return true;
                }
                match (v.coord(), self.strand) {
                    (Some(c), Strand::Minus) => c < coord,
                    (Some(c), _) => c > coord,
                    (None, _) => false,
                }
            })
            .unwrap_or(self.vertices.len())
    }

    pub fn contains_vertex(&self, name: &str) -> bool {
        self.name_to_id.contains_key(name)
    }

    /// Look up a vertex by name; absence is a hard error.
    pub fn vertex_id(&self, name: &str) -> Result<VertexId, GraphError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::MissingVertex {
                name: name.to_string(),
            })
    }

    #[inline]
    pub fn vertex_id_at(&self, coord: Coord) -> Result<VertexId, GraphError> {
        self.vertex_id(&coord.to_string())
    }

    /// Insert a directed edge between two existing vertices.
    pub fn add_edge(&mut self, source: VertexId, target: VertexId) -> Result<EdgeId, GraphError> {
        let len = self.vertices.len();
        for index in [source, target] {
            if index >= len {
                return Err(GraphError::BadVertexIndex { index, len });
            }
        }
        let id = self.edges.len();
        self.edges.push(Edge::new(source, target));
        self.incident[source].push(id);
        if target != source {
            self.incident[target].push(id);
        }
        Ok(id)
    }

    pub fn add_edge_by_name(&mut self, source: &str, target: &str) -> Result<EdgeId, GraphError> {
        let s = self.vertex_id(source)?;
        let t = self.vertex_id(target)?;
        self.add_edge(s, t)
    }

    /// All edges whose endpoints both lie in `{a, b}`, in insertion order.
    pub fn edges_within(&self, a: VertexId, b: VertexId) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = Vec::new();
        for v in [a, b] {
            let Some(list) = self.incident.get(v) else {
                continue;
            };
            out.extend(
                list.iter()
                    .copied()
                    .filter(|&e| self.edges[e].lies_within(a, b)),
            );
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// First edge lying within `{a, b}`.
    pub fn find_edge_within(&self, a: VertexId, b: VertexId) -> Result<EdgeId, GraphError> {
        self.edges_within(a, b)
            .first()
            .copied()
            .ok_or_else(|| GraphError::MissingEdge {
                from: self.name_or_index(a),
                to: self.name_or_index(b),
            })
    }

    pub fn fragment_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().filter(|(_, e)| e.is_fragment())
    }

    /// Verify that index adjacency follows the transcript: coordinates ascend
    /// with index on `+`, descend on `-`. Non-numeric vertices are skipped.
    pub fn check_transcript_order(&self) -> Result<(), GraphError> {
        if self.strand == Strand::Unknown {
            return Ok(());
        }

        let mut prev: Option<(Coord, VertexId)> = None;
        for (idx, v) in self.vertices.iter().enumerate() {
            let Some(c) = v.coord() else { continue };
            if let Some((pc, pidx)) = prev {
                let ok = match self.strand {
                    Strand::Plus => c > pc,
                    Strand::Minus => c < pc,
                    Strand::Unknown => true,
                };
                if !ok {
                    return Err(GraphError::OrderViolation {
                        strand: self.strand,
                        prev: self.vertices[pidx].name.clone(),
                        prev_index: pidx,
                        next: v.name.clone(),
                        next_index: idx,
                    });
                }
            }
            prev = Some((c, idx));
        }
        Ok(())
    }

    fn name_or_index(&self, id: VertexId) -> String {
        self.vertices
            .get(id)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }
}
