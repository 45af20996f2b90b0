use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::annotation::io::{ExonicPart, ParseError, PartitionAnnotation};
use crate::model::graph::{GraphError, SpliceGraph};
use crate::types::{Coord, Strand};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("gene '{gene}' has no usable strand ('{strand}'); fragment direction is undefined")]
    UnknownStrand { gene: String, strand: Strand },

    #[error("fragment {fragment}: end coordinate {coord} cannot be made exclusive")]
    CoordinateOverflow { fragment: String, coord: Coord },
}

fn end_vertex(part: &ExonicPart) -> Result<Coord, BuildError> {
    part.end_vertex().ok_or_else(|| BuildError::CoordinateOverflow {
        fragment: part.fragment.clone(),
        coord: part.right,
    })
}

/// Adds one edge per DEXSeq exonic part to a splice graph.
///
/// - `+` strand: edge runs left -> right+1
/// - `-` strand: edge runs right+1 -> left
///
/// Endpoints must already be vertices unless `create_missing_vertices` is set.
#[derive(Debug, Clone, Default)]
pub struct FragmentBuilder {
    pub create_missing_vertices: bool,
}

impl FragmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert absent endpoint vertices at their transcript position instead of failing.
    pub fn create_missing_vertices(mut self, yes: bool) -> Self {
        self.create_missing_vertices = yes;
        self
    }

    /// Store gene/strand on the graph and add the fragment edges.
    pub fn build(
        &self,
        mut graph: SpliceGraph,
        partition: &PartitionAnnotation,
    ) -> Result<SpliceGraph, BuildError> {
        if partition.strand == Strand::Unknown {
            return Err(BuildError::UnknownStrand {
                gene: partition.gene.clone(),
                strand: partition.strand,
            });
        }
        graph.gene = partition.gene.clone();
        graph.strand = partition.strand;

        if self.create_missing_vertices {
            self.add_missing_vertices(&mut graph, &partition.parts)?;
        }

        for part in &partition.parts {
            let (from, to) = partition.strand.orient(part.left, end_vertex(part)?);
            let s = graph.vertex_id_at(from)?;
            let t = graph.vertex_id_at(to)?;
            let e = graph.add_edge(s, t)?;
            graph.edge_mut(e).dexseq_fragment = part.fragment.clone();
            debug!("fragment {} -> edge {} ({} -> {})", part.fragment, e, from, to);
        }

        info!(
            "added {} fragment edges for gene {} ({} strand)",
            partition.parts.len(),
            graph.gene,
            graph.strand
        );
        Ok(graph)
    }

    /// Build from anything implementing `BufRead`.
    pub fn build_from_reader<R: BufRead>(
        &self,
        graph: SpliceGraph,
        reader: R,
    ) -> Result<SpliceGraph, BuildError> {
        let partition = PartitionAnnotation::from_reader(reader)?;
        self.build(graph, &partition)
    }

    /// Build from a file path.
    ///
    /// - If path ends with `.gz`, uses a gzip decoder.
    /// - Otherwise reads as plain text.
    pub fn build_from_path<P: AsRef<Path>>(
        &self,
        graph: SpliceGraph,
        path: P,
    ) -> Result<SpliceGraph, BuildError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);

        if is_gz {
            let decoder = flate2::read::GzDecoder::new(file);
            self.build_from_reader(graph, BufReader::new(decoder))
        } else {
            self.build_from_reader(graph, BufReader::new(file))
        }
    }

    fn add_missing_vertices(
        &self,
        graph: &mut SpliceGraph,
        parts: &[ExonicPart],
    ) -> Result<(), BuildError> {
        let mut coords: Vec<Coord> = Vec::with_capacity(parts.len() * 2);
        for p in parts {
            coords.push(p.left);
            coords.push(end_vertex(p)?);
        }
        coords.retain(|c| !graph.contains_vertex(&c.to_string()));
        coords.sort_unstable();
        coords.dedup();

        for c in &coords {
            let name = c.to_string();
            let at = graph.transcript_position(*c);
            graph.insert_vertex(at, &name, &name)?;
            debug!("created vertex {name} at index {at}");
        }
        if !coords.is_empty() {
            info!("created {} vertices missing from the graph", coords.len());
        }
        Ok(())
    }
}

// -------------------- tests --------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gff(strand: &str) -> String {
        format!(
            "\
chr1\tdexseq\taggregate_gene\t100\t200\t.\t{s}\t.\tgene_id \"G1\"
chr1\tdexseq\texonic_part\t100\t150\t.\t{s}\t.\ttranscripts \"T1\"; exonic_part_number \"001\"; gene_id \"G1\"
chr1\tdexseq\texonic_part\t151\t200\t.\t{s}\t.\ttranscripts \"T1\"; exonic_part_number \"002\"; gene_id \"G1\"
",
            s = strand
        )
    }

    fn graph_with(names: &[&str]) -> SpliceGraph {
        let mut g = SpliceGraph::new();
        for n in names {
            g.add_vertex(n, n).unwrap();
        }
        g
    }

    #[test]
    fn plus_strand_edges_run_left_to_right() {
        let g = graph_with(&["100", "151", "201"]);
        let g = FragmentBuilder::new()
            .build_from_reader(g, Cursor::new(gff("+")))
            .unwrap();

        assert_eq!(g.gene, "G1");
        assert_eq!(g.strand, Strand::Plus);
        let frags: Vec<_> = g
            .fragment_edges()
            .map(|(_, e)| (e.source, e.target, e.dexseq_fragment.as_str()))
            .collect();
        assert_eq!(frags, vec![(0, 1, "001"), (1, 2, "002")]);
    }

    #[test]
    fn minus_strand_edges_run_right_to_left() {
        let g = graph_with(&["201", "151", "100"]);
        let g = FragmentBuilder::new()
            .build_from_reader(g, Cursor::new(gff("-")))
            .unwrap();

        let e = g.edge(0);
        assert_eq!(g.vertex(e.source).name, "151");
        assert_eq!(g.vertex(e.target).name, "100");
        assert_eq!(e.dexseq_fragment, "001");
    }

    #[test]
    fn missing_vertex_is_fatal_by_default() {
        let g = graph_with(&["100", "151"]);
        let err = FragmentBuilder::new()
            .build_from_reader(g, Cursor::new(gff("+")))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Graph(GraphError::MissingVertex { ref name }) if name == "201"
        ));
    }

    #[test]
    fn created_vertices_follow_transcript_order() {
        let g = FragmentBuilder::new()
            .create_missing_vertices(true)
            .build_from_reader(SpliceGraph::new(), Cursor::new(gff("-")))
            .unwrap();

        let names: Vec<_> = g.vertices().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["201", "151", "100"]);
        assert!(g.check_transcript_order().is_ok());
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn created_vertices_land_between_imported_ones() {
        let g = graph_with(&["L", "100", "201", "R"]);
        let mut g = FragmentBuilder::new()
            .create_missing_vertices(true)
            .build_from_reader(g, Cursor::new(gff("+")))
            .unwrap();

        let names: Vec<_> = g.vertices().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["L", "100", "151", "201", "R"]);
        assert!(g.check_transcript_order().is_ok());

        let se = crate::events::EventRecord {
            id: "1".into(),
            span: crate::events::EventSpan::FullFragment(crate::events::ExonSpan {
                start: 100,
                end: 201,
            }),
        };
        let map = crate::events::EventResolver::default()
            .resolve(&mut g, crate::types::EventKind::SE, &[se])
            .unwrap();
        assert_eq!(map.joined("1").as_deref(), Some("E001,E002"));
    }

    #[test]
    fn created_vertices_keep_minus_strand_order() {
        let g = graph_with(&["L", "201", "100", "R"]);
        let g = FragmentBuilder::new()
            .create_missing_vertices(true)
            .build_from_reader(g, Cursor::new(gff("-")))
            .unwrap();
        let names: Vec<_> = g.vertices().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["L", "201", "151", "100", "R"]);
        assert!(g.check_transcript_order().is_ok());
    }

    #[test]
    fn overflowing_end_is_an_error() {
        let partition = PartitionAnnotation {
            gene: "G".into(),
            strand: Strand::Plus,
            parts: vec![ExonicPart {
                left: 1,
                right: Coord::MAX,
                fragment: "001".into(),
            }],
        };
        let err = FragmentBuilder::new()
            .create_missing_vertices(true)
            .build(SpliceGraph::new(), &partition)
            .unwrap_err();
        assert!(matches!(err, BuildError::CoordinateOverflow { .. }));
    }

    #[test]
    fn gzipped_partition_is_decompressed() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene.gff.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(gff("+").as_bytes()).unwrap();
        enc.finish().unwrap();

        let g = FragmentBuilder::new()
            .build_from_path(graph_with(&["100", "151", "201"]), &path)
            .unwrap();
        assert_eq!(g.gene, "G1");
        assert_eq!(g.fragment_edges().count(), 2);
    }

    #[test]
    fn unknown_strand_is_rejected() {
        let err = FragmentBuilder::new()
            .create_missing_vertices(true)
            .build_from_reader(SpliceGraph::new(), Cursor::new(gff(".")))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownStrand { .. }));
    }
}
