use std::io::BufRead;

use log::{debug, warn};
use thiserror::Error;

use crate::types::{vertex_coord, Coord, Strand};

/// Feature types of a DEXSeq flattened annotation (column 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    AggregateGene,
    ExonicPart,
    Other(String),
}

impl FeatureKind {
    fn parse(s: &str) -> Self {
        match s {
            "aggregate_gene" => FeatureKind::AggregateGene,
            "exonic_part" => FeatureKind::ExonicPart,
            other => FeatureKind::Other(other.to_string()),
        }
    }
}

/// A single parsed record line of a DEXSeq GFF.
///
/// Coordinates are kept as written: 1-based, closed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRecord {
    pub seqname: String,
    pub source: String,
    pub feature: FeatureKind,
    pub start: Coord,
    pub end: Coord,
    pub strand: Strand,
    /// Attributes in file order.
    pub attrs: Vec<(String, String)>,
    pub line_no: usize,
}

impl PartitionRecord {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the last attribute on the line.
    pub fn last_attr_value(&self) -> Option<&str> {
        self.attrs.last().map(|(_, v)| v.as_str())
    }

    /// `gene_id`, falling back to the last attribute value.
    pub fn gene_id(&self) -> Option<&str> {
        self.attr("gene_id").or_else(|| self.last_attr_value())
    }

    /// `exonic_part_number`, falling back to the last attribute value.
    pub fn exonic_part_number(&self) -> Option<&str> {
        self.attr("exonic_part_number")
            .or_else(|| self.last_attr_value())
    }
}

/// Parsing errors for the partition annotation.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line_no}: malformed DEXSeq GFF line ({problem}): {line}")]
    MalformedLine {
        line_no: usize,
        problem: &'static str,
        line: String,
    },

    #[error("line {line_no}: bad coordinates: {line}")]
    BadCoordinates { line_no: usize, line: String },

    #[error("line {line_no}: {feature} record has no '{key}' attribute")]
    MissingAttribute {
        line_no: usize,
        feature: &'static str,
        key: &'static str,
    },

    #[error("line {line_no}: end coordinate {coord} cannot be made exclusive")]
    CoordinateOverflow { line_no: usize, coord: Coord },

    #[error("no aggregate_gene record found; cannot determine gene and strand")]
    MissingAggregateGene,
}

/// Low-level streaming parser for DEXSeq flattened GFF files.
///
/// Most callers want [`PartitionAnnotation::from_reader`], which collects the
/// gene header and every exonic part in one pass.
///
/// ```
/// use std::io::Cursor;
/// use splice_event_map::annotation::io::PartitionReader;
///
/// let gff = "chr1\tdexseq\texonic_part\t100\t150\t.\t+\t.\tgene_id \"G1\"; exonic_part_number \"001\"\n";
/// let recs: Vec<_> = PartitionReader::new(Cursor::new(gff)).records().collect();
/// assert_eq!(recs.len(), 1);
/// ```
pub struct PartitionReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> PartitionReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
        }
    }

    /// Returns an iterator over parsed records.
    ///
    /// - Skips blank lines
    /// - Skips comment lines starting with '#'
    pub fn records(mut self) -> impl Iterator<Item = Result<PartitionRecord, ParseError>> {
        std::iter::from_fn(move || loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    return Some(Err(ParseError::Io {
                        path: "<reader>".to_string(),
                        source: e,
                    }))
                }
            }

            let line = self.buf.trim_end_matches(&['\n', '\r'][..]);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            return Some(parse_record_line(line, self.line_no));
        })
    }
}

/// Parse a single non-comment line into a `PartitionRecord`.
pub fn parse_record_line(line: &str, line_no: usize) -> Result<PartitionRecord, ParseError> {
    let malformed = |problem: &'static str| ParseError::MalformedLine {
        line_no,
        problem,
        line: line.to_string(),
    };

    // seqname source feature start end score strand phase attributes
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() != 9 {
        return Err(malformed("expected 9 tab-separated columns"));
    }

    let bad_coords = || ParseError::BadCoordinates {
        line_no,
        line: line.to_string(),
    };
    let start: Coord = cols[3].trim().parse().map_err(|_| bad_coords())?;
    let end: Coord = cols[4].trim().parse().map_err(|_| bad_coords())?;

    let strand = Strand::from_symbol(cols[6].trim()).ok_or_else(|| malformed("unknown strand"))?;

    Ok(PartitionRecord {
        seqname: cols[0].to_string(),
        source: cols[1].to_string(),
        feature: FeatureKind::parse(cols[2]),
        start,
        end,
        strand,
        attrs: parse_attributes(cols[8]),
        line_no,
    })
}

/// Parse a GTF-style (`key "value";`) or GFF3-style (`key=value;`) attribute
/// column, keeping file order.
pub fn parse_attributes(s: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for part in s.trim().split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((k, v)) if !k.contains(char::is_whitespace) => (k, v),
            _ => part.split_once(char::is_whitespace).unwrap_or((part, "")),
        };
        let key = key.trim();
        if !key.is_empty() {
            out.push((key.to_string(), unquote(value)));
        }
    }
    out
}

fn unquote(v: &str) -> String {
    let v = v.trim();
    let v = v.strip_prefix('"').unwrap_or(v);
    let v = v.strip_suffix('"').unwrap_or(v);
    v.to_string()
}

/// One exonic fragment of the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExonicPart {
    /// 1-based closed left coordinate.
    pub left: Coord,
    /// 1-based closed right coordinate, as written.
    pub right: Coord,
    /// Exonic part number, e.g. `001`.
    pub fragment: String,
}

impl ExonicPart {
    /// Vertex name of the exclusive end (`right + 1`).
    #[inline]
    pub fn end_vertex(&self) -> Option<Coord> {
        vertex_coord(self.right)
    }
}

/// Gene header plus ordered exonic parts of one DEXSeq annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAnnotation {
    pub gene: String,
    pub strand: Strand,
    pub parts: Vec<ExonicPart>,
}

impl PartitionAnnotation {
    /// Collect the `aggregate_gene` header and all `exonic_part` records.
    ///
    /// When several `aggregate_gene` records are present the last one wins.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        let mut header: Option<(String, Strand)> = None;
        let mut parts = Vec::new();

        for rec in PartitionReader::new(reader).records() {
            let rec = rec?;
            match rec.feature {
                FeatureKind::AggregateGene => {
                    let gene = rec.gene_id().ok_or(ParseError::MissingAttribute {
                        line_no: rec.line_no,
                        feature: "aggregate_gene",
                        key: "gene_id",
                    })?;
                    if let Some((prev, _)) = &header {
                        warn!(
                            "line {}: another aggregate_gene record ('{}' replaces '{}')",
                            rec.line_no, gene, prev
                        );
                    }
                    header = Some((gene.to_string(), rec.strand));
                }
                FeatureKind::ExonicPart => {
                    let fragment =
                        rec.exonic_part_number()
                            .ok_or(ParseError::MissingAttribute {
                                line_no: rec.line_no,
                                feature: "exonic_part",
                                key: "exonic_part_number",
                            })?;
                    if vertex_coord(rec.end).is_none() {
                        return Err(ParseError::CoordinateOverflow {
                            line_no: rec.line_no,
                            coord: rec.end,
                        });
                    }
                    parts.push(ExonicPart {
                        left: rec.start,
                        right: rec.end,
                        fragment: fragment.to_string(),
                    });
                }
                FeatureKind::Other(ref t) => {
                    debug!("line {}: skipping feature type '{}'", rec.line_no, t);
                }
            }
        }

        let (gene, strand) = header.ok_or(ParseError::MissingAggregateGene)?;
        Ok(Self {
            gene,
            strand,
            parts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GFF: &str = "\
chr1\tdexseq_prepare_annotation.py\taggregate_gene\t100\t200\t.\t-\t.\tgene_id \"ENSG01\"
chr1\tdexseq_prepare_annotation.py\texonic_part\t100\t150\t.\t-\t.\ttranscripts \"T1+T2\"; exonic_part_number \"001\"; gene_id \"ENSG01\"
chr1\tdexseq_prepare_annotation.py\texonic_part\t151\t200\t.\t-\t.\ttranscripts \"T1\"; exonic_part_number \"002\"; gene_id \"ENSG01\"
";

    #[test]
    fn parse_exonic_part_line() {
        let line = "chr1\tdexseq\texonic_part\t101\t150\t.\t+\t.\ttranscripts \"T1\"; exonic_part_number \"003\"; gene_id \"G1\"";
        let rec = parse_record_line(line, 7).unwrap();

        assert_eq!(rec.feature, FeatureKind::ExonicPart);
        assert_eq!(rec.start, 101);
        assert_eq!(rec.end, 150);
        assert_eq!(rec.strand, Strand::Plus);
        assert_eq!(rec.exonic_part_number(), Some("003"));
        assert_eq!(rec.gene_id(), Some("G1"));
        assert_eq!(rec.line_no, 7);
    }

    #[test]
    fn last_attribute_is_the_fallback() {
        let rec = parse_record_line(
            "chr1\tdexseq\texonic_part\t1\t2\t.\t+\t.\ttranscripts \"T1\"; part \"007\"",
            1,
        )
        .unwrap();
        assert_eq!(rec.exonic_part_number(), Some("007"));
    }

    #[test]
    fn gff3_attributes_are_accepted() {
        let attrs = parse_attributes("ID=ex1;gene_id=G9; exonic_part_number=\"004\"");
        assert_eq!(attrs[0], ("ID".to_string(), "ex1".to_string()));
        assert_eq!(attrs[2], ("exonic_part_number".to_string(), "004".to_string()));
    }

    #[test]
    fn bad_lines_report_line_numbers() {
        let err = parse_record_line("chr1\tsrc\texonic_part\tx\t150\t.\t+\t.\tgene_id \"G\"", 3).unwrap_err();
        assert!(matches!(err, ParseError::BadCoordinates { line_no: 3, .. }));

        let err = parse_record_line("chr1 src exonic_part 1 2 . + . gene_id", 4).unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line_no: 4, .. }));
    }

    #[test]
    fn annotation_collects_header_and_parts() {
        let ann = PartitionAnnotation::from_reader(Cursor::new(GFF)).unwrap();
        assert_eq!(ann.gene, "ENSG01");
        assert_eq!(ann.strand, Strand::Minus);
        assert_eq!(
            ann.parts,
            vec![
                ExonicPart { left: 100, right: 150, fragment: "001".into() },
                ExonicPart { left: 151, right: 200, fragment: "002".into() },
            ]
        );
    }

    #[test]
    fn reader_skips_comments_and_blank_lines() {
        let data = format!("# header\n\n{GFF}\n");
        let recs: Vec<_> = PartitionReader::new(Cursor::new(data))
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].line_no, 3);
    }

    #[test]
    fn largest_end_coordinate_is_rejected() {
        let gff = "\
chr1\tdexseq\taggregate_gene\t1\t2\t.\t+\t.\tgene_id \"G\"
chr1\tdexseq\texonic_part\t1\t18446744073709551615\t.\t+\t.\texonic_part_number \"001\"
";
        let err = PartitionAnnotation::from_reader(Cursor::new(gff)).unwrap_err();
        assert!(matches!(err, ParseError::CoordinateOverflow { line_no: 2, coord: u64::MAX }));
    }

    #[test]
    fn missing_aggregate_gene_is_an_error() {
        let gff = "chr1\tdexseq\texonic_part\t1\t2\t.\t+\t.\texonic_part_number \"001\"\n";
        let err = PartitionAnnotation::from_reader(Cursor::new(gff)).unwrap_err();
        assert!(matches!(err, ParseError::MissingAggregateGene));
    }
}
