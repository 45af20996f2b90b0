//! GraphML import and export of the splice graph.
//!
//! Node order in the file becomes vertex index order, which the resolver
//! treats as position along the transcript.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info, warn};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::model::graph::{GraphError, SpliceGraph};
use crate::model::types::RmatsIsoform;
use crate::types::{EventKind, Strand};

#[derive(Debug, Error)]
pub enum GraphMlError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed GraphML: {0}")]
    Malformed(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone)]
struct KeyDef {
    name: String,
    domain: String,
    default: Option<String>,
}

#[derive(Debug, Default)]
struct PendingNode {
    xml_id: String,
    data: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct PendingEdge {
    source: String,
    target: String,
    data: Vec<(String, String)>,
}

/// Event-driven collector; turned into a graph once the document ends.
#[derive(Debug, Default)]
struct Collector {
    keys: HashMap<String, KeyDef>,
    key_order: Vec<String>,
    open_key: Option<String>,
    default_text: Option<String>,
    node: Option<PendingNode>,
    edge: Option<PendingEdge>,
    data: Option<(String, String)>,
    nodes: Vec<PendingNode>,
    edges: Vec<PendingEdge>,
    graph_data: Vec<(String, String)>,
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, GraphMlError> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

fn required(attrs: &mut HashMap<String, String>, key: &str, element: &str) -> Result<String, GraphMlError> {
    attrs
        .remove(key)
        .ok_or_else(|| GraphMlError::Malformed(format!("<{element}> without '{key}' attribute")))
}

impl Collector {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), GraphMlError> {
        match e.local_name().as_ref() {
            b"key" => {
                let mut attrs = attributes(e)?;
                let id = required(&mut attrs, "id", "key")?;
                let name = attrs.remove("attr.name").unwrap_or_else(|| id.clone());
                let domain = attrs.remove("for").unwrap_or_else(|| "all".to_string());
                self.keys.insert(
                    id.clone(),
                    KeyDef {
                        name,
                        domain,
                        default: None,
                    },
                );
                self.key_order.push(id.clone());
                self.open_key = Some(id);
            }
            b"default" => {
                if self.open_key.is_some() {
                    self.default_text = Some(String::new());
                }
            }
            b"graph" => {
                let attrs = attributes(e)?;
                if attrs.get("edgedefault").map(|s| s.as_str()) == Some("undirected") {
                    warn!("GraphML declares an undirected graph; edges are read as directed");
                }
            }
            b"node" => {
                let mut attrs = attributes(e)?;
                self.node = Some(PendingNode {
                    xml_id: required(&mut attrs, "id", "node")?,
                    data: Vec::new(),
                });
            }
            b"edge" => {
                let mut attrs = attributes(e)?;
                self.edge = Some(PendingEdge {
                    source: required(&mut attrs, "source", "edge")?,
                    target: required(&mut attrs, "target", "edge")?,
                    data: Vec::new(),
                });
            }
            b"data" => {
                let mut attrs = attributes(e)?;
                self.data = Some((required(&mut attrs, "key", "data")?, String::new()));
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some((_, value)) = self.data.as_mut() {
            value.push_str(text);
        } else if let Some(buf) = self.default_text.as_mut() {
            buf.push_str(text);
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"key" => self.open_key = None,
            b"default" => {
                if let (Some(id), Some(text)) = (self.open_key.as_ref(), self.default_text.take()) {
                    if let Some(def) = self.keys.get_mut(id) {
                        def.default = Some(text);
                    }
                }
            }
            b"data" => {
                let Some(entry) = self.data.take() else { return };
                if let Some(edge) = self.edge.as_mut() {
                    edge.data.push(entry);
                } else if let Some(node) = self.node.as_mut() {
                    node.data.push(entry);
                } else {
                    self.graph_data.push(entry);
                }
            }
            b"node" => {
                if let Some(node) = self.node.take() {
                    self.nodes.push(node);
                }
            }
            b"edge" => {
                if let Some(edge) = self.edge.take() {
                    self.edges.push(edge);
                }
            }
            _ => {}
        }
    }

    fn key_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.keys.get(key).map(|d| d.name.as_str()).unwrap_or(key)
    }

    /// Data entries resolved to attribute names, with key defaults filled in.
    fn resolve(&self, data: &[(String, String)], domain: &str) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = data
            .iter()
            .map(|(k, v)| (self.key_name(k).to_string(), v.clone()))
            .collect();
        for id in &self.key_order {
            let def = &self.keys[id];
            let Some(default) = def.default.as_ref() else { continue };
            if (def.domain == domain || def.domain == "all") && !data.iter().any(|(k, _)| k == id) {
                out.push((def.name.clone(), default.clone()));
            }
        }
        out
    }

    fn finish(self) -> Result<SpliceGraph, GraphMlError> {
        let mut graph = SpliceGraph::new();

        for (name, value) in self.resolve(&self.graph_data, "graph") {
            match name.as_str() {
                "gene" => graph.gene = value,
                "strand" => graph.strand = Strand::from_symbol(&value).unwrap_or_default(),
                _ => debug!("ignoring graph attribute '{name}'"),
            }
        }

        let mut xml_to_vertex: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let attrs = self.resolve(&node.data, "node");
            let lookup = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.trim().to_string())
            };
            let name = lookup("name").unwrap_or_else(|| node.xml_id.clone());
            let label = lookup("id").unwrap_or_else(|| node.xml_id.clone());
            let v = graph.add_vertex(&name, &label)?;
            xml_to_vertex.insert(node.xml_id.as_str(), v);
        }

        for pending in &self.edges {
            let endpoint = |xml_id: &str| {
                xml_to_vertex.get(xml_id).copied().ok_or_else(|| {
                    GraphMlError::Malformed(format!("edge refers to unknown node '{xml_id}'"))
                })
            };
            let s = endpoint(&pending.source)?;
            let t = endpoint(&pending.target)?;
            let id = graph.add_edge(s, t)?;
            let edge = graph.edge_mut(id);

            for (name, value) in self.resolve(&pending.data, "edge") {
                match name.as_str() {
                    "ex_or_in" => edge.ex_or_in = Some(value),
                    "dexseq_fragment" => edge.dexseq_fragment = value,
                    "rmats" => edge.rmats = RmatsIsoform::from_label(&value),
                    other => match EventKind::from_label(other) {
                        Some(kind) => {
                            if parse_flag(&value) {
                                edge.tags.set(kind);
                            }
                        }
                        None => {
                            edge.attrs.insert(name, value);
                        }
                    },
                }
            }
        }

        Ok(graph)
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim(), "true" | "True" | "TRUE" | "1")
}

/// Read a GraphML document into a splice graph.
pub fn read_graphml<R: BufRead>(reader: R) -> Result<SpliceGraph, GraphMlError> {
    let mut reader = Reader::from_reader(reader);
    reader.trim_text(true);

    let mut collector = Collector::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => collector.open(&e)?,
            Event::Empty(e) => {
                collector.open(&e)?;
                collector.close(e.local_name().as_ref());
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                collector.text(&text);
            }
            Event::End(e) => collector.close(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    collector.finish()
}

/// Read a GraphML file; `.gz` files are decompressed on the fly.
pub fn read_graphml_path<P: AsRef<Path>>(path: P) -> Result<SpliceGraph, GraphMlError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| GraphMlError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);
    let graph = if is_gz {
        read_graphml(BufReader::new(flate2::read::GzDecoder::new(file)))?
    } else {
        read_graphml(BufReader::new(file))?
    };

    info!(
        "read {} vertices and {} edges from {}",
        graph.vertex_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(graph)
}

/// Write the annotated graph, including fragment ids and event tags.
pub fn write_graphml<W: Write>(graph: &SpliceGraph, mut w: W) -> std::io::Result<()> {
    let extra: BTreeSet<&str> = graph
        .edges()
        .iter()
        .flat_map(|e| e.attrs.keys().map(|k| k.as_str()))
        .collect();

    writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(w, r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#)?;
    writeln!(w, r#"  <key id="g_gene" for="graph" attr.name="gene" attr.type="string"/>"#)?;
    writeln!(w, r#"  <key id="g_strand" for="graph" attr.name="strand" attr.type="string"/>"#)?;
    writeln!(w, r#"  <key id="v_name" for="node" attr.name="name" attr.type="string"/>"#)?;
    writeln!(w, r#"  <key id="v_id" for="node" attr.name="id" attr.type="string"/>"#)?;
    for name in ["ex_or_in", "dexseq_fragment", "rmats"] {
        writeln!(w, r#"  <key id="e_{name}" for="edge" attr.name="{name}" attr.type="string"/>"#)?;
    }
    for kind in EventKind::ALL {
        writeln!(w, r#"  <key id="e_{kind}" for="edge" attr.name="{kind}" attr.type="boolean"/>"#)?;
    }
    for (i, name) in extra.iter().enumerate() {
        writeln!(
            w,
            r#"  <key id="x{i}" for="edge" attr.name="{}" attr.type="string"/>"#,
            escape(*name)
        )?;
    }

    writeln!(w, r#"  <graph id="G" edgedefault="directed">"#)?;
    writeln!(w, r#"    <data key="g_gene">{}</data>"#, escape(graph.gene.as_str()))?;
    writeln!(w, r#"    <data key="g_strand">{}</data>"#, graph.strand)?;

    for (i, v) in graph.vertices().iter().enumerate() {
        writeln!(
            w,
            r#"    <node id="n{i}"><data key="v_name">{}</data><data key="v_id">{}</data></node>"#,
            escape(v.name.as_str()),
            escape(v.label.as_str())
        )?;
    }

    for e in graph.edges() {
        write!(w, r#"    <edge source="n{}" target="n{}">"#, e.source, e.target)?;
        if let Some(x) = &e.ex_or_in {
            write!(w, r#"<data key="e_ex_or_in">{}</data>"#, escape(x.as_str()))?;
        }
        write!(w, r#"<data key="e_dexseq_fragment">{}</data>"#, escape(e.dexseq_fragment.as_str()))?;
        write!(
            w,
            r#"<data key="e_rmats">{}</data>"#,
            e.rmats.map(|r| r.label()).unwrap_or("")
        )?;
        for kind in EventKind::ALL {
            write!(w, r#"<data key="e_{kind}">{}</data>"#, e.tags.has(kind))?;
        }
        for (i, name) in extra.iter().enumerate() {
            if let Some(value) = e.attrs.get(*name) {
                write!(w, r#"<data key="x{i}">{}</data>"#, escape(value.as_str()))?;
            }
        }
        writeln!(w, "</edge>")?;
    }

    writeln!(w, "  </graph>")?;
    writeln!(w, "</graphml>")?;
    w.flush()
}

pub fn write_graphml_path<P: AsRef<Path>>(graph: &SpliceGraph, path: P) -> Result<(), GraphMlError> {
    let path = path.as_ref();
    let io_err = |e| GraphMlError::Io {
        path: path.display().to_string(),
        source: e,
    };
    let file = File::create(path).map_err(io_err)?;
    write_graphml(graph, BufWriter::new(file)).map_err(io_err)
}
