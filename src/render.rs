//! Edge/vertex styling and the rendering sinks.
//!
//! [`project`] turns the tags accumulated on a [`SpliceGraph`] into a
//! [`VisualStyle`]; a [`Renderer`] turns graph + style into files. The DOT
//! renderer always works; the Graphviz renderer additionally runs the `dot`
//! program to produce `graph_<gene>.png`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::ValueEnum;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::graph::{SpliceGraph, LEFT_SENTINEL, RIGHT_SENTINEL};

/// Ordering key of the left sentinel; sorts before every coordinate.
pub const LEFT_ORDER: u64 = 100_000_000_000;
/// Ordering key of the right sentinel.
pub const RIGHT_ORDER: u64 = 0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot read style table '{path}': {source}")]
    StyleIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid style table '{path}': {source}")]
    StyleJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' failed ({status}): {stderr}")]
    Graphviz {
        program: String,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub color: String,
    pub curved: f64,
    pub width: f64,
}

impl EdgeStyle {
    fn new(color: &str, curved: f64, width: f64) -> Self {
        Self {
            color: color.to_string(),
            curved,
            width,
        }
    }
}

/// Edge styles keyed by the `ex_or_in` attribute, with a fallback entry.
///
/// JSON layout:
/// ```json
/// { "classes": { "ex": { "color": "orange", "curved": -0.3, "width": 5 } },
///   "default": { "color": "darkgreen", "curved": 0, "width": 5 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleTable {
    pub classes: BTreeMap<String, EdgeStyle>,
    pub default: EdgeStyle,
}

impl Default for StyleTable {
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert("ex".to_string(), EdgeStyle::new("orange", -0.3, 5.0));
        classes.insert("in".to_string(), EdgeStyle::new("grey", 0.0, 2.0));
        classes.insert("NA".to_string(), EdgeStyle::new("grey", 0.0, 2.0));
        Self {
            classes,
            default: EdgeStyle::new("darkgreen", 0.0, 5.0),
        }
    }
}

impl StyleTable {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RenderError::StyleIo {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| RenderError::StyleJson {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Style for an `ex_or_in` value; unknown or absent keys use the default.
    pub fn lookup(&self, ex_or_in: Option<&str>) -> &EdgeStyle {
        ex_or_in
            .and_then(|k| self.classes.get(k))
            .unwrap_or(&self.default)
    }
}

/// Fixed canvas parameters of the gene diagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width_px: u32,
    pub height_px: u32,
    pub margin_px: u32,
    pub vertex_label_size: u32,
    pub edge_label_size: u32,
    pub arrow_size: f64,
    /// Layout rotation in degrees; 270 reads left to right.
    pub rotation: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width_px: 3500,
            height_px: 1000,
            margin_px: 100,
            vertex_label_size: 25,
            edge_label_size: 25,
            arrow_size: 0.001,
            rotation: 270,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVisual {
    pub style: EdgeStyle,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexVisual {
    pub label: String,
    pub order: u64,
}

/// Everything a renderer needs besides the graph itself.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualStyle {
    pub edges: Vec<EdgeVisual>,
    pub vertices: Vec<VertexVisual>,
    pub canvas: Canvas,
}

/// Derive per-edge and per-vertex visuals, in graph order.
pub fn project(graph: &SpliceGraph, styles: &StyleTable) -> VisualStyle {
    let edges = graph
        .edges()
        .iter()
        .map(|e| {
            let mut parts: Vec<&str> = Vec::new();
            if e.is_fragment() {
                parts.push(&e.dexseq_fragment);
            }
            parts.extend(e.tags.kinds().map(|k| k.label()));
            EdgeVisual {
                style: styles.lookup(e.ex_or_in.as_deref()).clone(),
                label: parts.join(" "),
            }
        })
        .collect();

    let vertices = graph
        .vertices()
        .iter()
        .map(|v| VertexVisual {
            label: v.label.clone(),
            order: order_key(&v.name, v.coord()),
        })
        .collect();

    VisualStyle {
        edges,
        vertices,
        canvas: Canvas::default(),
    }
}

fn order_key(name: &str, coord: Option<u64>) -> u64 {
    match name {
        LEFT_SENTINEL => LEFT_ORDER,
        RIGHT_SENTINEL => RIGHT_ORDER,
        _ => coord.unwrap_or(RIGHT_ORDER),
    }
}

/// A sink that consumes a decorated graph and produces output files.
pub trait Renderer {
    /// Render into `out_dir`; returns the files written.
    fn render(
        &self,
        graph: &SpliceGraph,
        style: &VisualStyle,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RendererKind {
    /// DOT file plus PNG through the Graphviz `dot` program.
    #[default]
    Graphviz,
    /// DOT file only.
    Dot,
    /// No diagram.
    None,
}

/// Build the renderer for `kind`; `None` disables rendering.
pub fn make_renderer(kind: RendererKind, graphviz_bin: &str) -> Option<Box<dyn Renderer>> {
    match kind {
        RendererKind::Graphviz => Some(Box::new(GraphvizRenderer::new(graphviz_bin))),
        RendererKind::Dot => Some(Box::new(DotRenderer)),
        RendererKind::None => None,
    }
}

pub fn dot_path(out_dir: &Path, gene: &str) -> PathBuf {
    out_dir.join(format!("graph_{gene}.dot"))
}

pub fn png_path(out_dir: &Path, gene: &str) -> PathBuf {
    out_dir.join(format!("graph_{gene}.png"))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Vertex indices in left-to-right drawing order: left sentinel, coordinates
/// by ascending order key, right sentinel (and non-coordinate vertices) last.
pub fn drawing_order(style: &VisualStyle) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..style.vertices.len()).collect();
    idx.sort_by_key(|&i| match style.vertices[i].order {
        LEFT_ORDER => (0, 0),
        RIGHT_ORDER => (2, 0),
        key => (1, key),
    });
    idx
}

/// DOT rendering of a decorated graph; use `to_string()` for the text.
pub struct Dot<'a> {
    pub graph: &'a SpliceGraph,
    pub style: &'a VisualStyle,
}

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (graph, style) = (self.graph, self.style);
        let c = &style.canvas;
        // Graphviz sizes are in inches; 100 dpi maps pixels 1:100.
        let dpi = 100.0;
        let rankdir = match c.rotation {
            90 => "RL",
            180 => "BT",
            270 => "LR",
            _ => "TB",
        };

        writeln!(f, "digraph {} {{", quote(&graph.gene))?;
        writeln!(
            f,
            "  graph [rankdir={rankdir}, dpi={dpi}, size=\"{},{}!\", pad={}, label={}];",
            f64::from(c.width_px) / dpi,
            f64::from(c.height_px) / dpi,
            f64::from(c.margin_px) / dpi,
            quote(&format!("{} ({})", graph.gene, graph.strand)),
        )?;
        writeln!(f, "  node [shape=plaintext, fontsize={}];", c.vertex_label_size)?;
        writeln!(
            f,
            "  edge [arrowsize={}, fontsize={}];",
            c.arrow_size, c.edge_label_size
        )?;

        for (i, v) in style.vertices.iter().enumerate() {
            writeln!(f, "  n{i} [label={}];", quote(&v.label))?;
        }

        // invisible chain pins the order keys onto the rank axis
        for pair in drawing_order(style).windows(2) {
            writeln!(f, "  n{} -> n{} [style=invis, weight=10];", pair[0], pair[1])?;
        }

        for (e, vis) in graph.edges().iter().zip(&style.edges) {
            write!(
                f,
                "  n{} -> n{} [label={}, color={}, penwidth={}",
                e.source,
                e.target,
                quote(&vis.label),
                quote(&vis.style.color),
                vis.style.width
            )?;
            if vis.style.curved < 0.0 {
                write!(f, ", tailport=n, headport=n")?;
            } else if vis.style.curved > 0.0 {
                write!(f, ", tailport=s, headport=s")?;
            }
            writeln!(f, "];")?;
        }
        writeln!(f, "}}")
    }
}

/// Graphviz DOT text for a decorated graph.
pub fn to_dot(graph: &SpliceGraph, style: &VisualStyle) -> String {
    Dot { graph, style }.to_string()
}

fn write_dot(graph: &SpliceGraph, style: &VisualStyle, out_dir: &Path) -> Result<PathBuf, RenderError> {
    let path = dot_path(out_dir, &graph.gene);
    fs::write(&path, to_dot(graph, style)).map_err(|e| RenderError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("wrote {}", path.display());
    Ok(path)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl Renderer for DotRenderer {
    fn render(
        &self,
        graph: &SpliceGraph,
        style: &VisualStyle,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, RenderError> {
        Ok(vec![write_dot(graph, style, out_dir)?])
    }
}

/// Writes DOT, then runs `<program> -Tpng` on it.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    program: String,
}

impl GraphvizRenderer {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Renderer for GraphvizRenderer {
    fn render(
        &self,
        graph: &SpliceGraph,
        style: &VisualStyle,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, RenderError> {
        let dot = write_dot(graph, style, out_dir)?;
        let png = png_path(out_dir, &graph.gene);

        let output = Command::new(&self.program)
            .arg("-Tpng")
            .arg("-o")
            .arg(&png)
            .arg(&dot)
            .output();

        match output {
            Ok(out) if out.status.success() => {
                info!("wrote {}", png.display());
                Ok(vec![dot, png])
            }
            Ok(out) => Err(RenderError::Graphviz {
                program: self.program.clone(),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "'{}' not found; kept {} without a PNG",
                    self.program,
                    dot.display()
                );
                Ok(vec![dot])
            }
            Err(e) => Err(RenderError::Io {
                path: self.program.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, Strand};

    fn tagged_graph() -> SpliceGraph {
        let mut g = SpliceGraph::new();
        g.gene = "G1".into();
        g.strand = Strand::Plus;
        for (n, l) in [("L", "n0"), ("100", "n1"), ("151", "n2"), ("R", "n3")] {
            g.add_vertex(n, l).unwrap();
        }
        let e = g.add_edge_by_name("100", "151").unwrap();
        let edge = g.edge_mut(e);
        edge.dexseq_fragment = "001".into();
        edge.ex_or_in = Some("ex".into());
        edge.tags.set(EventKind::SE);
        edge.tags.set(EventKind::A3SS);

        let e = g.add_edge_by_name("L", "100").unwrap();
        g.edge_mut(e).ex_or_in = Some("weird".into());
        g
    }

    #[test]
    fn labels_join_fragment_and_true_tags() {
        let v = project(&tagged_graph(), &StyleTable::default());
        assert_eq!(v.edges[0].label, "001 A3SS SE");
        assert_eq!(v.edges[1].label, "");
    }

    #[test]
    fn styles_fall_back_to_default_entry() {
        let v = project(&tagged_graph(), &StyleTable::default());
        assert_eq!(v.edges[0].style, EdgeStyle::new("orange", -0.3, 5.0));
        assert_eq!(v.edges[1].style.color, "darkgreen");
    }

    #[test]
    fn sentinels_get_extreme_order_keys() {
        let v = project(&tagged_graph(), &StyleTable::default());
        let orders: Vec<_> = v.vertices.iter().map(|x| x.order).collect();
        assert_eq!(orders, vec![LEFT_ORDER, 100, 151, RIGHT_ORDER]);
        assert_eq!(v.vertices[1].label, "n1");
    }

    #[test]
    fn style_table_json_overrides_and_defaults() {
        let json = r#"{ "classes": { "ex": { "color": "red", "curved": 0.5, "width": 1 } } }"#;
        let t: StyleTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.lookup(Some("ex")).color, "red");
        assert_eq!(t.lookup(Some("in")).color, "darkgreen");
        assert_eq!(t.lookup(None), &StyleTable::default().default);
    }

    #[test]
    fn dot_output_has_one_line_per_edge() {
        let g = tagged_graph();
        let dot = to_dot(&g, &project(&g, &StyleTable::default()));
        assert!(dot.starts_with("digraph \"G1\" {"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("node [shape=plaintext, fontsize=25];"));
        assert!(dot.contains("n1 -> n2 [label=\"001 A3SS SE\", color=\"orange\", penwidth=5, tailport=n, headport=n];"));
        assert!(dot.ends_with("}\n"));
        assert_eq!(dot.matches(" -> ").count(), 2 + 3);
        assert_eq!(dot.matches("style=invis").count(), 3);
    }

    #[test]
    fn drawing_order_puts_sentinels_at_the_ends() {
        let mut g = SpliceGraph::new();
        g.strand = Strand::Minus;
        for n in ["R", "201", "L", "100"] {
            g.add_vertex(n, n).unwrap();
        }
        let style = project(&g, &StyleTable::default());
        assert_eq!(drawing_order(&style), vec![2, 3, 1, 0]);

        let dot = to_dot(&g, &style);
        assert!(dot.contains("n2 -> n3 [style=invis, weight=10];"));
        assert!(dot.contains("n1 -> n0 [style=invis, weight=10];"));
    }

    #[test]
    fn missing_graphviz_falls_back_to_dot() {
        let dir = tempfile::tempdir().unwrap();
        let g = tagged_graph();
        let style = project(&g, &StyleTable::default());
        let files = GraphvizRenderer::new("no-such-graphviz-binary-here")
            .render(&g, &style, dir.path())
            .unwrap();
        assert_eq!(files, vec![dot_path(dir.path(), "G1")]);
        assert!(files[0].exists());
    }
}
