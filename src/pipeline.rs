use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::annotation::FragmentBuilder;
use crate::events::{EventResolver, EventTable, ResolveOptions};
use crate::export::export_table;
use crate::graphml::{read_graphml_path, write_graphml_path};
use crate::model::SpliceGraph;
use crate::render::{make_renderer, project, RendererKind, StyleTable};
use crate::types::{EventKind, Strand};

/// Everything one run needs; built from the command line.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub out_dir: PathBuf,
    pub graph: PathBuf,
    pub partition: PathBuf,
    /// One table per kind; iterated in `EventKind` order.
    pub events: BTreeMap<EventKind, PathBuf>,
    pub strict: bool,
    pub create_missing_vertices: bool,
    pub style: Option<PathBuf>,
    pub renderer: RendererKind,
    pub graphviz_bin: String,
    pub write_graphml: bool,
}

impl PipelineConfig {
    pub fn new(out_dir: PathBuf, graph: PathBuf, partition: PathBuf) -> Self {
        Self {
            out_dir,
            graph,
            partition,
            events: BTreeMap::new(),
            strict: false,
            create_missing_vertices: false,
            style: None,
            renderer: RendererKind::default(),
            graphviz_bin: "dot".to_string(),
            write_graphml: false,
        }
    }

    pub fn with_events(mut self, kind: EventKind, path: PathBuf) -> Self {
        self.events.insert(kind, path);
        self
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub gene: String,
    pub strand: Strand,
    /// Events read per kind.
    pub events: BTreeMap<EventKind, usize>,
    pub tables: Vec<PathBuf>,
    pub diagram: Vec<PathBuf>,
    pub graphml: Option<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<String> = self
            .events
            .iter()
            .map(|(k, n)| format!("{k}={n}"))
            .collect();
        write!(
            f,
            "gene {} ({}): events [{}], {} tables, {} diagram files",
            self.gene,
            self.strand,
            counts.join(", "),
            self.tables.len(),
            self.diagram.len()
        )?;
        if let Some(p) = &self.graphml {
            write!(f, ", graph {}", p.display())?;
        }
        Ok(())
    }
}

/// Import, build, resolve every event kind, export, render.
pub fn run(cfg: &PipelineConfig) -> Result<RunSummary> {
    let styles = match &cfg.style {
        Some(p) => StyleTable::from_json_path(p)?,
        None => StyleTable::default(),
    };

    let graph = read_graphml_path(&cfg.graph)
        .with_context(|| format!("Failed to import graph {}", cfg.graph.display()))?;
    info!(
        "imported {} vertices and {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );

    let graph = FragmentBuilder::new()
        .create_missing_vertices(cfg.create_missing_vertices)
        .build_from_path(graph, &cfg.partition)
        .with_context(|| format!("Failed to add fragments from {}", cfg.partition.display()))?;

    check_order(&graph, cfg.strict)?;

    let resolver = EventResolver::new(ResolveOptions::new().strict_overhang(cfg.strict));
    let mut summary = RunSummary::default();
    let mut graph = graph;

    for (&kind, path) in &cfg.events {
        let table = EventTable::from_path(kind, path)
            .with_context(|| format!("Failed to read {} events from {}", kind, path.display()))?;
        let records = table
            .records()
            .with_context(|| format!("Bad coordinates in {}", path.display()))?;

        let (g, fragments) = resolver
            .resolve_owned(graph, kind, &records)
            .with_context(|| format!("Failed to resolve {} events from {}", kind, path.display()))?;
        graph = g;

        let out = export_table(&cfg.out_dir, &graph.gene, &table, &fragments)
            .with_context(|| format!("Failed to export {} table", kind))?;
        summary.events.insert(kind, records.len());
        summary.tables.push(out);
    }

    if let Some(renderer) = make_renderer(cfg.renderer, &cfg.graphviz_bin) {
        let style = project(&graph, &styles);
        summary.diagram = renderer
            .render(&graph, &style, &cfg.out_dir)
            .context("Failed to render the gene diagram")?;
    }

    if cfg.write_graphml {
        let path = cfg.out_dir.join(format!("updated_{}.graphml", graph.gene));
        write_graphml_path(&graph, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        summary.graphml = Some(path);
    }

    summary.gene = graph.gene.clone();
    summary.strand = graph.strand;
    info!("{graph}");
    Ok(summary)
}

fn check_order(graph: &SpliceGraph, strict: bool) -> Result<()> {
    match graph.check_transcript_order() {
        Ok(()) => Ok(()),
        Err(e) if strict => Err(e).context("Graph vertex order does not follow the transcript"),
        Err(e) => {
            warn!("{e}; fragment walks may pick up unrelated edges");
            Ok(())
        }
    }
}
