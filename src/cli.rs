use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::pipeline::PipelineConfig;
use crate::render::RendererKind;
use crate::types::EventKind;

/// Map rMATS splicing events onto the DEXSeq exonic parts of a gene's splice graph.
#[derive(Parser, Debug, Clone)]
#[command(name = "splice_event_map", author, version, about)]
pub struct Args {
    /// Existing directory for the updated tables and the diagram
    pub out_dir: PathBuf,

    /// Splice graph of the gene (.graphml, optionally gzipped)
    pub graph: PathBuf,

    /// DEXSeq flattened annotation of the gene (.gff, optionally gzipped)
    pub partition: PathBuf,

    /// rMATS event tables named fromGTF.<A3SS|A5SS|SE|RI>.txt
    #[arg(required = true, num_args = 1..=4)]
    pub events: Vec<PathBuf>,

    /// More output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Abort on ambiguous overhang events and vertex order violations
    #[arg(long)]
    pub strict: bool,

    /// Add fragment boundaries missing from the graph as new vertices
    #[arg(long)]
    pub create_missing_vertices: bool,

    /// JSON edge style table replacing the built-in colours
    #[arg(long, value_name = "JSON")]
    pub style: Option<PathBuf>,

    /// Diagram output
    #[arg(long, value_enum, default_value_t = RendererKind::Graphviz)]
    pub renderer: RendererKind,

    /// Graphviz program used for PNG output
    #[arg(long, value_name = "PATH", default_value = "dot")]
    pub graphviz_bin: String,

    /// Also write the annotated graph as updated_<gene>.graphml
    #[arg(long)]
    pub write_graphml: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output directory {0} does not exist")]
    MissingOutDir(PathBuf),

    #[error("{path} is not a {expected} file")]
    WrongExtension { path: PathBuf, expected: &'static str },

    #[error("{0} is not an rMATS fromGTF.<A3SS|A5SS|SE|RI>.txt file")]
    UnknownEventFile(PathBuf),

    #[error("{kind} events given twice: {first} and {second}")]
    DuplicateKind {
        kind: EventKind,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Cannot open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn has_extension(path: &Path, ext: &str) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(ext) || name.ends_with(&format!("{ext}.gz"))
}

fn readable(path: &Path) -> Result<(), CliError> {
    File::open(path).map(|_| ()).map_err(|e| CliError::Unreadable {
        path: path.to_path_buf(),
        source: e,
    })
}

impl Args {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }

    /// Validate paths before anything is read.
    pub fn check(&self) -> Result<(), CliError> {
        if !self.out_dir.is_dir() {
            return Err(CliError::MissingOutDir(self.out_dir.clone()));
        }
        if !has_extension(&self.graph, ".graphml") {
            return Err(CliError::WrongExtension {
                path: self.graph.clone(),
                expected: ".graphml",
            });
        }
        if !has_extension(&self.partition, ".gff") {
            return Err(CliError::WrongExtension {
                path: self.partition.clone(),
                expected: ".gff",
            });
        }
        readable(&self.graph)?;
        readable(&self.partition)?;
        for p in self.event_files()?.values() {
            readable(p)?;
        }
        if let Some(style) = &self.style {
            readable(style)?;
        }
        if self.graphviz_bin.trim().is_empty() {
            return Err(CliError::InvalidInput("empty --graphviz-bin".to_string()));
        }
        Ok(())
    }

    /// Event tables keyed by the kind named in their file name.
    pub fn event_files(&self) -> Result<BTreeMap<EventKind, PathBuf>, CliError> {
        let mut out: BTreeMap<EventKind, PathBuf> = BTreeMap::new();
        for p in &self.events {
            let kind = EventKind::from_path(p).ok_or_else(|| CliError::UnknownEventFile(p.clone()))?;
            if let Some(first) = out.get(&kind) {
                return Err(CliError::DuplicateKind {
                    kind,
                    first: first.clone(),
                    second: p.clone(),
                });
            }
            out.insert(kind, p.clone());
        }
        Ok(out)
    }

    /// Validate and turn the arguments into a pipeline configuration.
    pub fn to_config(&self) -> Result<PipelineConfig, CliError> {
        self.check()?;
        let mut cfg = PipelineConfig::new(
            self.out_dir.clone(),
            self.graph.clone(),
            self.partition.clone(),
        );
        cfg.events = self.event_files()?;
        cfg.strict = self.strict;
        cfg.create_missing_vertices = self.create_missing_vertices;
        cfg.style = self.style.clone();
        cfg.renderer = self.renderer;
        cfg.graphviz_bin = self.graphviz_bin.clone();
        cfg.write_graphml = self.write_graphml;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, "").unwrap();
        p
    }

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["splice_event_map"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn valid_arguments_give_a_config() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let g = touch(d, "gene.graphml");
        let p = touch(d, "gene.gff");
        let ri = touch(d, "fromGTF.RI.txt");
        let a3 = touch(d, "fromGTF.A3SS.txt");

        let args = parse(&[
            d.to_str().unwrap(),
            g.to_str().unwrap(),
            p.to_str().unwrap(),
            ri.to_str().unwrap(),
            a3.to_str().unwrap(),
            "-vv",
            "--strict",
        ]);
        assert_eq!(args.log_level(), log::LevelFilter::Debug);

        let cfg = args.to_config().unwrap();
        assert!(cfg.strict);
        assert_eq!(cfg.renderer, RendererKind::Graphviz);
        assert_eq!(cfg.graphviz_bin, "dot");
        let kinds: Vec<_> = cfg.events.keys().copied().collect();
        assert_eq!(kinds, vec![EventKind::A3SS, EventKind::RI]);
    }

    #[test]
    fn rejects_bad_paths() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let g = touch(d, "gene.xml");
        let p = touch(d, "gene.gff.gz");
        let se = touch(d, "fromGTF.SE.txt");
        let args = parse(&[d.to_str().unwrap(), g.to_str().unwrap(), p.to_str().unwrap(), se.to_str().unwrap()]);
        assert!(matches!(args.check(), Err(CliError::WrongExtension { expected: ".graphml", .. })));

        let g = touch(d, "gene.graphml");
        let odd = touch(d, "SE.txt");
        let args = parse(&[d.to_str().unwrap(), g.to_str().unwrap(), p.to_str().unwrap(), odd.to_str().unwrap()]);
        assert!(matches!(args.check(), Err(CliError::UnknownEventFile(_))));

        let missing = d.join("nope");
        let args = parse(&[missing.to_str().unwrap(), g.to_str().unwrap(), p.to_str().unwrap(), se.to_str().unwrap()]);
        assert!(matches!(args.check(), Err(CliError::MissingOutDir(_))));
    }

    #[test]
    fn rejects_repeated_kinds_and_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let g = touch(d, "gene.graphml");
        let p = touch(d, "gene.gff");
        let se = touch(d, "fromGTF.SE.txt");
        fs::create_dir(d.join("other")).unwrap();
        let se2 = touch(&d.join("other"), "fromGTF.SE.txt");

        let args = parse(&[d.to_str().unwrap(), g.to_str().unwrap(), p.to_str().unwrap(), se.to_str().unwrap(), se2.to_str().unwrap()]);
        assert!(matches!(args.check(), Err(CliError::DuplicateKind { kind: EventKind::SE, .. })));

        let gone = d.join("fromGTF.RI.txt");
        let args = parse(&[d.to_str().unwrap(), g.to_str().unwrap(), p.to_str().unwrap(), gone.to_str().unwrap()]);
        assert!(matches!(args.check(), Err(CliError::Unreadable { .. })));
    }

    #[test]
    fn at_most_four_event_files() {
        let r = Args::try_parse_from([
            "splice_event_map", "o", "g.graphml", "p.gff", "a", "b", "c", "d", "e",
        ]);
        assert!(r.is_err());
        let r = Args::try_parse_from(["splice_event_map", "o", "g.graphml", "p.gff"]);
        assert!(r.is_err());
    }
}
