use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A 1-based genomic coordinate as used for vertex names.
pub type Coord = u64;

/// Genomic strand/orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Plus,
    Minus,
    #[default]
    Unknown,
}

impl Strand {
    /// Parse the GFF strand column (`+`, `-`, `.`, `?`).
    pub fn from_symbol(s: &str) -> Option<Strand> {
        match s {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            "." | "?" => Some(Strand::Unknown),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Strand::Plus => "+",
            Strand::Minus => "-",
            Strand::Unknown => ".",
        }
    }

    /// Orient a genomic (left, right) pair along the direction of transcription.
    #[inline]
    pub fn orient<T>(self, left: T, right: T) -> (T, T) {
        match self {
            Strand::Minus => (right, left),
            Strand::Plus | Strand::Unknown => (left, right),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Convert an exclusive end (or a 0-based start) into the closed 1-based
/// coordinate that names a graph vertex. `None` when the value has no successor.
#[inline]
pub fn vertex_coord(raw: Coord) -> Option<Coord> {
    raw.checked_add(1)
}

/// Geometry of an event: which resolution strategy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventShape {
    /// Long/short isoform pair sharing one boundary.
    Overhang,
    /// One full optional segment.
    FullFragment,
}

/// The four rMATS event kinds handled by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    A3SS,
    A5SS,
    SE,
    RI,
}

impl EventKind {
    /// Processing order of a run, independent of argument order.
    pub const ALL: [EventKind; 4] = [EventKind::A3SS, EventKind::A5SS, EventKind::SE, EventKind::RI];

    pub fn label(self) -> &'static str {
        match self {
            EventKind::A3SS => "A3SS",
            EventKind::A5SS => "A5SS",
            EventKind::SE => "SE",
            EventKind::RI => "RI",
        }
    }

    pub fn from_label(s: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|k| k.label() == s)
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            EventKind::A3SS => 0,
            EventKind::A5SS => 1,
            EventKind::SE => 2,
            EventKind::RI => 3,
        }
    }

    pub fn shape(self) -> EventShape {
        match self {
            EventKind::A3SS | EventKind::A5SS => EventShape::Overhang,
            EventKind::SE | EventKind::RI => EventShape::FullFragment,
        }
    }

    /// Detect the kind from an rMATS file name such as `fromGTF.SE.txt`.
    pub fn from_path(path: &Path) -> Option<EventKind> {
        let name = path.file_name()?.to_str()?;
        EventKind::ALL
            .into_iter()
            .find(|k| name.contains(&format!("fromGTF.{}.txt", k.label())))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strand_orients_minus_reversed() {
        assert_eq!(Strand::Plus.orient(1, 2), (1, 2));
        assert_eq!(Strand::Minus.orient(1, 2), (2, 1));
        assert_eq!(Strand::from_symbol("-"), Some(Strand::Minus));
        assert_eq!(Strand::from_symbol("x"), None);
    }

    #[test]
    fn event_kind_from_rmats_file_name() {
        let p = PathBuf::from("/data/run1/fromGTF.A5SS.txt");
        assert_eq!(EventKind::from_path(&p), Some(EventKind::A5SS));
        let p = PathBuf::from("/data/run1/fromGTF.novelEvents.SE.txt");
        assert_eq!(EventKind::from_path(&p), None);
        let p = PathBuf::from("SE.txt");
        assert_eq!(EventKind::from_path(&p), None);
    }

    #[test]
    fn vertex_coord_rejects_the_largest_value() {
        assert_eq!(vertex_coord(99), Some(100));
        assert_eq!(vertex_coord(Coord::MAX), None);
    }

    #[test]
    fn shapes_split_overhang_and_full_fragment() {
        assert_eq!(EventKind::A3SS.shape(), EventShape::Overhang);
        assert_eq!(EventKind::RI.shape(), EventShape::FullFragment);
        assert_eq!(EventKind::from_label("SE"), Some(EventKind::SE));
    }
}
