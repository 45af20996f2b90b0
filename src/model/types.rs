use std::fmt;

use crate::types::EventKind;

/// Internal numeric IDs (indexes into Vecs).
pub type VertexId = usize;
pub type EdgeId = usize;

/// Which isoform of an overhang event an edge spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmatsIsoform {
    Long,
    Short,
}

impl RmatsIsoform {
    pub fn label(self) -> &'static str {
        match self {
            RmatsIsoform::Long => "rmats long",
            RmatsIsoform::Short => "rmats short",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "rmats long" => Some(RmatsIsoform::Long),
            "rmats short" => Some(RmatsIsoform::Short),
            _ => None,
        }
    }
}

impl fmt::Display for RmatsIsoform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One flag per event kind; set when a fragment edge lies inside an event of that kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTags([bool; 4]);

impl EventTags {
    #[inline]
    pub fn set(&mut self, kind: EventKind) {
        self.0[kind.index()] = true;
    }

    #[inline]
    pub fn has(&self, kind: EventKind) -> bool {
        self.0[kind.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|&b| b)
    }

    /// Kinds that are set, in `EventKind::ALL` order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL.into_iter().filter(move |k| self.has(*k))
    }
}
