use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

use crate::types::{vertex_coord, Coord, EventKind, EventShape};

/// Column holding the event identifier.
pub const ID_COLUMN: &str = "ID";

/// 0-based column of the first coordinate in rMATS `fromGTF` tables
/// (`exonStart_0base` or `longExonStart_0base`).
pub const FIRST_COORD_COLUMN: usize = 5;

#[derive(Debug, Error)]
pub enum EventTableError {
    #[error("I/O error while reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {kind} table: {source}")]
    Csv {
        kind: EventKind,
        #[source]
        source: csv::Error,
    },

    #[error("{kind} table has no 'ID' column")]
    MissingIdColumn { kind: EventKind },

    #[error("{kind} event '{id}': row has {found} columns, coordinates need {needed}")]
    ShortRow {
        kind: EventKind,
        id: String,
        found: usize,
        needed: usize,
    },

    #[error("{kind} event '{id}': column '{column}' is not a coordinate: '{value}'")]
    BadCoordinate {
        kind: EventKind,
        id: String,
        column: String,
        value: String,
    },
}

/// Coordinates of an overhang event, normalized to vertex names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverhangSpan {
    pub long_start: Coord,
    pub long_end: Coord,
    pub short_start: Coord,
    pub short_end: Coord,
}

/// Coordinates of a full-fragment event, normalized to vertex names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExonSpan {
    pub start: Coord,
    pub end: Coord,
}

/// The two event geometries; selects the resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSpan {
    Overhang(OverhangSpan),
    FullFragment(ExonSpan),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    pub span: EventSpan,
}

/// One rMATS `fromGTF.<KIND>.txt` table, kept verbatim for re-export.
#[derive(Debug, Clone)]
pub struct EventTable {
    pub kind: EventKind,
    headers: StringRecord,
    rows: Vec<StringRecord>,
    id_col: usize,
}

impl EventTable {
    /// Read a tab-delimited table with a header row.
    pub fn from_reader<R: Read>(kind: EventKind, reader: R) -> Result<Self, EventTableError> {
        let csv_err = |source| EventTableError::Csv { kind, source };

        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers().map_err(csv_err)?.clone();
        let id_col = headers
            .iter()
            .position(|h| h.trim() == ID_COLUMN)
            .ok_or(EventTableError::MissingIdColumn { kind })?;

        let rows = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;

        Ok(Self {
            kind,
            headers,
            rows,
            id_col,
        })
    }

    pub fn from_path<P: AsRef<Path>>(kind: EventKind, path: P) -> Result<Self, EventTableError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EventTableError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(kind, file)
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Event ID of a row (empty when the row is short).
    pub fn row_id<'a>(&self, row: &'a StringRecord) -> &'a str {
        row.get(self.id_col).unwrap_or("")
    }

    /// Parse every row into an event record, normalizing coordinates (+1).
    pub fn records(&self) -> Result<Vec<EventRecord>, EventTableError> {
        self.rows.iter().map(|row| self.parse_row(row)).collect()
    }

    fn parse_row(&self, row: &StringRecord) -> Result<EventRecord, EventTableError> {
        let id = self.row_id(row).to_string();
        let n = match self.kind.shape() {
            EventShape::Overhang => 4,
            EventShape::FullFragment => 2,
        };
        let needed = FIRST_COORD_COLUMN + n;
        if row.len() < needed {
            return Err(EventTableError::ShortRow {
                kind: self.kind,
                id,
                found: row.len(),
                needed,
            });
        }

        let coord = |offset: usize| -> Result<Coord, EventTableError> {
            let col = FIRST_COORD_COLUMN + offset;
            let value = &row[col];
            value
                .trim()
                .parse::<Coord>()
                .ok()
                .and_then(vertex_coord)
                .ok_or_else(|| EventTableError::BadCoordinate {
                    kind: self.kind,
                    id: id.clone(),
                    column: self.headers.get(col).unwrap_or("?").to_string(),
                    value: value.to_string(),
                })
        };

        let span = match self.kind.shape() {
            EventShape::Overhang => EventSpan::Overhang(OverhangSpan {
                long_start: coord(0)?,
                long_end: coord(1)?,
                short_start: coord(2)?,
                short_end: coord(3)?,
            }),
            EventShape::FullFragment => EventSpan::FullFragment(ExonSpan {
                start: coord(0)?,
                end: coord(1)?,
            }),
        };

        Ok(EventRecord { id, span })
    }
}
