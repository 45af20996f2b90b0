use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{StringRecord, WriterBuilder};
use log::info;
use thiserror::Error;

use crate::events::io::EventTable;
use crate::events::resolver::FragmentMap;
use crate::types::EventKind;

/// Column appended to every exported event table.
pub const FRAGMENT_COLUMN: &str = "DexseqFragment";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {kind} table: {source}")]
    Csv {
        kind: EventKind,
        #[source]
        source: csv::Error,
    },
}

/// `<out_dir>/fromGTF_<gene>.<KIND>.txt`
pub fn output_path(out_dir: &Path, gene: &str, kind: EventKind) -> PathBuf {
    out_dir.join(format!("fromGTF_{gene}.{kind}.txt"))
}

/// Write `table` with one extra `DexseqFragment` column, rows in input order.
/// IDs missing from `fragments` get an empty cell.
pub fn write_table<W: Write>(
    table: &EventTable,
    fragments: &FragmentMap,
    writer: W,
) -> Result<(), ExportError> {
    let kind = table.kind;
    let csv_err = |source| ExportError::Csv { kind, source };

    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(writer);

    let mut header = table.headers().clone();
    header.push_field(FRAGMENT_COLUMN);
    wtr.write_record(&header).map_err(csv_err)?;

    for row in table.rows() {
        let mut out: StringRecord = row.clone();
        let joined = fragments.joined(table.row_id(row)).unwrap_or_default();
        out.push_field(&joined);
        wtr.write_record(&out).map_err(csv_err)?;
    }

    wtr.flush().map_err(|e| ExportError::Io {
        path: format!("<{kind} table>"),
        source: e,
    })
}

/// Write the augmented table for `table.kind` into `out_dir`; returns its path.
pub fn export_table(
    out_dir: &Path,
    gene: &str,
    table: &EventTable,
    fragments: &FragmentMap,
) -> Result<PathBuf, ExportError> {
    let path = output_path(out_dir, gene, table.kind);
    let file = File::create(&path).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    write_table(table, fragments, file)?;
    info!("wrote {} ({} rows)", path.display(), table.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SE: &str = "ID\tGeneID\tgeneSymbol\tchr\tstrand\texonStart_0base\texonEnd\n\
2\tG\tS\tchr1\t+\t99\t200\n\
1\tG\tS\tchr1\t+\t99\t150\n\
3\tG\tS\tchr1\t+\t150\t200\n";

    #[test]
    fn appends_column_and_keeps_row_order() {
        let table = EventTable::from_reader(EventKind::SE, Cursor::new(SE)).unwrap();
        let mut map = FragmentMap::new();
        map.extend("1", vec!["E001".into()]);
        map.extend("2", vec!["E001".into(), "E002".into()]);

        let mut buf = Vec::new();
        write_table(&table, &map, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines[0],
            "ID\tGeneID\tgeneSymbol\tchr\tstrand\texonStart_0base\texonEnd\tDexseqFragment"
        );
        assert_eq!(lines[1], "2\tG\tS\tchr1\t+\t99\t200\tE001,E002");
        assert_eq!(lines[2], "1\tG\tS\tchr1\t+\t99\t150\tE001");
        // unmapped ID -> empty cell
        assert_eq!(lines[3], "3\tG\tS\tchr1\t+\t150\t200\t");
    }

    #[test]
    fn exported_table_reads_back_with_one_extra_column() {
        let table = EventTable::from_reader(EventKind::SE, Cursor::new(SE)).unwrap();
        let mut buf = Vec::new();
        write_table(&table, &FragmentMap::new(), &mut buf).unwrap();

        let back = EventTable::from_reader(EventKind::SE, Cursor::new(buf)).unwrap();
        assert_eq!(back.headers().len(), table.headers().len() + 1);
        assert_eq!(back.len(), table.len());
        for (a, b) in table.rows().iter().zip(back.rows()) {
            assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().take(a.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn output_path_is_named_by_gene_and_kind() {
        let p = output_path(Path::new("/out"), "ENSG1", EventKind::A5SS);
        assert_eq!(p, PathBuf::from("/out/fromGTF_ENSG1.A5SS.txt"));
    }
}
