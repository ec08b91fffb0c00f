//! CSV export of a filtered table.

use std::fs;
use std::path::Path;
use tracing::info;

use crate::constants::export::{DELIMITER, LIST_SEPARATOR};
use crate::data::{FieldValue, Table};
use crate::errors::ExplorerError;

/// Header names: the id column first, then the remaining schema columns in
/// declaration order.
pub fn header(table: &Table) -> Vec<&str> {
    let id_field = table.schema.id_field.as_str();
    std::iter::once(id_field)
        .chain(table.schema.column_names().filter(|name| *name != id_field))
        .collect()
}

/// Render `table` as CSV: a header row, then one line per record.
///
/// Cells containing the delimiter, a quote, or a line break are quoted with
/// inner quotes doubled. Nulls are empty cells and list values are joined
/// with `;`.
pub fn to_csv(table: &Table) -> String {
    let columns = header(table);
    let mut out = String::new();
    push_row(&mut out, columns.iter().map(|name| name.to_string()));
    for record in &table.records {
        push_row(
            &mut out,
            columns.iter().enumerate().map(|(idx, column)| {
                let value = record.get(column);
                if idx == 0 && matches!(value, FieldValue::Null) {
                    record.id.clone()
                } else {
                    value.to_cell(LIST_SEPARATOR)
                }
            }),
        );
    }
    out
}

/// Write `to_csv(table)` to `path`, replacing any existing file.
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> Result<(), ExplorerError> {
    let path = path.as_ref();
    fs::write(path, to_csv(table))?;
    info!(
        "[hf_explorer:export] wrote {} rows from '{}' to {}",
        table.len(),
        table.source(),
        path.display()
    );
    Ok(())
}

fn push_row<I>(out: &mut String, cells: I)
where
    I: IntoIterator<Item = String>,
{
    for (idx, cell) in cells.into_iter().enumerate() {
        if idx > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&escape_cell(&cell));
    }
    out.push('\n');
}

fn escape_cell(cell: &str) -> String {
    let needs_quotes = cell
        .chars()
        .any(|ch| ch == DELIMITER || ch == '"' || ch == '\n' || ch == '\r');
    if needs_quotes {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
