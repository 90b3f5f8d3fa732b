//! Repeats a template table's last ("prototype") row once per item.

use serde_json::{Map, Value};

use crate::document::{Cell, Document, Row, Style, Table};
use crate::errors::{AppError, AppResult};
use crate::template_engine::{fill_table_with, resolve};

/// Fills the prototype row from the first item, appends one row per further
/// item (resolved from the prototype's raw text), then resolves whatever is
/// left in the table against the report-level `report` data.
pub fn fill_rows_per_item<D: Document>(
    table: &mut D::Table,
    items: &[Value],
    report: &Value,
) -> AppResult<()> {
    let style = Style::default();
    let raw_texts: Vec<String> = table
        .rows()
        .last()
        .ok_or_else(|| AppError::TemplateCorrupted("table has no row to repeat".to_string()))?
        .cells()
        .iter()
        .map(Cell::text)
        .collect();

    let empty = Value::Object(Map::new());
    let first = items.first().unwrap_or(&empty);
    if let Some(prototype) = table.rows_mut().last_mut() {
        for (cell, raw) in prototype.cells_mut().iter_mut().zip(&raw_texts) {
            cell.set_text(&resolve(raw, first));
        }
    }

    for item in items.iter().skip(1) {
        let row = table.add_row();
        let cells = row.cells_mut();
        if cells.len() != raw_texts.len() {
            return Err(AppError::TemplateCorrupted(format!(
                "repeated row has {} cells while its prototype has {}",
                cells.len(),
                raw_texts.len()
            )));
        }
        for (cell, raw) in cells.iter_mut().zip(&raw_texts) {
            cell.set_text(&resolve(raw, item));
            D::set_cell_style(cell, &style);
        }
    }

    fill_table_with(table, report, |cell| D::set_cell_style(cell, &style));
    Ok(())
}
