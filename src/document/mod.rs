//! Document access abstraction.
//!
//! The template engine and the report strategies only ever talk to these
//! traits. Each backing file format provides one adapter (see [`json`]).
//! Tables are plain values: `Clone` is the deep copy used before a template
//! table is filled, so the template it came from stays reusable.

pub mod json;

use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::errors::{AppError, AppResult};

// ==============================================================================
// STYLE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
    Justify,
}

/// Paragraph level formatting applied to cells after text substitution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Style {
    pub alignment: Alignment,
    pub italic: bool,
    pub bold: bool,
    pub font: String,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            alignment: Alignment::Center,
            italic: false,
            bold: true,
            font: "Times New Roman".to_string(),
        }
    }
}

impl Style {
    /// Plain justified text, used for narrative tables.
    pub fn justified() -> Self {
        Self {
            alignment: Alignment::Justify,
            bold: false,
            ..Self::default()
        }
    }
}

// ==============================================================================
// TABLE ELEMENTS
// ==============================================================================

pub trait Cell {
    type Paragraph;

    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
    fn paragraphs(&self) -> &[Self::Paragraph];
    fn paragraphs_mut(&mut self) -> &mut [Self::Paragraph];
}

pub trait Row {
    type Cell: Cell;

    fn cells(&self) -> &[Self::Cell];
    fn cells_mut(&mut self) -> &mut [Self::Cell];
    /// Row height in centimetres.
    fn height(&self) -> f64;
}

/// Borrowed view over one table column.
pub struct Column<'a, C> {
    /// Column width in centimetres.
    pub width: f64,
    pub cells: Vec<&'a C>,
}

pub trait Table: Clone {
    type Cell: Cell;
    type Row: Row<Cell = Self::Cell>;

    fn rows(&self) -> &[Self::Row];
    fn rows_mut(&mut self) -> &mut [Self::Row];
    /// Appends an empty row shaped like the last one and returns it.
    fn add_row(&mut self) -> &mut Self::Row;
    fn column_count(&self) -> usize;
    fn column_width(&self, column_number: usize) -> Option<f64>;

    fn row_cells(&self, row_number: usize) -> Vec<&Self::Cell> {
        self.rows()
            .get(row_number)
            .map(|row| row.cells().iter().collect())
            .unwrap_or_default()
    }

    fn row_cells_mut(&mut self, row_number: usize) -> Option<&mut [Self::Cell]> {
        self.rows_mut().get_mut(row_number).map(|row| row.cells_mut())
    }

    fn column_cells(&self, column_number: usize) -> Vec<&Self::Cell> {
        self.rows()
            .iter()
            .filter_map(|row| row.cells().get(column_number))
            .collect()
    }

    fn columns(&self) -> Vec<Column<'_, Self::Cell>> {
        (0..self.column_count())
            .map(|n| Column {
                width: self.column_width(n).unwrap_or_default(),
                cells: self.column_cells(n),
            })
            .collect()
    }
}

// ==============================================================================
// DOCUMENT
// ==============================================================================

pub type CellOf<D> = <<D as Document>::Table as Table>::Cell;

pub trait Document: Sized {
    type Table: Table;

    fn load(path: &Path) -> AppResult<Self>;
    fn save(&self, path: &Path) -> AppResult<()>;

    fn tables(&self) -> &[Self::Table];
    fn tables_mut(&mut self) -> &mut [Self::Table];
    /// Appends a table to the end of the document and returns the appended copy.
    fn append_table(&mut self, table: Self::Table) -> &mut Self::Table;
    fn paragraphs(&self) -> Vec<String>;
    fn append_paragraph(&mut self, text: &str, style: &Style);
    fn append_picture(&mut self, picture: &[u8], height: f64, width: f64, alignment: Alignment);
    fn add_page_break(&mut self);
    fn add_section(&mut self, horizontal: bool);
    /// `(height, width)` of the last section's page, in centimetres.
    fn page_size(&self) -> (f64, f64);

    fn set_cell_style(cell: &mut CellOf<Self>, style: &Style);
    fn insert_picture_into_cell(cell: &mut CellOf<Self>, picture: &[u8], height: f64, width: f64);
}

/// Writes `path` through a temporary file in the same directory, renamed into
/// place only once `write` succeeded and every byte is flushed. On error the
/// previous file, if any, is left untouched.
pub fn replace_file<F>(path: &Path, write: F) -> AppResult<()>
where
    F: FnOnce(&mut dyn Write) -> AppResult<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Document adapters selectable through `repository.doc_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Json,
}

impl DocumentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Json => "json",
        }
    }

    pub fn media_type(&self) -> mime::Mime {
        match self {
            DocumentKind::Json => mime::APPLICATION_JSON,
        }
    }
}

impl FromStr for DocumentKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(DocumentKind::Json),
            other => Err(AppError::WrongDocumentType(other.to_string())),
        }
    }
}
