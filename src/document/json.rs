//! In-memory document tree persisted as JSON.
//!
//! The body is an ordered list of blocks; tables live in their own vector and
//! are referenced from the body by index so `tables()` can hand out a slice.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{replace_file, Alignment, Cell, Document, Row, Style, Table};
use crate::errors::AppResult;

/// A4 portrait, centimetres.
const A4_HEIGHT_CM: f64 = 29.7;
const A4_WIDTH_CM: f64 = 21.0;
const DEFAULT_COLUMN_WIDTH_CM: f64 = 4.0;
const DEFAULT_ROW_HEIGHT_CM: f64 = 1.0;

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// BLOCKS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Picture {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub height: f64,
    pub width: f64,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionLayout {
    pub landscape: bool,
    pub page_height: f64,
    pub page_width: f64,
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self {
            landscape: false,
            page_height: A4_HEIGHT_CM,
            page_width: A4_WIDTH_CM,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table { index: usize },
    Picture(Picture),
    PageBreak,
    Section(SectionLayout),
}

// ==============================================================================
// TABLE ELEMENTS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellParagraph {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pictures: Vec<Picture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JsonCell {
    pub paragraphs: Vec<CellParagraph>,
}

impl JsonCell {
    pub fn new(text: &str) -> Self {
        let mut cell = Self::default();
        cell.set_text(text);
        cell
    }
}

impl Cell for JsonCell {
    type Paragraph = CellParagraph;

    fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replaces the whole content with one paragraph; pictures are dropped,
    /// the first paragraph's style survives.
    fn set_text(&mut self, text: &str) {
        let style = self.paragraphs.first().and_then(|p| p.style.clone());
        self.paragraphs = vec![CellParagraph {
            text: text.to_string(),
            style,
            pictures: Vec::new(),
        }];
    }

    fn paragraphs(&self) -> &[CellParagraph] {
        &self.paragraphs
    }

    fn paragraphs_mut(&mut self) -> &mut [CellParagraph] {
        &mut self.paragraphs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRow {
    pub height: f64,
    pub cells: Vec<JsonCell>,
}

impl Row for JsonRow {
    type Cell = JsonCell;

    fn cells(&self) -> &[JsonCell] {
        &self.cells
    }

    fn cells_mut(&mut self) -> &mut [JsonCell] {
        &mut self.cells
    }

    fn height(&self) -> f64 {
        self.height
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonTable {
    pub column_widths: Vec<f64>,
    pub rows: Vec<JsonRow>,
}

impl JsonTable {
    /// Builds a table from cell texts with default geometry.
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            column_widths: vec![DEFAULT_COLUMN_WIDTH_CM; columns],
            rows: rows
                .iter()
                .map(|texts| JsonRow {
                    height: DEFAULT_ROW_HEIGHT_CM,
                    cells: texts.iter().map(|t| JsonCell::new(t.as_ref())).collect(),
                })
                .collect(),
        }
    }

    pub fn with_geometry(mut self, column_width: f64, row_height: f64) -> Self {
        self.column_widths.iter_mut().for_each(|w| *w = column_width);
        self.rows.iter_mut().for_each(|r| r.height = row_height);
        self
    }

    /// Cell texts, row by row.
    pub fn texts(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.cells.iter().map(Cell::text).collect())
            .collect()
    }
}

impl Table for JsonTable {
    type Cell = JsonCell;
    type Row = JsonRow;

    fn rows(&self) -> &[JsonRow] {
        &self.rows
    }

    fn rows_mut(&mut self) -> &mut [JsonRow] {
        &mut self.rows
    }

    fn add_row(&mut self) -> &mut JsonRow {
        let height = self.rows.last().map(|r| r.height).unwrap_or(DEFAULT_ROW_HEIGHT_CM);
        let cells = (0..self.column_widths.len()).map(|_| JsonCell::new("")).collect();
        self.rows.push(JsonRow { height, cells });
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    fn column_count(&self) -> usize {
        self.column_widths.len()
    }

    fn column_width(&self, column_number: usize) -> Option<f64> {
        self.column_widths.get(column_number).copied()
    }
}

// ==============================================================================
// DOCUMENT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonDocument {
    pub initial_section: SectionLayout,
    pub tables: Vec<JsonTable>,
    pub body: Vec<Block>,
}

impl Default for JsonDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonDocument {
    pub fn new() -> Self {
        Self {
            initial_section: SectionLayout::default(),
            tables: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.body
    }

    pub fn page_break_count(&self) -> usize {
        self.body.iter().filter(|b| matches!(b, Block::PageBreak)).count()
    }

    pub fn pictures(&self) -> Vec<&Picture> {
        self.body
            .iter()
            .filter_map(|b| match b {
                Block::Picture(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Serializes the document as pretty JSON and flushes `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> AppResult<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    fn current_section(&self) -> &SectionLayout {
        self.body
            .iter()
            .rev()
            .find_map(|b| match b {
                Block::Section(layout) => Some(layout),
                _ => None,
            })
            .unwrap_or(&self.initial_section)
    }
}

impl Document for JsonDocument {
    type Table = JsonTable;

    fn load(path: &Path) -> AppResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn save(&self, path: &Path) -> AppResult<()> {
        replace_file(path, |writer| self.write_to(writer))
    }

    fn tables(&self) -> &[JsonTable] {
        &self.tables
    }

    fn tables_mut(&mut self) -> &mut [JsonTable] {
        &mut self.tables
    }

    fn append_table(&mut self, table: JsonTable) -> &mut JsonTable {
        let index = self.tables.len();
        self.tables.push(table);
        self.body.push(Block::Table { index });
        &mut self.tables[index]
    }

    fn paragraphs(&self) -> Vec<String> {
        self.body
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p.text.clone()),
                _ => None,
            })
            .collect()
    }

    fn append_paragraph(&mut self, text: &str, style: &Style) {
        self.body.push(Block::Paragraph(Paragraph {
            text: text.to_string(),
            style: style.clone(),
        }));
    }

    fn append_picture(&mut self, picture: &[u8], height: f64, width: f64, alignment: Alignment) {
        self.body.push(Block::Picture(Picture {
            data: picture.to_vec(),
            height,
            width,
            alignment,
        }));
    }

    fn add_page_break(&mut self) {
        self.body.push(Block::PageBreak);
    }

    fn add_section(&mut self, horizontal: bool) {
        let current = self.current_section();
        let long = current.page_height.max(current.page_width);
        let short = current.page_height.min(current.page_width);
        let layout = if horizontal {
            SectionLayout { landscape: true, page_height: short, page_width: long }
        } else {
            SectionLayout { landscape: false, page_height: long, page_width: short }
        };
        self.body.push(Block::Section(layout));
    }

    fn page_size(&self) -> (f64, f64) {
        let section = self.current_section();
        (section.page_height, section.page_width)
    }

    fn set_cell_style(cell: &mut JsonCell, style: &Style) {
        if cell.paragraphs.is_empty() {
            cell.paragraphs.push(CellParagraph::default());
        }
        cell.paragraphs[0].style = Some(style.clone());
    }

    fn insert_picture_into_cell(cell: &mut JsonCell, picture: &[u8], height: f64, width: f64) {
        if cell.paragraphs.is_empty() {
            cell.paragraphs.push(CellParagraph::default());
        }
        cell.paragraphs[0].pictures.push(Picture {
            data: picture.to_vec(),
            height,
            width,
            alignment: Alignment::Center,
        });
    }
}
