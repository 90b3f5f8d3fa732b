#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::{json, Value};
use tempfile::TempDir;

use inspection_reports::config::Settings;
use inspection_reports::document::json::{JsonDocument, JsonTable};
use inspection_reports::document::{Document, Style};
use inspection_reports::repository::ReportRepository;

pub const UNIT_NUMBERS: [&str; 4] = ["CRLU1395673", "ADMU9000367", "SEGU9195005", "TGHU8811520"];

pub struct Workspace {
    pub dir: TempDir,
    pub repository: ReportRepository<JsonDocument>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    /// Same workspace with extra settings applied before the repository is built.
    pub fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_self_import_templates(&dir.path().join("templates"));

        let mut settings = Settings::default();
        settings.repository.templates_dir = dir.path().join("templates");
        settings.repository.reports_dir = dir.path().join("reports");
        settings.translations.fruits.insert("яблоко".into(), "Apple".into());
        settings.translations.fruits.insert("груша".into(), "Pear".into());
        adjust(&mut settings);
        let repository = ReportRepository::new(settings).unwrap();

        Self { dir, repository }
    }

    pub fn template_path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join("templates/SelfImportReport").join(format!("{}.json", name))
    }

    pub fn draft_path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join("reports").join(name)
    }

    pub fn drafts(&self) -> Vec<String> {
        self.repository.list_reports().unwrap().into_iter().map(|d| d.name).collect()
    }
}

fn table(rows: &[&[&str]]) -> JsonTable {
    let rows: Vec<Vec<&str>> = rows.iter().map(|r| r.to_vec()).collect();
    JsonTable::from_rows(&rows)
}

fn save(dir: &Path, name: &str, paragraphs: &[&str], tables: Vec<JsonTable>) {
    let mut doc = JsonDocument::new();
    for text in paragraphs {
        doc.append_paragraph(text, &Style::default());
    }
    for t in tables {
        doc.append_table(t);
    }
    doc.save(&dir.join(format!("{}.json", name))).unwrap();
}

pub fn write_self_import_templates(root: &Path) {
    let dir = root.join("SelfImportReport");
    fs::create_dir_all(&dir).unwrap();

    save(&dir, "header_template", &[], vec![table(&[
        &["Report {{report_number}}", "{{vessel}}"],
        &["{{cargo}}", "{{transport_units}}"],
        &["{{shipper}}", "{{BL}}"],
    ])]);
    save(&dir, "temperature_template", &[], vec![table(&[
        &["Temperature, order {{order}}", "", ""],
        &["Container", "Pulp", "Recommended"],
        &["{{number}}", "{{temperature.pulp.min}}/{{temperature.pulp.max}}", "{{temperature.recommended}}"],
    ])]);
    save(&dir, "tally_account_template", &[], vec![
        table(&[&["Pallets {{number}}", "{{pallets}}"]]),
        table(&[&["Boxes {{number}}", "{{boxes}}"]]),
    ]);
    save(&dir, "inspection_result_template", &["груша"], vec![
        table(&[&["General result"], &["{{number}}"]]),
        table(&[&["Pear result"], &["{{number}}"]]),
    ]);
    save(&dir, "colors_tables_template", &["", "яблоко"], vec![
        table(&[&["Apple colour"], &["{{number}}"]]),
        table(&[&["Apple blush"], &["{{number}}"]]),
    ]);
    save(&dir, "conclusion_template", &[], vec![
        table(&[&["Calibre"], &["{{number}} {{calibre}}"]]),
        table(&[&["Conclusion text"]]),
        table(&[&["Shelf life"], &["{{number}}"]]),
        table(&[&["{{surveyor}}", "{{issue_date}}"]]),
    ]);
    save(&dir, "letter_of_protest", &[], vec![table(&[
        &["{{date}}"],
        &["{{cargo}} / {{BL}}"],
        &["{{result}}"],
    ])]);
    save(&dir, "photos_template", &[], vec![
        table(&[&["", ""], &["", ""]]).with_geometry(12.0, 8.0),
    ]);
}

pub fn png_data_url(width: u32, height: u32) -> String {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

fn unit(number: &str, cargo: &str) -> Value {
    json!({
        "number": number,
        "supplier": "Weyland-Yutani Corp",
        "cargo": [cargo],
        "cultivar": ["Gala"],
        "invoice": "XYZ2020000001283",
        "calibre": ["70-75"],
        "BL": format!("BL-{}", number),
        "pallets": 20,
        "boxes": 1600,
        "temperature": {
            "recommended": 1.0,
            "pulp": {"min": 0.5, "max": 1.5},
            "violations_affect": "1",
            "thermographs": [
                {"number": format!("{}-1", number), "min": 0.0, "max": 2.5, "worked": "1",
                 "graph": {"id": 1, "file": png_data_url(2, 2)}},
                {"number": format!("{}-2", number), "min": -0.5, "max": 2.0, "worked": "1",
                 "graph": {"id": 2, "file": png_data_url(2, 2)}}
            ]
        }
    })
}

/// Four containers, two with apples and two with pears, no violations.
pub fn self_import_report() -> Value {
    json!({
        "report_type": "self_import",
        "place_of_inspection": "RC Alpha Centauri",
        "number": "12/34",
        "order": "LV-426",
        "inspection_date": "18.12.2020 - 19.12.2020",
        "surveyor": "Ellen Ripley",
        "vessel": "Rocinante",
        "transport_units": [
            unit(UNIT_NUMBERS[0], "Яблоко"),
            unit(UNIT_NUMBERS[1], "яблоко"),
            unit(UNIT_NUMBERS[2], "Груша"),
            unit(UNIT_NUMBERS[3], "груша"),
        ]
    })
}

pub fn draft_name() -> String {
    format!(
        "1234_LV-426_Weyland-Yutani Corp_яблоко_груша_{}.json",
        UNIT_NUMBERS.join("_")
    )
}
