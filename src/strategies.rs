use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::document::{Alignment, Document, Style};
use crate::errors::{AppError, AppResult};
use crate::fan_out::fill_rows_per_item;
use crate::models::{Celsius, Container, InspectionReport, Report, SelfImportReport, TransportUnit};
use crate::numbers::to_capitalized_words;
use crate::template_engine::{extract_key, fill_table_with, to_data};

pub const HEADER_TEMPLATE: &str = "header_template";
pub const TEMPERATURE_TEMPLATE: &str = "temperature_template";
pub const TALLY_ACCOUNT_TEMPLATE: &str = "tally_account_template";
pub const INSPECTION_RESULT_TEMPLATE: &str = "inspection_result_template";
pub const COLORS_TABLES_TEMPLATE: &str = "colors_tables_template";
pub const CONCLUSION_TEMPLATE: &str = "conclusion_template";
pub const LETTER_OF_PROTEST_TEMPLATE: &str = "letter_of_protest";
pub const PHOTOS_TEMPLATE: &str = "photos_template";

/// Share of the page a thermograph graph occupies: (height, width).
const GRAPH_PAGE_SHARE: (f64, f64) = (0.3, 0.7);

// ==============================================================================
// TEMPLATE LOOKUP
// ==============================================================================

/// Template documents of one report type: `{root}/{folder}/{name}.{extension}`.
#[derive(Debug, Clone)]
pub struct Templates {
    dir: PathBuf,
    extension: String,
}

impl Templates {
    pub fn new(root: &Path, folder: &str, extension: &str) -> Self {
        Self {
            dir: root.join(folder),
            extension: extension.to_string(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, self.extension))
    }

    /// Loads a template document. A missing or unreadable template is corruption.
    pub fn load<D: Document>(&self, name: &str) -> AppResult<D> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(AppError::TemplateCorrupted(format!(
                "template {} is missing",
                path.display()
            )));
        }
        D::load(&path).map_err(|e| {
            AppError::TemplateCorrupted(format!("template {} cannot be read: {}", path.display(), e))
        })
    }

    /// Deep copy of the first table of a template document.
    pub fn first_table<D: Document>(&self, name: &str, missing: &str) -> AppResult<D::Table> {
        self.load::<D>(name)?
            .tables()
            .first()
            .cloned()
            .ok_or_else(|| AppError::TemplateCorrupted(missing.to_string()))
    }
}

/// Cargo labels of a template's paragraphs, lower-cased, blanks dropped.
/// A paragraph may carry the label as plain text or as a `{{ key }}`.
fn cargo_labels<D: Document>(template: &D) -> Vec<String> {
    template
        .paragraphs()
        .iter()
        .map(|p| extract_key(p).unwrap_or_else(|| p.clone()).trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect()
}

// ==============================================================================
// STRATEGIES
// ==============================================================================

/// Composes the body of a report document, whose header table is already in place.
pub trait ReportStrategy<D: Document> {
    fn execute(&mut self, report_doc: &mut D) -> AppResult<()>;
}

/// Picks the strategy for a report variant.
pub fn strategy_for<'a, D: Document>(
    report: &'a mut Report,
    settings: &'a Settings,
    templates: Templates,
) -> AppResult<Box<dyn ReportStrategy<D> + 'a>> {
    match report {
        Report::SelfImport(report) => Ok(Box::new(SelfImportStrategy::new(report, settings, templates))),
        Report::SelfImportOnAuto(_) => Err(AppError::StrategyNotImplemented(
            "self import on auto".to_string(),
        )),
        Report::PickupFromSupplier(_) => Err(AppError::StrategyNotImplemented(
            "pickup from supplier".to_string(),
        )),
    }
}

/// Loads the header template of the report's type and runs its strategy on it.
pub fn generate_report<D: Document>(
    report: &mut Report,
    settings: &Settings,
    extension: &str,
) -> AppResult<D> {
    let templates = Templates::new(&settings.repository.templates_dir, report.template_folder(), extension);
    let mut strategy = strategy_for::<D>(report, settings, templates.clone())?;
    let mut report_doc: D = templates.load(HEADER_TEMPLATE)?;
    strategy.execute(&mut report_doc)?;
    Ok(report_doc)
}

pub struct SelfImportStrategy<'a> {
    report: &'a mut SelfImportReport,
    settings: &'a Settings,
    templates: Templates,
}

impl<'a, D: Document> ReportStrategy<D> for SelfImportStrategy<'a> {
    fn execute(&mut self, report_doc: &mut D) -> AppResult<()> {
        self.fill_header_table(report_doc)?;

        let report_data = to_data(&*self.report)?;
        let units_data = self.report.units_data()?;

        self.add_temperature_table(report_doc, &units_data, &report_data)?;
        report_doc.add_page_break();
        self.add_tally_account_and_pallets_tables(report_doc, &units_data)?;
        self.add_inspection_result_tables(report_doc, &units_data, &report_data)?;
        self.add_conclusion_tables(report_doc, &units_data, &report_data)?;

        let violating = self.report.units_with_violations();
        if !violating.is_empty() {
            debug!(units = violating.len(), "Temperature violations found, adding letter of protest");
            self.add_letter_of_protest(report_doc, &violating)?;
        }

        self.add_pictures_of_thermographs(report_doc);
        Ok(())
    }
}

impl<'a> SelfImportStrategy<'a> {
    pub fn new(report: &'a mut SelfImportReport, settings: &'a Settings, templates: Templates) -> Self {
        Self { report, settings, templates }
    }

    fn fill_header_table<D: Document>(&mut self, report_doc: &mut D) -> AppResult<()> {
        self.report.translate_cargos(&self.settings.translations);
        let header = self.report.header();
        let table = report_doc
            .tables_mut()
            .first_mut()
            .ok_or_else(|| AppError::TemplateCorrupted("header table is missing".to_string()))?;
        let style = Style::default();
        fill_table_with(table, &header, |cell| D::set_cell_style(cell, &style));
        debug!(report = %self.report.common.number, "Header filled");
        Ok(())
    }

    fn add_temperature_table<D: Document>(
        &self,
        report_doc: &mut D,
        units_data: &[Value],
        report_data: &Value,
    ) -> AppResult<()> {
        let mut table = self
            .templates
            .first_table::<D>(TEMPERATURE_TEMPLATE, "temperature table template is missing")?;
        fill_rows_per_item::<D>(&mut table, units_data, report_data)?;
        report_doc.append_table(table);
        debug!("Temperature table added");
        Ok(())
    }

    /// One pallets table and one tally account table per transport unit.
    fn add_tally_account_and_pallets_tables<D: Document>(
        &self,
        report_doc: &mut D,
        units_data: &[Value],
    ) -> AppResult<()> {
        let template: D = self.templates.load(TALLY_ACCOUNT_TEMPLATE)?;
        let pallets = template
            .tables()
            .first()
            .ok_or_else(|| AppError::TemplateCorrupted("pallets table template is missing".to_string()))?;
        let tally_account = template.tables().get(1).ok_or_else(|| {
            AppError::TemplateCorrupted("tally account table template is missing".to_string())
        })?;

        let style = Style::default();
        for unit in units_data {
            for prototype in [pallets, tally_account] {
                let mut table = prototype.clone();
                fill_table_with(&mut table, unit, |cell| D::set_cell_style(cell, &style));
                report_doc.append_table(table);
            }
            report_doc.add_page_break();
        }
        debug!(units = units_data.len(), "Tally account and pallets tables added");
        Ok(())
    }

    /// One result table per distinct cargo, followed by its colour table(s) if any.
    fn add_inspection_result_tables<D: Document>(
        &self,
        report_doc: &mut D,
        units_data: &[Value],
        report_data: &Value,
    ) -> AppResult<()> {
        let results: D = self.templates.load(INSPECTION_RESULT_TEMPLATE)?;
        let result_labels = cargo_labels(&results);
        let colors: D = self.templates.load(COLORS_TABLES_TEMPLATE)?;
        let color_labels = cargo_labels(&colors);
        let units = self.report.units();

        for cargo in self.report.all_cargos() {
            let cargo_units: Vec<Value> = units
                .iter()
                .zip(units_data)
                .filter(|(unit, _)| unit.cargo.contains(&cargo))
                .map(|(_, data)| data.clone())
                .collect();

            // table 0 is the general one for cargos without their own
            let index = result_labels
                .iter()
                .position(|label| *label == cargo)
                .map_or(0, |i| i + 1);
            let mut table = results.tables().get(index).cloned().ok_or_else(|| {
                AppError::TemplateCorrupted(format!("inspection result table for {} is missing", cargo))
            })?;
            fill_rows_per_item::<D>(&mut table, &cargo_units, report_data)?;
            report_doc.append_table(table);

            self.add_colors_tables(report_doc, &cargo, &cargo_units, report_data, &colors, &color_labels)?;
        }
        Ok(())
    }

    fn add_colors_tables<D: Document>(
        &self,
        report_doc: &mut D,
        cargo: &str,
        cargo_units: &[Value],
        report_data: &Value,
        colors: &D,
        color_labels: &[String],
    ) -> AppResult<()> {
        let Some(index) = color_labels.iter().position(|label| label == cargo) else {
            debug!(cargo, "No colour table for cargo");
            return Ok(());
        };
        let count = if self.settings.inspection.has_double_color_table(cargo) { 2 } else { 1 };

        for offset in 0..count {
            let mut table = colors.tables().get(index + offset).cloned().ok_or_else(|| {
                AppError::TemplateCorrupted(format!("colour table for {} is missing", cargo))
            })?;
            fill_rows_per_item::<D>(&mut table, cargo_units, report_data)?;
            report_doc.append_table(table);
        }
        Ok(())
    }

    /// Calibre, conclusion, shelf life and executor tables, in that order.
    fn add_conclusion_tables<D: Document>(
        &self,
        report_doc: &mut D,
        units_data: &[Value],
        report_data: &Value,
    ) -> AppResult<()> {
        let template: D = self.templates.load(CONCLUSION_TEMPLATE)?;
        let [mut calibre, conclusion, mut shelf_life, mut executor] = match template.tables() {
            [calibre, conclusion, shelf_life, executor, ..] => {
                [calibre, conclusion, shelf_life, executor].map(Clone::clone)
            }
            _ => {
                return Err(AppError::TemplateCorrupted(
                    "one of the conclusion table templates is missing".to_string(),
                ))
            }
        };

        fill_rows_per_item::<D>(&mut calibre, units_data, report_data)?;
        report_doc.append_table(calibre);

        report_doc.append_table(conclusion);

        fill_rows_per_item::<D>(&mut shelf_life, units_data, report_data)?;
        report_doc.append_table(shelf_life);

        let style = Style::default();
        fill_table_with(&mut executor, report_data, |cell| D::set_cell_style(cell, &style));
        report_doc.append_table(executor);
        debug!("Conclusion tables added");
        Ok(())
    }

    fn add_letter_of_protest<D: Document>(
        &self,
        report_doc: &mut D,
        violating: &[&TransportUnit],
    ) -> AppResult<()> {
        let mut letter = self
            .templates
            .first_table::<D>(LETTER_OF_PROTEST_TEMPLATE, "letter of protest template is missing")?;

        let mut variables = self.report.header();
        if let Value::Object(map) = &mut variables {
            map.insert("date".into(), Local::now().format("%d.%m.%Y").to_string().into());
            map.insert("cargo".into(), self.report.all_cargos_in_english().join(", ").into());
            map.insert(
                "BL".into(),
                self.report
                    .transport_units
                    .iter()
                    .map(|unit: &Container| unit.bl.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
                    .into(),
            );
            map.insert("result".into(), self.violations_narrative(violating).into());
        }

        let style = Style::justified();
        fill_table_with(&mut letter, &variables, |cell| D::set_cell_style(cell, &style));
        report_doc.add_page_break();
        report_doc.append_table(letter);
        Ok(())
    }

    fn violations_narrative(&self, violating: &[&TransportUnit]) -> String {
        let opened_on = self
            .report
            .common
            .inspection_date
            .split(" - ")
            .next()
            .unwrap_or_default();

        violating
            .iter()
            .map(|unit| {
                let thermographs = &unit.temperature.thermographs;
                let pulp = &unit.temperature.pulp;
                let opening = format!(
                    "Container {} was opened on {} and temperature inside was {}°C/{}°C.",
                    unit.number, opened_on, pulp.min, pulp.max
                );
                if thermographs.is_empty() {
                    return opening;
                }
                let lowest = Celsius(thermographs.iter().map(|th| th.min.0).fold(f64::INFINITY, f64::min));
                let highest = Celsius(thermographs.iter().map(|th| th.max.0).fold(f64::NEG_INFINITY, f64::max));
                format!(
                    "{} thermograph(s) found in the container {} and according to {} record(s) \
                     the temperature during transportation was from {}°C to {}°C.\n{}",
                    to_capitalized_words(thermographs.len() as u64),
                    unit.number,
                    if thermographs.len() == 1 { "its" } else { "their" },
                    lowest,
                    highest,
                    opening
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn add_pictures_of_thermographs<D: Document>(&self, report_doc: &mut D) {
        for unit in self.report.units() {
            for thermograph in &unit.temperature.thermographs {
                let Some(graph) = thermograph.graph_image() else {
                    continue;
                };
                report_doc.add_page_break();
                report_doc.append_paragraph(
                    &format!("Container: {}\nThermograph: {}", unit.number, thermograph.number),
                    &Style::default(),
                );
                let (page_height, page_width) = report_doc.page_size();
                report_doc.append_picture(
                    graph,
                    page_height * GRAPH_PAGE_SHARE.0,
                    page_width * GRAPH_PAGE_SHARE.1,
                    Alignment::Center,
                );
            }
        }
    }
}
