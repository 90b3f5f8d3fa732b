use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::document::{replace_file, Document, DocumentKind};
use crate::errors::{AppError, AppResult};
use crate::models::Report;
use crate::photos::add_photo_tables;
use crate::strategies::{generate_report, Templates, PHOTOS_TEMPLATE};

#[derive(Debug, Clone, Serialize)]
pub struct DraftSummary {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

// ==============================================================================
// REPORT REPOSITORY
// ==============================================================================

/// Draft documents stored as flat files named after their report.
pub struct ReportRepository<D> {
    settings: Settings,
    kind: DocumentKind,
    _document: PhantomData<fn() -> D>,
}

impl<D: Document> ReportRepository<D> {
    /// Checks the configured document type and makes sure the drafts directory exists.
    pub fn new(settings: Settings) -> AppResult<Self> {
        let kind: DocumentKind = settings.repository.doc_type.parse()?;
        fs::create_dir_all(&settings.repository.reports_dir)?;
        Ok(Self {
            settings,
            kind,
            _document: PhantomData,
        })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Largest accepted draft upload, the same cap as JSON bodies.
    pub fn upload_limit(&self) -> usize {
        self.settings.server.max_payload_mb * 1024 * 1024
    }

    /// Generates a draft from a report and stores it under its deterministic name.
    pub fn create_report(&self, mut report: Report) -> AppResult<PathBuf> {
        report.validate()?;
        let extension = self.kind.extension();
        let doc: D = generate_report(&mut report, &self.settings, extension)?;

        let path = self.reports_dir().join(report.draft_name(extension));
        doc.save(&path)?;
        info!(path = %path.display(), "Draft saved");
        Ok(path)
    }

    pub fn list_reports(&self) -> AppResult<Vec<DraftSummary>> {
        let mut drafts = Vec::new();
        for entry in fs::read_dir(self.reports_dir())? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            drafts.push(DraftSummary {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        drafts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drafts)
    }

    /// Path of an existing draft.
    pub fn get_report(&self, filename: &str) -> AppResult<PathBuf> {
        let path = self.draft_path(filename)?;
        if !path.is_file() {
            return Err(AppError::DraftNotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Replaces an existing draft with an edited copy.
    pub fn update_report(&self, filename: &str, content: &[u8]) -> AppResult<PathBuf> {
        let path = self.get_report(filename)?;
        replace_file(&path, |writer| Ok(writer.write_all(content)?))?;
        info!(path = %path.display(), bytes = content.len(), "Draft overwritten");
        Ok(path)
    }

    /// Appends the report's photos to its existing draft.
    pub fn add_photos(&self, report: Report) -> AppResult<PathBuf> {
        report.validate()?;
        let extension = self.kind.extension();
        let path = self.get_report(&report.draft_name(extension))?;

        let templates = Templates::new(&self.settings.repository.templates_dir, report.template_folder(), extension);
        let template = templates.first_table::<D>(PHOTOS_TEMPLATE, "photos table template is missing")?;

        let mut doc = D::load(&path)?;
        let tables = add_photo_tables(&mut doc, report.units(), &template)?;
        doc.save(&path)?;
        info!(path = %path.display(), tables, "Photos added to draft");
        Ok(path)
    }

    fn reports_dir(&self) -> &std::path::Path {
        &self.settings.repository.reports_dir
    }

    /// Draft names are plain file names; anything that could leave the directory is rejected.
    fn draft_path(&self, filename: &str) -> AppResult<PathBuf> {
        if filename.is_empty() || filename.contains(['/', '\\']) || filename == ".." || filename == "." {
            return Err(AppError::BadRequest(format!("invalid draft name: {}", filename)));
        }
        Ok(self.reports_dir().join(filename))
    }
}
