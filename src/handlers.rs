use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::StreamExt;
use std::path::PathBuf;

use crate::document::Document;
use crate::errors::{AppError, AppResult};
use crate::models::{ApiResponse, Report};
use crate::repository::ReportRepository;

/// Multipart field names accepted for an edited draft.
const UPLOAD_FIELDS: [&str; 2] = ["report_file", "file"];

// ==============================================================================
// ROUTES
// ==============================================================================

pub fn configure<D: Document + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/report")
            .route("", web::put().to(create_report::<D>))
            .route("", web::get().to(list_reports::<D>))
            .route("", web::patch().to(add_photos::<D>))
            .route("/{filename}", web::get().to(get_report::<D>))
            .route("/{filename}", web::post().to(update_report::<D>)),
    );
}

// ==============================================================================
// HEALTH CHECK
// ==============================================================================

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "inspection-reports",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ==============================================================================
// REPORT HANDLERS
// ==============================================================================

async fn draft_file<D: Document>(repository: &ReportRepository<D>, path: PathBuf) -> AppResult<NamedFile> {
    Ok(NamedFile::open_async(path)
        .await?
        .set_content_type(repository.kind().media_type()))
}

/// Generates a draft and sends it back.
pub async fn create_report<D: Document + 'static>(
    repository: web::Data<ReportRepository<D>>,
    body: web::Json<Report>,
) -> Result<NamedFile, AppError> {
    let report = body.into_inner();
    let repo = repository.clone();
    let path = web::block(move || repo.create_report(report)).await??;
    draft_file(&repository, path).await
}

pub async fn list_reports<D: Document + 'static>(
    repository: web::Data<ReportRepository<D>>,
) -> Result<HttpResponse, AppError> {
    let repo = repository.clone();
    let drafts = web::block(move || repo.list_reports()).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::success(drafts)))
}

pub async fn get_report<D: Document + 'static>(
    repository: web::Data<ReportRepository<D>>,
    filename: web::Path<String>,
) -> Result<NamedFile, AppError> {
    let path = repository.get_report(&filename)?;
    draft_file(&repository, path).await
}

/// Replaces a draft with the uploaded file.
pub async fn update_report<D: Document + 'static>(
    repository: web::Data<ReportRepository<D>>,
    filename: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let filename = filename.into_inner();
    let limit = repository.upload_limit();
    let mut content: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(e.to_string()))?;
        let wanted = content.is_none()
            && field
                .content_disposition()
                .and_then(|cd| cd.get_name())
                .is_some_and(|name| UPLOAD_FIELDS.contains(&name));

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(e.to_string()))?;
            // other fields are drained unread
            if !wanted {
                continue;
            }
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::PayloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }
        if wanted {
            content = Some(bytes);
        }
    }

    let content = content.ok_or_else(|| {
        AppError::BadRequest(format!("multipart body needs a `{}` field", UPLOAD_FIELDS[0]))
    })?;
    let repo = repository.clone();
    let name = filename.clone();
    web::block(move || repo.update_report(&name, &content)).await??;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(filename, "Draft updated")))
}

/// Appends the report's photos to its draft and sends the draft back.
pub async fn add_photos<D: Document + 'static>(
    repository: web::Data<ReportRepository<D>>,
    body: web::Json<Report>,
) -> Result<NamedFile, AppError> {
    let report = body.into_inner();
    let repo = repository.clone();
    let path = web::block(move || repo.add_photos(report)).await??;
    draft_file(&repository, path).await
}
