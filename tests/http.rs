mod common;

use std::fs;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use common::{draft_name, png_data_url, self_import_report, Workspace};
use inspection_reports::document::json::JsonDocument;
use inspection_reports::document::Document;
use inspection_reports::handlers;
use serde_json::{json, Value};

const BOUNDARY: &str = "draft-upload-boundary";

macro_rules! app {
    ($repository:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($repository))
                .configure(handlers::configure::<JsonDocument>),
        )
        .await
    };
}

fn upload(uri: &str, fields: &[(&str, &str)]) -> test::TestRequest {
    let mut body = Vec::new();
    for (name, content) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.json\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    test::TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
}

fn with_photos(count: usize) -> Value {
    let mut payload = self_import_report();
    let photos: Vec<Value> = (0..count)
        .map(|id| json!({"id": id, "file": png_data_url(4, 2), "rotation": 0}))
        .collect();
    payload["transport_units"][0]["photos"] = json!(photos);
    payload
}

#[actix_rt::test]
async fn health_reports_healthy() {
    let workspace = Workspace::new();
    let app = app!(workspace.repository);
    let resp: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp["status"], "healthy");
}

#[actix_rt::test]
async fn created_draft_is_listed_and_downloadable() {
    let workspace = Workspace::new();
    let app = app!(workspace.repository);

    let req = test::TestRequest::put().uri("/report").set_json(self_import_report()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/json"
    );

    let req = test::TestRequest::get().uri("/report").to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing["success"], true);
    assert_eq!(listing["data"][0]["name"], draft_name());

    let req = test::TestRequest::get().uri("/report/absent.json").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn unsupported_report_type_is_not_implemented() {
    let workspace = Workspace::new();
    let app = app!(workspace.repository);

    let mut payload = self_import_report();
    payload["report_type"] = "pickup_from_supplier".into();
    for unit in payload["transport_units"].as_array_mut().unwrap() {
        unit["distribution_center_receiver"] = "DC-1".into();
    }
    let req = test::TestRequest::put().uri("/report").set_json(payload).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "NOT_IMPLEMENTED");
}

#[actix_rt::test]
async fn corrupted_template_is_unprocessable() {
    let workspace = Workspace::new();
    std::fs::remove_file(workspace.template_path("temperature_template")).unwrap();
    let app = app!(workspace.repository);

    let req = test::TestRequest::put().uri("/report").set_json(self_import_report()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn upload_replaces_the_draft_with_the_report_file_field() {
    let workspace = Workspace::new();
    let draft = workspace.draft_path("a.json");
    fs::write(&draft, b"old").unwrap();
    let app = app!(workspace.repository);

    let req = upload("/report/a.json", &[("comment", "ignored"), ("report_file", "NEW-BYTES")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], "a.json");
    assert_eq!(fs::read(&draft).unwrap(), b"NEW-BYTES");
}

#[actix_rt::test]
async fn upload_accepts_the_file_field_and_keeps_the_first_match() {
    let workspace = Workspace::new();
    let draft = workspace.draft_path("a.json");
    fs::write(&draft, b"old").unwrap();
    let app = app!(workspace.repository);

    let req = upload("/report/a.json", &[("file", "FIRST"), ("report_file", "SECOND")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(fs::read(&draft).unwrap(), b"FIRST");
}

#[actix_rt::test]
async fn upload_without_a_draft_field_is_a_bad_request() {
    let workspace = Workspace::new();
    let draft = workspace.draft_path("a.json");
    fs::write(&draft, b"old").unwrap();
    let app = app!(workspace.repository);

    let req = upload("/report/a.json", &[("comment", "NEW-BYTES")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fs::read(&draft).unwrap(), b"old");
}

#[actix_rt::test]
async fn upload_to_an_unknown_draft_is_not_found() {
    let workspace = Workspace::new();
    let absent = workspace.draft_path("absent.json");
    let app = app!(workspace.repository);

    let req = upload("/report/absent.json", &[("report_file", "NEW-BYTES")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "DRAFT_NOT_FOUND");
    assert!(!absent.exists());
}

#[actix_rt::test]
async fn oversized_upload_is_rejected_and_the_draft_kept() {
    let workspace = Workspace::with_settings(|settings| settings.server.max_payload_mb = 0);
    let draft = workspace.draft_path("a.json");
    fs::write(&draft, b"old").unwrap();
    let app = app!(workspace.repository);

    let req = upload("/report/a.json", &[("report_file", "NEW-BYTES")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fs::read(&draft).unwrap(), b"old");
}

#[actix_rt::test]
async fn patch_appends_photo_tables_to_the_draft() {
    let workspace = Workspace::new();
    let app = app!(workspace.repository);

    let req = test::TestRequest::put().uri("/report").set_json(with_photos(5)).to_request();
    let created: JsonDocument = serde_json::from_slice(&test::call_and_read_body(&app, req).await).unwrap();

    let req = test::TestRequest::patch().uri("/report").set_json(with_photos(5)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: JsonDocument = serde_json::from_slice(&test::read_body(resp).await).unwrap();

    assert_eq!(updated.tables().len(), created.tables().len() + 2);
    assert_eq!(updated.pictures().len(), created.pictures().len());
    assert_eq!(updated.page_break_count(), created.page_break_count() + 2);
}

#[actix_rt::test]
async fn patch_without_a_draft_is_not_found() {
    let workspace = Workspace::new();
    let app = app!(workspace.repository);

    let req = test::TestRequest::patch().uri("/report").set_json(with_photos(1)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
