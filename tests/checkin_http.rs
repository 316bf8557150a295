mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use serde_json::json;

use common::{spawn_app, visitor, TestApp};
use congreso::database::attendee_repo::{self, NewAttendee};
use congreso::database::registration_repo;

async fn register(app: &TestApp, email: &str, dni: &str) -> serde_json::Value {
    let (status, body) = app
        .post_json("/api/inscripcion/", visitor("Ana", email, dni))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn dni_confirmation_issues_and_emails_certificate() {
    let app = spawn_app().await;
    let registered = register(&app, "ana@example.com", "30123456").await;
    let attendee_id = registered["asistente"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post_json("/api/verificar-dni/", json!({ "dni": "30.123.456" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(body["asistente"]["nombre_completo"], "Ana Gómez");
    assert_eq!(body["asistencia_confirmada"], true);
    assert_eq!(body["asistente"]["attendance_confirmed"], true);
    assert_eq!(body["asistente"]["asistencia_confirmada"], true);
    assert_eq!(body["email_sent"], true);
    assert!(body["certificate_id"].is_i64());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    let certificate_mail = &sent[1];
    assert_eq!(certificate_mail.attachments.len(), 1);
    assert_eq!(certificate_mail.attachments[0].content_type, "application/pdf");
    assert!(certificate_mail.attachments[0].bytes.starts_with(b"%PDF"));

    let registration = registration_repo::find_by_attendee(&app.state.pool, attendee_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status, "certified");
    assert!(registration.attended_at.is_some());
}

#[tokio::test]
async fn second_confirmation_is_a_conflict_with_original_timestamp() {
    let app = spawn_app().await;
    register(&app, "ana@example.com", "30123456").await;

    let (status, first) = app
        .post_json("/api/verificar-dni/", json!({ "dni": "30123456" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = app
        .post_json("/api/verificar-dni/", json!({ "dni": 30123456 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(second["fecha_confirmacion"].is_string());
    assert!(first["asistente"]["fecha_confirmacion"].is_string());
    assert_eq!(second["asistente"]["attendance_confirmed"], true);
    // No second certificate email.
    assert_eq!(app.mailer.sent().len(), 2);
}

#[tokio::test]
async fn unknown_and_malformed_dni() {
    let app = spawn_app().await;

    let (status, body) = app
        .post_json("/api/verificar-dni/", json!({ "dni": "11222333" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().starts_with("DNI no encontrado"));

    let (status, body) = app.post_json("/api/verificar-dni/", json!({ "dni": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["dni"].is_array());

    let (status, _) = app.post_json("/api/verificar-dni/", json!({ "dni": "12ab" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn qr_code_is_consumed_once() {
    let app = spawn_app().await;
    let registered = register(&app, "ana@example.com", "30123456").await;
    let token = registered["qr_token"].as_str().unwrap().to_string();

    let (status, body) = app.post_json("/api/checkin/", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["newly_confirmed"], true);
    assert_eq!(body["asistencia_confirmada"], true);
    assert_eq!(body["asistente"]["attendance_confirmed"], true);

    let (status, body) = app.post_json("/api/checkin/", json!({ "codigo": token })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["checked_in_at"].is_string());

    let (status, _) = app
        .post_json("/api/checkin/", json!({ "token": "no-such-token" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn qr_after_dni_confirmation_is_accepted_without_new_certificate() {
    let app = spawn_app().await;
    let registered = register(&app, "ana@example.com", "30123456").await;
    let token = registered["qr_token"].as_str().unwrap().to_string();

    let (status, _) = app
        .post_json("/api/verificar-dni/", json!({ "dni": "30123456" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post_json("/api/checkin/", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newly_confirmed"], false);
    assert_eq!(app.mailer.sent().len(), 2);
}

#[tokio::test]
async fn registration_qr_png_and_static_codes() {
    let app = spawn_app().await;
    let registered = register(&app, "ana@example.com", "30123456").await;
    let token = registered["qr_token"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/api/qr/{}", token))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

    let (status, body) = app.get_json("/api/generar-qrs/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["checkin_qr"]["url"].as_str().unwrap().ends_with("/verificar-dni"));
    assert!(body["registro_qr"]["url"].as_str().unwrap().ends_with("/registro-rapido"));
    assert!(body["checkin_qr"]["image_base64"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn certificate_download_renders_pdf() {
    let app = spawn_app().await;
    register(&app, "ana@example.com", "30123456").await;
    let (_, body) = app
        .post_json("/api/verificar-dni/", json!({ "dni": "30123456" }))
        .await;
    let certificate_id = body["certificate_id"].as_i64().unwrap();

    let request = Request::builder()
        .uri(format!("/api/certificates/{}/download/", certificate_id))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&format!("certificado_asistencia_{}.pdf", certificate_id)));

    let (status, body) = app.get_json("/api/certificates/9999/download/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

async fn attendee_without_dni(app: &TestApp, token: &str) -> i64 {
    attendee_repo::insert_attendee(
        &app.state.pool,
        &NewAttendee {
            first_name: "Bruno",
            last_name: "Díaz",
            email: "bruno@example.com",
            phone: None,
            dni: None,
            dni_update_token: Some(token),
            profile_type: "VISITOR",
            is_unab_student: false,
            institution: None,
            career: None,
            year_of_study: None,
            career_taught: None,
            work_area: None,
            occupation: None,
            group_name: None,
            group_municipality: None,
            group_size: None,
            representative_id: None,
            company_id: None,
            created_at: Utc::now(),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn dni_update_token_is_single_use() {
    let app = spawn_app().await;
    register(&app, "ana@example.com", "30123456").await;
    let id = attendee_without_dni(&app, "tok123").await;

    let (status, body) = app.get_json("/api/actualizar-dni/?token=tok123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asistente"]["email"], "bruno@example.com");

    // Owned by Ana.
    let (status, _) = app
        .post_json("/api/actualizar-dni/", json!({ "token": "tok123", "dni": "30123456" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post_json("/api/actualizar-dni/", json!({ "token": "tok123", "dni": "12" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json("/api/actualizar-dni/", json!({ "token": "tok123", "dni": "35444555" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");

    let stored = attendee_repo::find_by_id(&app.state.pool, id).await.unwrap().unwrap();
    assert_eq!(stored.dni.as_deref(), Some("35444555"));
    assert!(stored.dni_update_token.is_none());

    let (status, _) = app.get_json("/api/actualizar-dni/?token=tok123").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_csrf_token() {
    let app = spawn_app().await;
    let (status, body) = app.get_json("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let request = Request::builder()
        .uri("/api/csrf-token/")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("csrftoken="));
}
