mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};

use chrono::{TimeZone, Utc};
use common::{multipart_body, multipart_request, spawn_app, visitor, TestApp};
use congreso::database::{attendee_repo, registration_repo};
use congreso::services::checkin_service;

async fn register(app: &TestApp, first_name: &str, email: &str, dni: &str) -> i64 {
    let (status, body) = app
        .post_json("/api/inscripcion/", visitor(first_name, email, dni))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["asistente"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn console_requires_basic_credentials() {
    let app = spawn_app().await;

    let request = Request::builder()
        .uri("/api/admin/attendees")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let request = Request::builder()
        .uri("/api/admin/attendees")
        .header(header::AUTHORIZATION, "Basic YWRtaW46bm9wZQ==")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, bytes) = app.admin_get("/api/admin/me").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn attendee_listing_filters_and_pages() {
    let app = spawn_app().await;
    register(&app, "Carla", "carla@example.com", "33444555").await;
    register(&app, "Diego", "diego@example.com", "34555666").await;

    let (status, bytes) = app.admin_get("/api/admin/attendees").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["count"], 2);

    let (_, bytes) = app.admin_get("/api/admin/attendees?q=carla").await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["email"], "carla@example.com");

    let (_, bytes) = app.admin_get("/api/admin/attendees?page_size=1&page=2").await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"].as_array().map(Vec::len), Some(1));

    let (_, bytes) = app.admin_get("/api/admin/attendees?confirmed=true").await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn bulk_attendance_then_capped_certificate_batches() {
    let app = spawn_app().await;
    let carla = register(&app, "Carla", "carla@example.com", "33444555").await;
    let diego = register(&app, "Diego", "diego@example.com", "34555666").await;
    let confirmation_mails = app.mailer.sent().len();

    let (status, body) = app
        .admin_post_json(
            "/api/admin/attendees/mark-attended",
            json!({ "ids": [carla, diego, 9999] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["confirmed"], 2);
    assert_eq!(body["not_found"], json!([9999]));
    // Bulk confirmation never emails.
    assert_eq!(app.mailer.sent().len(), confirmation_mails);

    let (_, body) = app
        .admin_post_json("/api/admin/attendees/mark-attended", json!({ "ids": [carla] }))
        .await;
    assert_eq!(body["already_confirmed"], 1);

    let (status, body) = app
        .admin_post_json("/api/admin/certificates/generate", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["created"], 2);
    assert_eq!(body["rendered"], 2);

    let (status, body) = app
        .admin_post_json("/api/admin/certificates/send", json!({ "limit": 1 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sent"], 1);
    assert_eq!(body["remaining"], 1);

    let (_, body) = app
        .admin_post_json("/api/admin/certificates/send", json!({}))
        .await;
    assert_eq!(body["sent"], 1);
    assert_eq!(body["remaining"], 0);
    assert_eq!(app.mailer.sent().len(), confirmation_mails + 2);

    let (_, bytes) = app.admin_get("/api/admin/certificates?sent=true").await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn certificate_batches_can_be_limited_to_a_confirmation_day() {
    let app = spawn_app().await;
    let carla = register(&app, "Carla", "carla@example.com", "33444555").await;
    app.admin_post_json("/api/admin/attendees/mark-attended", json!({ "ids": [carla] }))
        .await;
    app.admin_post_json("/api/admin/certificates/generate", json!({}))
        .await;

    let (_, body) = app
        .admin_post_json(
            "/api/admin/certificates/send",
            json!({ "confirmed_on": "2000-01-01" }),
        )
        .await;
    assert_eq!(body["processed"], 0);
    assert_eq!(body["remaining"], 0);

    let (_, body) = app
        .admin_post_json("/api/admin/certificates/send", json!({}))
        .await;
    assert_eq!(body["sent"], 1);
}

const IMPORT_CSV: &str = "\
NOMBRE,Apellido,CORREO ELECTRONICO,NUMERO DE CELULAR (con codigo de area),DNI,TIPO DE PERFIL
Carla,Mena,carla@example.com,1144556677,33.444.555,Estudiante
Diego,Sanz,,1100000000,34555666,
Elena,Vera,CARLA@example.com,,35666777,Docente
Fabio,Ríos,fabio@example.com,,12,Profesional
";

async fn import_csv(app: &TestApp) -> Value {
    let body = multipart_body(&[], Some(("file", "asistentes.csv", IMPORT_CSV.as_bytes())));
    let auth = app.admin_auth();
    let (status, bytes) = app
        .send(multipart_request("/api/admin/attendees/import", body, Some(&auth)))
        .await;
    let report: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::OK, "{report}");
    report
}

#[tokio::test]
async fn spreadsheet_import_reports_each_row() {
    let app = spawn_app().await;
    let report = import_csv(&app).await;

    assert_eq!(report["total_rows"], 4);
    assert_eq!(report["created"], 2);
    assert_eq!(report["skipped"], 2);
    assert_eq!(report["without_dni"], 1);

    let rows = report["rows"].as_array().unwrap();
    let reason = |row: i64| {
        rows.iter()
            .find(|r| r["row"] == row)
            .and_then(|r| r["reason"].as_str())
            .map(str::to_string)
    };
    assert_eq!(reason(3).as_deref(), Some("sin email"));
    assert_eq!(reason(4).as_deref(), Some("email duplicado"));

    let carla = attendee_repo::find_by_email(&app.state.pool, "carla@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(carla.dni.as_deref(), Some("33444555"));
    assert_eq!(carla.profile_type, "STUDENT");

    let fabio = attendee_repo::find_by_email(&app.state.pool, "fabio@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(fabio.dni.is_none());
    assert!(fabio.dni_update_token.is_some());
    assert_eq!(fabio.profile_type, "PROFESSIONAL");
}

#[tokio::test]
async fn import_rejects_unknown_formats() {
    let app = spawn_app().await;
    let body = multipart_body(&[], Some(("file", "asistentes.txt", "hola".as_bytes())));
    let auth = app.admin_auth();
    let (status, _) = app
        .send(multipart_request("/api/admin/attendees/import", body, Some(&auth)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dni_requests_go_out_once_per_attendee() {
    let app = spawn_app().await;
    import_csv(&app).await;

    let (status, body) = app
        .admin_post_json("/api/admin/dni/requests", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sent"], 1);
    assert_eq!(body["remaining"], 0);

    let sent = app.mailer.sent();
    let request = sent.last().unwrap();
    assert_eq!(request.to, "fabio@example.com");
    assert!(request.html.contains("actualizar-dni?token="));

    let (_, body) = app
        .admin_post_json("/api/admin/dni/requests", json!({}))
        .await;
    assert_eq!(body["processed"], 0);
}

#[tokio::test]
async fn csv_export_lists_every_attendee() {
    let app = spawn_app().await;
    register(&app, "Carla", "carla@example.com", "33444555").await;

    let (status, bytes) = app.admin_get("/api/admin/attendees/export").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,nombre,apellido,email,dni"));
    let row = lines.next().unwrap();
    assert!(row.contains("carla@example.com"));
    assert!(row.contains("33444555"));
    assert!(lines.next().is_none());
}

#[tokio::test]
async fn speakers_and_sessions_feed_the_public_program() {
    let app = spawn_app().await;

    let (status, speaker) = app
        .admin_post_json(
            "/api/admin/speakers",
            json!({ "nombre": "María José Núñez", "organizacion": "UNaB" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{speaker}");
    assert_eq!(speaker["slug"], "maria-jose-nunez");

    let (status, body) = app
        .admin_post_json(
            "/api/admin/sessions",
            json!({
                "titulo": "Apertura",
                "disertante_id": speaker["id"],
                "sala": "Aula Magna",
                "dia": "2025-11-14",
                "hora_inicio": "09:00",
                "hora_fin": "08:30"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["end_time"].is_array());

    let (status, _) = app
        .admin_post_json(
            "/api/admin/sessions",
            json!({
                "titulo": "Apertura",
                "disertante_id": speaker["id"],
                "sala": "Aula Magna",
                "dia": "2025-11-14",
                "hora_inicio": "09:00",
                "hora_fin": "10:00"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, program) = app.get_json("/api/programa/?dia=2025-11-14").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(program.as_array().map(Vec::len), Some(1));
    assert_eq!(program[0]["disertante"], "María José Núñez");
    assert_eq!(program[0]["hora_inicio"], "09:00");

    let (_, other_day) = app.get_json("/api/programa/?dia=2025-11-15").await;
    assert_eq!(other_day.as_array().map(Vec::len), Some(0));

    let (status, detail) = app.get_json("/api/disertantes/maria-jose-nunez/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["sesiones"].as_array().map(Vec::len), Some(1));

    let (status, _) = app.get_json("/api/disertantes/nadie/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dni_normalization_report() {
    let app = spawn_app().await;
    import_csv(&app).await;
    let (status, body) = app
        .admin_post_json("/api/admin/dni/normalize", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["checked"], 2);
}

#[tokio::test]
async fn malformed_batch_filter_is_rejected_instead_of_ignored() {
    let app = spawn_app().await;
    let carla = register(&app, "Carla", "carla@example.com", "33444555").await;
    app.admin_post_json("/api/admin/attendees/mark-attended", json!({ "ids": [carla] }))
        .await;
    app.admin_post_json("/api/admin/certificates/generate", json!({}))
        .await;
    let mails_before = app.mailer.sent().len();

    let (status, body) = app
        .admin_post_json(
            "/api/admin/certificates/send",
            json!({ "confirmed_on": "15/11/2000" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["errors"]["__all__"].is_array());

    let (status, _) = app
        .admin_post_json("/api/admin/certificates/send", json!({ "ids": "todos" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.mailer.sent().len(), mails_before);

    // An empty body still means the default batch.
    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/certificates/send")
        .header(header::AUTHORIZATION, app.admin_auth())
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["sent"], 1);
}

#[tokio::test]
async fn huge_page_number_returns_an_empty_page() {
    let app = spawn_app().await;
    register(&app, "Carla", "carla@example.com", "33444555").await;

    let (status, bytes) = app
        .admin_get("/api/admin/attendees?page=9223372036854775807")
        .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn speaker_certificates_are_rendered_for_every_speaker() {
    let app = spawn_app().await;
    let (_, speaker) = app
        .admin_post_json(
            "/api/admin/speakers",
            json!({ "nombre": "María José Núñez", "organizacion": "UNaB" }),
        )
        .await;
    app.admin_post_json("/api/admin/speakers", json!({ "nombre": "Raúl Ortiz" }))
        .await;

    let (status, report) = app
        .admin_post_json("/api/admin/certificates/speakers", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    let rendered = report["rendered"].as_array().unwrap();
    assert_eq!(rendered.len(), 2);
    let url = rendered
        .iter()
        .find(|r| r["speaker_id"] == speaker["id"])
        .and_then(|r| r["url"].as_str())
        .unwrap();
    assert_eq!(
        url,
        "/media/certificates/disertantes/certificado_disertante_maria-jose-nunez.pdf"
    );

    let (status, pdf) = app
        .admin_get(&format!("/api/admin/speakers/{}/certificate", speaker["id"]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(pdf.starts_with(b"%PDF"));

    let (status, _) = app.admin_get("/api/admin/speakers/9999/certificate").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn participation_certificates_use_the_attendee_batch() {
    let app = spawn_app().await;
    let carla = register(&app, "Carla", "carla@example.com", "33444555").await;
    app.admin_post_json("/api/admin/attendees/mark-attended", json!({ "ids": [carla] }))
        .await;

    let (status, body) = app
        .admin_post_json(
            "/api/admin/certificates/generate",
            json!({ "kind": "PARTICIPATION" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["created"], 1);

    let (_, bytes) = app
        .admin_get("/api/admin/certificates?kind=PARTICIPATION")
        .await;
    let listed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .admin_post_json("/api/admin/certificates/generate", json!({ "kind": "SPEAKER" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirmation_day_is_read_in_event_local_time() {
    let app = spawn_app().await;
    let carla = register(&app, "Carla", "carla@example.com", "33444555").await;
    // 22:30 in Buenos Aires on the 15th.
    let late_evening = Utc.with_ymd_and_hms(2025, 11, 16, 1, 30, 0).unwrap();
    assert!(checkin_service::record_attendance(&app.state.pool, carla, late_evening)
        .await
        .unwrap());
    app.admin_post_json("/api/admin/certificates/generate", json!({}))
        .await;

    let (_, body) = app
        .admin_post_json(
            "/api/admin/certificates/send",
            json!({ "confirmed_on": "2025-11-16" }),
        )
        .await;
    assert_eq!(body["processed"], 0);

    let (_, body) = app
        .admin_post_json(
            "/api/admin/certificates/send",
            json!({ "confirmed_on": "2025-11-15" }),
        )
        .await;
    assert_eq!(body["sent"], 1);
}

#[tokio::test]
async fn attendance_and_registration_status_change_together() {
    let app = spawn_app().await;
    let carla = register(&app, "Carla", "carla@example.com", "33444555").await;
    let pool = &app.state.pool;

    sqlx::query(
        "CREATE TRIGGER block_attended BEFORE UPDATE ON registrations \
         BEGIN SELECT RAISE(ABORT, 'registrations locked'); END",
    )
    .execute(pool)
    .await
    .unwrap();
    assert!(checkin_service::record_attendance(pool, carla, Utc::now())
        .await
        .is_err());
    let stored = attendee_repo::find_by_id(pool, carla).await.unwrap().unwrap();
    assert!(!stored.attendance_confirmed);

    sqlx::query("DROP TRIGGER block_attended")
        .execute(pool)
        .await
        .unwrap();
    let (status, body) = app
        .admin_post_json("/api/admin/attendees/mark-attended", json!({ "ids": [carla] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confirmed"], 1);
    let registration = registration_repo::find_by_attendee(pool, carla)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status, "attended");
    assert!(registration.attended_at.is_some());
}
