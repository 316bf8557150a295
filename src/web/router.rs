use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, get_service, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::middleware::auth as auth_middleware;
use crate::web::routes::{
    admin, certificates, checkin, companies, dni_update, misc, program, qr, registration,
};

const LOGO_UPLOAD_LIMIT: usize = 6 * 1024 * 1024;
const IMPORT_UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if allowed.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn media_mount(media_url: &str) -> String {
    let path = media_url.trim_end_matches('/');
    if path.starts_with('/') && path.len() > 1 {
        path.to_string()
    } else {
        "/media".to_string()
    }
}

/// The full application: public API, admin console and stored media.
pub fn build_router(state: AppState) -> Router {
    // Admin console behind HTTP Basic auth
    let admin_routes = Router::new()
        .route("/api/admin/me", get(admin::whoami_handler))
        .route("/api/admin/summary", get(admin::summary_handler))
        .route("/api/admin/attendees", get(admin::list_attendees_handler))
        .route("/api/admin/attendees/export", get(admin::export_attendees_handler))
        .route(
            "/api/admin/attendees/import",
            post(admin::import_attendees_handler).layer(DefaultBodyLimit::max(IMPORT_UPLOAD_LIMIT)),
        )
        .route("/api/admin/attendees/mark-attended", post(admin::mark_attended_handler))
        .route("/api/admin/companies", get(admin::list_companies_handler))
        .route("/api/admin/registrations", get(admin::list_registrations_handler))
        .route("/api/admin/certificates", get(admin::list_certificates_handler))
        .route(
            "/api/admin/certificates/generate",
            post(admin::generate_certificates_handler),
        )
        .route("/api/admin/certificates/send", post(admin::send_certificates_handler))
        .route(
            "/api/admin/certificates/speakers",
            post(admin::generate_speaker_certificates_handler),
        )
        .route("/api/admin/dni/requests", post(admin::send_dni_requests_handler))
        .route("/api/admin/dni/normalize", post(admin::normalize_dnis_handler))
        .route("/api/admin/speakers", post(admin::create_speaker_handler))
        .route(
            "/api/admin/speakers/:id/certificate",
            get(admin::speaker_certificate_handler),
        )
        .route("/api/admin/sessions", post(admin::create_session_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_admin,
        ));

    let public_routes = Router::new()
        .route("/api/inscripcion/", post(registration::register_individual_handler))
        .route("/api/inscripcion-grupal/", post(registration::register_group_handler))
        .route("/api/registro-rapido/", post(registration::register_on_site_handler))
        .route(
            "/api/empresas/",
            get(companies::list_companies_handler)
                .post(companies::register_company_handler)
                .layer(DefaultBodyLimit::max(LOGO_UPLOAD_LIMIT)),
        )
        .route("/api/verificar-dni/", post(checkin::verify_dni_handler))
        .route("/api/checkin/", post(checkin::qr_checkin_handler))
        .route(
            "/api/certificates/:id/download/",
            get(certificates::download_handler),
        )
        .route("/api/generar-qrs/", get(qr::static_codes_handler))
        .route("/api/qr/:token", get(qr::registration_qr_handler))
        .route(
            "/api/actualizar-dni/",
            get(dni_update::lookup_handler).post(dni_update::update_handler),
        )
        .route("/api/programa/", get(program::list_sessions_handler))
        .route("/api/programa/:id/", get(program::session_detail_handler))
        .route("/api/disertantes/", get(program::list_speakers_handler))
        .route("/api/disertantes/:slug/", get(program::speaker_detail_handler))
        .route("/api/csrf-token/", get(misc::csrf_token_handler))
        .route("/api/health", get(misc::health_handler));

    let media_root = state.media.root().to_path_buf();

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        // Stored uploads and certificates
        .nest_service(
            &media_mount(&state.config.media_url),
            get_service(ServeDir::new(media_root)),
        )
        // Layers
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_mount_falls_back_for_absolute_urls() {
        assert_eq!(media_mount("/media/"), "/media");
        assert_eq!(media_mount("/uploads"), "/uploads");
        assert_eq!(media_mount("https://cdn.example/media"), "/media");
    }
}
