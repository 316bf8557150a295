use dotenvy::dotenv;
use std::env;

use congreso::config::AppConfig;
use congreso::database;
use congreso::services::admin_service::{self, GenerateRequest, SendCertificatesRequest};
use congreso::services::mailer;
use congreso::AppState;

/// `certificates [generate|send|all|speakers]`; CERTIFICATE_LIMIT caps one
/// run below the configured batch size.
#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let mode = env::args().nth(1).unwrap_or_else(|| "all".to_string());
    if !matches!(mode.as_str(), "generate" | "send" | "all" | "speakers") {
        eprintln!("usage: certificates [generate|send|all|speakers]");
        std::process::exit(2);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(2);
        }
    };
    let limit: Option<i64> = env::var("CERTIFICATE_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok());

    let pool = match database::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("database connection failed: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = database::migrate(&pool).await {
        eprintln!("migrations failed: {}", e);
        std::process::exit(1);
    }
    let mailer = match mailer::build_mailer(&config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("mail transport unavailable: {}", e);
            std::process::exit(1);
        }
    };
    let state = AppState::new(pool, config, mailer);

    if mode == "speakers" {
        match admin_service::generate_speaker_certificates(&state).await {
            Ok(report) => {
                for certificate in &report.rendered {
                    println!("{}: {}", certificate.name, certificate.url);
                }
                println!(
                    "speakers: rendered={}, failed={}",
                    report.rendered.len(),
                    report.failed.len()
                );
            }
            Err(e) => {
                eprintln!("speaker certificates failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if mode != "send" {
        let request = GenerateRequest {
            limit,
            ..GenerateRequest::default()
        };
        match admin_service::generate_certificates(&state, request).await {
            Ok(report) => println!(
                "generate: created={}, rendered={}, failed={}",
                report.created,
                report.rendered,
                report.failed.len()
            ),
            Err(e) => {
                eprintln!("certificate generation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if mode != "generate" {
        let request = SendCertificatesRequest {
            limit,
            ..SendCertificatesRequest::default()
        };
        match admin_service::send_certificates(&state, request).await {
            Ok(report) => println!(
                "send: processed={}, sent={}, failed={}, remaining={}",
                report.processed,
                report.sent,
                report.failed.len(),
                report.remaining
            ),
            Err(e) => {
                eprintln!("certificate sending failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
