//! Admin settings: scrape delay and pull token.

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::ExporterError;

use super::ExporterState;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub token: String,
    pub delay: u32,
    /// RFC 3339, or `never`.
    pub last_execution: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub token: Option<String>,
    pub delay: i64,
}

impl SettingsView {
    fn current(state: &ExporterState) -> Self {
        Self {
            token: state.tokens.get_token(),
            delay: state.scraping.get_delay(),
            last_execution: state
                .scheduler
                .last_execution()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

fn server_error(e: &ExporterError) -> HttpResponse {
    error!("Failed to apply settings: {}", e);
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.format_simple() }))
}

pub struct SettingsService;

impl SettingsService {
    pub async fn get_settings(state: web::Data<ExporterState>) -> impl Responder {
        HttpResponse::Ok().json(SettingsView::current(&state))
    }

    pub async fn update_settings(
        state: web::Data<ExporterState>,
        update: web::Json<SettingsUpdate>,
    ) -> impl Responder {
        let update = update.into_inner();

        // validate first so a bad delay persists nothing
        let delay = match crate::config::validators::validate_delay(update.delay) {
            Ok(delay) => delay,
            Err(e) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "errors": { "delay": e.message() }
                }));
            }
        };

        if let Some(token) = update.token
            && let Err(e) = state.tokens.set_token(token.trim())
        {
            return server_error(&e);
        }
        if let Err(e) = state.scraping.set_delay(i64::from(delay)) {
            return server_error(&e);
        }
        if let Err(e) = state.scheduler.restart(i64::from(delay)) {
            return server_error(&e);
        }

        info!("Exporter settings updated, scrape delay {} minute(s)", delay);
        HttpResponse::Ok().json(SettingsView::current(&state))
    }
}

pub fn settings_routes() -> actix_web::Scope {
    web::scope("/settings")
        .route("", web::get().to(SettingsService::get_settings))
        .route("", web::post().to(SettingsService::update_settings))
}
