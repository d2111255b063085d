//! Prometheus pull endpoint
//!
//! `GET|POST <endpoint>?token=<secret>&name[]=<series>...`. The token is only
//! checked when one is configured. `name[]` narrows the output to the listed
//! families; without it the full snapshot is returned.

use actix_web::{HttpMessage, HttpRequest, HttpResponse, http::Method, web};
use tracing::{debug, error, trace};
use url::form_urlencoded;

use crate::api::constant_time_eq;
use crate::metrics::{CONTENT_TYPE, NameFilter, encode_text};

use super::ExporterState;

const TOKEN_PARAM: &str = "token";
const NAME_PARAM: &str = "name[]";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Parameters of one pull, merged from the query string and a form body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PullParams {
    pub token: Option<String>,
    pub names: Vec<String>,
}

impl PullParams {
    pub fn parse(query: &str, form_body: Option<&[u8]>) -> Self {
        let mut params = Self::default();
        params.absorb(query.as_bytes());
        if let Some(body) = form_body {
            params.absorb(body);
        }
        params
    }

    fn absorb(&mut self, input: &[u8]) {
        for (key, value) in form_urlencoded::parse(input) {
            match key.as_ref() {
                TOKEN_PARAM if self.token.is_none() => self.token = Some(value.into_owned()),
                NAME_PARAM => self.names.push(value.into_owned()),
                _ => {}
            }
        }
    }
}

pub struct MetricsService;

impl MetricsService {
    pub async fn pull(
        req: HttpRequest,
        body: web::Bytes,
        state: web::Data<ExporterState>,
    ) -> HttpResponse {
        let form_body = (req.method() == Method::POST && req.content_type() == FORM_CONTENT_TYPE)
            .then_some(&body[..]);
        let params = PullParams::parse(req.query_string(), form_body);

        let expected = state.tokens.get_token();
        if !expected.trim().is_empty() {
            let supplied = params.token.as_deref().unwrap_or_default();
            if !constant_time_eq(supplied, &expected) {
                debug!("Rejected metrics pull with invalid token");
                return HttpResponse::Unauthorized().finish();
            }
        }

        let snapshot = state.registry.collect_all();
        let filter = NameFilter::from_names(params.names);
        let families = filter.apply(snapshot.families);
        trace!("Serving {} metric families", families.len());

        match encode_text(&families) {
            Ok(output) => HttpResponse::Ok().content_type(CONTENT_TYPE).body(output),
            Err(e) => {
                error!("Failed to render metrics: {}", e);
                HttpResponse::InternalServerError()
                    .content_type("text/plain; charset=utf-8")
                    .body(e.format_simple())
            }
        }
    }
}

/// GET and POST on the configured endpoint.
pub fn metrics_routes(endpoint: &str) -> actix_web::Resource {
    web::resource(endpoint)
        .route(web::get().to(MetricsService::pull))
        .route(web::post().to(MetricsService::pull))
}
