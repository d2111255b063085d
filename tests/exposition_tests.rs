//! Pull endpoint tests
//!
//! Token gate, `name[]` filtering and GET/POST parity of the metrics route.

use actix_web::http::StatusCode;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use std::sync::Arc;

use atlas_exporter::api::configure_routes;
use atlas_exporter::config::{MemorySettingsStore, SettingsStore, StaticConfig};
use atlas_exporter::errors::Result;
use atlas_exporter::metrics::{MetricEvent, CONTENT_TYPE as EXPOSITION_CONTENT_TYPE};
use atlas_exporter::runtime::lifetime::startup::{ExporterContext, prepare_exporter_with};
use atlas_exporter::scrape::SizeComputer;

// =============================================================================
// Test Setup
// =============================================================================

struct FixedSize;

impl SizeComputer for FixedSize {
    fn compute(&self) -> Result<u64> {
        Ok(4096)
    }
}

async fn exporter(token: &str) -> (StaticConfig, ExporterContext) {
    let config = StaticConfig::default();
    let store = MemorySettingsStore::arc();
    if !token.is_empty() {
        store.put("securityToken", token).unwrap();
    }
    let context = prepare_exporter_with(&config, store, Arc::new(FixedSize))
        .await
        .expect("exporter should start");
    (config, context)
}

macro_rules! app {
    ($config:expr, $context:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($context.state.clone()))
                .configure(|cfg| configure_routes(cfg, &$config.metrics, &$config.api)),
        )
        .await
    };
}

fn record_some_events(context: &ExporterContext) {
    context.recorder.record(&MetricEvent::UserLogin {
        username: "admin".into(),
    });
    context.recorder.record(&MetricEvent::IssueViewed {
        project_key: "PROJ".into(),
        username: "admin".into(),
    });
}

// =============================================================================
// Token gate
// =============================================================================

#[tokio::test]
async fn test_no_token_configured_serves_everyone() {
    let (config, context) = exporter("").await;
    record_some_events(&context);
    let app = app!(config, context);

    let req = TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        EXPOSITION_CONTENT_TYPE
    );

    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("jira_user_login_count{username=\"admin\"} 1"));
    assert!(text.contains("jira_uptime_seconds_gauge"));
    context.scheduler.stop();
}

#[tokio::test]
async fn test_wrong_or_missing_token_is_401_with_empty_body() {
    let (config, context) = exporter("s3cret").await;
    let app = app!(config, context);

    for uri in ["/metrics", "/metrics?token=wrong", "/metrics?token="] {
        let req = TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "uri {}", uri);
        let body = test::read_body(resp).await;
        assert!(body.is_empty());
    }
    context.scheduler.stop();
}

#[tokio::test]
async fn test_correct_token_is_accepted() {
    let (config, context) = exporter("s3cret").await;
    let app = app!(config, context);

    let req = TestRequest::get()
        .uri("/metrics?token=s3cret")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    context.scheduler.stop();
}

#[tokio::test]
async fn test_blank_stored_token_means_no_auth() {
    let (config, context) = exporter("   ").await;
    let app = app!(config, context);

    let req = TestRequest::get().uri("/metrics?token=anything").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    context.scheduler.stop();
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_name_filter_limits_families() {
    let (config, context) = exporter("").await;
    record_some_events(&context);
    let app = app!(config, context);

    let req = TestRequest::get()
        .uri("/metrics?name%5B%5D=jira_user_login_count")
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("jira_user_login_count"));
    assert!(!text.contains("jira_issue_view_count"));
    assert!(!text.contains("jira_uptime_seconds_gauge"));
    context.scheduler.stop();
}

#[tokio::test]
async fn test_unknown_name_yields_empty_output() {
    let (config, context) = exporter("").await;
    let app = app!(config, context);

    let req = TestRequest::get()
        .uri("/metrics?name[]=does_not_exist")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
    context.scheduler.stop();
}

// =============================================================================
// POST parity
// =============================================================================

#[tokio::test]
async fn test_post_form_behaves_like_get() {
    let (config, context) = exporter("s3cret").await;
    record_some_events(&context);
    let app = app!(config, context);

    let req = TestRequest::post()
        .uri("/metrics")
        .insert_header((CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("token=s3cret&name%5B%5D=jira_issue_view_count")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(text.contains("jira_issue_view_count{projectKey=\"PROJ\",username=\"admin\"} 1"));
    assert!(!text.contains("jira_user_login_count"));

    let req = TestRequest::post()
        .uri("/metrics")
        .insert_header((CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("token=wrong")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    context.scheduler.stop();
}

#[tokio::test]
async fn test_other_methods_are_not_routed() {
    let (config, context) = exporter("").await;
    let app = app!(config, context);

    let req = TestRequest::delete().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
    context.scheduler.stop();
}
