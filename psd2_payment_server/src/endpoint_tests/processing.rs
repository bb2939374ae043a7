use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use actix_web::{http::header, test::TestRequest, web, web::ServiceConfig};
use futures::{future::BoxFuture, FutureExt};
use log::*;
use psd2_payment_engine::{
    CallerContext,
    HandlerResult,
    IdempotencyCache,
    ProcessCall,
    ProcessingApi,
    ProcessingError,
    ProcessingRequest,
    ProcessingResponse,
};
use serde_json::{json, Value};

use super::helpers::{send_request, test_options};
use crate::routes::process_payment;

struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl ProcessCall for CountingHandler {
    fn process<'a>(
        &'a self,
        ctx: &'a CallerContext,
        _request: &'a ProcessingRequest,
    ) -> BoxFuture<'a, HandlerResult> {
        async move {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(ProcessingResponse::new(json!({ "status": "authorized", "caller": ctx.caller_address })))
        }
        .boxed()
    }
}

struct DecliningHandler;

impl ProcessCall for DecliningHandler {
    fn process<'a>(
        &'a self,
        _ctx: &'a CallerContext,
        _request: &'a ProcessingRequest,
    ) -> BoxFuture<'a, HandlerResult> {
        async { Err(ProcessingError::declined("Insufficient funds for this purchase")) }.boxed()
    }
}

fn test_api(count: Arc<AtomicUsize>) -> ProcessingApi {
    ProcessingApi::new(IdempotencyCache::new(Duration::from_secs(60), 100))
        .register("authorize", CountingHandler { count })
        .register("decline", DecliningHandler)
}

fn configure_app(api: ProcessingApi) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(api)).app_data(web::Data::new(test_options())).service(process_payment);
    }
}

fn post(path: &str, body: &str, content_type: Option<&str>) -> actix_http::Request {
    let mut req = TestRequest::post()
        .uri(path)
        .peer_addr("203.0.113.9:4000".parse().unwrap())
        .set_payload(body.to_string());
    if let Some(ct) = content_type {
        req = req.insert_header((header::CONTENT_TYPE, ct));
    }
    req.to_request()
}

#[actix_web::test]
async fn successful_calls_return_the_handler_document_as_json() {
    let _ = env_logger::try_init().ok();
    let count = Arc::new(AtomicUsize::new(0));
    let req = post("/processing/authorize", "{}", Some("application/json"));
    let (status, headers, body) = send_request(req, configure_app(test_api(count.clone()))).await;
    info!("Response body: {body}");
    assert_eq!(status.as_u16(), 200);
    assert!(headers.get(header::CONTENT_TYPE).unwrap().to_str().unwrap().contains("json"));
    let document: Value = serde_json::from_str(&body).expect("response body must be valid JSON");
    assert_eq!(document["status"], "authorized");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn non_json_bodies_never_reach_a_handler() {
    let _ = env_logger::try_init().ok();
    let count = Arc::new(AtomicUsize::new(0));
    let req = post("/processing/authorize", "this is not json", Some("application/json"));
    let (status, _, body) = send_request(req, configure_app(test_api(count.clone()))).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("From 203.0.113.9"), "was: {body}");
    assert!(body.contains("Malformed request"), "was: {body}");
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn wrong_content_type_never_reaches_a_handler() {
    let _ = env_logger::try_init().ok();
    let count = Arc::new(AtomicUsize::new(0));
    let req = post("/processing/authorize", "{}", Some("text/plain"));
    let (status, _, body) = send_request(req, configure_app(test_api(count.clone()))).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("Content-Type must indicate JSON"), "was: {body}");
    assert_eq!(count.load(Ordering::SeqCst), 0);

    let req = post("/processing/authorize", "{}", None);
    let (status, _, _) = send_request(req, configure_app(test_api(count.clone()))).await;
    assert_eq!(status.as_u16(), 400);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn declined_calls_carry_the_decline_message_and_the_caller() {
    let _ = env_logger::try_init().ok();
    let req = post("/processing/decline", "{}", Some("application/json"));
    let (status, _, body) = send_request(req, configure_app(test_api(Arc::new(AtomicUsize::new(0))))).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("Insufficient funds for this purchase"), "was: {body}");
    assert!(body.contains("From 203.0.113.9"), "was: {body}");
    assert!(body.contains("URL=/processing/decline"), "was: {body}");
}

#[actix_web::test]
async fn unknown_operations_are_hard_errors() {
    let _ = env_logger::try_init().ok();
    let req = post("/processing/transmogrify", "{}", Some("application/json"));
    let (status, _, body) = send_request(req, configure_app(test_api(Arc::new(AtomicUsize::new(0))))).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("Unknown operation 'transmogrify'"), "was: {body}");
}

#[actix_web::test]
async fn identical_retries_replay_the_first_response() {
    let _ = env_logger::try_init().ok();
    let count = Arc::new(AtomicUsize::new(0));
    let api = test_api(count.clone());
    let payload = r#"{"amount": 4200, "payee": "Space Shop"}"#;

    let app = actix_web::App::new().configure(configure_app(api));
    let service = actix_web::test::init_service(app).await;
    let mut bodies = Vec::new();
    for _ in 0..2 {
        let req = post("/processing/authorize", payload, Some("application/json"));
        let res = actix_web::test::call_service(&service, req).await;
        assert_eq!(res.status().as_u16(), 200);
        let body = actix_web::test::read_body(res).await;
        bodies.push(String::from_utf8_lossy(&body).into_owned());
    }
    // The second call was served from the replay cache: same body, one execution
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn the_real_operation_registry_authorizes_over_http() {
    let _ = env_logger::try_init().ok();
    let api = crate::server::build_processing_api(&crate::config::ServerConfig::default());
    let body = json!({
        "timeStamp": chrono::Utc::now().to_rfc3339(),
        "userAuthenticatedAt": chrono::Utc::now().to_rfc3339(),
        "accountId": "SE45 5000 0000 0583 9825 7466",
        "amount": 4500,
        "currency": "EUR",
        "payee": "Space Shop",
    })
    .to_string();
    let req = post("/processing/authorize", &body, Some("application/json"));
    let (status, _, res) = send_request(req, configure_app(api)).await;
    info!("Response body: {res}");
    assert_eq!(status.as_u16(), 200);
    let document: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(document["status"], "authorized");
    assert_eq!(document["provider"], "Open Banking Sandbox Bank");
}

#[actix_web::test]
async fn different_bodies_are_processed_independently() {
    let _ = env_logger::try_init().ok();
    let count = Arc::new(AtomicUsize::new(0));
    let api = test_api(count.clone());
    let app = actix_web::App::new().configure(configure_app(api));
    let service = actix_web::test::init_service(app).await;
    for payload in [r#"{"amount": 1}"#, r#"{"amount": 2}"#] {
        let req = post("/processing/authorize", payload, Some("application/json"));
        let res = actix_web::test::call_service(&service, req).await;
        assert_eq!(res.status().as_u16(), 200);
    }
    assert_eq!(count.load(Ordering::SeqCst), 2);
}
