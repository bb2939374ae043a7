use actix_web::{http::header, test::TestRequest, web, web::ServiceConfig};
use log::*;
use ppg_common::Secret;
use psd2_payment_engine::traits::{SessionStoreError, TokenExchangeError};

use super::{
    helpers::{open_session, send_request, test_options},
    mocks::{MockBank, MockSessions},
};
use crate::routes::AuthRedirectRoute;

fn configure_app(store: MockSessions, bank: MockBank) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(store))
            .app_data(web::Data::new(bank))
            .app_data(web::Data::new(test_options()))
            .service(AuthRedirectRoute::<MockSessions, MockBank>::new());
    }
}

#[actix_web::test]
async fn valid_session_exchanges_the_code_once_and_redirects() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessions::new();
    store.expect_fetch_session().returning(|id| Ok(open_session(id)));
    store.expect_begin_code_exchange().times(1).returning(|id| Ok(open_session(id)));
    store
        .expect_complete_code_exchange()
        .withf(|_, token| token.reveal() == "access-granted")
        .times(1)
        .returning(|_, _| Ok(()));
    let mut bank = MockBank::new();
    bank.expect_exchange_code()
        .withf(|code| code == "abc123")
        .times(1)
        .returning(|_| Ok(Secret::new("access-granted".to_string())));

    let req = TestRequest::get().uri("/api/redirect?state=sess-1&code=abc123").to_request();
    let (status, headers, body) = send_request(req, configure_app(store, bank)).await;
    info!("Response body: {body}");
    assert_eq!(status.as_u16(), 302);
    assert_eq!(headers.get(header::LOCATION).unwrap().to_str().unwrap(), "/account/loginsuccess");
}

#[actix_web::test]
async fn missing_code_fails_without_a_token_call() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessions::new();
    store.expect_fetch_session().returning(|id| Ok(open_session(id)));
    // No expectations on the bank mock: any outbound call panics the test
    let bank = MockBank::new();

    let req = TestRequest::get().uri("/api/redirect?state=sess-1").to_request();
    let (status, _, body) = send_request(req, configure_app(store, bank)).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("code"), "was: {body}");
}

#[actix_web::test]
async fn unknown_session_fails_the_same_way_every_time() {
    let _ = env_logger::try_init().ok();
    let mut bodies = Vec::new();
    for _ in 0..2 {
        let mut store = MockSessions::new();
        store.expect_fetch_session().times(1).returning(|_| Err(SessionStoreError::ExpiredOrInvalid));
        let req = TestRequest::get().uri("/api/redirect?state=gone&code=abc123").to_request();
        let (status, _, body) = send_request(req, configure_app(store, MockBank::new())).await;
        assert_eq!(status.as_u16(), 400);
        bodies.push(body);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert!(bodies[0].contains("expired or invalid"), "was: {}", bodies[0]);
}

#[actix_web::test]
async fn missing_state_is_a_session_error() {
    let _ = env_logger::try_init().ok();
    // No store or bank expectations: neither may be touched
    let req = TestRequest::get().uri("/api/redirect?code=abc123").to_request();
    let (status, _, body) = send_request(req, configure_app(MockSessions::new(), MockBank::new())).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("expired or invalid"), "was: {body}");
}

#[actix_web::test]
async fn overlapping_redirects_do_not_exchange_twice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessions::new();
    store.expect_fetch_session().returning(|id| Ok(open_session(id)));
    store.expect_begin_code_exchange().returning(|_| Err(SessionStoreError::ExchangeAlreadyStarted));
    let bank = MockBank::new();

    let req = TestRequest::get().uri("/api/redirect?state=sess-1&code=abc123").to_request();
    let (status, _, body) = send_request(req, configure_app(store, bank)).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("already been exchanged"), "was: {body}");
}

#[actix_web::test]
async fn failed_token_exchange_destroys_the_session() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessions::new();
    store.expect_fetch_session().returning(|id| Ok(open_session(id)));
    store.expect_begin_code_exchange().times(1).returning(|id| Ok(open_session(id)));
    store.expect_consume_session().times(1).returning(|id| Ok(open_session(id)));
    let mut bank = MockBank::new();
    bank.expect_exchange_code()
        .times(1)
        .returning(|_| Err(TokenExchangeError::Rejected("HTTP 400: invalid_grant".to_string())));

    let req = TestRequest::get().uri("/api/redirect?state=sess-1&code=stale").to_request();
    let (status, _, body) = send_request(req, configure_app(store, bank)).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("Could not obtain an access token"), "was: {body}");
}
