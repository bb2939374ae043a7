use actix_web::{http::header, test::TestRequest, web, web::ServiceConfig};
use log::*;
use psd2_payment_engine::session_objects::SessionId;

use super::{
    helpers::{send_request, test_options},
    mocks::{MockBank, MockSessions},
};
use crate::{
    data_objects::LoginRequest,
    routes::{login_page, InitiateLoginRoute},
};

fn configure_app(store: MockSessions, bank: MockBank) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(store))
            .app_data(web::Data::new(bank))
            .app_data(web::Data::new(test_options()))
            .service(login_page)
            .service(InitiateLoginRoute::<MockSessions, MockBank>::new());
    }
}

#[actix_web::test]
async fn login_page_is_served() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/account/login").to_request();
    let (status, _, body) = send_request(req, configure_app(MockSessions::new(), MockBank::new())).await;
    assert!(status.is_success());
    assert!(body.contains("form"), "was: {body}");
}

#[actix_web::test]
async fn post_creates_a_session_and_redirects_to_the_bank() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessions::new();
    store
        .expect_create_session()
        .withf(|ns| ns.bank_id == "sandbank" && ns.login_success_url == "/account/loginsuccess")
        .times(1)
        .returning(|_| Ok(SessionId::from("sess-42")));
    let mut bank = MockBank::new();
    bank.expect_authorization_url()
        .withf(|id| id.as_str() == "sess-42")
        .return_const("https://bank.example/authorize?state=sess-42".to_string());

    let req = TestRequest::post().uri("/account/login").set_form(LoginRequest::default()).to_request();
    let (status, headers, body) = send_request(req, configure_app(store, bank)).await;
    info!("Response body: {body}");
    assert_eq!(status.as_u16(), 303);
    assert_eq!(
        headers.get(header::LOCATION).unwrap().to_str().unwrap(),
        "https://bank.example/authorize?state=sess-42"
    );
}

#[actix_web::test]
async fn the_caller_can_pick_a_bank() {
    let _ = env_logger::try_init().ok();
    let mut store = MockSessions::new();
    store
        .expect_create_session()
        .withf(|ns| ns.bank_id == "other-bank" && ns.user_hint == "anna")
        .times(1)
        .returning(|_| Ok(SessionId::from("sess-43")));
    let mut bank = MockBank::new();
    bank.expect_authorization_url().return_const("https://bank.example/authorize?state=sess-43".to_string());

    let form = LoginRequest { user_hint: Some("anna".to_string()), bank_id: Some("other-bank".to_string()) };
    let req = TestRequest::post().uri("/account/login").set_form(form).to_request();
    let (status, _, _) = send_request(req, configure_app(store, bank)).await;
    assert_eq!(status.as_u16(), 303);
}
