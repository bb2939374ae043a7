use actix_web::{
    body::MessageBody,
    http::{header::HeaderMap, StatusCode},
    test,
    web::ServiceConfig,
    App,
};
use psd2_payment_engine::session_objects::{NewSession, OpenBankingSession, SessionId};

use crate::config::ServerOptions;

pub fn test_options() -> ServerOptions {
    ServerOptions {
        use_x_forwarded_for: false,
        use_forwarded: false,
        log_payloads: false,
        default_bank_id: "sandbank".to_string(),
        login_success_url: "/account/loginsuccess".to_string(),
    }
}

pub fn open_session(id: &SessionId) -> OpenBankingSession {
    OpenBankingSession::new(
        id.clone(),
        NewSession {
            user_hint: "anna".to_string(),
            bank_id: "sandbank".to_string(),
            login_success_url: "/account/loginsuccess".to_string(),
        },
    )
}

pub async fn send_request(
    req: actix_http::Request,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, HeaderMap, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::call_service(&service, req).await.into_parts();
    let status = res.status();
    let headers = res.headers().clone();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, headers, body)
}
