use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use psd2_payment_engine::{
    AuthorityOptions,
    AuthorizeHandler,
    ChallengeHandler,
    FinalizeHandler,
    IdempotencyCache,
    MemorySessionStore,
    PaymentAuthority,
    ProcessingApi,
    OP_AUTHORIZE,
    OP_CHALLENGE,
    OP_FINALIZE,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::open_banking::OpenBankingApi,
    routes::{health, login_page, login_success_page, process_payment, AuthRedirectRoute, InitiateLoginRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let store = MemorySessionStore::new();
    let bank = OpenBankingApi::new(config.bank.clone())?;
    let processing = web::Data::new(build_processing_api(&config));
    start_expiry_worker(store.clone(), processing.clone().into_inner(), config.session_timeout);
    let srv = create_server_instance(config, store, bank, processing)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Builds the operation registry the dispatcher routes processing calls through. Each operation
/// gets its own handler over the shared payment authority; the idempotency cache in front of them
/// is shared across all server workers, so duplicate suppression is process-wide.
pub fn build_processing_api(config: &ServerConfig) -> ProcessingApi {
    let authority = Arc::new(PaymentAuthority::new(AuthorityOptions {
        bank_common_name: config.bank.common_name.clone(),
        rba_threshold: config.rba_threshold,
        bounds: config.bounds,
        ..Default::default()
    }));
    let cache = IdempotencyCache::new(config.replay_window, config.max_replay_entries);
    ProcessingApi::new(cache)
        .register(OP_AUTHORIZE, AuthorizeHandler(authority.clone()))
        .register(OP_CHALLENGE, ChallengeHandler(authority.clone()))
        .register(OP_FINALIZE, FinalizeHandler(authority))
}

pub fn create_server_instance(
    config: ServerConfig,
    store: MemorySessionStore,
    bank: OpenBankingApi,
    processing: web::Data<ProcessingApi>,
) -> Result<Server, ServerError> {
    let options = web::Data::new(ServerOptions::from_config(&config));
    let store = web::Data::new(store);
    let bank = web::Data::new(bank);
    info!("💻️ Serving Open-Banking logins for '{}'", config.bank.common_name);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ppg::access_log"))
            .app_data(processing.clone())
            .app_data(options.clone())
            .app_data(store.clone())
            .app_data(bank.clone())
            .service(health)
            .service(login_page)
            .service(login_success_page)
            .service(InitiateLoginRoute::<MemorySessionStore, OpenBankingApi>::new())
            .service(AuthRedirectRoute::<MemorySessionStore, OpenBankingApi>::new())
            .service(process_payment)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
