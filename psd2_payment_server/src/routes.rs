//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Note that the processing and redirect handlers await their downstream calls (token exchange,
//! operation handlers) rather than blocking, so worker threads keep serving other requests while a
//! bank call is in flight. The gateway imposes no concurrency limit of its own; admission control
//! is the embedding server's job.

use actix_web::{
    get,
    http::header::{self, ContentType},
    post,
    web,
    HttpRequest,
    HttpResponse,
    Responder,
};
use log::*;
use psd2_payment_engine::{
    session_objects::{NewSession, SessionId},
    CallerContext,
    ProcessingApi,
    ProcessingError,
    ProcessingRequest,
    SessionStore,
    SessionStoreError,
    TokenExchange,
};

use crate::{
    config::ServerOptions,
    data_objects::{LoginRequest, RedirectParams},
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Login initiation  -------------------------------------------

/// The page itself is a stand-in - page rendering lives outside this gateway. It only has to let
/// a human kick off the POST below.
#[get("/account/login")]
pub async fn login_page() -> impl Responder {
    HttpResponse::Ok().content_type(ContentType::html()).body(
        "<html><body><p>The sandbox login accepts any input.</p>\
         <form method=\"post\" action=\"/account/login\"><button>Authorize/Login</button></form>\
         </body></html>\n",
    )
}

/// Shown after a completed code exchange. Real deployments point `PPG_LOGIN_SUCCESS_URL`
/// somewhere better.
#[get("/account/loginsuccess")]
pub async fn login_success_page() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body("<html><body><p>Login successful. You can now authorize payments.</p></body></html>\n")
}

route!(initiate_login => Post "/account/login" impl SessionStore, TokenExchange);
/// Creates a session between this gateway and the Open-Banking service for a specific user, then
/// sends the browser off to the bank's user-authentication page.
///
/// The sandbox only supports a single user, but the session is created anyway so the flow matches
/// a production setup against a multi-user Open-Banking API. The fresh session id rides along as
/// the OAuth2 `state` parameter and comes back to us on the `api/redirect` path.
pub async fn initiate_login<S, X>(
    body: web::Form<LoginRequest>,
    store: web::Data<S>,
    bank: web::Data<X>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    S: SessionStore,
    X: TokenExchange,
{
    let login = body.into_inner();
    let new_session = NewSession {
        user_hint: login.user_hint.unwrap_or_default(),
        bank_id: login.bank_id.unwrap_or_else(|| options.default_bank_id.clone()),
        login_success_url: options.login_success_url.clone(),
    };
    let session_id = store.create_session(new_session).await?;
    let url = bank.authorization_url(&session_id);
    info!("💻️ Login initiated; sending the browser to the bank for authentication");
    Ok(HttpResponse::SeeOther().insert_header((header::LOCATION, url)).finish())
}

//----------------------------------------------   OAuth2 redirect  --------------------------------------------

route!(auth_redirect => Get "/api/redirect" impl SessionStore, TokenExchange);
/// The bank redirects the browser here after a successful user authentication.
///
/// The `state` parameter carries the session id issued at login initiation; the `code` parameter
/// is the authorization code to upgrade. The code exchange is attempted at most once per session:
/// an overlapping or repeated redirect fails at the session store before any outbound call is
/// made, and a replayed code is the bank's token endpoint's to reject.
pub async fn auth_redirect<S, X>(
    query: web::Query<RedirectParams>,
    store: web::Data<S>,
    bank: web::Data<X>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    S: SessionStore,
    X: TokenExchange,
{
    let params = query.into_inner();
    // Check that we still have a session before looking at anything else
    let session_id: SessionId =
        params.state.map(SessionId::from).ok_or(ServerError::SessionError(SessionStoreError::ExpiredOrInvalid))?;
    let session = store.fetch_session(&session_id).await?;

    // We should now have the "code" parameter
    let code = params.code.ok_or(ServerError::MissingAuthorizationCode)?;
    if options.log_payloads {
        info!("💻️ code={code}");
    }

    // We got the code, now we need to upgrade it to an OAuth2 access token
    store.begin_code_exchange(&session_id).await?;
    match bank.exchange_code(&code).await {
        Ok(token) => store.complete_code_exchange(&session_id, token).await?,
        Err(e) => {
            // A session whose exchange failed is unusable; destroy it so the user restarts cleanly
            warn!("💻️ Token exchange failed for session {session_id}; destroying the session");
            let _ = store.consume_session(&session_id).await;
            return Err(e.into());
        },
    }

    // Go to the designated URL
    debug!("💻️ Code exchange complete; redirecting the browser to {}", session.login_success_url);
    Ok(HttpResponse::Found().insert_header((header::LOCATION, session.login_success_url)).finish())
}

//----------------------------------------------   Processing  -------------------------------------------------

/// The server-to-server payment-processing endpoint.
///
/// The envelope contract: the body must be tagged and parse as a JSON object. Caller metadata is
/// captured before any parsing so that every failure message can name the caller. On success the
/// handler's document is written verbatim with a JSON content type; every failure converges on
/// [`ServerError`]'s single plain-text responder.
#[post("/processing/{operation}")]
pub async fn process_payment(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<ProcessingApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let operation = path.into_inner();
    let caller = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "<unknown>".to_string());
    let ctx = CallerContext::new(caller, req.uri().to_string());
    trace!("🔄️ Received '{operation}' processing call from {}", ctx.caller_address);

    let content_type = req.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !content_type.contains("json") {
        let e = ProcessingError::MalformedRequest(format!("Content-Type must indicate JSON, was '{content_type}'"));
        return Err(ServerError::from_processing(&ctx, e));
    }
    let request = ProcessingRequest::from_slice(&body).map_err(|e| ServerError::from_processing(&ctx, e))?;
    if options.log_payloads {
        info!("🔄️ Call from {} with data:\n{}", ctx.caller_address, request.canonical());
    }

    let response = api.process(&ctx, &operation, request).await.map_err(|e| ServerError::from_processing(&ctx, e))?;
    if options.log_payloads {
        info!("🔄️ Responding to {} with data:\n{}", ctx.caller_address, response.to_body());
    }
    Ok(HttpResponse::Ok().content_type(ContentType::json()).body(response.to_body()))
}
