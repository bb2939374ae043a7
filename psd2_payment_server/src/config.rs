use std::{env, time::Duration};

use chrono::Duration as ChronoDuration;
use log::*;
use ppg_common::{helpers::parse_boolean_flag, MinorAmount, Secret};
use psd2_payment_engine::gateway::freshness::{
    FreshnessBounds,
    DEFAULT_MAX_AUTH_AGE_MS,
    DEFAULT_MAX_CLOCK_SKEW_MS,
};

const DEFAULT_PPG_HOST: &str = "127.0.0.1";
const DEFAULT_PPG_PORT: u16 = 8410;
const DEFAULT_SESSION_TIMEOUT_MINS: i64 = 30;
const DEFAULT_REPLAY_WINDOW_MS: u64 = 5 * 60 * 1000;
const DEFAULT_MAX_REPLAY_ENTRIES: usize = 10_000;
const DEFAULT_BANK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RBA_THRESHOLD_MINOR: i64 = 100_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The public base URL of this gateway. The bank redirects the browser back to the fixed
    /// relative path `api/redirect` under this base.
    pub public_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
    /// When true, every inbound and outbound processing document is logged verbatim. Best-effort
    /// tracing for audit and debugging.
    pub log_payloads: bool,
    /// Sessions older than this are destroyed by the expiry worker.
    pub session_timeout: ChronoDuration,
    /// How long a completed response is replayed to duplicate requests.
    pub replay_window: Duration,
    pub max_replay_entries: usize,
    /// Clock-skew and authentication-age limits applied to client-supplied timestamps.
    pub bounds: FreshnessBounds,
    /// Amounts at or above this (in minor units) trigger the RBA step-up challenge.
    pub rba_threshold: MinorAmount,
    /// Open-Banking sandbox connection details.
    pub bank: BankConfig,
}

#[derive(Clone, Debug)]
pub struct BankConfig {
    /// Identifier of the bank a login is initiated against when the caller doesn't pick one.
    pub bank_id: String,
    /// The bank identity included in every processing response.
    pub common_name: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// The bank's user-authorization endpoint.
    pub auth_url: String,
    /// The bank's OAuth2 token endpoint.
    pub token_url: String,
    /// Where the bank sends the browser back to: `<public_url>/api/redirect`.
    pub redirect_url: String,
    /// Where the browser goes after a completed code exchange.
    pub login_success_url: String,
    pub call_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PPG_HOST.to_string(),
            port: DEFAULT_PPG_PORT,
            public_url: format!("http://{DEFAULT_PPG_HOST}:{DEFAULT_PPG_PORT}"),
            use_x_forwarded_for: false,
            use_forwarded: false,
            log_payloads: false,
            session_timeout: ChronoDuration::minutes(DEFAULT_SESSION_TIMEOUT_MINS),
            replay_window: Duration::from_millis(DEFAULT_REPLAY_WINDOW_MS),
            max_replay_entries: DEFAULT_MAX_REPLAY_ENTRIES,
            bounds: FreshnessBounds::default(),
            rba_threshold: MinorAmount::from(DEFAULT_RBA_THRESHOLD_MINOR),
            bank: BankConfig::default(),
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            bank_id: "sandbank".to_string(),
            common_name: "Open Banking Sandbox Bank".to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            auth_url: "https://psd2.sandbox.example-bank.com/oauth2/authorize".to_string(),
            token_url: "https://psd2.sandbox.example-bank.com/oauth2/token".to_string(),
            redirect_url: format!("http://{DEFAULT_PPG_HOST}:{DEFAULT_PPG_PORT}/api/redirect"),
            login_success_url: "/account/loginsuccess".to_string(),
            call_timeout: Duration::from_secs(DEFAULT_BANK_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PPG_HOST").ok().unwrap_or_else(|| DEFAULT_PPG_HOST.into());
        let port = env::var("PPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PPG_PORT. {e} Using the default, {DEFAULT_PPG_PORT}, instead."
                    );
                    DEFAULT_PPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PPG_PORT);
        let public_url = env::var("PPG_PUBLIC_URL").ok().unwrap_or_else(|| {
            info!("🪛️ PPG_PUBLIC_URL is not set. Assuming the server is reached at http://{host}:{port}.");
            format!("http://{host}:{port}")
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("PPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("PPG_USE_FORWARDED").ok(), false);
        let log_payloads = parse_boolean_flag(env::var("PPG_LOG_PAYLOADS").ok(), false);
        let session_timeout = duration_from_env("PPG_SESSION_TIMEOUT_MINS", DEFAULT_SESSION_TIMEOUT_MINS, ChronoDuration::minutes);
        let replay_window = env::var("PPG_REPLAY_WINDOW_MS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for PPG_REPLAY_WINDOW_MS. {e}"))
                    .ok()
            })
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_REPLAY_WINDOW_MS));
        let max_replay_entries = env::var("PPG_MAX_REPLAY_ENTRIES")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for PPG_MAX_REPLAY_ENTRIES. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MAX_REPLAY_ENTRIES);
        let bounds = FreshnessBounds {
            max_clock_skew: duration_from_env("PPG_MAX_CLOCK_SKEW_MS", DEFAULT_MAX_CLOCK_SKEW_MS, ChronoDuration::milliseconds),
            max_auth_age: duration_from_env("PPG_MAX_AUTH_AGE_MS", DEFAULT_MAX_AUTH_AGE_MS, ChronoDuration::milliseconds),
        };
        let rba_threshold = env::var("PPG_RBA_THRESHOLD")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for PPG_RBA_THRESHOLD. {e}"))
                    .ok()
            })
            .map(MinorAmount::from)
            .unwrap_or_else(|| MinorAmount::from(DEFAULT_RBA_THRESHOLD_MINOR));
        let bank = BankConfig::from_env_or_defaults(&public_url);
        Self {
            host,
            port,
            public_url,
            use_x_forwarded_for,
            use_forwarded,
            log_payloads,
            session_timeout,
            replay_window,
            max_replay_entries,
            bounds,
            rba_threshold,
            bank,
        }
    }
}

impl BankConfig {
    pub fn from_env_or_defaults(public_url: &str) -> Self {
        let defaults = BankConfig::default();
        let bank_id = env::var("PPG_BANK_ID").ok().unwrap_or(defaults.bank_id);
        let common_name = env::var("PPG_BANK_COMMON_NAME").ok().unwrap_or(defaults.common_name);
        let client_id = env::var("PPG_BANK_CLIENT_ID").ok().unwrap_or_else(|| {
            error!("🪛️ PPG_BANK_CLIENT_ID is not set. Please set it to the client id of your Open-Banking app.");
            String::default()
        });
        let client_secret = env::var("PPG_BANK_CLIENT_SECRET").map(Secret::new).unwrap_or_else(|_| {
            error!(
                "🪛️ PPG_BANK_CLIENT_SECRET is not set. Please set it to the client secret of your Open-Banking app."
            );
            Secret::default()
        });
        let auth_url = env::var("PPG_BANK_AUTH_URL").ok().unwrap_or(defaults.auth_url);
        let token_url = env::var("PPG_BANK_TOKEN_URL").ok().unwrap_or(defaults.token_url);
        let login_success_url = env::var("PPG_LOGIN_SUCCESS_URL").ok().unwrap_or(defaults.login_success_url);
        let call_timeout = env::var("PPG_BANK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for PPG_BANK_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(defaults.call_timeout);
        // The redirect path is fixed; only the base URL is configurable.
        let redirect_url = format!("{}/api/redirect", public_url.trim_end_matches('/'));
        Self {
            bank_id,
            common_name,
            client_id,
            client_secret,
            auth_url,
            token_url,
            redirect_url,
            login_success_url,
            call_timeout,
        }
    }
}

fn duration_from_env(var: &str, default: i64, to_duration: fn(i64) -> ChronoDuration) -> ChronoDuration {
    env::var(var)
        .map_err(|_| trace!("🪛️ {var} is not set. Using the default value of {default}."))
        .and_then(|s| {
            s.parse::<i64>()
                .map(to_duration)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or_else(|| to_duration(default))
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that request handlers need. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the
/// system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub log_payloads: bool,
    pub default_bank_id: String,
    pub login_success_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            log_payloads: config.log_payloads,
            default_bank_id: config.bank.bank_id.clone(),
            login_success_url: config.bank.login_success_url.clone(),
        }
    }
}
