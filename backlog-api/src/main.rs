use crate::{
    clerk::ClerkAuthenticator,
    config::{Config, ConfigError, CorsConfig},
    server::ServerState,
};
use axum::http::{HeaderValue, Method, header};
use backlog_db::client::{DbClient, DbError};
use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clerk;
mod config;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error connecting to the database: {0}")]
    Database(#[from] DbError),
    #[error("Error building the authentication client: {0}")]
    Authenticator(#[from] reqwest::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_app_env")]
    app_env: String,
    #[serde(default = "default_config_dir")]
    config_dir: PathBuf,
    #[serde(default = "default_server_address")]
    server_address: IpAddr,
    #[serde(default = "default_server_port")]
    server_port: u16,
}

fn default_app_env() -> String {
    "dev".to_owned()
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_server_port() -> u16 {
    8080
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "backlog_api=debug,\
                backlog_db=debug,\
                backlog_common=debug,\
                tower_http=debug,axum::rejection=trace,mongodb=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(origin) => Some(origin),
            Err(err) => {
                warn!(origin, error = %err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Cancels `token` on ctrl-c or, on unix, SIGTERM.
fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                warn!(error = %err, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("Received ctrl-c, shutting down");
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut terminate) => {
                    terminate.recv().await;
                    info!("Received terminate signal, shutting down");
                }
                Err(err) => {
                    warn!(error = %err, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let config = Config::load(&env.config_dir, &env.app_env)?;
    info!(app_env = %env.app_env, "Loaded configuration");

    let request_timeout = config.request_timeout().map_err(ConfigError::from)?;
    let db_client = Arc::new(DbClient::connect(&config.mongodb, request_timeout).await?);
    db_client.ensure_indexes().await?;

    let authenticator = Arc::new(ClerkAuthenticator::new(&config.clerk)?);

    let state = ServerState {
        db_client: Arc::clone(&db_client),
        authenticator,
    };

    let app = server::routes()
        .with_state(state)
        .layer(cors_layer(&config.cors))
        .layer(TraceLayer::new_for_http());

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    db_client.shutdown().await;
    info!("Shut down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Env, cors_layer, config::CorsConfig};
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn env_defaults() {
        let env: Env = envy::from_iter(Vec::<(String, String)>::new()).unwrap();

        assert_eq!(env.app_env, "dev");
        assert_eq!(env.config_dir.to_str(), Some("config"));
        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(env.server_port, 8080);
    }

    #[test]
    fn env_overrides() {
        let env: Env = envy::from_iter([
            ("APP_ENV".to_owned(), "prod".to_owned()),
            ("SERVER_PORT".to_owned(), "3000".to_owned()),
        ])
        .unwrap();

        assert_eq!(env.app_env, "prod");
        assert_eq!(env.server_port, 3000);
    }

    #[test]
    fn cors_skips_invalid_origins() {
        // Must not panic on a header value with a newline.
        let _layer = cors_layer(&CorsConfig {
            allowed_origins: vec!["https://ok.example.com".to_owned(), "bad\norigin".to_owned()],
        });
    }
}
