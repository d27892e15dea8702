use gita_auth::auth::{AuthService, TokenIssuer};
use gita_auth::configuration::get_configuration;
use gita_auth::startup::{run, spawn_session_sweeper};
use gita_auth::store::Stores;
use gita_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::io::{Error, ErrorKind};
use std::net::TcpListener;
use std::time::Duration;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // The subscriber format depends on the environment, so configuration comes first
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        Error::new(ErrorKind::InvalidInput, "Configuration error")
    })?;

    init_telemetry(configuration.application.environment);
    tracing::info!(
        environment = ?configuration.application.environment,
        "Configuration loaded successfully"
    );

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            Error::new(ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        Error::new(ErrorKind::Other, "Migration error")
    })?;
    tracing::info!("Database ready");

    let stores = Stores::postgres(pool);
    let auth = AuthService::new(
        stores.users.clone(),
        stores.sessions.clone(),
        TokenIssuer::new(&configuration.jwt),
        configuration.password.hash_cost,
    )
    .map_err(|e| {
        tracing::error!("Failed to initialise auth service: {}", e);
        Error::new(ErrorKind::Other, "Auth service error")
    })?;

    let sweep_interval = configuration.application.session_sweep_interval;
    if sweep_interval > 0 {
        spawn_session_sweeper(stores.sessions.clone(), Duration::from_secs(sweep_interval));
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, configuration.application, auth, stores)?.await
}
