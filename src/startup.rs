use actix_web::dev::Server;
use actix_web::{error, web, App, HttpServer};
use chrono::Utc;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::auth::{AuthService, TokenIssuer};
use crate::configuration::ApplicationSettings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{Authorization, ErrorDetails, JwtMiddleware};
use crate::routes::{
    current_user, delete_user, get_user, grant_premium, health_check, list_users, login, logout,
    not_found, premium_status, refresh, register, toggle_user_status, user_stats,
};
use crate::store::{Role, SessionStore, Stores, UserStore};

pub fn run(
    listener: TcpListener,
    application: ApplicationSettings,
    auth: AuthService,
    stores: Stores,
) -> Result<Server, std::io::Error> {
    let environment = application.environment;
    let scope_path = application.scope_path();
    let tokens = auth.tokens().clone();

    let auth = web::Data::new(auth);
    let users: web::Data<dyn UserStore> = web::Data::from(stores.users.clone());
    let sessions: web::Data<dyn SessionStore> = web::Data::from(stores.sessions.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(ErrorDetails::new(environment))
            .wrap(LoggerMiddleware)
            // Extractor failures use the standard error envelope
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            // Shared state
            .app_data(auth.clone())
            .app_data(users.clone())
            .app_data(sessions.clone())
            .route("/health_check", web::get().to(health_check))
            .service(web::scope(&scope_path).configure(|cfg| {
                api_routes(cfg, &tokens, stores.users.clone())
            }))
            .default_service(web::route().to(not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

fn api_routes(cfg: &mut web::ServiceConfig, tokens: &TokenIssuer, users: Arc<dyn UserStore>) {
    // In actix the last `wrap` runs first: JwtMiddleware precedes Authorization
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .service(
                web::resource("/logout")
                    .wrap(JwtMiddleware::new(tokens.clone()))
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/me")
                    .wrap(JwtMiddleware::new(tokens.clone()))
                    .route(web::get().to(current_user)),
            ),
    )
    .service(
        web::scope("/admin")
            .wrap(Authorization::require_roles(&[Role::Admin]))
            .wrap(JwtMiddleware::new(tokens.clone()))
            .route("/stats", web::get().to(user_stats))
            .route("/users", web::get().to(list_users))
            .route("/users/{id}", web::get().to(get_user))
            .route("/users/{id}", web::delete().to(delete_user))
            .route("/users/{id}/toggle-status", web::put().to(toggle_user_status))
            .route("/users/{id}/grant-premium", web::put().to(grant_premium)),
    )
    .service(
        web::scope("/premium")
            .wrap(Authorization::require_premium(users))
            .wrap(JwtMiddleware::new(tokens.clone()))
            .route("/status", web::get().to(premium_status)),
    );
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let reason = match &err {
            error::JsonPayloadError::ContentType => "expected an application/json body".to_string(),
            other => other.to_string(),
        };
        AppError::from(ValidationError::MalformedBody(reason)).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|_err, _req| AppError::from(ValidationError::InvalidFormat("id".into())).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::from(ValidationError::MalformedBody(err.to_string())).into()
    })
}

/// Periodically delete sessions whose expiry has passed. Expired rows are
/// already rejected on refresh; this only reclaims storage.
pub fn spawn_session_sweeper(sessions: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match sessions.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Expired sessions purged"),
                Err(e) => tracing::error!(error = %e, "Session sweep failed"),
            }
        }
    })
}
