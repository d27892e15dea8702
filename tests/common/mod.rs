#![allow(dead_code)]

use std::net::TcpListener;

use gita_auth::auth::{hash_password, AuthService, TokenIssuer};
use gita_auth::configuration::{
    get_configuration, ApplicationSettings, DatabaseSettings, Environment, JwtSettings,
};
use gita_auth::startup::run;
use gita_auth::store::{NewUser, Role, Stores, User};
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};

pub const TEST_HASH_COST: u32 = 4;
pub const PASSWORD: &str = "Password1!";

pub struct TestApp {
    pub address: String,
    pub stores: Stores,
    pub client: reqwest::Client,
}

/// Run the server on a random port with in-memory stores.
pub async fn spawn_app() -> TestApp {
    spawn_app_in(Environment::Production).await
}

/// In-memory stores, with the error rendering of `environment`.
pub async fn spawn_app_in(environment: Environment) -> TestApp {
    serve(environment, Stores::in_memory()).await
}

/// Run against a fresh, migrated Postgres database.
pub async fn spawn_pg_app() -> TestApp {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    serve(Environment::Production, Stores::postgres(connection_pool)).await
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn serve(environment: Environment, stores: Stores) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let application = ApplicationSettings {
        host: "127.0.0.1".to_string(),
        port,
        api_prefix: "api".to_string(),
        environment,
        session_sweep_interval: 0,
    };
    let jwt = JwtSettings {
        access_secret: "integration-access-secret-0123456789abcdef".to_string(),
        access_token_expiry: 900,
        refresh_secret: "integration-refresh-secret-0123456789abcdef".to_string(),
        refresh_token_expiry: 604800,
        issuer: "gita_auth".to_string(),
    };

    let auth = AuthService::new(
        stores.users.clone(),
        stores.sessions.clone(),
        TokenIssuer::new(&jwt),
        TEST_HASH_COST,
    )
    .expect("Failed to build auth service");

    let server = run(listener, application, auth, stores.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        stores,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.get(self.url(path)), token)
    }

    pub fn put(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.put(self.url(path)), token)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.delete(self.url(path)), token)
    }

    pub async fn post_json(&self, path: &str, body: &Value, token: Option<&str>) -> Response {
        with_token(self.client.post(self.url(path)), token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Response {
        self.post_json(
            "/auth/register",
            &json!({ "name": name, "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Register and return the `data` payload (tokens + user)
    pub async fn register_user(&self, name: &str, email: &str) -> Value {
        let response = self.register(name, email, PASSWORD).await;
        assert_eq!(201, response.status().as_u16());
        body(response).await["data"].clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_json(
            "/auth/login",
            &json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response {
        self.post_json("/auth/refresh", &json!({ "refreshToken": refresh_token }), None)
            .await
    }

    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Response {
        self.post_json(
            "/auth/logout",
            &json!({ "refreshToken": refresh_token }),
            Some(access_token),
        )
        .await
    }

    /// Seed an admin directly in the store and log in; returns the access token.
    pub async fn admin_token(&self, email: &str) -> String {
        self.stores
            .users
            .insert(NewUser {
                name: "Site Admin".to_string(),
                email: email.to_string(),
                password_hash: hash_password(PASSWORD, TEST_HASH_COST).unwrap(),
                role: Role::Admin,
            })
            .await
            .expect("Failed to seed admin");

        let response = self.login(email, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        token(&body(response).await, "accessToken")
    }

    pub async fn user_by_email(&self, email: &str) -> User {
        self.stores
            .users
            .find_by_email(email)
            .await
            .unwrap()
            .expect("user exists")
    }
}

fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

pub async fn body(response: Response) -> Value {
    response.json().await.expect("Failed to parse response")
}

/// Read `data.<field>` (or `<field>` on an already unwrapped payload)
pub fn token(payload: &Value, field: &str) -> String {
    payload["data"][field]
        .as_str()
        .or_else(|| payload[field].as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", field, payload))
        .to_string()
}
