use config::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub password: PasswordSettings,
}

/// Runtime environment; development mode surfaces internal error details.
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub environment: Environment,
    /// Seconds between expired-session sweeps; 0 disables the sweep
    #[serde(default)]
    pub session_sweep_interval: u64,
}

impl ApplicationSettings {
    /// Route prefix with a leading slash, e.g. `/api`
    pub fn scope_path(&self) -> String {
        let trimmed = self.api_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server-level connection, used to create throwaway test databases.
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_secret: String,
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days); also the session row lifetime
    pub issuer: String,
}

impl JwtSettings {
    /// Reject configurations the token issuer cannot safely run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.chars().count() < MIN_SECRET_LENGTH {
            return Err(invalid("jwt.access_secret must be at least 32 characters"));
        }
        if self.refresh_secret.chars().count() < MIN_SECRET_LENGTH {
            return Err(invalid("jwt.refresh_secret must be at least 32 characters"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(invalid("jwt.access_secret and jwt.refresh_secret must differ"));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(invalid("jwt token lifetimes must be positive"));
        }
        if self.access_token_expiry >= self.refresh_token_expiry {
            return Err(invalid(
                "jwt.access_token_expiry must be shorter than jwt.refresh_token_expiry",
            ));
        }
        if self.issuer.trim().is_empty() {
            return Err(invalid("jwt.issuer must not be empty"));
        }
        Ok(())
    }
}

/// Password hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
}

fn default_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl PasswordSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(4..=31).contains(&self.hash_cost) {
            return Err(invalid("password.hash_cost must be between 4 and 31"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Message(msg.to_string())
}

/// Load settings from `configuration.yaml` (optional) and `APP_*` environment
/// variables, e.g. `APP_JWT__ACCESS_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    settings.password.validate()?;
    Ok(settings)
}
