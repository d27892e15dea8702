use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::configuration::Environment;

/// Installs the global subscriber. `RUST_LOG` controls the level (default
/// `info`); production emits JSON lines, development human-readable output.
/// Records from crates logging through `log` are bridged in as well.
pub fn init_telemetry(environment: Environment) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match environment {
        Environment::Production => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stdout)
                    .json(),
            )
            .init(),
        Environment::Development => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_target(false),
            )
            .init(),
    }
}
