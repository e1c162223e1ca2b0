use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{AtomicSettings, Config, ServerSettings};

/// Loads the application configuration.
///
/// This function is the primary entry point for this crate. It reads the
/// optional `config.toml` file, applies `ROWSTREAM_*` environment variable
/// overrides (e.g. `ROWSTREAM_SERVER__LISTEN_ADDR`), and deserializes the
/// result into our strongly-typed `Config` struct.
pub fn load_config() -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        // Tells the builder to look for a file named `config.toml`;
        // the service runs on defaults when it is absent.
        .add_source(config::File::with_name("config.toml").required(false))
        .add_source(config::Environment::with_prefix("ROWSTREAM").separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;

    Ok(config)
}
