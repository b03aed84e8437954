//! Configuration: exactly two environment variables — an API key and
//! an organization id for the oracle provider. No other configuration
//! surface.

/// Errors from loading oracle credentials out of the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    MissingEnvVar(&'static str),
}

/// Oracle credentials loaded from the environment.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub organization: Option<String>,
}

impl OracleConfig {
    /// Loads `OPENAI_API_KEY` (required) and `OPENAI_ORG_ID` (optional)
    /// from the process environment, after attempting to load a local
    /// `.env` file (a no-op if one isn't present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY"))?;
        let organization = std::env::var("OPENAI_ORG_ID").ok();
        Ok(OracleConfig {
            api_key,
            organization,
        })
    }
}
