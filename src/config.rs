use serde::Deserialize;

use crate::error::AppError;

/// Table layout and store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Pages table, keyed by (`userid`, `pageid`).
    pub page_table: String,
    /// Authorizations table, keyed by (`userid`, `pageid`).
    pub authorization_table: String,
    /// Secondary index on the authorizations table, keyed by `pageid`.
    pub authorization_page_index: String,
    /// The AWS region of the store.
    pub region: String,
    /// Optional custom endpoint (DynamoDB Local, LocalStack, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Settings {
    /// Load settings from built-in defaults, an optional `folio.toml` in the
    /// working directory, then `FOLIO_*` environment variables.
    ///
    /// Recognized variables:
    /// - `FOLIO_PAGE_TABLE`
    /// - `FOLIO_AUTHORIZATION_TABLE`
    /// - `FOLIO_AUTHORIZATION_PAGE_INDEX`
    /// - `FOLIO_REGION`
    /// - `FOLIO_ENDPOINT`
    pub fn from_env() -> Result<Self, AppError> {
        Self::load_with(config::Environment::with_prefix("FOLIO"))
    }

    /// Load settings with an explicit environment source.
    pub fn load_with(environment: config::Environment) -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("page_table", "pages")?
            .set_default("authorization_table", "authorizations")?
            .set_default("authorization_page_index", "pageid-index")?
            .set_default("region", "ca-central-1")?
            .add_source(config::File::with_name("folio").required(false))
            .add_source(environment)
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        if settings.page_table == settings.authorization_table {
            return Err(AppError::Configuration(format!(
                "Pages and authorizations cannot share table '{}'",
                settings.page_table
            )));
        }
        Ok(settings)
    }

    /// Build with explicit table names (useful for testing).
    pub fn new(page_table: impl Into<String>, authorization_table: impl Into<String>) -> Self {
        Self {
            page_table: page_table.into(),
            authorization_table: authorization_table.into(),
            authorization_page_index: "pageid-index".to_string(),
            region: "ca-central-1".to_string(),
            endpoint: None,
        }
    }
}
