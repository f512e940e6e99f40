//! Configuration resolution for the pairing service
//!
//! Credentials resolve with ENV → TOML priority; the first source holding a
//! non-blank value wins. Pipeline settings come straight from TOML.

use std::time::Duration;
use tracing::{info, warn};
use vinedine_common::config::TomlConfig;
use vinedine_common::{Error, Result};

use crate::services::{DispatchMode, OrchestratorSettings, SongSelectionStrategy};
use crate::utils::RetryPolicy;

pub const OPENAI_API_KEY_ENV: &str = "VINEDINE_OPENAI_API_KEY";
/// Conventional variable honoured after [`OPENAI_API_KEY_ENV`]
pub const OPENAI_API_KEY_FALLBACK_ENV: &str = "OPENAI_API_KEY";
pub const SPOTIFY_CLIENT_ID_ENV: &str = "VINEDINE_SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "VINEDINE_SPOTIFY_CLIENT_SECRET";

/// Catalog client credentials
#[derive(Clone)]
pub struct CatalogCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Validate a secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// First valid value among `(source name, value)` candidates, in order
fn resolve_secret(name: &str, candidates: Vec<(&str, Option<String>)>) -> Option<String> {
    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, value)| value.filter(|v| is_valid_key(v)).map(|v| (source, v)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    let (source, value) = valid.into_iter().next()?;
    info!("{} loaded from {}", name, source);
    Some(value.trim().to_string())
}

/// Generation API key
///
/// **Priority:** `VINEDINE_OPENAI_API_KEY` → `OPENAI_API_KEY` → TOML
pub fn resolve_openai_api_key(toml_config: &TomlConfig) -> Result<String> {
    resolve_secret(
        "OpenAI API key",
        vec![
            (OPENAI_API_KEY_ENV, std::env::var(OPENAI_API_KEY_ENV).ok()),
            (
                OPENAI_API_KEY_FALLBACK_ENV,
                std::env::var(OPENAI_API_KEY_FALLBACK_ENV).ok(),
            ),
            ("TOML", toml_config.generation.api_key.clone()),
        ],
    )
    .ok_or_else(|| {
        Error::Config(format!(
            "OpenAI API key not configured. Please configure using one of:\n\
             1. Environment: {}=your-key-here\n\
             2. TOML config: [generation] api_key = \"your-key\"",
            OPENAI_API_KEY_ENV
        ))
    })
}

/// Catalog client credentials
///
/// **Priority:** ENV → TOML, each value resolved on its own
pub fn resolve_catalog_credentials(toml_config: &TomlConfig) -> Result<CatalogCredentials> {
    let client_id = resolve_secret(
        "Spotify client id",
        vec![
            (SPOTIFY_CLIENT_ID_ENV, std::env::var(SPOTIFY_CLIENT_ID_ENV).ok()),
            ("TOML", toml_config.catalog.client_id.clone()),
        ],
    );
    let client_secret = resolve_secret(
        "Spotify client secret",
        vec![
            (
                SPOTIFY_CLIENT_SECRET_ENV,
                std::env::var(SPOTIFY_CLIENT_SECRET_ENV).ok(),
            ),
            ("TOML", toml_config.catalog.client_secret.clone()),
        ],
    );

    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(CatalogCredentials {
            client_id,
            client_secret,
        }),
        _ => Err(Error::Config(format!(
            "Spotify credentials not configured. Set {} and {}, or [catalog] client_id and \
             client_secret in the TOML config",
            SPOTIFY_CLIENT_ID_ENV, SPOTIFY_CLIENT_SECRET_ENV
        ))),
    }
}

/// Typed pipeline settings from the `[pipeline]` section
pub fn orchestrator_settings(toml_config: &TomlConfig) -> Result<OrchestratorSettings> {
    let pipeline = &toml_config.pipeline;
    let strategy: SongSelectionStrategy = pipeline.song_selection.parse().map_err(Error::Config)?;
    let dispatch: DispatchMode = pipeline.dispatch.parse().map_err(Error::Config)?;

    Ok(OrchestratorSettings {
        strategy,
        dispatch,
        rng_seed: pipeline.rng_seed,
    })
}

/// Retry policy from the `[retry]` section
pub fn retry_policy(toml_config: &TomlConfig) -> RetryPolicy {
    RetryPolicy::from_config(&toml_config.retry)
}

/// Deadline applied to every single upstream call
pub fn call_deadline(toml_config: &TomlConfig) -> Duration {
    Duration::from_secs(toml_config.retry.call_deadline_secs.max(1))
}
