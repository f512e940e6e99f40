//! Recipe pairing endpoints
//!
//! - `POST /api/recipes`: run the pipeline for one request
//! - `GET /api/recipes`: every stored record, oldest first

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extraction::format_sections;
use crate::models::{CompositeRecord, SongOutcome};
use crate::services::share_url;
use crate::AppState;

/// Request body for POST /api/recipes
#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    /// Comma-separated ingredients, e.g. "chicken, peanuts, chilli"
    pub ingredients: String,
    pub cuisine: String,
    pub dietary_requirement: String,
}

/// Response for POST /api/recipes
#[derive(Debug, Serialize)]
pub struct CreateRecipeResponse {
    pub record: CompositeRecord,
    pub song: SongOutcome,
    /// Recipe body with section labels rendered as markup
    pub formatted: String,
    pub share_url: String,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

/// POST /api/recipes
pub async fn create_recipe(
    State(state): State<AppState>,
    Json(request): Json<CreateRecipeRequest>,
) -> ApiResult<Json<CreateRecipeResponse>> {
    let orchestrator = &state.orchestrator;

    let recipe_request = orchestrator
        .validate(
            &request.ingredients,
            &request.cuisine,
            &request.dietary_requirement,
        )
        .map_err(ApiError::from)?;

    let cancel = state.shutdown.child_token();
    let outcome = match orchestrator.produce_composite(&recipe_request, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Pairing request failed");
            *state.last_error.write().await = Some(e.to_string());
            return Err(e.into());
        }
    };

    info!(
        cuisine = %recipe_request.cuisine(),
        persisted = outcome.persisted,
        "Pairing request served"
    );

    Ok(Json(CreateRecipeResponse {
        formatted: format_sections(&outcome.record.recipe_body),
        share_url: share_url(&outcome.record.recipe_body),
        record: outcome.record,
        song: outcome.song,
        persisted: outcome.persisted,
        storage_error: outcome.storage_error,
    }))
}

/// GET /api/recipes
pub async fn list_recipes(State(state): State<AppState>) -> ApiResult<Json<Vec<CompositeRecord>>> {
    let records = state.orchestrator.store().list_all().await?;
    Ok(Json(records))
}

/// Build recipe routes
pub fn recipe_routes() -> Router<AppState> {
    Router::new().route("/api/recipes", get(list_recipes).post(create_recipe))
}
