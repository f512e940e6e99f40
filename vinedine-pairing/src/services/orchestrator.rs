//! Pairing pipeline orchestration
//!
//! Drives one request through a linear sequence of states:
//!
//! ```text
//! Idle → Validating → Dispatching → Awaiting → SelectingTrack
//!      → Assembling → Persisting → Done
//! ```
//!
//! Recipe generation and genre suggestion are independent and run together in
//! the Dispatching state. Every random draw happens after they have both
//! finished, from an RNG seeded per request out of the orchestrator's own RNG,
//! so the dispatch mode never changes which record a seed produces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::RecordStore;
use crate::models::{CompositeRecord, RecipeRequest, RecipeResult, SongOutcome, ValidationError};
use crate::services::catalog_client::{CatalogClient, CatalogError};
use crate::services::generation_client::{GenerationClient, GenerationError};
use crate::services::song_selection::{
    select_by_genre, select_by_hint, DispatchMode, SongSelectionStrategy,
};

/// Pipeline states, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating,
    Dispatching,
    Awaiting,
    SelectingTrack,
    Assembling,
    Persisting,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::Dispatching => "dispatching",
            PipelineState::Awaiting => "awaiting",
            PipelineState::SelectingTrack => "selecting_track",
            PipelineState::Assembling => "assembling",
            PipelineState::Persisting => "persisting",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Failure that aborts a request
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Recipe generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Song selection failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Request cancelled")]
    Cancelled,
}

/// Result of one successful request
#[derive(Debug, Clone, Serialize)]
pub struct CompositeOutcome {
    pub record: CompositeRecord,
    pub song: SongOutcome,
    pub persisted: bool,
    /// Set when the record could not be stored; the record is still valid
    pub storage_error: Option<String>,
}

/// Runtime knobs for the pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorSettings {
    pub strategy: SongSelectionStrategy,
    pub dispatch: DispatchMode,
    /// Fixed seed for reproducible selection; entropy when absent
    pub rng_seed: Option<u64>,
}

/// Runs the pairing pipeline over injected clients
#[derive(Debug)]
pub struct Orchestrator {
    generation: Arc<GenerationClient>,
    catalog: Arc<CatalogClient>,
    store: RecordStore,
    strategy: SongSelectionStrategy,
    dispatch: DispatchMode,
    rng: Mutex<StdRng>,
}

impl Orchestrator {
    pub fn new(
        generation: Arc<GenerationClient>,
        catalog: Arc<CatalogClient>,
        store: RecordStore,
        settings: OrchestratorSettings,
    ) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            generation,
            catalog,
            store,
            strategy: settings.strategy,
            dispatch: settings.dispatch,
            rng: Mutex::new(rng),
        }
    }

    pub fn strategy(&self) -> SongSelectionStrategy {
        self.strategy
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.dispatch
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Validate raw form input; no upstream call is made on rejection
    pub fn validate(
        &self,
        ingredients: &str,
        cuisine: &str,
        dietary_requirement: &str,
    ) -> Result<RecipeRequest, PipelineError> {
        debug!(from = %PipelineState::Idle, to = %PipelineState::Validating, "Pipeline transition");

        RecipeRequest::parse(ingredients, cuisine, dietary_requirement).map_err(|e| {
            debug!(error = %e, "Request rejected");
            PipelineError::Validation(e)
        })
    }

    /// Produce, persist and return one composite record
    ///
    /// Cancelling `cancel` drops whatever upstream call is in flight and
    /// returns [`PipelineError::Cancelled`]; nothing is persisted.
    pub async fn produce_composite(
        &self,
        request: &RecipeRequest,
        cancel: &CancellationToken,
    ) -> Result<CompositeOutcome, PipelineError> {
        let request_id = Uuid::new_v4();
        let start = Instant::now();

        let (record, song) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(%request_id, "Request cancelled before completion");
                return Err(PipelineError::Cancelled);
            }
            result = self.build_record(request_id, request) => result?,
        };

        transition(request_id, PipelineState::Assembling, PipelineState::Persisting);

        let (persisted, storage_error) = match self.store.append(&record).await {
            Ok(()) => (true, None),
            Err(e) => {
                warn!(%request_id, error = %e, "Failed to persist record, returning it anyway");
                (false, Some(e.to_string()))
            }
        };

        transition(request_id, PipelineState::Persisting, PipelineState::Done);
        info!(
            %request_id,
            title = record.recipe_title.as_deref().unwrap_or("<untitled>"),
            song = record.song_name.as_deref().unwrap_or("<none>"),
            persisted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pairing complete"
        );

        Ok(CompositeOutcome {
            record,
            song,
            persisted,
            storage_error,
        })
    }

    async fn build_record(
        &self,
        request_id: Uuid,
        request: &RecipeRequest,
    ) -> Result<(CompositeRecord, SongOutcome), PipelineError> {
        transition(request_id, PipelineState::Validating, PipelineState::Dispatching);
        debug!(
            %request_id,
            cuisine = %request.cuisine(),
            strategy = %self.strategy,
            dispatch = %self.dispatch,
            "Dispatching upstream calls"
        );

        let (recipe, genres) = self.dispatch_calls(request).await;
        transition(request_id, PipelineState::Dispatching, PipelineState::Awaiting);

        let recipe = recipe?;
        let mut rng = self.request_rng();

        transition(request_id, PipelineState::Awaiting, PipelineState::SelectingTrack);
        let song = match self.strategy {
            SongSelectionStrategy::GenrePlaylist => {
                select_by_genre(&self.catalog, &genres.unwrap_or_default(), &mut rng).await?
            }
            SongSelectionStrategy::RecipeHint => select_by_hint(&self.catalog, &recipe).await?,
        };

        transition(request_id, PipelineState::SelectingTrack, PipelineState::Assembling);
        Ok((CompositeRecord::assemble(&recipe, &song), song))
    }

    /// Recipe generation plus, when the strategy needs them, genre suggestions
    async fn dispatch_calls(
        &self,
        request: &RecipeRequest,
    ) -> (Result<RecipeResult, GenerationError>, Option<Vec<String>>) {
        let generate = self.generation.generate(request);

        if !self.strategy.needs_genres() {
            return (generate.await, None);
        }

        let suggest = self.catalog.suggest_genres(request.cuisine());
        match self.dispatch {
            DispatchMode::Concurrent => {
                let (recipe, genres) = tokio::join!(generate, suggest);
                (recipe, Some(genres))
            }
            DispatchMode::Sequential => {
                let recipe = generate.await;
                let genres = suggest.await;
                (recipe, Some(genres))
            }
        }
    }

    /// Fresh RNG for one request, seeded from the orchestrator's RNG
    fn request_rng(&self) -> StdRng {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        StdRng::seed_from_u64(rng.gen())
    }
}

fn transition(request_id: Uuid, from: PipelineState, to: PipelineState) {
    debug!(%request_id, %from, %to, "Pipeline transition");
}
