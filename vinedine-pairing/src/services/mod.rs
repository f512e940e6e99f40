//! Upstream clients and the pairing pipeline

pub mod catalog_client;
pub mod generation_client;
pub mod orchestrator;
pub mod share;
pub mod song_selection;

pub use catalog_client::{CatalogClient, CatalogError, MusicCatalog, SpotifyCatalog};
pub use generation_client::{GenerationClient, GenerationError, OpenAiGenerator, TextGenerator};
pub use orchestrator::{CompositeOutcome, Orchestrator, OrchestratorSettings, PipelineError};
pub use share::share_url;
pub use song_selection::{DispatchMode, SongSelectionStrategy};
