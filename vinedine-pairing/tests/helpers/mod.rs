//! Shared fakes and fixtures for integration tests
//!
//! Scripted [`TextGenerator`] and [`MusicCatalog`] backends plus a temp-dir
//! SQLite database, so the full pipeline runs without any network access.

#![allow(dead_code)]

use axum::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use vinedine_pairing::db::RecordStore;
use vinedine_pairing::services::catalog_client::{
    CatalogClient, CatalogFault, CatalogTrack, MusicCatalog, PlaylistRef,
};
use vinedine_pairing::services::generation_client::{
    CompletionRequest, GenerationClient, GenerationFault, TextGenerator,
};
use vinedine_pairing::services::{Orchestrator, OrchestratorSettings};
use vinedine_pairing::utils::RetryPolicy;

pub const RECIPE_TEXT: &str = "Here you go!\n\
    Title: Spicy Peanut Stew\n\
    Ingredients:\n\
    - 300 g chicken\n\
    - 100 g peanuts\n\
    Instructions: Brown the chicken, add peanuts and simmer at 90°C.\n\
    Wine pairing: A chilled Chenin Blanc.\n\
    South African wine recommendation: Ken Forrester Old Vine Reserve Chenin Blanc.\n\
    Complimentary spices and herbs: Coriander, chilli.\n\
    Estimated calories per portion: 520\n\
    Song recommendation: \"Grazing in the Grass\" by Hugh Masekela.";

pub const GENRE_REPLY: &str = "Sure: ['Afrobeat', 'Kwaito', 'Mbaqanga', 'Soul Jazz', 'Marabi']";

/// Generator that answers recipe and genre prompts from a script
#[derive(Debug)]
pub struct FakeGenerator {
    recipe_reply: Result<String, GenerationFault>,
    genre_reply: Result<String, GenerationFault>,
    /// Transient faults returned before the scripted reply
    transient_failures: AtomicU32,
    /// Delay before every reply
    stall: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(recipe_reply: &str, genre_reply: &str) -> Self {
        Self {
            recipe_reply: Ok(recipe_reply.to_string()),
            genre_reply: Ok(genre_reply.to_string()),
            transient_failures: AtomicU32::new(0),
            stall: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(fault: GenerationFault) -> Self {
        Self {
            recipe_reply: Err(fault.clone()),
            genre_reply: Err(fault),
            transient_failures: AtomicU32::new(0),
            stall: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep `delay` before answering; outlasting the deadline never answers
    pub fn with_stall(mut self, delay: Duration) -> Self {
        self.stall = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GenerationFault::Server {
                status: 503,
                message: "overloaded".to_string(),
            });
        }

        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        if prompt.contains("music genres") {
            self.genre_reply.clone()
        } else {
            self.recipe_reply.clone()
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// In-memory catalog keyed by exact genre and playlist id
#[derive(Debug, Default)]
pub struct FakeCatalog {
    playlists: HashMap<String, Vec<PlaylistRef>>,
    tracks: HashMap<String, Vec<CatalogTrack>>,
    search_results: Vec<CatalogTrack>,
    /// Rate-limit faults returned by playlist searches before answering
    rate_limited_searches: AtomicU32,
    /// Delay before every playlist search
    search_stall: Option<Duration>,
    pub searched_genres: Mutex<Vec<String>>,
    pub track_queries: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a genre with `playlist_count` playlists of `tracks_per_playlist` tracks
    pub fn with_genre(mut self, genre: &str, playlist_count: usize, tracks_per_playlist: usize) -> Self {
        let slug = genre.to_lowercase().replace(' ', "-");
        let mut playlists = Vec::new();

        for p in 0..playlist_count {
            let id = format!("{}-pl{}", slug, p);
            let tracks = (0..tracks_per_playlist)
                .map(|t| track(&format!("{}-t{}", id, t), &format!("{} Song {}-{}", genre, p, t)))
                .collect();
            self.tracks.insert(id.clone(), tracks);
            playlists.push(PlaylistRef {
                url: format!("https://open.spotify.com/playlist/{}", id),
                name: format!("{} Mix {}", genre, p),
                id,
            });
        }

        self.playlists.insert(genre.to_string(), playlists);
        self
    }

    pub fn with_search_result(mut self, result: CatalogTrack) -> Self {
        self.search_results.push(result);
        self
    }

    pub fn with_rate_limited_searches(self, count: u32) -> Self {
        self.rate_limited_searches.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_search_stall(mut self, delay: Duration) -> Self {
        self.search_stall = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn searched_genres(&self) -> Vec<String> {
        self.searched_genres.lock().unwrap().clone()
    }
}

pub fn track(id: &str, name: &str) -> CatalogTrack {
    CatalogTrack {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec!["Test Artist".to_string()],
        url: format!("https://open.spotify.com/track/{}", id),
    }
}

#[async_trait]
impl MusicCatalog for FakeCatalog {
    async fn search_playlists(&self, genre: &str) -> Result<Vec<PlaylistRef>, CatalogFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.searched_genres.lock().unwrap().push(genre.to_string());

        if let Some(delay) = self.search_stall {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.rate_limited_searches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rate_limited_searches.store(remaining - 1, Ordering::SeqCst);
            return Err(CatalogFault::RateLimited { retry_after_secs: None });
        }

        Ok(self.playlists.get(genre).cloned().unwrap_or_default())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<CatalogTrack>, CatalogFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tracks
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogFault::NotFound(playlist_id.to_string()))
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>, CatalogFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.track_queries.lock().unwrap().push(query.to_string());
        Ok(self
            .search_results
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Per-call deadline used by every test client
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

pub fn test_policy() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_millis(1))
}

pub fn generation_client(generator: Arc<FakeGenerator>) -> GenerationClient {
    GenerationClient::new(generator, test_policy(), TEST_DEADLINE)
}

pub fn catalog_client(catalog: Arc<FakeCatalog>, generator: Arc<FakeGenerator>) -> CatalogClient {
    CatalogClient::new(
        catalog,
        generation_client(generator),
        test_policy(),
        TEST_DEADLINE,
    )
}

/// Record store backed by a fresh database file
///
/// Returns (TempDir, RecordStore) - TempDir must be kept alive for duration of test
pub async fn temp_store() -> (TempDir, RecordStore) {
    let dir = TempDir::new().unwrap();
    let pool = vinedine_common::db::init_database(&dir.path().join("test_vinedine.db"))
        .await
        .unwrap();
    let store = RecordStore::open(pool, test_policy()).await.unwrap();
    (dir, store)
}

/// Orchestrator over the given fakes and a temp database
pub async fn orchestrator(
    generator: Arc<FakeGenerator>,
    catalog: Arc<FakeCatalog>,
    settings: OrchestratorSettings,
) -> (TempDir, Orchestrator) {
    let (dir, store) = temp_store().await;
    let orchestrator = Orchestrator::new(
        Arc::new(generation_client(generator.clone())),
        Arc::new(catalog_client(catalog, generator)),
        store,
        settings,
    );
    (dir, orchestrator)
}

/// Catalog where every genre of [`GENRE_REPLY`] and "World" is populated
pub fn populated_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .with_genre("Afrobeat", 3, 4)
        .with_genre("Kwaito", 2, 5)
        .with_genre("Mbaqanga", 4, 2)
        .with_genre("Soul Jazz", 2, 3)
        .with_genre("Marabi", 1, 6)
        .with_genre("World", 3, 3)
}
