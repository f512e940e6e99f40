//! Music-catalog service client
//!
//! [`MusicCatalog`] is the narrow contract with the external catalog (playlist
//! search, playlist listing, track search). [`CatalogClient`] builds the
//! pairing operations on top of it: genre suggestion, random track selection
//! from genre playlists, and direct track lookup.
//!
//! # API Reference
//! - Spotify Web API: `GET /search`, `GET /playlists/{id}/tracks`
//! - Client credentials flow: `POST https://accounts.spotify.com/api/token`

use axum::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::extraction::parse_genre_list;
use crate::models::{Cuisine, TrackSelection};
use crate::services::generation_client::GenerationClient;
use crate::utils::{retry_with_backoff, RetryPolicy, Retryable};
use vinedine_common::config::CatalogConfig;

/// Genres known to have populated playlists, used when suggestion fails
pub const FALLBACK_GENRES: [&str; 7] = [
    "World",
    "World Chill",
    "Vocal Jazz",
    "Roots Reggae",
    "Soul",
    "Soul Jazz",
    "Salsa",
];

/// Genre substituted once when the chosen genre yields nothing
pub const FALLBACK_GENRE: &str = "World";

/// Tokens are refreshed this long before the catalog says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const PLAYLIST_SEARCH_LIMIT: u32 = 20;
const PLAYLIST_TRACK_LIMIT: u32 = 100;

/// Playlist found by a genre search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Playable catalog track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub url: String,
}

impl CatalogTrack {
    pub fn artist_display(&self) -> String {
        self.artists.join(", ")
    }
}

/// Fault reported by a catalog backend for one call
#[derive(Debug, Clone, Error)]
pub enum CatalogFault {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No response within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Catalog failure surfaced to the orchestrator
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("No playlists found for genre '{0}'")]
    NoPlaylists(String),

    #[error("No playable tracks found for '{0}'")]
    NoTracks(String),

    /// Recoverable upstream fault that outlasted the retry budget
    #[error("Catalog temporarily unavailable: {0}")]
    Transient(CatalogFault),

    /// A lookup key was missing: unknown id or malformed response
    #[error("Catalog lookup failed: {0}")]
    LookupKey(CatalogFault),

    #[error("Catalog request rejected: {0}")]
    Permanent(CatalogFault),
}

impl CatalogError {
    /// Whether the orchestrator should try again with [`FALLBACK_GENRE`]
    pub fn warrants_fallback(&self) -> bool {
        matches!(
            self,
            CatalogError::NoPlaylists(_) | CatalogError::NoTracks(_) | CatalogError::LookupKey(_)
        )
    }
}

impl Retryable for CatalogError {
    fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Transient(_))
    }
}

impl From<CatalogFault> for CatalogError {
    fn from(fault: CatalogFault) -> Self {
        match fault {
            CatalogFault::RateLimited { .. }
            | CatalogFault::Connection(_)
            | CatalogFault::Server { .. }
            | CatalogFault::DeadlineExceeded(_) => CatalogError::Transient(fault),
            CatalogFault::NotFound(_) | CatalogFault::Malformed(_) => CatalogError::LookupKey(fault),
            CatalogFault::Auth(_) => CatalogError::Permanent(fault),
        }
    }
}

/// Music-catalog backend
#[async_trait]
pub trait MusicCatalog: Send + Sync + fmt::Debug {
    /// Playlists matching a genre, scoped to the backend's market
    async fn search_playlists(&self, genre: &str) -> Result<Vec<PlaylistRef>, CatalogFault>;

    /// Playable tracks of a playlist
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<CatalogTrack>, CatalogFault>;

    /// Free-text track search
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>, CatalogFault>;
}

// ============================================================================
// Spotify Web API backend
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyPlaylist {
    id: String,
    name: String,
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    artists: Vec<SpotifyArtist>,
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSearchResponse {
    playlists: Page<Option<SpotifyPlaylist>>,
}

#[derive(Debug, Deserialize)]
struct TrackSearchResponse {
    tracks: Page<Option<SpotifyTrack>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

impl SpotifyTrack {
    /// Local files and unavailable tracks carry no id or URL
    fn into_catalog_track(self) -> Option<CatalogTrack> {
        Some(CatalogTrack {
            id: self.id?,
            name: self.name,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
            url: self.external_urls.spotify?,
        })
    }
}

/// Spotify Web API backend using the client credentials flow
pub struct SpotifyCatalog {
    http_client: reqwest::Client,
    api_base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    market: String,
    token: Mutex<Option<CachedToken>>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl fmt::Debug for SpotifyCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyCatalog")
            .field("api_base_url", &self.api_base_url)
            .field("market", &self.market)
            .finish_non_exhaustive()
    }
}

impl SpotifyCatalog {
    pub fn new(
        config: &CatalogConfig,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, CatalogFault> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("vinedine/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogFault::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id,
            client_secret,
            market: config.market.clone(),
            token: Mutex::new(None),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Current bearer token, fetching a new one when missing or near expiry
    async fn access_token(&self) -> Result<String, CatalogFault> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!(url = %self.token_url, "Requesting catalog access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CatalogFault::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                400 | 401 | 403 => CatalogFault::Auth(body),
                _ => classify_status(status, None, body),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogFault::Malformed(e.to_string()))?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(value)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    /// Rate-limited authenticated GET; a rejected token is refreshed once
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogFault> {
        let mut refreshed = false;

        loop {
            self.rate_limiter.until_ready().await;
            let token = self.access_token().await?;

            debug!(url = %url, "Querying catalog API");

            let response = self
                .http_client
                .get(url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| CatalogFault::Connection(e.to_string()))?;

            let status = response.status().as_u16();

            if status == 401 && !refreshed {
                warn!("Catalog rejected access token, refreshing");
                self.forget_token().await;
                refreshed = true;
                continue;
            }

            if !(200..300).contains(&status) {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status, retry_after, body));
            }

            return response
                .json()
                .await
                .map_err(|e| CatalogFault::Malformed(e.to_string()));
        }
    }
}

fn classify_status(status: u16, retry_after_secs: Option<u64>, body: String) -> CatalogFault {
    match status {
        404 => CatalogFault::NotFound(body),
        429 => CatalogFault::RateLimited { retry_after_secs },
        401 | 403 => CatalogFault::Auth(body),
        500..=599 => CatalogFault::Server {
            status,
            message: body,
        },
        _ => CatalogFault::Malformed(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl MusicCatalog for SpotifyCatalog {
    async fn search_playlists(&self, genre: &str) -> Result<Vec<PlaylistRef>, CatalogFault> {
        let url = format!("{}/search", self.api_base_url);
        let response: PlaylistSearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", genre.to_string()),
                    ("type", "playlist".to_string()),
                    ("market", self.market.clone()),
                    ("limit", PLAYLIST_SEARCH_LIMIT.to_string()),
                ],
            )
            .await?;

        Ok(response
            .playlists
            .items
            .into_iter()
            .flatten()
            .filter_map(|p| {
                Some(PlaylistRef {
                    url: p.external_urls.spotify?,
                    id: p.id,
                    name: p.name,
                })
            })
            .collect())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<CatalogTrack>, CatalogFault> {
        let url = format!("{}/playlists/{}/tracks", self.api_base_url, playlist_id);
        let items: Page<PlaylistItem> = self
            .get_json(
                &url,
                &[
                    ("market", self.market.clone()),
                    ("limit", PLAYLIST_TRACK_LIMIT.to_string()),
                ],
            )
            .await?;

        Ok(items
            .items
            .into_iter()
            .filter_map(|item| item.track?.into_catalog_track())
            .collect())
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>, CatalogFault> {
        let url = format!("{}/search", self.api_base_url);
        let response: TrackSearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("market", self.market.clone()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(response
            .tracks
            .items
            .into_iter()
            .flatten()
            .filter_map(SpotifyTrack::into_catalog_track)
            .collect())
    }
}

// ============================================================================
// Pairing operations
// ============================================================================

/// Genre suggestion prompt for a cuisine
pub fn genre_prompt(cuisine: Cuisine) -> String {
    format!(
        "Suggest five music genres that suit a {} meal. Reply with only a list literal such as \
         ['Genre One', 'Genre Two', 'Genre Three', 'Genre Four', 'Genre Five'].",
        cuisine
    )
}

/// Pairing operations over a catalog backend
#[derive(Debug, Clone)]
pub struct CatalogClient {
    catalog: Arc<dyn MusicCatalog>,
    generation: GenerationClient,
    policy: RetryPolicy,
    deadline: Duration,
}

impl CatalogClient {
    /// `generation` answers genre suggestions; the catalog answers everything else
    pub fn new(
        catalog: Arc<dyn MusicCatalog>,
        generation: GenerationClient,
        policy: RetryPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            catalog,
            generation,
            policy,
            deadline,
        }
    }

    /// Genres suiting a cuisine; never empty
    ///
    /// Falls back to [`FALLBACK_GENRES`] when the suggestion fails or carries
    /// no bracketed list.
    pub async fn suggest_genres(&self, cuisine: Cuisine) -> Vec<String> {
        let reply = match self
            .generation
            .complete("genre suggestion", &genre_prompt(cuisine))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(cuisine = %cuisine, error = %e, "Genre suggestion failed, using fallback genres");
                return fallback_genres();
            }
        };

        match parse_genre_list(&reply) {
            Some(genres) => {
                debug!(cuisine = %cuisine, genres = ?genres, "Genres suggested");
                genres
            }
            None => {
                warn!(cuisine = %cuisine, reply = %reply, "No genre list in suggestion, using fallback genres");
                fallback_genres()
            }
        }
    }

    /// Random playable track from a random playlist of `genre`
    ///
    /// Playlists are tried in random order without replacement; the first one
    /// with any playable track wins. Transient faults restart the whole
    /// selection, replaying the same random order.
    pub async fn pick_track(
        &self,
        genre: &str,
        rng: &mut StdRng,
    ) -> Result<TrackSelection, CatalogError> {
        let seed: u64 = rng.gen();

        let selection = retry_with_backoff("track selection", &self.policy, || async move {
            self.pick_track_once(genre, StdRng::seed_from_u64(seed)).await
        })
        .await?;

        info!(
            genre = %genre,
            track = %selection.track_name,
            artist = %selection.artist_name,
            "Track selected"
        );

        Ok(selection)
    }

    async fn pick_track_once(
        &self,
        genre: &str,
        mut rng: StdRng,
    ) -> Result<TrackSelection, CatalogError> {
        let mut playlists = self.call(self.catalog.search_playlists(genre)).await?;
        if playlists.is_empty() {
            return Err(CatalogError::NoPlaylists(genre.to_string()));
        }

        playlists.shuffle(&mut rng);

        for playlist in playlists {
            let tracks = self.call(self.catalog.playlist_tracks(&playlist.id)).await?;

            let Some(track) = tracks.choose(&mut rng) else {
                debug!(playlist = %playlist.name, "Playlist has no playable tracks, trying next");
                continue;
            };

            return Ok(TrackSelection {
                track_name: track.name.clone(),
                artist_name: track.artist_display(),
                track_url: track.url.clone(),
                source_playlist_url: Some(playlist.url),
            });
        }

        Err(CatalogError::NoTracks(genre.to_string()))
    }

    /// First catalog hit for a song by an artist
    pub async fn search_track(
        &self,
        song_name: &str,
        artist_name: &str,
    ) -> Result<TrackSelection, CatalogError> {
        let query = format!("artist:{} track:{}", artist_name, song_name);

        let tracks = retry_with_backoff("track search", &self.policy, || {
            self.call(self.catalog.search_tracks(&query, 1))
        })
        .await?;

        let track = tracks
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NoTracks(query.clone()))?;

        Ok(TrackSelection {
            artist_name: track.artist_display(),
            track_name: track.name,
            track_url: track.url,
            source_playlist_url: None,
        })
    }

    /// Apply the per-call deadline to one backend call
    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, CatalogFault>>,
    ) -> Result<T, CatalogError> {
        match tokio::time::timeout(self.deadline, request).await {
            Ok(result) => result.map_err(CatalogError::from),
            Err(_) => Err(CatalogError::Transient(CatalogFault::DeadlineExceeded(
                self.deadline,
            ))),
        }
    }
}

fn fallback_genres() -> Vec<String> {
    FALLBACK_GENRES.iter().map(|g| g.to_string()).collect()
}
