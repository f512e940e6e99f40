//! Song selection strategies and dispatch modes
//!
//! Two independent ways of attaching a song to a recipe:
//! - [`SongSelectionStrategy::GenrePlaylist`]: suggest genres for the cuisine,
//!   draw one, then draw a track from that genre's playlists
//! - [`SongSelectionStrategy::RecipeHint`]: read `"song" by artist` out of the
//!   generated recipe and look that track up directly

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::extraction::extract_song_hint;
use crate::models::{RecipeResult, SongOutcome};
use crate::services::catalog_client::{CatalogClient, CatalogError, FALLBACK_GENRE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SongSelectionStrategy {
    #[default]
    GenrePlaylist,
    RecipeHint,
}

impl SongSelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongSelectionStrategy::GenrePlaylist => "genre_playlist",
            SongSelectionStrategy::RecipeHint => "recipe_hint",
        }
    }

    /// Whether genre suggestion runs alongside recipe generation
    pub fn needs_genres(&self) -> bool {
        matches!(self, SongSelectionStrategy::GenrePlaylist)
    }
}

impl fmt::Display for SongSelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SongSelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "genre_playlist" => Ok(SongSelectionStrategy::GenrePlaylist),
            "recipe_hint" => Ok(SongSelectionStrategy::RecipeHint),
            other => Err(format!(
                "unknown song selection strategy '{}' (expected genre_playlist or recipe_hint)",
                other
            )),
        }
    }
}

/// How the two independent upstream calls are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    Concurrent,
    Sequential,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Concurrent => "concurrent",
            DispatchMode::Sequential => "sequential",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(DispatchMode::Concurrent),
            "sequential" => Ok(DispatchMode::Sequential),
            other => Err(format!(
                "unknown dispatch mode '{}' (expected concurrent or sequential)",
                other
            )),
        }
    }
}

/// Draw a genre and a track from it, substituting [`FALLBACK_GENRE`] once
pub async fn select_by_genre(
    catalog: &CatalogClient,
    genres: &[String],
    rng: &mut StdRng,
) -> Result<SongOutcome, CatalogError> {
    let genre = genres
        .choose(rng)
        .map(String::as_str)
        .unwrap_or(FALLBACK_GENRE);
    debug!(genre = %genre, "Genre drawn");

    match catalog.pick_track(genre, rng).await {
        Ok(track) => Ok(SongOutcome::Selected(track)),
        Err(e) if e.warrants_fallback() && !genre.eq_ignore_ascii_case(FALLBACK_GENRE) => {
            warn!(genre = %genre, error = %e, fallback = FALLBACK_GENRE, "Retrying with fallback genre");
            let track = catalog.pick_track(FALLBACK_GENRE, rng).await?;
            Ok(SongOutcome::Selected(track))
        }
        Err(e) => Err(e),
    }
}

/// Look up the song the recipe text itself recommends
///
/// A recipe naming no song yields [`SongOutcome::Missing`]; a named song the
/// catalog does not know yields [`SongOutcome::Unresolved`].
pub async fn select_by_hint(
    catalog: &CatalogClient,
    recipe: &RecipeResult,
) -> Result<SongOutcome, CatalogError> {
    let Some(hint) = extract_song_hint(&recipe.body) else {
        debug!("Recipe names no song");
        return Ok(SongOutcome::Missing);
    };

    match catalog.search_track(&hint.song_name, &hint.artist_name).await {
        Ok(track) => Ok(SongOutcome::Selected(track)),
        Err(CatalogError::NoTracks(query)) => {
            debug!(query = %query, "Recommended song not in catalog");
            Ok(SongOutcome::Unresolved {
                song_name: hint.song_name,
                artist_name: hint.artist_name,
            })
        }
        Err(e) => Err(e),
    }
}
