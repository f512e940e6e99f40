//! Track selection and the persisted composite record

use serde::{Deserialize, Serialize};

use super::RecipeResult;

/// A track chosen from the music catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelection {
    pub track_name: String,
    pub artist_name: String,
    /// Canonical web URL of the track
    pub track_url: String,
    /// Playlist the track was drawn from; absent for direct searches
    pub source_playlist_url: Option<String>,
}

/// The persisted unit joining a generated recipe with a song
///
/// Title and song fields are optional: an extraction miss leaves them absent
/// rather than aborting the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompositeRecord {
    pub recipe_title: Option<String>,
    #[sqlx(rename = "recipe")]
    pub recipe_body: String,
    pub song_name: Option<String>,
    #[sqlx(rename = "artist")]
    pub artist_name: Option<String>,
    pub song_url: Option<String>,
}

impl CompositeRecord {
    /// Join a recipe with whatever song information was obtained
    pub fn assemble(recipe: &RecipeResult, song: &SongOutcome) -> Self {
        let (song_name, artist_name, song_url) = match song {
            SongOutcome::Selected(track) => (
                Some(track.track_name.clone()),
                Some(track.artist_name.clone()),
                Some(track.track_url.clone()),
            ),
            SongOutcome::Unresolved { song_name, artist_name } => {
                (Some(song_name.clone()), Some(artist_name.clone()), None)
            }
            SongOutcome::Missing => (None, None, None),
        };

        Self {
            recipe_title: recipe.title.clone(),
            recipe_body: recipe.body.clone(),
            song_name,
            artist_name,
            song_url,
        }
    }
}

/// What song selection produced for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SongOutcome {
    /// A catalog track with a URL
    Selected(TrackSelection),
    /// Song named in the recipe text but not found in the catalog
    Unresolved { song_name: String, artist_name: String },
    /// The recipe text named no song
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe() -> RecipeResult {
        RecipeResult::from_text("Title: Pap en Vleis\nInstructions: braai".to_string())
    }

    #[test]
    fn test_assemble_selected_track() {
        let track = TrackSelection {
            track_name: "Pata Pata".to_string(),
            artist_name: "Miriam Makeba".to_string(),
            track_url: "https://open.spotify.com/track/1".to_string(),
            source_playlist_url: None,
        };
        let record = CompositeRecord::assemble(&recipe(), &SongOutcome::Selected(track));

        assert_eq!(record.recipe_title.as_deref(), Some("Pap en Vleis"));
        assert_eq!(record.song_name.as_deref(), Some("Pata Pata"));
        assert_eq!(record.artist_name.as_deref(), Some("Miriam Makeba"));
        assert_eq!(record.song_url.as_deref(), Some("https://open.spotify.com/track/1"));
    }

    #[test]
    fn test_assemble_without_song() {
        let record = CompositeRecord::assemble(&recipe(), &SongOutcome::Missing);
        assert!(record.song_name.is_none());
        assert!(record.artist_name.is_none());
        assert!(record.song_url.is_none());
        assert_eq!(record.recipe_body, "Title: Pap en Vleis\nInstructions: braai");
    }
}
