//! Pipeline tests over scripted upstream services

mod helpers;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use helpers::*;
use vinedine_pairing::models::{RecipeRequest, SongOutcome, ValidationError};
use vinedine_pairing::services::catalog_client::{CatalogError, CatalogFault, FALLBACK_GENRES};
use vinedine_pairing::services::generation_client::{GenerationError, GenerationFault};
use vinedine_pairing::services::{
    DispatchMode, OrchestratorSettings, PipelineError, SongSelectionStrategy,
};

fn request() -> RecipeRequest {
    RecipeRequest::parse("chicken, peanuts, chilli", "South African", "Anything goes").unwrap()
}

fn seeded(dispatch: DispatchMode) -> OrchestratorSettings {
    OrchestratorSettings {
        strategy: SongSelectionStrategy::GenrePlaylist,
        dispatch,
        rng_seed: Some(42),
    }
}

#[tokio::test]
async fn test_produces_and_persists_composite() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(populated_catalog());
    let (_dir, orchestrator) =
        orchestrator(generator, catalog, seeded(DispatchMode::Concurrent)).await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.persisted);
    assert!(outcome.storage_error.is_none());
    assert_eq!(outcome.record.recipe_title.as_deref(), Some("Spicy Peanut Stew"));
    assert_eq!(outcome.record.recipe_body, RECIPE_TEXT);
    assert!(matches!(outcome.song, SongOutcome::Selected(_)));
    assert!(outcome
        .record
        .song_url
        .as_deref()
        .unwrap()
        .starts_with("https://open.spotify.com/track/"));

    let stored = orchestrator.store().list_all().await.unwrap();
    assert_eq!(stored, vec![outcome.record]);
}

#[tokio::test]
async fn test_unknown_genre_falls_back_to_world() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, "['Nonexistent123']"));
    let catalog = Arc::new(FakeCatalog::new().with_genre("World", 2, 3));
    let (_dir, orchestrator) =
        orchestrator(generator, catalog.clone(), seeded(DispatchMode::Concurrent)).await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(catalog.searched_genres(), ["Nonexistent123", "World"]);
    match outcome.song {
        SongOutcome::Selected(track) => {
            assert!(track.track_name.starts_with("World Song"));
            assert!(track.source_playlist_url.is_some());
        }
        other => panic!("expected a selected track, got {:?}", other),
    }
    assert_eq!(orchestrator.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_fallback_is_attempted_only_once() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, "['Nonexistent123']"));
    let catalog = Arc::new(FakeCatalog::new());
    let (_dir, orchestrator) =
        orchestrator(generator, catalog.clone(), seeded(DispatchMode::Concurrent)).await;

    let err = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Catalog(CatalogError::NoPlaylists(ref genre)) if genre == "World"
    ));
    assert_eq!(catalog.searched_genres(), ["Nonexistent123", "World"]);
    assert_eq!(orchestrator.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_validation_rejects_before_any_upstream_call() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(populated_catalog());
    let (_dir, orchestrator) = orchestrator(
        generator.clone(),
        catalog.clone(),
        seeded(DispatchMode::Concurrent),
    )
    .await;

    for (ingredients, expected) in [
        ("", ValidationError::EmptyIngredients),
        ("chicken peanuts", ValidationError::MissingSeparator),
    ] {
        let err = orchestrator
            .validate(ingredients, "Thai", "Vegan")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ref e) if *e == expected));
    }

    assert_eq!(generator.call_count(), 0);
    assert_eq!(catalog.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_and_sequential_dispatch_agree_for_fixed_seed() {
    let mut records = Vec::new();

    for dispatch in [DispatchMode::Concurrent, DispatchMode::Sequential] {
        let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
        let catalog = Arc::new(populated_catalog());
        let (_dir, orchestrator) = orchestrator(generator, catalog, seeded(dispatch)).await;

        let first = orchestrator
            .produce_composite(&request(), &CancellationToken::new())
            .await
            .unwrap();
        let second = orchestrator
            .produce_composite(&request(), &CancellationToken::new())
            .await
            .unwrap();
        records.push((first.record, second.record));
    }

    assert_eq!(records[0], records[1]);
}

#[tokio::test]
async fn test_recipe_hint_strategy_searches_named_song() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(
        FakeCatalog::new().with_search_result(track("grazing", "Grazing in the Grass")),
    );
    let settings = OrchestratorSettings {
        strategy: SongSelectionStrategy::RecipeHint,
        ..OrchestratorSettings::default()
    };
    let (_dir, orchestrator) = orchestrator(generator.clone(), catalog.clone(), settings).await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        catalog.track_queries.lock().unwrap().as_slice(),
        ["artist:Hugh track:Grazing in the Grass"]
    );
    assert_eq!(outcome.record.song_name.as_deref(), Some("Grazing in the Grass"));
    assert_eq!(
        outcome.record.song_url.as_deref(),
        Some("https://open.spotify.com/track/grazing")
    );
    // No genre suggestion for this strategy
    assert_eq!(generator.call_count(), 1);
    assert!(catalog.searched_genres().is_empty());
}

#[tokio::test]
async fn test_recipe_hint_keeps_names_when_catalog_misses() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(FakeCatalog::new());
    let settings = OrchestratorSettings {
        strategy: SongSelectionStrategy::RecipeHint,
        ..OrchestratorSettings::default()
    };
    let (_dir, orchestrator) = orchestrator(generator, catalog, settings).await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.record.song_name.as_deref(), Some("Grazing in the Grass"));
    assert_eq!(outcome.record.artist_name.as_deref(), Some("Hugh"));
    assert_eq!(outcome.record.song_url, None);
    assert!(matches!(outcome.song, SongOutcome::Unresolved { .. }));
}

#[tokio::test]
async fn test_recipe_hint_without_song_leaves_song_fields_empty() {
    let generator = Arc::new(FakeGenerator::new(
        "Title: Plain Rice\nInstructions: boil",
        GENRE_REPLY,
    ));
    let catalog = Arc::new(FakeCatalog::new());
    let settings = OrchestratorSettings {
        strategy: SongSelectionStrategy::RecipeHint,
        ..OrchestratorSettings::default()
    };
    let (_dir, orchestrator) = orchestrator(generator, catalog.clone(), settings).await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.record.recipe_title.as_deref(), Some("Plain Rice"));
    assert_eq!(outcome.song, SongOutcome::Missing);
    assert!(outcome.record.song_name.is_none());
    assert_eq!(catalog.call_count(), 0);
}

#[tokio::test]
async fn test_permanent_generation_fault_fails_fast() {
    let generator = Arc::new(FakeGenerator::failing(GenerationFault::Auth(
        "invalid api key".to_string(),
    )));
    let catalog = Arc::new(populated_catalog());
    let (_dir, orchestrator) = orchestrator(
        generator.clone(),
        catalog,
        seeded(DispatchMode::Sequential),
    )
    .await;

    let err = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Generation(GenerationError::Permanent(GenerationFault::Auth(_)))
    ));
    // One recipe attempt plus one genre attempt, neither retried
    assert_eq!(generator.call_count(), 2);
    assert_eq!(orchestrator.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_transient_faults_are_retried() {
    let generator =
        Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY).with_transient_failures(2));
    let catalog = Arc::new(populated_catalog().with_rate_limited_searches(1));
    let (_dir, orchestrator) = orchestrator(
        generator.clone(),
        catalog,
        seeded(DispatchMode::Sequential),
    )
    .await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome.song, SongOutcome::Selected(_)));
    // Two failures then the recipe, then the genre suggestion
    assert_eq!(generator.call_count(), 4);
}

#[tokio::test]
async fn test_cancelled_request_is_not_persisted() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(populated_catalog());
    let (_dir, orchestrator) =
        orchestrator(generator, catalog, seeded(DispatchMode::Concurrent)).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .produce_composite(&request(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(orchestrator.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_storage_failure_still_returns_record() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(populated_catalog());
    let (_dir, orchestrator) =
        orchestrator(generator, catalog, seeded(DispatchMode::Concurrent)).await;

    orchestrator.store().pool().close().await;

    let outcome = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.persisted);
    assert!(outcome.storage_error.is_some());
    assert_eq!(outcome.record.recipe_title.as_deref(), Some("Spicy Peanut Stew"));
}

#[tokio::test]
async fn test_suggest_genres_falls_back_without_list() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, "Jazz and some soul, probably."));
    let client = catalog_client(Arc::new(FakeCatalog::new()), generator);

    let genres = client
        .suggest_genres(vinedine_pairing::models::Cuisine::Italian)
        .await;

    assert_eq!(genres, FALLBACK_GENRES.map(String::from));
}

#[tokio::test]
async fn test_suggest_genres_parses_list() {
    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let client = catalog_client(Arc::new(FakeCatalog::new()), generator);

    let genres = client
        .suggest_genres(vinedine_pairing::models::Cuisine::SouthAfrican)
        .await;

    assert_eq!(genres, ["Afrobeat", "Kwaito", "Mbaqanga", "Soul Jazz", "Marabi"]);
}

#[tokio::test]
async fn test_pick_track_reports_missing_playlists() {
    use rand::SeedableRng;

    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let client = catalog_client(Arc::new(FakeCatalog::new()), generator);
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);

    let err = client.pick_track("Nonexistent123", &mut rng).await.unwrap_err();
    assert!(matches!(err, CatalogError::NoPlaylists(ref genre) if genre == "Nonexistent123"));
}

#[tokio::test]
async fn test_pick_track_skips_empty_playlists() {
    use rand::SeedableRng;

    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = FakeCatalog::new()
        .with_genre("Empty", 3, 0)
        .with_genre("Salsa", 1, 2);
    let client = catalog_client(Arc::new(catalog), generator);
    let mut rng = rand::rngs::StdRng::seed_from_u64(9);

    let err = client.pick_track("Empty", &mut rng).await.unwrap_err();
    assert!(matches!(err, CatalogError::NoTracks(_)));

    let selection = client.pick_track("Salsa", &mut rng).await.unwrap();
    assert!(selection.track_name.starts_with("Salsa Song"));
}

#[tokio::test(start_paused = true)]
async fn test_generation_deadline_is_enforced_per_attempt() {
    let generator =
        Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY).with_stall(Duration::from_secs(600)));
    let client = generation_client(generator.clone());
    let start = tokio::time::Instant::now();

    let err = client.generate(&request()).await.unwrap_err();

    assert!(matches!(
        err,
        GenerationError::Transient(GenerationFault::DeadlineExceeded(d)) if d == TEST_DEADLINE
    ));
    assert_eq!(generator.call_count(), test_policy().max_attempts as usize);
    assert!(start.elapsed() >= TEST_DEADLINE * test_policy().max_attempts);
    assert!(start.elapsed() < Duration::from_secs(600));
}

#[tokio::test(start_paused = true)]
async fn test_catalog_deadline_is_enforced_per_attempt() {
    use rand::SeedableRng;

    let generator = Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY));
    let catalog = Arc::new(populated_catalog().with_search_stall(Duration::from_secs(600)));
    let client = catalog_client(catalog.clone(), generator);
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);

    let err = client.pick_track("Afrobeat", &mut rng).await.unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Transient(CatalogFault::DeadlineExceeded(d)) if d == TEST_DEADLINE
    ));
    assert_eq!(catalog.searched_genres().len(), test_policy().max_attempts as usize);
}

#[tokio::test]
async fn test_stalled_generation_fails_pipeline_without_persisting() {
    let generator =
        Arc::new(FakeGenerator::new(RECIPE_TEXT, GENRE_REPLY).with_stall(Duration::from_secs(600)));
    let catalog = Arc::new(populated_catalog());
    let settings = OrchestratorSettings {
        strategy: SongSelectionStrategy::RecipeHint,
        dispatch: DispatchMode::Concurrent,
        rng_seed: Some(42),
    };
    let (_dir, orchestrator) = orchestrator(generator.clone(), catalog.clone(), settings).await;

    // Database setup runs on the real clock; only the pipeline sees paused time
    tokio::time::pause();
    let err = orchestrator
        .produce_composite(&request(), &CancellationToken::new())
        .await
        .unwrap_err();
    tokio::time::resume();

    assert!(matches!(
        err,
        PipelineError::Generation(GenerationError::Transient(GenerationFault::DeadlineExceeded(_)))
    ));
    assert_eq!(generator.call_count(), test_policy().max_attempts as usize);
    assert_eq!(catalog.call_count(), 0);
    assert_eq!(orchestrator.store().count().await.unwrap(), 0);
}
