use playlist_blender::api::mock::{CatalogCall, MockCatalog, MockGenerator};
use playlist_blender::blend::Blender;
use playlist_blender::config::Config;
use playlist_blender::db;
use playlist_blender::error::BlendError;
use playlist_blender::models::{AuthContext, BlendRequest, PlaylistTarget, Stage};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const ROCK: [&str; 4] = [
    "Queen - Bohemian Rhapsody",
    "Nirvana - Lithium",
    "AC/DC - Thunderstruck",
    "The Who - Baba O'Riley",
];
const JAZZ: [&str; 4] = [
    "Miles Davis - So What",
    "John Coltrane - Naima",
    "Dave Brubeck - Take Five",
    "Bill Evans - Peace Piece",
];

fn auth() -> AuthContext {
    AuthContext::new("token", "mock_user")
}

fn test_config() -> Config {
    Config {
        playlist_length: 4,
        backoff_base_ms: 1,
        default_retry_after_secs: 0,
        merge_seed: Some(7),
        ..Config::default()
    }
}

fn uri_for(title: &str) -> String {
    format!("spotify:track:{}", title.to_lowercase().replace(' ', ""))
}

fn catalog_with_all() -> MockCatalog {
    ROCK.iter().chain(JAZZ.iter()).fold(MockCatalog::new(), |c, t| c.with_track(t, &uri_for(t)))
}

fn generator() -> MockGenerator {
    MockGenerator::new().with_theme("rock", &ROCK).with_theme("jazz", &JAZZ)
}

fn build(cfg: &Config, catalog: Arc<MockCatalog>, generator: Arc<MockGenerator>) -> (Blender, TempDir) {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("blend.db"), 4).unwrap();
    (Blender::new(cfg, pool, catalog, generator), td)
}

fn request(themes: &[&str], target: PlaylistTarget, rename: bool) -> BlendRequest {
    BlendRequest { themes: themes.iter().map(|s| s.to_string()).collect(), target, rename }
}

#[tokio::test]
async fn new_playlist_is_created_named_and_filled() {
    let catalog = Arc::new(catalog_with_all());
    let gen = Arc::new(generator());
    let (blender, _td) = build(&test_config(), catalog.clone(), gen.clone());

    let report = blender
        .blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false))
        .await
        .unwrap();

    assert_eq!(report.playlist_id, "mock-playlist-mock-blend");
    assert_eq!(report.playlist_name, "mock blend");
    assert_eq!(report.combined.len(), 4);
    assert_eq!(report.track_uris.len(), 4);
    // themes are sorted before generation
    let themes: Vec<&str> = report.candidates.iter().map(|c| c.theme.as_str()).collect();
    assert_eq!(themes, vec!["jazz", "rock"]);

    // two from each theme, no duplicates
    let rock: HashSet<&str> = ROCK.iter().copied().collect();
    let from_rock = report.combined.iter().filter(|s| rock.contains(s.as_str())).count();
    assert_eq!(from_rock, 2);
    let unique: HashSet<&String> = report.combined.iter().collect();
    assert_eq!(unique.len(), 4);

    let expected_uris: Vec<String> = report.combined.iter().map(|t| uri_for(t)).collect();
    assert_eq!(report.track_uris, expected_uris);

    let calls = catalog.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], CatalogCall::Create { name: "mock blend".into() });
    assert!(matches!(&calls[1], CatalogCall::Details { playlist_id, .. } if playlist_id == "mock-playlist-mock-blend"));
    assert_eq!(
        calls[2],
        CatalogCall::Replace { playlist_id: "mock-playlist-mock-blend".into(), uris: expected_uris }
    );
}

#[tokio::test]
async fn same_seed_gives_same_playlist() {
    let cfg = test_config();
    let (first, _td1) = build(&cfg, Arc::new(catalog_with_all()), Arc::new(generator()));
    let (second, _td2) = build(&cfg, Arc::new(catalog_with_all()), Arc::new(generator()));

    let a = first.blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false)).await.unwrap();
    let b = second.blend(&auth(), request(&["jazz", "rock"], PlaylistTarget::Create, false)).await.unwrap();
    assert_eq!(a.combined, b.combined);
}

#[tokio::test]
async fn fewer_than_two_themes_fails_before_any_work() {
    let catalog = Arc::new(catalog_with_all());
    let gen = Arc::new(generator());
    let (blender, _td) = build(&test_config(), catalog.clone(), gen.clone());

    let err = blender
        .blend(&auth(), request(&["rock", " ROCK ", ""], PlaylistTarget::Create, false))
        .await
        .unwrap_err();
    assert!(matches!(err, BlendError::Validation(_)));
    assert_eq!(gen.theme_calls(), 0);
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn existing_target_needs_an_id() {
    let gen = Arc::new(generator());
    let (blender, _td) = build(&test_config(), Arc::new(catalog_with_all()), gen.clone());

    let target = PlaylistTarget::Existing { id: "  ".into(), name: "Old".into() };
    let err = blender.blend(&auth(), request(&["rock", "jazz"], target, false)).await.unwrap_err();
    assert!(matches!(err, BlendError::Validation(_)));
    assert_eq!(gen.theme_calls(), 0);
}

#[tokio::test]
async fn existing_playlist_keeps_name_and_description() {
    let catalog = Arc::new(catalog_with_all().with_description("pl1", "Serving up old favourites."));
    let (blender, _td) = build(&test_config(), catalog.clone(), Arc::new(generator()));

    let target = PlaylistTarget::Existing { id: "pl1".into(), name: "Old Name".into() };
    let report = blender.blend(&auth(), request(&["rock", "jazz"], target, false)).await.unwrap();

    assert_eq!(report.playlist_id, "pl1");
    assert_eq!(report.playlist_name, "Old Name");
    assert_eq!(report.description, "Serving up old favourites.");

    let calls = catalog.calls();
    assert!(!calls.iter().any(|c| matches!(c, CatalogCall::Create { .. })));
    assert_eq!(
        calls[0],
        CatalogCall::Details {
            playlist_id: "pl1".into(),
            name: "Old Name".into(),
            description: "Serving up old favourites.".into(),
        }
    );
    assert!(matches!(&calls[1], CatalogCall::Replace { playlist_id, uris } if playlist_id == "pl1" && uris.len() == 4));
}

#[tokio::test]
async fn rename_generates_fresh_details_for_existing_playlist() {
    let catalog = Arc::new(catalog_with_all().with_description("pl1", "old"));
    let gen = Arc::new(generator().with_name("Fresh Mix").with_description("Here's some new vibes."));
    let (blender, _td) = build(&test_config(), catalog.clone(), gen);

    let target = PlaylistTarget::Existing { id: "pl1".into(), name: "Old Name".into() };
    let report = blender.blend(&auth(), request(&["rock", "jazz"], target, true)).await.unwrap();

    assert_eq!(report.playlist_name, "Fresh Mix");
    assert_eq!(report.description, "Here's some new vibes.");
    assert_eq!(
        catalog.calls()[0],
        CatalogCall::Details {
            playlist_id: "pl1".into(),
            name: "Fresh Mix".into(),
            description: "Here's some new vibes.".into(),
        }
    );
}

#[tokio::test]
async fn unresolved_songs_are_dropped_from_publish() {
    // only the rock songs exist in the catalog
    let catalog = Arc::new(ROCK.iter().fold(MockCatalog::new(), |c, t| c.with_track(t, &uri_for(t))));
    let (blender, _td) = build(&test_config(), catalog.clone(), Arc::new(generator()));

    let report = blender
        .blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false))
        .await
        .unwrap();
    assert_eq!(report.combined.len(), 4);
    assert_eq!(report.track_uris.len(), 2);
    assert!(report.track_uris.iter().all(|u| u.starts_with("spotify:track:")));
}

#[tokio::test]
async fn nothing_resolvable_fails_publish_before_creating() {
    let catalog = Arc::new(
        ROCK.iter()
            .chain(JAZZ.iter())
            .fold(MockCatalog::new(), |c, t| c.with_track(t, "spotify:episode:not-a-track")),
    );
    let (blender, _td) = build(&test_config(), catalog.clone(), Arc::new(generator()));

    let err = blender
        .blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Publish));
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn replace_failure_is_reported_as_publish_stage() {
    let catalog = Arc::new(catalog_with_all().failing_replace());
    let (blender, _td) = build(&test_config(), catalog.clone(), Arc::new(generator()));

    let err = blender
        .blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Publish));
    assert!(format!("{}", err).starts_with("publish stage failed"));
    // details were already pushed
    assert!(catalog.calls().iter().any(|c| matches!(c, CatalogCall::Details { .. })));
}

#[tokio::test]
async fn generator_failure_is_reported_as_generate_stage() {
    let gen = Arc::new(MockGenerator::new().with_theme("rock", &ROCK));
    let catalog = Arc::new(catalog_with_all());
    let (blender, _td) = build(&test_config(), catalog.clone(), gen);

    let err = blender
        .blend(&auth(), request(&["rock", "polka"], PlaylistTarget::Create, false))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Generate));
    assert_eq!(catalog.total_searches(), 0);
}

#[tokio::test]
async fn theme_lists_and_resolutions_are_reused_across_blends() {
    let catalog = Arc::new(catalog_with_all());
    let gen = Arc::new(generator());
    let (blender, _td) = build(&test_config(), catalog.clone(), gen.clone());

    blender.blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false)).await.unwrap();
    assert_eq!(gen.theme_calls(), 2);
    let searches = catalog.total_searches();
    assert_eq!(searches, 4);

    let report = blender
        .blend(&auth(), request(&["Rock", "JAZZ"], PlaylistTarget::Create, false))
        .await
        .unwrap();
    assert_eq!(gen.theme_calls(), 2);
    assert_eq!(report.candidates[0].songs.len(), 4);
    // the same seed picks the same songs, all of which are cached now
    assert_eq!(catalog.total_searches(), searches);
}

#[tokio::test]
async fn completed_blends_are_recorded() {
    let (blender, _td) = build(&test_config(), Arc::new(catalog_with_all()), Arc::new(generator()));

    blender.blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false)).await.unwrap();
    let recent = blender.history().recent("mock_user", 10).await.unwrap();
    assert_eq!(recent, vec![("mock blend".to_string(), vec!["jazz".to_string(), "rock".to_string()])]);
}

#[tokio::test]
async fn small_theme_pool_gives_short_playlist() {
    let gen = Arc::new(
        MockGenerator::new()
            .with_theme("rock", &["Queen - Bohemian Rhapsody"])
            .with_theme("jazz", &["Miles Davis - So What", "queen - bohemian rhapsody"]),
    );
    let (blender, _td) = build(&test_config(), Arc::new(catalog_with_all()), gen);

    let report = blender
        .blend(&auth(), request(&["rock", "jazz"], PlaylistTarget::Create, false))
        .await
        .unwrap();
    assert_eq!(report.combined.len(), 2);
    assert_eq!(report.track_uris.len(), 2);
}
