use playlist_blender::cache::{BlendHistory, ThemeCache, TitleCache};
use playlist_blender::db;
use tempfile::tempdir;

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn lookup_is_case_insensitive_and_keyed_by_given_title() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 4).unwrap();
    let cache = TitleCache::new(pool);

    let written = cache
        .insert_many(vec![("Daft Punk - Around the World".into(), "spotify:track:atw".into())])
        .await
        .unwrap();
    assert_eq!(written, 1);

    let found = cache
        .lookup_many(&strings(&["  daft punk - AROUND THE WORLD ", "Unknown - Nothing"]))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found["  daft punk - AROUND THE WORLD "], "spotify:track:atw");
}

#[tokio::test]
async fn existing_uri_is_kept_on_reinsert() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 4).unwrap();
    let cache = TitleCache::new(pool);

    cache.insert_many(vec![("Song".into(), "spotify:track:first".into())]).await.unwrap();
    let written = cache.insert_many(vec![("SONG".into(), "spotify:track:second".into())]).await.unwrap();
    assert_eq!(written, 0);

    let found = cache.lookup_many(&strings(&["song"])).await.unwrap();
    assert_eq!(found["song"], "spotify:track:first");
}

#[tokio::test]
async fn empty_inputs_are_no_ops() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 2).unwrap();
    let cache = TitleCache::new(pool);
    assert!(cache.lookup_many(&[]).await.unwrap().is_empty());
    assert_eq!(cache.insert_many(Vec::new()).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_of_the_same_title_do_not_fail() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 8).unwrap();
    let cache = TitleCache::new(pool);

    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let title = if i % 2 == 0 { "Shared Song" } else { "shared song" };
            cache
                .insert_many(vec![
                    (title.to_string(), format!("spotify:track:{}", i)),
                    (format!("Own Song {}", i), format!("spotify:track:own{}", i)),
                ])
                .await
        }));
    }
    let mut total = 0;
    for h in handles {
        total += h.await.unwrap().expect("insert should tolerate conflicts");
    }
    // one winner for the shared title plus every distinct title
    assert_eq!(total, 9);

    let found = cache.lookup_many(&strings(&["SHARED SONG"])).await.unwrap();
    assert!(found["SHARED SONG"].starts_with("spotify:track:"));
}

#[tokio::test]
async fn theme_cache_round_trip_and_first_write_wins() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 2).unwrap();
    let themes = ThemeCache::new(pool);

    assert!(themes.get("Jazz").await.unwrap().is_none());
    assert!(themes.put(" Jazz ", &strings(&["Miles Davis - So What"])).await.unwrap());
    assert!(!themes.put("jazz", &strings(&["Other - Song"])).await.unwrap());
    assert_eq!(themes.get("JAZZ").await.unwrap(), Some(strings(&["Miles Davis - So What"])));
}

#[tokio::test]
async fn blend_history_records_per_user() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 2).unwrap();
    let history = BlendHistory::new(pool);

    history.record("Sunday Mix", "alice", &strings(&["jazz", "rock"])).await.unwrap();
    history.record("Gym Mix", "bob", &strings(&["metal", "techno"])).await.unwrap();

    let recent = history.recent("alice", 5).await.unwrap();
    assert_eq!(recent, vec![("Sunday Mix".to_string(), strings(&["jazz", "rock"]))]);
}

#[tokio::test]
async fn rejected_row_does_not_block_the_rest_of_the_batch() {
    let td = tempdir().unwrap();
    let pool = db::open_pool(&td.path().join("cache.db"), 2).unwrap();
    pool.get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON songs WHEN NEW.name_key = 'poison' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
    let cache = TitleCache::new(pool);

    let written = cache
        .insert_many(vec![
            ("Good".into(), "spotify:track:good".into()),
            ("Poison".into(), "spotify:track:poison".into()),
            ("Other".into(), "spotify:track:other".into()),
        ])
        .await
        .expect("a rejected row is skipped, not fatal");
    assert_eq!(written, 2);

    let found = cache.lookup_many(&strings(&["good", "poison", "other"])).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["good"], "spotify:track:good");
    assert_eq!(found["other"], "spotify:track:other");
}
