use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

static SCHEMA: &str = include_str!("../db/schema.sql");

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Connection settings applied to every pooled connection. WAL lets readers
/// proceed while a request is writing; the busy timeout covers two requests
/// writing the same song at once.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA busy_timeout = 5000;
";

pub fn open_or_create(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Build a connection pool for the database at `path`, creating the schema
/// if needed.
pub fn open_pool(path: &Path, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)
        .with_context(|| format!("building connection pool for {}", path.display()))?;
    let conn = pool.get()?;
    run_migrations(&conn).with_context(|| format!("running migrations on {}", path.display()))?;
    Ok(pool)
}

/// Look up track URIs for normalized title keys. Keys without a row, or with
/// a row whose URI is still NULL, are absent from the result.
pub fn lookup_song_uris(conn: &Connection, keys: &[String]) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare_cached("SELECT track_uri FROM songs WHERE name_key = ?1 AND track_uri IS NOT NULL LIMIT 1")?;
    let mut found = HashMap::new();
    for key in keys {
        let uri: Option<String> = stmt.query_row(params![key], |r| r.get(0)).optional()?;
        if let Some(uri) = uri {
            found.insert(key.clone(), uri);
        }
    }
    Ok(found)
}

/// Insert or fill one song row. An existing non-NULL URI is never replaced.
/// Returns true when the row was inserted or its URI filled in.
pub fn upsert_song_uri(conn: &Connection, name: &str, name_key: &str, uri: &str) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO songs (name, name_key, track_uri, created_at) VALUES (?1, ?2, ?3, strftime('%s','now')) ON CONFLICT(name_key) DO UPDATE SET track_uri = excluded.track_uri WHERE songs.track_uri IS NULL",
        params![name, name_key, uri],
    )?;
    Ok(changed > 0)
}

/// Upsert many `(name, name_key, uri)` rows in a single transaction.
pub fn upsert_song_uris(conn: &mut Connection, entries: &[(String, String, String)]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut changed = 0;
    for (name, key, uri) in entries {
        if upsert_song_uri(&tx, name, key, uri)? {
            changed += 1;
        }
    }
    tx.commit()?;
    Ok(changed)
}

/// Stored candidate list for a normalized theme key.
pub fn get_theme_songs(conn: &Connection, theme_key: &str) -> Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare("SELECT song_list FROM theme_playlists WHERE theme_key = ?1 LIMIT 1")?;
    let row: Option<String> = stmt.query_row(params![theme_key], |r| r.get(0)).optional()?;
    match row {
        Some(json) => {
            let songs: Vec<String> = serde_json::from_str(&json)
                .with_context(|| format!("parsing stored song list for theme {}", theme_key))?;
            Ok(Some(songs))
        }
        None => Ok(None),
    }
}

/// Store the candidate list for a theme. The first list stored for a key wins.
pub fn insert_theme_songs(conn: &Connection, theme_key: &str, songs: &[String]) -> Result<bool> {
    let json = serde_json::to_string(songs)?;
    let changed = conn.execute(
        "INSERT INTO theme_playlists (theme_key, song_list, created_at) VALUES (?1, ?2, strftime('%s','now')) ON CONFLICT(theme_key) DO NOTHING",
        params![theme_key, json],
    )?;
    Ok(changed > 0)
}

pub fn record_blend(conn: &Connection, playlist_name: &str, user_id: &str, themes: &[String]) -> Result<()> {
    let json = serde_json::to_string(themes)?;
    conn.execute(
        "INSERT INTO blend_history (playlist_name, user_id, themes, created_at) VALUES (?1, ?2, ?3, strftime('%s','now'))",
        params![playlist_name, user_id, json],
    )?;
    Ok(())
}

/// Most recent blends for a user, newest first: `(playlist_name, themes)`.
pub fn recent_blends(conn: &Connection, user_id: &str, limit: usize) -> Result<Vec<(String, Vec<String>)>> {
    let mut stmt = conn.prepare("SELECT playlist_name, themes FROM blend_history WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2")?;
    let rows = stmt.query_map(params![user_id, limit as i64], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut v = Vec::new();
    for row in rows {
        let (name, themes_json) = row?;
        let themes: Vec<String> = serde_json::from_str(&themes_json)
            .with_context(|| format!("parsing stored themes for blend {:?}", name))?;
        v.push((name, themes));
    }
    Ok(v)
}
