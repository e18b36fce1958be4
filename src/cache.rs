//! Persistent caches shared by every request: resolved song titles and
//! generated theme lists. All SQLite work runs on the blocking pool.
use crate::db::{self, DbPool};
use crate::models::normalize_key;
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Case-insensitive title → track URI cache.
#[derive(Clone)]
pub struct TitleCache {
    pool: DbPool,
}

impl TitleCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Known URIs for `titles`, keyed by the title as given. Titles with no
    /// stored URI are absent.
    pub async fn lookup_many(&self, titles: &[String]) -> Result<HashMap<String, String>> {
        if titles.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.clone();
        let keys: Vec<String> = titles.iter().map(|t| normalize_key(t)).collect();
        let found = tokio::task::spawn_blocking(move || -> Result<HashMap<String, String>> {
            let conn = pool.get().context("checking out connection for title lookup")?;
            db::lookup_song_uris(&conn, &keys)
        })
        .await??;

        let mut out = HashMap::new();
        for title in titles {
            if let Some(uri) = found.get(&normalize_key(title)) {
                out.insert(title.clone(), uri.clone());
            }
        }
        Ok(out)
    }

    /// Store `(title, uri)` pairs. A title that already has a URI keeps it;
    /// concurrent inserts of the same title resolve to a no-op. Returns the
    /// number of rows written.
    pub async fn insert_many(&self, entries: Vec<(String, String)>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let pool = self.pool.clone();
        let rows: Vec<(String, String, String)> = entries
            .into_iter()
            .map(|(title, uri)| {
                let key = normalize_key(&title);
                (title.trim().to_string(), key, uri)
            })
            .collect();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut conn = pool.get().context("checking out connection for title insert")?;
            match db::upsert_song_uris(&mut conn, &rows) {
                Ok(n) => Ok(n),
                Err(e) => {
                    // The batch rolled back; write what we can row by row.
                    warn!("Bulk title insert failed ({}); retrying {} rows individually", e, rows.len());
                    let mut written = 0;
                    for (name, key, uri) in &rows {
                        match db::upsert_song_uri(&conn, name, key, uri) {
                            Ok(true) => written += 1,
                            Ok(false) => {}
                            Err(e) => debug!("Skipping cache row for {:?}: {}", name, e),
                        }
                    }
                    Ok(written)
                }
            }
        })
        .await?
    }
}

/// Case-insensitive theme → generated candidate list cache.
#[derive(Clone)]
pub struct ThemeCache {
    pool: DbPool,
}

impl ThemeCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, theme: &str) -> Result<Option<Vec<String>>> {
        let pool = self.pool.clone();
        let key = normalize_key(theme);
        tokio::task::spawn_blocking(move || -> Result<Option<Vec<String>>> {
            let conn = pool.get()?;
            db::get_theme_songs(&conn, &key)
        })
        .await?
    }

    /// Store a generated list. A list already stored for the theme wins.
    pub async fn put(&self, theme: &str, songs: &[String]) -> Result<bool> {
        let pool = self.pool.clone();
        let key = normalize_key(theme);
        let songs = songs.to_vec();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let conn = pool.get()?;
            db::insert_theme_songs(&conn, &key, &songs)
        })
        .await?
    }
}

/// Record of completed blends.
#[derive(Clone)]
pub struct BlendHistory {
    pool: DbPool,
}

impl BlendHistory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, playlist_name: &str, user_id: &str, themes: &[String]) -> Result<()> {
        let pool = self.pool.clone();
        let (name, user, themes) = (playlist_name.to_string(), user_id.to_string(), themes.to_vec());
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get()?;
            db::record_blend(&conn, &name, &user, &themes)
        })
        .await?
    }

    pub async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<(String, Vec<String>)>> {
        let pool = self.pool.clone();
        let user = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<(String, Vec<String>)>> {
            let conn = pool.get()?;
            db::recent_blends(&conn, &user, limit)
        })
        .await?
    }
}
