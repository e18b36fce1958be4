use super::{CatalogApi, SongGenerator};
use crate::error::RemoteError;
use crate::models::{normalize_key, AuthContext, PlaylistSummary};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// One scripted reply to a search.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Found(String),
    Empty,
    RateLimited(Option<Duration>),
    ServerError,
    ClientError,
}

impl MockResponse {
    fn into_result(self) -> Result<Option<String>, RemoteError> {
        match self {
            MockResponse::Found(uri) => Ok(Some(uri)),
            MockResponse::Empty => Ok(None),
            MockResponse::RateLimited(retry_after) => Err(RemoteError::RateLimited { retry_after }),
            MockResponse::ServerError => Err(RemoteError::Server { status: 503, body: "unavailable".into() }),
            MockResponse::ClientError => Err(RemoteError::Client { status: 400, body: "bad request".into() }),
        }
    }
}

/// Playlist operations recorded by the mock catalog, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    Create { name: String },
    Details { playlist_id: String, name: String, description: String },
    Replace { playlist_id: String, uris: Vec<String> },
}

/// In-memory catalog used in tests and dry runs. Searches consume scripted
/// replies first, then fall back to the fixed track table.
#[derive(Default)]
pub struct MockCatalog {
    tracks: HashMap<String, String>,
    scripts: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    delays: HashMap<String, Duration>,
    descriptions: HashMap<String, String>,
    playlists: Vec<PlaylistSummary>,
    fail_replace: bool,
    search_calls: Mutex<HashMap<String, u32>>,
    total_searches: AtomicUsize,
    calls: Mutex<Vec<CatalogCall>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, title: &str, uri: &str) -> Self {
        self.tracks.insert(normalize_key(title), uri.to_string());
        self
    }

    pub fn with_script(self, title: &str, replies: Vec<MockResponse>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(normalize_key(title), replies.into());
        }
        self
    }

    /// Delay every search for `title` by `delay`.
    pub fn with_delay(mut self, title: &str, delay: Duration) -> Self {
        self.delays.insert(normalize_key(title), delay);
        self
    }

    pub fn with_description(mut self, playlist_id: &str, description: &str) -> Self {
        self.descriptions.insert(playlist_id.to_string(), description.to_string());
        self
    }

    pub fn with_playlist(mut self, id: &str, name: &str) -> Self {
        self.playlists.push(PlaylistSummary { id: id.to_string(), name: name.to_string() });
        self
    }

    /// Make every `replace_tracks` call fail with a client error.
    pub fn failing_replace(mut self) -> Self {
        self.fail_replace = true;
        self
    }

    /// Searches issued for `title` (case-insensitive).
    pub fn search_calls(&self, title: &str) -> u32 {
        self.search_calls
            .lock()
            .map(|c| c.get(&normalize_key(title)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_searches(&self) -> usize {
        self.total_searches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: CatalogCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_track(&self, _auth: &AuthContext, query: &str) -> Result<Option<String>, RemoteError> {
        let key = normalize_key(query);
        self.total_searches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.search_calls.lock() {
            *calls.entry(key.clone()).or_insert(0) += 1;
        }
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        let scripted = self.scripts.lock().ok().and_then(|mut s| s.get_mut(&key).and_then(|q| q.pop_front()));
        match scripted {
            Some(reply) => reply.into_result(),
            None => Ok(self.tracks.get(&key).cloned()),
        }
    }

    async fn create_playlist(&self, auth: &AuthContext, name: &str) -> Result<String, RemoteError> {
        info!("MockCatalog: create_playlist {} for {}", name, auth.user_id);
        self.record(CatalogCall::Create { name: name.to_string() });
        Ok(format!("mock-playlist-{}", normalize_key(name).replace(' ', "-")))
    }

    async fn replace_tracks(&self, _auth: &AuthContext, playlist_id: &str, uris: &[String]) -> Result<(), RemoteError> {
        info!("MockCatalog: replace_tracks {} -> {} tracks", playlist_id, uris.len());
        if self.fail_replace {
            return Err(RemoteError::Client { status: 403, body: "forbidden".into() });
        }
        self.record(CatalogCall::Replace { playlist_id: playlist_id.to_string(), uris: uris.to_vec() });
        Ok(())
    }

    async fn update_details(&self, _auth: &AuthContext, playlist_id: &str, name: &str, description: &str) -> Result<(), RemoteError> {
        info!("MockCatalog: update_details {} -> {}", playlist_id, name);
        self.record(CatalogCall::Details {
            playlist_id: playlist_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        });
        Ok(())
    }

    async fn playlist_description(&self, _auth: &AuthContext, playlist_id: &str) -> Result<Option<String>, RemoteError> {
        Ok(self.descriptions.get(playlist_id).cloned())
    }

    async fn list_playlists(&self, _auth: &AuthContext) -> Result<Vec<PlaylistSummary>, RemoteError> {
        let mut playlists = self.playlists.clone();
        playlists.sort_by_key(|p| p.name.to_lowercase());
        Ok(playlists)
    }
}

/// Generator returning canned text per theme.
pub struct MockGenerator {
    themes: HashMap<String, String>,
    name: String,
    description: String,
    theme_calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            themes: HashMap::new(),
            name: "mock blend".into(),
            description: "Here's some mock vibes, generated with playlist-blender.".into(),
            theme_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_theme(mut self, theme: &str, songs: &[&str]) -> Self {
        self.themes.insert(normalize_key(theme), songs.join("\n"));
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn theme_calls(&self) -> usize {
        self.theme_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SongGenerator for MockGenerator {
    async fn theme_playlist(&self, theme: &str, _length: usize) -> Result<String> {
        self.theme_calls.fetch_add(1, Ordering::SeqCst);
        self.themes
            .get(&normalize_key(theme))
            .cloned()
            .ok_or_else(|| anyhow!("no canned playlist for theme {:?}", theme))
    }

    async fn playlist_name(&self, _songs: &[String]) -> Result<String> {
        Ok(self.name.clone())
    }

    async fn playlist_description(&self, _songs: &[String]) -> Result<String> {
        Ok(self.description.clone())
    }
}
