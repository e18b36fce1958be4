pub mod mock;
pub mod openai;
pub mod spotify;

use crate::error::RemoteError;
use crate::models::{AuthContext, PlaylistSummary};
use anyhow::Result;

/// Remote catalog: track search plus the playlist operations a blend needs.
/// Implementations: spotify::SpotifyCatalog, mock::MockCatalog.
///
/// Implementations make exactly one request per call and classify failures
/// into `RemoteError`; retrying is the caller's business.
#[async_trait::async_trait]
pub trait CatalogApi: Send + Sync {
    /// Best match for a free-text query. `Ok(None)` when nothing matched.
    async fn search_track(&self, auth: &AuthContext, query: &str) -> Result<Option<String>, RemoteError>;

    /// Create a playlist owned by `auth.user_id` and return its id.
    async fn create_playlist(&self, auth: &AuthContext, name: &str) -> Result<String, RemoteError>;

    /// Replace every track of a playlist (at most 100 URIs per call).
    async fn replace_tracks(&self, auth: &AuthContext, playlist_id: &str, uris: &[String]) -> Result<(), RemoteError>;

    async fn update_details(&self, auth: &AuthContext, playlist_id: &str, name: &str, description: &str) -> Result<(), RemoteError>;

    async fn playlist_description(&self, auth: &AuthContext, playlist_id: &str) -> Result<Option<String>, RemoteError>;

    /// Playlists the user owns or collaborates on, sorted by name.
    async fn list_playlists(&self, auth: &AuthContext) -> Result<Vec<PlaylistSummary>, RemoteError>;

    /// Return the catalog's name (for logging)
    fn name(&self) -> &str;
}

/// Generative text service producing songs, names and descriptions.
/// Implementations: openai::OpenAiGenerator, mock::MockGenerator.
#[async_trait::async_trait]
pub trait SongGenerator: Send + Sync {
    /// Raw completion text for a theme, nominally one "Artist - Title" per line.
    async fn theme_playlist(&self, theme: &str, length: usize) -> Result<String>;

    async fn playlist_name(&self, songs: &[String]) -> Result<String>;

    async fn playlist_description(&self, songs: &[String]) -> Result<String>;
}
