use serde::{Deserialize, Serialize};
use std::fmt;

/// Track URIs accepted by the publish step.
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

/// Cache and equality key for song titles and themes.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Credentials for the remote catalog, passed explicitly to every call.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub access_token: String,
    pub user_id: String,
}

impl AuthContext {
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), user_id: user_id.into() }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Song titles generated for one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    pub theme: String,
    pub songs: Vec<String>,
}

impl CandidateList {
    pub fn new(theme: impl Into<String>, songs: Vec<String>) -> Self {
        Self { theme: theme.into(), songs }
    }
}

/// Playlist the user can modify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum PlaylistTarget {
    /// Overwrite an existing playlist. `name` is its current name, kept
    /// unless the request asks for a rename.
    Existing { id: String, name: String },
    /// Create a fresh playlist; name and description are always generated.
    Create,
}

#[derive(Debug, Clone)]
pub struct BlendRequest {
    pub themes: Vec<String>,
    pub target: PlaylistTarget,
    pub rename: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlendReport {
    pub playlist_id: String,
    pub playlist_name: String,
    pub description: String,
    pub candidates: Vec<CandidateList>,
    pub combined: Vec<String>,
    pub track_uris: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Generate,
    Merge,
    Resolve,
    Name,
    Describe,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Generate => "generate",
            Stage::Merge => "merge",
            Stage::Resolve => "resolve",
            Stage::Name => "name",
            Stage::Describe => "describe",
            Stage::Publish => "publish",
        };
        f.write_str(s)
    }
}
