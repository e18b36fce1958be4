use super::CatalogApi;
use crate::error::RemoteError;
use crate::models::{AuthContext, PlaylistSummary};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use std::time::Duration;

const CREATED_DESCRIPTION: &str = "Created with playlist-blender.";

/// Catalog backed by the Spotify Web API. The base URL is configurable so
/// tests can point it at a local mock server.
pub struct SpotifyCatalog {
    client: Client,
    api_base: String,
    request_timeout: Duration,
}

impl SpotifyCatalog {
    pub fn new(api_base: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn json_body(resp: Response) -> Result<serde_json::Value, RemoteError> {
        resp.json().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Parse a `Retry-After` header given in whole seconds.
fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pass successful responses through and classify the rest.
async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after(&resp);
        debug!("Spotify rate limited request to {} (retry_after={:?})", resp.url().path(), retry_after);
        return Err(RemoteError::RateLimited { retry_after });
    }
    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(RemoteError::Server { status: status.as_u16(), body })
    } else {
        Err(RemoteError::Client { status: status.as_u16(), body })
    }
}

#[async_trait]
impl CatalogApi for SpotifyCatalog {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn search_track(&self, auth: &AuthContext, query: &str) -> Result<Option<String>, RemoteError> {
        let url = self.url(&format!("/search?q={}&type=track&limit=1", urlencoding::encode(query)));
        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth.bearer())
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let j = Self::json_body(check_status(resp).await?).await?;
        Ok(j["tracks"]["items"]
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| first["uri"].as_str())
            .map(|s| s.to_string()))
    }

    async fn create_playlist(&self, auth: &AuthContext, name: &str) -> Result<String, RemoteError> {
        let url = self.url(&format!(
            "/users/{}/playlists",
            url::form_urlencoded::byte_serialize(auth.user_id.as_bytes()).collect::<String>()
        ));
        let body = json!({
            "name": name,
            "description": CREATED_DESCRIPTION,
            "public": true
        });
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth.bearer())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        let j = Self::json_body(check_status(resp).await?).await?;
        j["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RemoteError::Decode("create playlist response has no id".into()))
    }

    async fn replace_tracks(&self, auth: &AuthContext, playlist_id: &str, uris: &[String]) -> Result<(), RemoteError> {
        let url = self.url(&format!("/playlists/{}/tracks", playlist_id));
        let body = json!({ "uris": uris });
        let resp = self
            .client
            .put(&url)
            .header(AUTHORIZATION, auth.bearer())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn update_details(&self, auth: &AuthContext, playlist_id: &str, name: &str, description: &str) -> Result<(), RemoteError> {
        let url = self.url(&format!("/playlists/{}", playlist_id));
        let body = json!({ "name": name, "description": description });
        let resp = self
            .client
            .put(&url)
            .header(AUTHORIZATION, auth.bearer())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn playlist_description(&self, auth: &AuthContext, playlist_id: &str) -> Result<Option<String>, RemoteError> {
        let url = self.url(&format!("/playlists/{}?fields=description", playlist_id));
        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth.bearer())
            .timeout(self.request_timeout)
            .send()
            .await?;
        let j = Self::json_body(check_status(resp).await?).await?;
        Ok(j["description"].as_str().filter(|s| !s.is_empty()).map(|s| s.to_string()))
    }

    async fn list_playlists(&self, auth: &AuthContext) -> Result<Vec<PlaylistSummary>, RemoteError> {
        let mut playlists = Vec::new();
        let mut next_url = Some(self.url("/me/playlists?limit=50"));
        while let Some(url) = next_url {
            let resp = self
                .client
                .get(&url)
                .header(AUTHORIZATION, auth.bearer())
                .timeout(self.request_timeout)
                .send()
                .await?;
            let j = Self::json_body(check_status(resp).await?).await?;
            if let Some(items) = j["items"].as_array() {
                for pl in items {
                    let owned = pl["owner"]["id"].as_str() == Some(auth.user_id.as_str());
                    let collaborative = pl["collaborative"].as_bool().unwrap_or(false);
                    if !owned && !collaborative {
                        continue;
                    }
                    match (pl["id"].as_str(), pl["name"].as_str()) {
                        (Some(id), Some(name)) => playlists.push(PlaylistSummary { id: id.to_string(), name: name.to_string() }),
                        _ => warn!("Skipping playlist entry without id or name"),
                    }
                }
            }
            next_url = j["next"].as_str().map(|s| s.to_string());
        }
        playlists.sort_by_key(|p| p.name.to_lowercase());
        Ok(playlists)
    }
}
