//! Blend orchestration: generate → merge → resolve → name → describe → publish.
//!
//! The first stage to fail ends the run; its error is reported together with
//! the stage name. Nothing is retried at this level: remote calls already
//! carry their own retry policy.
use crate::api::{CatalogApi, SongGenerator};
use crate::cache::{BlendHistory, ThemeCache, TitleCache};
use crate::client::{RateLimitedClient, RetryPolicy};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::BlendError;
use crate::merge::PlaylistMerger;
use crate::models::{normalize_key, AuthContext, BlendReport, BlendRequest, CandidateList, PlaylistTarget, Stage, TRACK_URI_PREFIX};
use crate::prompts::parse_song_lines;
use crate::resolver::{ordered_uris, BatchResolver};
use anyhow::{ensure, Context, Result};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct Blender {
    generator: Arc<dyn SongGenerator>,
    client: Arc<RateLimitedClient>,
    resolver: BatchResolver,
    themes: ThemeCache,
    history: BlendHistory,
    merger: PlaylistMerger,
    generation_concurrency: usize,
    max_tracks_per_replace: usize,
    merge_seed: Option<u64>,
}

impl Blender {
    pub fn new(cfg: &Config, pool: DbPool, catalog: Arc<dyn CatalogApi>, generator: Arc<dyn SongGenerator>) -> Self {
        let client = Arc::new(RateLimitedClient::new(catalog, RetryPolicy::from_config(cfg)));
        let resolver = BatchResolver::new(
            client.clone(),
            TitleCache::new(pool.clone()),
            cfg.search_concurrency,
            cfg.batch_timeout(),
        );
        Self {
            generator,
            client,
            resolver,
            themes: ThemeCache::new(pool.clone()),
            history: BlendHistory::new(pool),
            merger: PlaylistMerger::new(cfg.playlist_length),
            generation_concurrency: cfg.generation_concurrency.max(1),
            max_tracks_per_replace: cfg.max_tracks_per_replace,
            merge_seed: cfg.merge_seed,
        }
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    pub fn resolver(&self) -> &BatchResolver {
        &self.resolver
    }

    pub fn history(&self) -> &BlendHistory {
        &self.history
    }

    /// Run one blend for `auth`'s user.
    pub async fn blend(&self, auth: &AuthContext, request: BlendRequest) -> Result<BlendReport, BlendError> {
        let span = info_span!("blend", run = %Uuid::new_v4(), user = %auth.user_id);
        self.run(auth, request).instrument(span).await
    }

    async fn run(&self, auth: &AuthContext, request: BlendRequest) -> Result<BlendReport, BlendError> {
        let themes = normalize_themes(&request.themes)?;
        if let PlaylistTarget::Existing { id, .. } = &request.target {
            if id.trim().is_empty() {
                return Err(BlendError::Validation("no playlist selected".into()));
            }
        }

        info!("Sourcing playlists for {} themes", themes.len());
        let candidates = self.generate(&themes).await.map_err(BlendError::at(Stage::Generate))?;

        info!("Building combined playlist");
        let combined = {
            let mut rng = match self.merge_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            self.merger.merge(&candidates, &mut rng)
        }
        .map_err(BlendError::at(Stage::Merge))?;

        info!("Resolving {} songs", combined.len());
        let resolved = self
            .resolver
            .resolve(auth, &combined)
            .await
            .map_err(BlendError::at(Stage::Resolve))?;
        let uris = ordered_uris(&combined, &resolved);
        if uris.len() < combined.len() {
            info!("{} of {} songs could not be resolved", combined.len() - uris.len(), combined.len());
        }

        let generate_details = request.rename || matches!(request.target, PlaylistTarget::Create);

        info!("Naming playlist");
        let playlist_name = match (&request.target, generate_details) {
            (PlaylistTarget::Existing { name, .. }, false) => name.clone(),
            _ => self
                .generator
                .playlist_name(&combined)
                .await
                .context("generating playlist name")
                .map_err(BlendError::at(Stage::Name))?,
        };

        info!("Describing playlist");
        let description = match (&request.target, generate_details) {
            (PlaylistTarget::Existing { id, .. }, false) => self
                .client
                .playlist_description(auth, id)
                .await
                .context("reading current playlist description")
                .map_err(BlendError::at(Stage::Describe))?
                .unwrap_or_default(),
            _ => self
                .generator
                .playlist_description(&combined)
                .await
                .context("generating playlist description")
                .map_err(BlendError::at(Stage::Describe))?,
        };

        info!("Publishing playlist {:?}", playlist_name);
        let (playlist_id, track_uris) = self
            .publish(auth, &request.target, &playlist_name, &description, &uris)
            .await
            .map_err(BlendError::at(Stage::Publish))?;

        if let Err(e) = self.history.record(&playlist_name, &auth.user_id, &themes).await {
            warn!("Failed to record blend history: {:#}", e);
        }
        info!("Published {} tracks to {}", track_uris.len(), playlist_id);

        Ok(BlendReport {
            playlist_id,
            playlist_name,
            description,
            candidates,
            combined,
            track_uris,
        })
    }

    /// Candidate lists for every theme, in theme order.
    async fn generate(&self, themes: &[String]) -> Result<Vec<CandidateList>> {
        let results: Vec<(String, Result<Vec<String>>)> = stream::iter(themes.iter().cloned())
            .map(|theme| async move {
                let songs = self.candidates_for(&theme).await;
                (theme, songs)
            })
            .buffer_unordered(self.generation_concurrency)
            .collect()
            .await;

        let mut by_theme: HashMap<String, Vec<String>> = HashMap::new();
        for (theme, songs) in results {
            by_theme.insert(theme, songs?);
        }
        Ok(themes
            .iter()
            .map(|t| CandidateList::new(t.clone(), by_theme.remove(t).unwrap_or_default()))
            .collect())
    }

    async fn candidates_for(&self, theme: &str) -> Result<Vec<String>> {
        match self.themes.get(theme).await {
            Ok(Some(songs)) => {
                debug!("Theme {:?} served from cache ({} songs)", theme, songs.len());
                return Ok(songs);
            }
            Ok(None) => {}
            Err(e) => warn!("Theme cache lookup failed for {:?}: {:#}", theme, e),
        }

        let text = self
            .generator
            .theme_playlist(theme, self.merger.target_size())
            .await
            .with_context(|| format!("generating playlist for theme {:?}", theme))?;
        let songs = parse_song_lines(&text);
        if songs.is_empty() {
            warn!("Generator returned no songs for theme {:?}", theme);
        } else if let Err(e) = self.themes.put(theme, &songs).await {
            warn!("Failed to cache songs for theme {:?}: {:#}", theme, e);
        }
        Ok(songs)
    }

    /// Push name, description and tracks. Returns the playlist id and the
    /// URIs actually sent. A failure part-way can leave the remote playlist
    /// with new details but old tracks.
    async fn publish(
        &self,
        auth: &AuthContext,
        target: &PlaylistTarget,
        name: &str,
        description: &str,
        uris: &[String],
    ) -> Result<(String, Vec<String>)> {
        let valid: Vec<String> = uris
            .iter()
            .filter(|u| u.starts_with(TRACK_URI_PREFIX))
            .take(self.max_tracks_per_replace)
            .cloned()
            .collect();
        ensure!(!valid.is_empty(), "no valid song URIs to add to the playlist");

        let playlist_id = match target {
            PlaylistTarget::Existing { id, .. } => id.clone(),
            PlaylistTarget::Create => self.client.create_playlist(auth, name).await.context("creating playlist")?,
        };
        self.client
            .update_details(auth, &playlist_id, name, description)
            .await
            .context("updating playlist details")?;
        self.client
            .replace_tracks(auth, &playlist_id, &valid)
            .await
            .context("replacing playlist tracks")?;
        Ok((playlist_id, valid))
    }
}

/// Trim, drop blanks, dedupe case-insensitively and sort by code point, so
/// capitalized themes come first. At least two
/// themes must remain.
pub fn normalize_themes(raw: &[String]) -> Result<Vec<String>, BlendError> {
    let mut seen = HashSet::new();
    let mut themes: Vec<String> = raw
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(normalize_key(t)))
        .map(|t| t.to_string())
        .collect();
    themes.sort();
    if themes.len() < 2 {
        return Err(BlendError::Validation("please enter at least two themes".into()));
    }
    Ok(themes)
}
