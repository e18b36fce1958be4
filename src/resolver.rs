use crate::cache::TitleCache;
use crate::client::RateLimitedClient;
use crate::models::{normalize_key, AuthContext};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Maps song titles to track URIs: cache first, then bounded concurrent
/// searches under a batch deadline.
///
/// The search permits are owned by the resolver, so when one resolver is
/// shared across requests the concurrency cap holds for all of them together.
pub struct BatchResolver {
    client: Arc<RateLimitedClient>,
    cache: TitleCache,
    permits: Arc<Semaphore>,
    batch_timeout: Duration,
}

impl BatchResolver {
    pub fn new(client: Arc<RateLimitedClient>, cache: TitleCache, max_concurrent: usize, batch_timeout: Duration) -> Self {
        Self {
            client,
            cache,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            batch_timeout,
        }
    }

    /// Resolve `titles`, returning a URI for every title (as given) that
    /// resolved. Titles differing only in case or surrounding whitespace are
    /// looked up and searched once. Titles the catalog has no match for, that
    /// failed after retries, or that were still pending at the deadline are
    /// simply absent.
    pub async fn resolve(&self, auth: &AuthContext, titles: &[String]) -> Result<HashMap<String, String>> {
        // normalized key -> first spelling seen
        let mut unique: HashMap<String, String> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for title in titles {
            let key = normalize_key(title);
            if key.is_empty() || unique.contains_key(&key) {
                continue;
            }
            unique.insert(key.clone(), title.trim().to_string());
            order.push(key);
        }
        if order.is_empty() {
            return Ok(HashMap::new());
        }

        let representatives: Vec<String> = order.iter().filter_map(|k| unique.get(k).cloned()).collect();
        let mut by_key: HashMap<String, String> = self
            .cache
            .lookup_many(&representatives)
            .await?
            .into_iter()
            .map(|(title, uri)| (normalize_key(&title), uri))
            .collect();

        let uncached: Vec<String> = representatives
            .into_iter()
            .filter(|t| !by_key.contains_key(&normalize_key(t)))
            .collect();
        debug!("{} titles cached, {} to search", by_key.len(), uncached.len());

        if !uncached.is_empty() {
            let found = self.search_all(auth, uncached).await;
            if !found.is_empty() {
                match self.cache.insert_many(found.clone()).await {
                    Ok(n) => debug!("Cached {} new title resolutions", n),
                    Err(e) => warn!("Failed to cache {} title resolutions: {:#}", found.len(), e),
                }
            }
            for (title, uri) in found {
                by_key.entry(normalize_key(&title)).or_insert(uri);
            }
        }

        let mut out = HashMap::new();
        for title in titles {
            if let Some(uri) = by_key.get(&normalize_key(title)) {
                out.insert(title.clone(), uri.clone());
            }
        }
        Ok(out)
    }

    /// Search every title concurrently; return the ones that resolved before
    /// the batch deadline.
    async fn search_all(&self, auth: &AuthContext, titles: Vec<String>) -> Vec<(String, String)> {
        let total = titles.len();
        let mut tasks = JoinSet::new();
        for title in titles {
            let client = self.client.clone();
            let permits = self.permits.clone();
            let auth = auth.clone();
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => client.search(&auth, &title).await,
                    Err(_) => Ok(None),
                };
                (title, result)
            });
        }

        let mut found = Vec::new();
        let deadline = tokio::time::sleep(self.batch_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        "Batch deadline of {:?} reached; abandoning {} of {} searches",
                        self.batch_timeout,
                        tasks.len(),
                        total
                    );
                    // Aborted tasks never report back, so a late result can't reach the cache.
                    tasks.abort_all();
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((title, Ok(Some(uri))))) => found.push((title, uri)),
                    Some(Ok((title, Ok(None)))) => debug!("No catalog match for {:?}", title),
                    Some(Ok((title, Err(e)))) => warn!("Could not resolve {:?}: {}", title, e),
                    Some(Err(e)) => warn!("Search task failed: {}", e),
                    None => break,
                },
            }
        }
        info!("Resolved {} of {} searched titles", found.len(), total);
        found
    }
}

/// Track URIs in the order of `titles`, skipping titles that did not resolve.
pub fn ordered_uris(titles: &[String], resolved: &HashMap<String, String>) -> Vec<String> {
    titles.iter().filter_map(|t| resolved.get(t).cloned()).collect()
}
