//!
//! src/catalog.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Resolves history artist names to catalog metadata. Matching is
//! exact and first-match-wins, results are memoized per name for the
//! life of the process
//!

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::StatsError;
use crate::fetch::SpotifySession;
use crate::types::ArtistMetadata;

/// Anything that can run an artist search, in server order
#[async_trait]
pub trait ArtistSearch {
    async fn search_artists(&self, name: &str) -> Result<Vec<ArtistMetadata>, StatsError>;
}

#[async_trait]
impl ArtistSearch for SpotifySession {
    async fn search_artists(&self, name: &str) -> Result<Vec<ArtistMetadata>, StatsError> {
        self.search(name).await
    }
}

/// First result whose name equals `name` byte for byte, else empty
pub fn select_exact(name: &str, items: Vec<ArtistMetadata>) -> ArtistMetadata {
    items.into_iter()
        .find(|artist| artist.name.as_deref() == Some(name))
        .unwrap_or_default()
}

pub struct CatalogLookup<S> {
    search: S,
    cache: HashMap<String, ArtistMetadata>
}

impl<S: ArtistSearch> CatalogLookup<S> {
    pub fn new(search: S) -> Self {
        Self { search, cache: HashMap::new() }
    }

    ///
    /// Never fails: a search error degrades to empty metadata, which is
    /// cached like any other answer so a name is searched at most once.
    ///
    pub async fn lookup(&mut self, name: &str) -> ArtistMetadata {
        if let Some(hit) = self.cache.get(name) {
            debug!(artist = %name, "catalog.cache_hit");
            return hit.clone();
        }

        let artist = match self.search.search_artists(name).await {
            Ok(items) => {
                let candidates = items.len();
                let artist = select_exact(name, items);
                debug!(
                    artist = %name,
                    candidates,
                    matched = !artist.is_empty(),
                    "catalog.lookup"
                );
                artist
            },
            Err(e) => {
                warn!(artist = %name, error = %e, "catalog.lookup.failed");
                ArtistMetadata::default()
            }
        };
        self.cache.insert(name.to_string(), artist.clone());
        artist
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
