use common::DEFAULT_COVER;
use library::Catalog;
use tracing::{debug, warn};

use crate::external::ArtistSearch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSource {
    Cached,
    Fetched,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtistImage {
    pub url: String,
    pub source: ImageSource,
}

impl ArtistImage {
    fn fallback() -> Self {
        Self {
            url: DEFAULT_COVER.to_string(),
            source: ImageSource::Fallback,
        }
    }
}

/// Cache first, then one remote lookup. Only real pictures are cached; the
/// default cover is handed out uncached so the next call retries the search.
pub async fn resolve_artist_image(
    catalog: &Catalog,
    search: &dyn ArtistSearch,
    artist: &str,
) -> ArtistImage {
    match catalog.cached_artist_image(artist) {
        Ok(Some(url)) => {
            return ArtistImage {
                url,
                source: ImageSource::Cached,
            }
        }
        Ok(None) => {}
        Err(err) => warn!("Artist image cache lookup failed for {:?}: {}", artist, err),
    }

    match search.picture_url(artist).await {
        Ok(Some(url)) => {
            if let Err(err) = catalog.store_artist_image(artist, &url) {
                warn!("Failed to cache artist image for {:?}: {}", artist, err);
            }
            ArtistImage {
                url,
                source: ImageSource::Fetched,
            }
        }
        Ok(None) => {
            debug!("No artist picture found for {:?}", artist);
            ArtistImage::fallback()
        }
        Err(err) => {
            warn!("Artist search failed for {:?}: {}", artist, err);
            ArtistImage::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ExternalError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSearch {
        reply: Option<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeSearch {
        fn new(reply: Option<&'static str>, fail: bool) -> Self {
            Self {
                reply,
                fail,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtistSearch for FakeSearch {
        async fn picture_url(&self, _artist: &str) -> Result<Option<String>, ExternalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExternalError::Status(503));
            }
            Ok(self.reply.map(str::to_string))
        }
    }

    fn catalog() -> Catalog {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.init_tables().unwrap();
        catalog
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let catalog = catalog();
        let search = FakeSearch::new(Some("https://img/daft.jpg"), false);

        let first = resolve_artist_image(&catalog, &search, "Daft Punk").await;
        assert_eq!(first.source, ImageSource::Fetched);
        assert_eq!(first.url, "https://img/daft.jpg");

        let second = resolve_artist_image(&catalog, &search, "Daft Punk").await;
        assert_eq!(second.source, ImageSource::Cached);
        assert_eq!(second.url, first.url);
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn failures_fall_back_without_caching() {
        let catalog = catalog();
        let search = FakeSearch::new(None, true);

        let image = resolve_artist_image(&catalog, &search, "Nobody").await;
        assert_eq!(image.source, ImageSource::Fallback);
        assert_eq!(image.url, DEFAULT_COVER);

        resolve_artist_image(&catalog, &search, "Nobody").await;
        assert_eq!(search.calls(), 2);
        assert!(catalog.cached_artist_image("Nobody").unwrap().is_none());
    }

    #[tokio::test]
    async fn no_results_falls_back() {
        let catalog = catalog();
        let search = FakeSearch::new(None, false);
        let image = resolve_artist_image(&catalog, &search, "Obscure").await;
        assert_eq!(image, ArtistImage::fallback());
    }
}
