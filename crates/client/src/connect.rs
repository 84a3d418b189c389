//! Wiring from configuration to a ready catalog service.

use appshelf_core::{AppConfig, CatalogService, Error, LocalCache, ServiceOptions};

use crate::rest::{RestConfig, RestRemoteStore};

/// Build a catalog service backed by the REST remote and the on-disk cache.
///
/// The configuration is validated and the remote probed first. A cache file
/// that cannot be opened degrades to an in-memory cache rather than failing.
pub async fn connect(config: &AppConfig) -> Result<CatalogService<RestRemoteStore>, Error> {
    config.validate()?;

    let remote = RestRemoteStore::connect(RestConfig::from_app_config(config)?).await?;

    let cache = match LocalCache::open(&config.cache_path).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(
                path = %config.cache_path.display(),
                error = %e,
                "cache file unavailable, falling back to in-memory cache"
            );
            LocalCache::open_in_memory().await?
        }
    };

    Ok(CatalogService::new(remote, cache, ServiceOptions::from(config)))
}
