//! Precache manifest resolution.

use std::collections::HashSet;

use offcache_client::resolve;
use offcache_core::Error;
use url::Url;

/// The precache list, resolved against the worker scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    urls: Vec<Url>,
}

impl PrecacheManifest {
    /// Resolve every entry, keeping list order.
    ///
    /// Two entries that resolve to the same URL are rejected; a bulk add
    /// cannot store the same request twice.
    pub fn resolve(scope: &Url, entries: &[String]) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(entries.len());

        for entry in entries {
            let url = resolve(scope, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))?;
            if !seen.insert(url.to_string()) {
                return Err(Error::DuplicatePrecache(url.to_string()));
            }
            urls.push(url);
        }

        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls.iter().any(|u| u == url)
    }
}
