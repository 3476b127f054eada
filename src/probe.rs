//! Existence checks for candidate media assets.
//!
//! A probe answers one question: does a resource exist at this location?
//! No body is transferred. Failures of any kind answer `false`; a miss is routine,
//! not an error.

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use std::path::Path;

/// Builds `{base}{index}.{ext}`.
pub fn candidate_url(base: &str, index: u32, ext: &str) -> String {
    format!("{}{}.{}", base, index, ext)
}

#[async_trait]
pub trait AssetProbe: Send + Sync {
    async fn exists(&self, url: &str) -> bool;
}

#[async_trait]
impl<T: AssetProbe + ?Sized> AssetProbe for Box<T> {
    async fn exists(&self, url: &str) -> bool {
        (**self).exists(url).await
    }
}

/// Probes remote assets with `HEAD` requests.
#[derive(Clone, Debug, Default)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetProbe for HttpProbe {
    async fn exists(&self, url: &str) -> bool {
        trace!("HEAD probe: {}", url);
        // Caching layers must not answer existence checks.
        match self.client.head(url).header(CACHE_CONTROL, "no-cache").send().await {
            Ok(response) => {
                let found = response.status().is_success();
                trace!("HEAD probe {} -> {}", url, response.status());
                found
            }
            Err(e) => {
                debug!("HEAD probe failed for {}: {}", url, e);
                false
            }
        }
    }
}

/// Probes assets under a local directory by file metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsProbe;

#[async_trait]
impl AssetProbe for FsProbe {
    async fn exists(&self, url: &str) -> bool {
        let path = url.strip_prefix("file://").unwrap_or(url);
        match tokio::fs::metadata(Path::new(path)).await {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                trace!("File probe miss for {}: {}", path, e);
                false
            }
        }
    }
}

/// Whether `base` addresses remote media.
pub fn is_remote_base(base: &str) -> bool {
    base.starts_with("http://") || base.starts_with("https://")
}
