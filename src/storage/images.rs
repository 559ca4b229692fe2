//! Photo download and on-disk layout: one directory per profile id, files
//! named by zero-based photo index.
//!
//! Fetching is fire-and-record: per-url failures are logged and skipped,
//! never aborting the batch. The trait seam exists because image transport
//! is an external collaborator and the harvest loop must be testable
//! without a network.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::PhotoSlot;

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download every present url in `photos` for profile `id`. Side effect
    /// only; completes after all attempts finished or were abandoned.
    async fn fetch(&self, id: u64, photos: &[PhotoSlot]);
}

pub fn image_dir(root: &Path, id: u64) -> PathBuf {
    root.join(id.to_string())
}

pub fn image_path(root: &Path, id: u64, index: usize) -> PathBuf {
    image_dir(root, id).join(format!("{}.jpg", index))
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
    root: PathBuf,
}

impl HttpImageFetcher {
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn fetch_one(client: reqwest::Client, url: String, dest: PathBuf) {
        let result: anyhow::Result<()> = async {
            let bytes = client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            tokio::fs::write(&dest, &bytes).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => debug!("saved {}", dest.display()),
            // A missing image file is an acceptable terminal outcome.
            Err(e) => warn!("image fetch failed for {}: {}", url, e),
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, id: u64, photos: &[PhotoSlot]) {
        let dir = image_dir(&self.root, id);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("cannot create image dir {}: {}", dir.display(), e);
            return;
        }

        // Pure network I/O, independent of UI state — the one step that may
        // run in parallel. The join keeps the iteration from advancing until
        // every attempt has settled.
        let tasks: Vec<_> = photos
            .iter()
            .filter_map(|slot| {
                let url = slot.url.clone()?;
                // Carousel styles sometimes carry blob:/data: URIs; only
                // plain HTTP(S) urls are fetchable.
                match url::Url::parse(&url) {
                    Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                    _ => {
                        warn!("skipping non-fetchable photo url '{}'", url);
                        return None;
                    }
                }
                let dest = image_path(&self.root, id, slot.index);
                let client = self.client.clone();
                Some(tokio::spawn(Self::fetch_one(client, url, dest)))
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            if let Err(e) = task {
                warn!("image fetch task join error: {}", e);
            }
        }
    }
}
