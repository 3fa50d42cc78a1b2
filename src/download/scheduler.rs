//! Concurrent tile download scheduling.
//!
//! One supervisor task per area fans individual tile fetches out through a
//! global semaphore shared by every in-flight area. Progress is published on a
//! watch channel from the supervisor alone, which keeps the delivered values
//! monotonically non-decreasing and the terminal value exactly-once.

use crate::core::geo::TileCoord;
use crate::coverage;
use crate::download::area::DownloadArea;
use crate::error::ChartError;
use crate::fetch::{TileFetcher, TileUrlBuilder};
use crate::store::TileStore;
use crate::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

/// Configuration for the download scheduler.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Simultaneous requests allowed across all in-flight areas.
    pub max_concurrent: usize,
    /// Retries per tile after the first failed attempt.
    pub max_retries: usize,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Re-fetch tiles even when they are already cached.
    pub force_refresh: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            min_zoom: coverage::MIN_ZOOM,
            max_zoom: coverage::MAX_ZOOM,
            force_refresh: true,
        }
    }
}

impl DownloadConfig {
    pub fn zoom_range(&self) -> RangeInclusive<u8> {
        self.min_zoom..=self.max_zoom
    }
}

/// Observable state of one area's download.
#[derive(Debug, Clone)]
pub enum DownloadStatus {
    Downloading { progress: f32 },
    Failed(ChartError),
    Complete,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Downloading { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

struct Inflight {
    status_rx: watch::Receiver<DownloadStatus>,
    supervisor: tokio::task::JoinHandle<()>,
    /// Distinguishes this run from any later run for the same area, so a
    /// finishing supervisor never evicts an entry it no longer owns.
    generation: u64,
}

/// Fetches the needed tiles of one area at a time, per area, skipping tiles
/// already on disk unless force-refresh is requested.
///
/// Starting a download for an area id supersedes any previous in-flight entry
/// for that id, so at most one scheduler run exists per area.
pub struct DownloadScheduler {
    store: Arc<TileStore>,
    fetcher: Arc<dyn TileFetcher>,
    urls: Arc<dyn TileUrlBuilder>,
    config: DownloadConfig,
    permits: Arc<Semaphore>,
    cached: Arc<RwLock<HashSet<TileCoord>>>,
    inflight: Arc<Mutex<HashMap<Uuid, Inflight>>>,
    generations: AtomicU64,
}

impl DownloadScheduler {
    pub fn new(
        store: Arc<TileStore>,
        fetcher: Arc<dyn TileFetcher>,
        urls: Arc<dyn TileUrlBuilder>,
        cached: Arc<RwLock<HashSet<TileCoord>>>,
        config: DownloadConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            store,
            fetcher,
            urls,
            config,
            permits,
            cached,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Begin downloading `area`, replacing any in-flight download for the same
    /// id. `on_complete` runs once with the area id and its total on-disk byte
    /// size when every tile resolved successfully.
    pub fn start<F>(
        &self,
        area: &DownloadArea,
        force_refresh: bool,
        on_complete: F,
    ) -> watch::Receiver<DownloadStatus>
    where
        F: FnOnce(Uuid, u64) + Send + 'static,
    {
        let (status_tx, status_rx) = watch::channel(DownloadStatus::Downloading { progress: 0.0 });
        let id = area.id;

        // the table lock is held across abort, spawn and insert so the old
        // run is gone before the new one becomes visible
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = inflight.remove(&id) {
            log::debug!("superseding in-flight download for area {}", id);
            previous.supervisor.abort();
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let supervisor = tokio::spawn(Self::run_download(
            area.clone(),
            force_refresh,
            generation,
            self.store.clone(),
            self.fetcher.clone(),
            self.urls.clone(),
            self.config.clone(),
            self.permits.clone(),
            self.cached.clone(),
            self.inflight.clone(),
            status_tx,
            on_complete,
        ));
        inflight.insert(
            id,
            Inflight {
                status_rx: status_rx.clone(),
                supervisor,
                generation,
            },
        );

        status_rx
    }

    /// Observe an in-flight (or terminally failed) download, if one exists.
    pub fn subscribe(&self, id: Uuid) -> Option<watch::Receiver<DownloadStatus>> {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|entry| entry.status_rx.clone())
    }

    /// Abort all outstanding fetches for the area and drop its tracking
    /// entry. Tiles already written stay on disk.
    pub fn cancel(&self, id: Uuid) {
        let entry = self
            .inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if let Some(entry) = entry {
            entry.supervisor.abort();
            log::debug!("cancelled download for area {}", id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_download<F>(
        area: DownloadArea,
        force_refresh: bool,
        generation: u64,
        store: Arc<TileStore>,
        fetcher: Arc<dyn TileFetcher>,
        urls: Arc<dyn TileUrlBuilder>,
        config: DownloadConfig,
        permits: Arc<Semaphore>,
        cached: Arc<RwLock<HashSet<TileCoord>>>,
        inflight: Arc<Mutex<HashMap<Uuid, Inflight>>>,
        status: watch::Sender<DownloadStatus>,
        on_complete: F,
    ) where
        F: FnOnce(Uuid, u64) + Send + 'static,
    {
        if let Err(err) = store.ensure_cache_dir() {
            let _ = status.send(DownloadStatus::Failed(err));
            return;
        }

        let tiles = coverage::needed_tiles(&area.geometry, config.zoom_range());
        let total = tiles.len();
        if total == 0 {
            let _ = status.send(DownloadStatus::Failed(ChartError::geometry(
                "Download area covers no tiles.",
            )));
            return;
        }
        log::debug!("area {}: downloading {} tiles", area.id, total);

        let mut jobs: FuturesUnordered<_> = tiles
            .iter()
            .map(|tile| {
                Self::fetch_tile(
                    *tile,
                    force_refresh,
                    store.clone(),
                    fetcher.clone(),
                    urls.clone(),
                    &config,
                    permits.clone(),
                    cached.clone(),
                )
            })
            .collect();

        let mut completed = 0usize;
        while let Some(outcome) = jobs.next().await {
            match outcome {
                Ok(()) => {
                    completed += 1;
                    let progress = completed as f32 / total as f32;
                    let _ = status.send(DownloadStatus::Downloading { progress });
                }
                Err(err) => {
                    // dropping the remaining futures aborts their fetches
                    log::error!("area {} download failed: {}", area.id, err);
                    let _ = status.send(DownloadStatus::Failed(err));
                    return;
                }
            }
        }
        drop(jobs);

        let size_bytes = tiles.iter().map(|tile| store.size_of(tile)).sum();
        on_complete(area.id, size_bytes);
        let _ = status.send(DownloadStatus::Complete);

        // completed downloads stop being tracked; the manager resolves later
        // progress queries from the stamped completion time. A superseding
        // start may have replaced the entry, in which case it stays.
        let mut table = inflight.lock().unwrap_or_else(|e| e.into_inner());
        if table
            .get(&area.id)
            .map_or(false, |entry| entry.generation == generation)
        {
            table.remove(&area.id);
        }
        drop(table);
        log::debug!("area {}: download complete ({} bytes)", area.id, size_bytes);
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_tile(
        tile: TileCoord,
        force_refresh: bool,
        store: Arc<TileStore>,
        fetcher: Arc<dyn TileFetcher>,
        urls: Arc<dyn TileUrlBuilder>,
        config: &DownloadConfig,
        permits: Arc<Semaphore>,
        cached: Arc<RwLock<HashSet<TileCoord>>>,
    ) -> Result<()> {
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|_| ChartError::Interrupted)?;

        // skip-if-cached still counts toward progress
        if !force_refresh && store.exists(&tile) {
            if let Ok(mut set) = cached.write() {
                set.insert(tile);
            }
            return Ok(());
        }

        let url = urls.url(&tile);
        let mut last_err = ChartError::network("no fetch attempts were made");
        for attempt in 1..=config.max_retries + 1 {
            if attempt > 1 {
                tokio::time::sleep(config.retry_delay).await;
            }
            log::debug!("fetch tile {:?} attempt {}", tile, attempt);
            match fetcher.fetch(&url).await {
                Ok(bytes) => {
                    store.write(&tile, &bytes)?;
                    if let Ok(mut set) = cached.write() {
                        set.insert(tile);
                    }
                    return Ok(());
                }
                Err(err) => {
                    log::warn!("tile {:?} attempt {} failed: {}", tile, attempt, err);
                    last_err = err;
                }
            }
        }
        log::error!("giving up on tile {:?}", tile);
        Err(last_err)
    }
}
