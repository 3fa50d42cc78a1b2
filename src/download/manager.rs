//! Area lifecycle management.
//!
//! [`AreaManager`] owns the declared download areas, persists them through the
//! injected [`PreferenceStore`], and drives the [`DownloadScheduler`] per
//! area. It is also the read path for cached tiles: a tile is served only when
//! it belongs to the set of blobs known to be on disk.

use crate::core::geo::TileCoord;
use crate::core::geometry::Geometry;
use crate::coverage;
use crate::download::area::DownloadArea;
use crate::download::scheduler::{DownloadConfig, DownloadScheduler, DownloadStatus};
use crate::error::ChartError;
use crate::fetch::{TileFetcher, TileUrlBuilder};
use crate::persist::PreferenceStore;
use crate::store::TileStore;
use crate::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;
use tokio::sync::watch;
use uuid::Uuid;

/// Preference key under which the area list is stored as JSON.
const DOWNLOAD_AREAS_KEY: &str = "downloadAreas";

/// Owns the download areas and the cached-tile index.
///
/// All mutation of the area list flows through this type, including the
/// completion stamp written by the scheduler's callback, so the persisted list
/// and the in-memory list never diverge.
pub struct AreaManager {
    store: Arc<TileStore>,
    prefs: Arc<dyn PreferenceStore>,
    scheduler: DownloadScheduler,
    config: DownloadConfig,
    areas: Arc<Mutex<Vec<DownloadArea>>>,
    cached: Arc<RwLock<HashSet<TileCoord>>>,
}

impl AreaManager {
    pub fn new(
        store: Arc<TileStore>,
        fetcher: Arc<dyn TileFetcher>,
        urls: Arc<dyn TileUrlBuilder>,
        prefs: Arc<dyn PreferenceStore>,
        config: DownloadConfig,
    ) -> Self {
        let cached = Arc::new(RwLock::new(HashSet::new()));
        let scheduler = DownloadScheduler::new(
            store.clone(),
            fetcher,
            urls,
            cached.clone(),
            config.clone(),
        );
        Self {
            store,
            prefs,
            scheduler,
            config,
            areas: Arc::new(Mutex::new(Vec::new())),
            cached,
        }
    }

    /// Load persisted areas and index the tiles already on disk.
    ///
    /// Areas stamped complete whose tiles are no longer all present lose their
    /// completion stamp, so they report as interrupted until re-downloaded.
    pub fn initialize(&self) -> Result<()> {
        self.store.ensure_cache_dir()?;

        let on_disk = self.store.list_all()?;
        log::info!("found {} cached tiles on startup", on_disk.len());
        if let Ok(mut set) = self.cached.write() {
            *set = on_disk.clone();
        }

        let mut areas = self.load_areas()?;
        let mut changed = false;
        for area in &mut areas {
            if area.completed_at.is_none() {
                continue;
            }
            let needed = coverage::needed_tiles(&area.geometry, self.config.zoom_range());
            if needed.iter().any(|tile| !on_disk.contains(tile)) {
                log::warn!(
                    "area {} is marked complete but is missing tiles; clearing completion",
                    area.id
                );
                area.completed_at = None;
                area.size_bytes = None;
                changed = true;
            }
        }
        if changed {
            persist_areas(&areas, self.prefs.as_ref())?;
        }

        *self.areas.lock().unwrap_or_else(|e| e.into_inner()) = areas;
        Ok(())
    }

    fn load_areas(&self) -> Result<Vec<DownloadArea>> {
        match self.prefs.get(DOWNLOAD_AREAS_KEY) {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                ChartError::persistence("Saved download areas could not be read.", Some(e.to_string()))
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Snapshot of the current area list.
    pub fn areas(&self) -> Vec<DownloadArea> {
        self.areas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn area(&self, id: Uuid) -> Option<DownloadArea> {
        self.areas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|area| area.id == id)
            .cloned()
    }

    /// Declare a new area, persist it, and start downloading it.
    pub fn create_and_download(
        &self,
        geometry: Geometry,
        name: Option<String>,
    ) -> Result<(DownloadArea, watch::Receiver<DownloadStatus>)> {
        if let Geometry::Region(region) = &geometry {
            if region.is_unset() || region.span_lat < 0.0 || region.span_lng < 0.0 {
                return Err(ChartError::geometry("Download area has no extent."));
            }
        }
        let area = DownloadArea::new(geometry, name);
        {
            // most recent area first, matching the order shown to the user
            let mut areas = self.areas.lock().unwrap_or_else(|e| e.into_inner());
            areas.insert(0, area.clone());
            persist_areas(&areas, self.prefs.as_ref())?;
        }
        let status = self.start_download(&area, self.config.force_refresh);
        Ok((area, status))
    }

    /// (Re-)download an already declared area. With `force_refresh` every
    /// tile is fetched again; without it, tiles already on disk are skipped.
    pub fn download(&self, id: Uuid, force_refresh: bool) -> Result<watch::Receiver<DownloadStatus>> {
        let area = self
            .area(id)
            .ok_or_else(|| ChartError::geometry("Unknown download area."))?;
        Ok(self.start_download(&area, force_refresh))
    }

    fn start_download(
        &self,
        area: &DownloadArea,
        force_refresh: bool,
    ) -> watch::Receiver<DownloadStatus> {
        let areas = self.areas.clone();
        let prefs = self.prefs.clone();
        self.scheduler.start(area, force_refresh, move |id, size_bytes| {
            let mut areas = areas.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(area) = areas.iter_mut().find(|area| area.id == id) {
                area.completed_at = Some(SystemTime::now());
                area.size_bytes = Some(size_bytes);
            }
            if let Err(err) = persist_areas(&areas, prefs.as_ref()) {
                log::error!("failed to persist completed area {}: {}", id, err);
            }
        })
    }

    /// Observe an in-flight download, if one exists for this area.
    pub fn subscribe(&self, id: Uuid) -> Option<watch::Receiver<DownloadStatus>> {
        self.scheduler.subscribe(id)
    }

    /// Current status of an area's download.
    ///
    /// An area with no in-flight entry resolves from its completion stamp: a
    /// stamped area is complete, an unstamped one was interrupted before it
    /// finished. Unknown ids return `None`.
    pub fn status(&self, id: Uuid) -> Option<DownloadStatus> {
        if let Some(rx) = self.scheduler.subscribe(id) {
            return Some(rx.borrow().clone());
        }
        let area = self.area(id)?;
        if area.completed_at.is_some() {
            Some(DownloadStatus::Complete)
        } else {
            Some(DownloadStatus::Failed(ChartError::Interrupted))
        }
    }

    pub fn is_downloading(&self, id: Uuid) -> bool {
        matches!(
            self.status(id),
            Some(DownloadStatus::Downloading { .. })
        )
    }

    /// Abort the area's in-flight download. Already written tiles stay cached.
    pub fn cancel(&self, id: Uuid) {
        self.scheduler.cancel(id);
    }

    /// Remove an area and the tiles no other area needs.
    ///
    /// Tiles shared with a surviving area are kept; only the tiles needed
    /// exclusively by the deleted area are removed from disk.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.scheduler.cancel(id);

        let (target, survivors) = {
            let mut areas = self.areas.lock().unwrap_or_else(|e| e.into_inner());
            let position = areas.iter().position(|area| area.id == id);
            let target = match position {
                Some(position) => areas.remove(position),
                None => return Ok(()),
            };
            persist_areas(&areas, self.prefs.as_ref())?;
            (target, areas.clone())
        };

        let mut doomed: HashSet<TileCoord> = coverage::needed_tiles(&target.geometry, self.config.zoom_range())
            .into_iter()
            .collect();
        for survivor in &survivors {
            for tile in coverage::needed_tiles(&survivor.geometry, self.config.zoom_range()) {
                doomed.remove(&tile);
            }
        }

        for tile in &doomed {
            self.store.delete(tile)?;
        }
        if let Ok(mut set) = self.cached.write() {
            for tile in &doomed {
                set.remove(tile);
            }
        }
        log::info!("deleted area {} and {} exclusive tiles", id, doomed.len());
        Ok(())
    }

    /// Serve a cached tile, or `None` when it was never downloaded.
    pub fn tile(&self, coord: &TileCoord) -> Option<Vec<u8>> {
        let known = self
            .cached
            .read()
            .map(|set| set.contains(coord))
            .unwrap_or(false);
        if !known {
            return None;
        }
        match self.store.read(coord) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("cached tile {:?} could not be read: {}", coord, err);
                None
            }
        }
    }

    /// Delete cache files no declared area needs. Returns the removed count.
    pub fn purge_stray_tiles(&self) -> Result<usize> {
        let mut on_disk = self.store.list_all()?;
        for area in self.areas() {
            for tile in coverage::needed_tiles(&area.geometry, self.config.zoom_range()) {
                on_disk.remove(&tile);
            }
        }
        for tile in &on_disk {
            self.store.delete(tile)?;
        }
        if let Ok(mut set) = self.cached.write() {
            for tile in &on_disk {
                set.remove(tile);
            }
        }
        if !on_disk.is_empty() {
            log::info!("purged {} stray cache files", on_disk.len());
        }
        Ok(on_disk.len())
    }

    /// Analytic tile count for a prospective area, for pre-download sizing.
    pub fn estimate_tile_count(&self, geometry: &Geometry) -> u64 {
        coverage::estimate_tile_count(geometry, self.config.zoom_range())
    }
}

fn persist_areas(areas: &[DownloadArea], prefs: &dyn PreferenceStore) -> Result<()> {
    let json = serde_json::to_string(areas).map_err(|e| {
        ChartError::persistence("Download areas could not be saved.", Some(e.to_string()))
    })?;
    prefs.set(DOWNLOAD_AREAS_KEY, &json)
}
