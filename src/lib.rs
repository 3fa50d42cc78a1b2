//! # chartcache
//!
//! Offline caching of raster chart tiles for nautical mapping applications.
//!
//! Given a geographic area (an axis-aligned region or an arbitrary polygon),
//! this library computes the slippy-map tiles needed to cover it across a zoom
//! range, downloads the missing ones over HTTP with bounded concurrency and
//! per-tile retry, persists them to a local cache directory, and serves them
//! back to a rendering layer with zero network cost on cache hit.
//!
//! The entry point is [`AreaManager`], which owns the collection of declared
//! download areas and orchestrates the [`DownloadScheduler`] per area. All
//! collaborators (tile store, fetch capability, preference store, URL builder)
//! are injected explicitly; the library holds no process-wide singletons.

pub mod core;
pub mod coverage;
pub mod download;
pub mod fetch;
pub mod persist;
pub mod store;

mod error;

// Re-export public API
pub use crate::core::{
    geo::{GeoRegion, LatLng, TileCoord},
    geometry::{GeoPolygon, Geometry},
};

pub use crate::download::{
    area::DownloadArea,
    manager::AreaManager,
    scheduler::{DownloadConfig, DownloadScheduler, DownloadStatus},
};

pub use crate::fetch::{
    ChartOptions, HttpTileFetcher, NoaaChartSource, TileFetcher, TileUrlBuilder,
};

pub use crate::persist::{FilePreferenceStore, MemoryStore, PreferenceStore};

pub use crate::store::TileStore;

pub use crate::error::ChartError;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ChartError>;
