//! Durable tile storage.
//!
//! One flat cache directory, one file per tile named `{z}-{x}-{y}.png`. The
//! filename is the sole source of truth for a tile's identity; there is no
//! sidecar index. No blob contents are held in memory, so every read hits
//! disk.

use crate::core::geo::TileCoord;
use crate::error::ChartError;
use crate::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const TILE_EXTENSION: &str = "png";

/// Marker file excluding the cache directory from backup tools.
const CACHEDIR_TAG: &str = "CACHEDIR.TAG";
const CACHEDIR_TAG_BODY: &str =
    "Signature: 8a477f597d28d172789f06886806bc55\n# Tile cache; contents are re-downloadable.\n";

/// Filesystem-backed key→blob store keyed by tile coordinate.
#[derive(Debug, Clone)]
pub struct TileStore {
    dir: PathBuf,
}

impl TileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Idempotent create-if-missing for the cache directory.
    ///
    /// Also drops a `CACHEDIR.TAG` marker so backup tools skip the directory;
    /// failure to write the marker is logged and otherwise ignored.
    pub fn ensure_cache_dir(&self) -> Result<&Path> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| ChartError::io("Unable to create cache directory.", &e))?;
        }
        let tag = self.dir.join(CACHEDIR_TAG);
        if !tag.exists() {
            if let Err(e) = fs::write(&tag, CACHEDIR_TAG_BODY) {
                log::warn!("failed to write {} marker: {}", CACHEDIR_TAG, e);
            }
        }
        Ok(&self.dir)
    }

    /// Path of the blob for `tile`, whether or not it exists.
    pub fn tile_path(&self, tile: &TileCoord) -> PathBuf {
        self.dir
            .join(format!("{}-{}-{}.{}", tile.z, tile.x, tile.y, TILE_EXTENSION))
    }

    /// Parse a cache file name back into a tile coordinate.
    pub fn parse_file_name(name: &str) -> Option<TileCoord> {
        let stem = name.split('.').next()?;
        let mut parts = stem.split('-');
        let z = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(TileCoord::new(x, y, z))
    }

    pub fn exists(&self, tile: &TileCoord) -> bool {
        self.tile_path(tile).is_file()
    }

    pub fn read(&self, tile: &TileCoord) -> Result<Vec<u8>> {
        fs::read(self.tile_path(tile)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ChartError::io("Tile is not cached.", &e),
            _ => ChartError::io("Failed to read cached tile.", &e),
        })
    }

    pub fn write(&self, tile: &TileCoord, bytes: &[u8]) -> Result<()> {
        fs::write(self.tile_path(tile), bytes)
            .map_err(|e| ChartError::io("Unable to save to cache directory.", &e))
    }

    /// Remove the blob if present; a missing blob is a no-op.
    pub fn delete(&self, tile: &TileCoord) -> Result<()> {
        let path = self.tile_path(tile);
        if path.is_file() {
            fs::remove_file(&path)
                .map_err(|e| ChartError::io("Failed to remove cached tile.", &e))?;
        }
        Ok(())
    }

    /// Byte length of the stored blob, 0 if absent.
    pub fn size_of(&self, tile: &TileCoord) -> u64 {
        fs::metadata(self.tile_path(tile))
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    /// Scan the cache directory and parse every file name back into a tile
    /// coordinate. Files that fail to parse are skipped and logged.
    pub fn list_all(&self) -> Result<HashSet<TileCoord>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| ChartError::io("Failed to read contents of cache dir.", &e))?;
        let mut tiles = HashSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| ChartError::io("Failed to read contents of cache dir.", &e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == CACHEDIR_TAG {
                continue;
            }
            match Self::parse_file_name(&name) {
                Some(tile) => {
                    tiles.insert(tile);
                }
                None => {
                    log::warn!("unparseable file in cache dir: {}. Skipping...", name);
                }
            }
        }
        Ok(tiles)
    }
}
