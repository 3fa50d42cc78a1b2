//! Tile fetching over HTTP.
//!
//! The network seam is the [`TileFetcher`] trait; [`HttpTileFetcher`] is the
//! reqwest-backed default. URL construction for a tile lives behind
//! [`TileUrlBuilder`] so the cache logic never knows which imagery service it
//! is talking to; [`NoaaChartSource`] builds NOAA maritime chart export URLs.

use crate::core::geo::TileCoord;
use crate::error::ChartError;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Shared async HTTP client with a custom User-Agent. Building the client once
/// avoids the cost of TLS and connection pool setup for every tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("chartcache/0.1")
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

/// Injected "fetch(url) -> bytes" capability.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Default fetcher backed by the shared reqwest client. A non-2xx status is an
/// error carrying the status code and a truncated body snippet.
#[derive(Debug, Default)]
pub struct HttpTileFetcher;

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = HTTP_CLIENT
            .get(url)
            .send()
            .await
            .map_err(|e| ChartError::network(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChartError::network(e.to_string()))?;
        if !status.is_success() {
            return Err(ChartError::http(status.as_u16(), &bytes));
        }
        Ok(bytes.to_vec())
    }
}

/// Produces the remote URL for a tile coordinate.
pub trait TileUrlBuilder: Send + Sync {
    fn url(&self, tile: &TileCoord) -> String;
}

/// Label size on rendered charts; the value doubles as the export DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartTextSize {
    Small,
    Medium,
    Large,
}

impl ChartTextSize {
    pub fn dpi(&self) -> u32 {
        match self {
            Self::Small => 90,
            Self::Medium => 180,
            Self::Large => 360,
        }
    }
}

/// Unit used for depth soundings on the chart imagery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthUnit {
    Meters,
    Feet,
    Fathoms,
}

impl DepthUnit {
    fn code(&self) -> u8 {
        match self {
            Self::Meters => 1,
            Self::Feet => 2,
            Self::Fathoms => 3,
        }
    }
}

/// Display options baked into the chart-service query string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    pub text_size: ChartTextSize,
    pub depth_unit: DepthUnit,
    pub high_quality: bool,
    pub show_chart_areas_and_limits: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            text_size: ChartTextSize::Medium,
            depth_unit: DepthUnit::Feet,
            high_quality: true,
            show_chart_areas_and_limits: false,
        }
    }
}

const NOAA_EXPORT_BASE: &str = "https://gis.charttools.noaa.gov/arcgis/rest/services/MCS/NOAAChartDisplay/MapServer/exts/MaritimeChartService/MapServer/export";

const TILE_SIZE_PX: u32 = 256;

/// URL builder for the NOAA maritime chart export service.
///
/// The service takes a Web-Mercator bounding box rather than slippy-map
/// indices, so each tile's corners are projected to EPSG:3857 meters.
#[derive(Debug, Clone, Default)]
pub struct NoaaChartSource {
    pub options: ChartOptions,
}

impl NoaaChartSource {
    pub fn new(options: ChartOptions) -> Self {
        Self { options }
    }
}

impl TileUrlBuilder for NoaaChartSource {
    fn url(&self, tile: &TileCoord) -> String {
        let options = &self.options;
        let dpi = if options.high_quality {
            options.text_size.dpi()
        } else {
            options.text_size.dpi() / 2
        };
        let size = if options.high_quality {
            TILE_SIZE_PX
        } else {
            TILE_SIZE_PX / 2
        };
        let layers = if options.show_chart_areas_and_limits {
            "show:2,3,4,5,6,7"
        } else {
            "show:2,6"
        };
        let display_params = format!(
            "{{\"ECDISParameters\":{{\"DynamicParameters\":{{\"Parameter\":[{{\"name\":\"DisplayDepthUnits\",\"value\":{}}}]}}}}}}",
            options.depth_unit.code()
        );

        let (min_x, max_y) = tile.nw_corner().to_web_mercator();
        let (max_x, min_y) = tile.se_corner().to_web_mercator();

        format!(
            "{}?transparent=true&layers={}&size={}%2C{}&bbox={}%2C{}%2C{}%2C{}&bboxsr=3857&imagesr=3857&dpi={}&display_params={}",
            NOAA_EXPORT_BASE,
            escape_query_value(layers),
            size,
            size,
            min_x,
            min_y,
            max_x,
            max_y,
            dpi,
            escape_query_value(&display_params),
        )
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                escaped.push(byte as char)
            }
            other => escaped.push_str(&format!("%{:02X}", other)),
        }
    }
    escaped
}
