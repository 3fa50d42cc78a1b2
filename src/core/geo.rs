use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Web Mercator projection constants
const EARTH_RADIUS: f64 = 6378137.0;
const MAX_LATITUDE: f64 = 85.0511287798;

/// Equatorial circumference of the earth in meters.
const EARTH_CIRCUMFERENCE: f64 = 40075016.686;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Clamps latitude to the range where the Web Mercator projection is
    /// defined. `asinh(tan(lat))` diverges toward the poles, so every
    /// geographic-to-tile conversion clamps through here first.
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Converts to Web Mercator meters (EPSG:3857)
    pub fn to_web_mercator(&self) -> (f64, f64) {
        let lat = Self::clamp_lat(self.lat);
        let x = self.lng.to_radians() * EARTH_RADIUS;
        let y = ((PI / 4.0 + lat.to_radians() / 2.0).tan().ln()) * EARTH_RADIUS;
        (x, y)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// An axis-aligned lat/lng window described by its center and span, with the
/// corner coordinates derived from `center ± span / 2`.
///
/// A zero-span region is the "unset" sentinel and must never be downloaded
/// against; see [`GeoRegion::is_unset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRegion {
    #[serde(rename = "centerLat")]
    pub center_lat: f64,
    #[serde(rename = "centerLon")]
    pub center_lng: f64,
    #[serde(rename = "spanLat")]
    pub span_lat: f64,
    #[serde(rename = "spanLon")]
    pub span_lng: f64,
}

impl GeoRegion {
    pub fn new(center: LatLng, span_lat: f64, span_lng: f64) -> Self {
        Self {
            center_lat: center.lat,
            center_lng: center.lng,
            span_lat,
            span_lng,
        }
    }

    /// The sentinel "unset" region.
    pub fn unset() -> Self {
        Self::new(LatLng::default(), 0.0, 0.0)
    }

    pub fn is_unset(&self) -> bool {
        self.span_lat <= 0.0 && self.span_lng <= 0.0
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(self.center_lat, self.center_lng)
    }

    pub fn north_west(&self) -> LatLng {
        LatLng::new(
            self.center_lat + self.span_lat / 2.0,
            self.center_lng - self.span_lng / 2.0,
        )
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::new(
            self.center_lat + self.span_lat / 2.0,
            self.center_lng + self.span_lng / 2.0,
        )
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::new(
            self.center_lat - self.span_lat / 2.0,
            self.center_lng - self.span_lng / 2.0,
        )
    }

    pub fn south_east(&self) -> LatLng {
        LatLng::new(
            self.center_lat - self.span_lat / 2.0,
            self.center_lng + self.span_lng / 2.0,
        )
    }
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Creates a tile coordinate from a LatLng and zoom level.
    ///
    /// Latitude is clamped to ±85.05° before conversion and the resulting
    /// indices are clamped into `[0, 2^z)`, so coordinates at the poles or the
    /// antimeridian map to the outermost tile instead of an invalid one.
    pub fn from_lat_lng(coord: &LatLng, zoom: u8) -> Self {
        let lat_rad = LatLng::clamp_lat(coord.lat).to_radians();
        let n = 2_f64.powi(zoom as i32);

        let x = ((coord.lng + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

        Self::new(
            x.clamp(0.0, n - 1.0) as u32,
            y.clamp(0.0, n - 1.0) as u32,
            zoom,
        )
    }

    /// Geographic coordinate of the tile's northwest corner. The other
    /// corners follow from the neighboring tile indices (x+1, y+1).
    pub fn nw_corner(&self) -> LatLng {
        let n = 2_f64.powi(self.z as i32);
        let lng = self.x as f64 / n * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan().to_degrees();

        LatLng::new(lat, lng)
    }

    /// Geographic coordinate of the tile's southeast corner.
    pub fn se_corner(&self) -> LatLng {
        TileCoord::new(self.x + 1, self.y + 1, self.z).nw_corner()
    }

    /// Checks if the tile is valid for the given zoom level
    pub fn is_valid(&self) -> bool {
        let max_coord = 2_u32.pow(self.z as u32);
        self.x < max_coord && self.y < max_coord
    }
}

/// Ground width covered by one tile at the equator, used by the rendering
/// collaborator to clamp camera distance.
pub fn meters_per_tile_at_equator(zoom: u8) -> f64 {
    EARTH_CIRCUMFERENCE / 2_f64.powi(zoom as i32 - 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_round_trip() {
        // NW corner of a tile converts back to the same tile.
        for (x, y, z) in [(4u32, 3u32, 3u8), (512, 511, 10), (65536, 65535, 17), (1, 1, 1)] {
            let tile = TileCoord::new(x, y, z);
            let back = TileCoord::from_lat_lng(&tile.nw_corner(), z);
            assert_eq!(back, tile);
        }
    }

    #[test]
    fn test_equator_maps_to_middle_row() {
        let tile = TileCoord::from_lat_lng(&LatLng::new(0.0, 0.0), 17);
        assert_eq!(tile, TileCoord::new(65536, 65536, 17));
    }

    #[test]
    fn test_poles_do_not_produce_invalid_tiles() {
        for lat in [90.0, -90.0, 89.999] {
            let tile = TileCoord::from_lat_lng(&LatLng::new(lat, 179.9999), 10);
            assert!(tile.is_valid());
        }
        // lon 180 is exactly the right edge of the pyramid
        let tile = TileCoord::from_lat_lng(&LatLng::new(0.0, 180.0), 4);
        assert!(tile.is_valid());
        assert_eq!(tile.x, 15);
    }

    #[test]
    fn test_region_corners() {
        let region = GeoRegion::new(LatLng::new(10.0, 20.0), 4.0, 6.0);
        assert_eq!(region.north_west(), LatLng::new(12.0, 17.0));
        assert_eq!(region.south_east(), LatLng::new(8.0, 23.0));
        assert!(!region.is_unset());
        assert!(GeoRegion::unset().is_unset());
    }

    #[test]
    fn test_region_serde_key_layout() {
        let region = GeoRegion::new(LatLng::new(1.5, -2.5), 0.5, 0.75);
        let json = serde_json::to_string(&region).unwrap();
        assert!(json.contains("\"centerLat\":1.5"));
        assert!(json.contains("\"spanLon\":0.75"));
        let back: GeoRegion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
    }

    #[test]
    fn test_meters_per_tile() {
        assert!((meters_per_tile_at_equator(3) - 40075016.686).abs() < 1e-3);
        assert!((meters_per_tile_at_equator(4) - 20037508.343).abs() < 1e-3);
    }
}
