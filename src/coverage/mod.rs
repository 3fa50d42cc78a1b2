//! Tile enumeration for download areas.
//!
//! Given a geometry and an inclusive zoom range, these functions return the
//! exact set of tiles whose rendered footprint overlaps the shape. Regions
//! expand to the full corner-to-corner tile rectangle per zoom; polygons prune
//! candidates to the bounding-box rectangle and then run three
//! cheap-to-expensive membership tests per tile.

use crate::core::geo::{GeoRegion, LatLng, TileCoord};
use crate::core::geometry::{ring_contains, segment_intersection, GeoPolygon, Geometry};
use std::ops::RangeInclusive;

/// Lowest zoom level worth caching for chart display.
pub const MIN_ZOOM: u8 = 3;
/// Highest zoom level served by the chart tile service.
pub const MAX_ZOOM: u8 = 17;

pub fn default_zoom_range() -> RangeInclusive<u8> {
    MIN_ZOOM..=MAX_ZOOM
}

/// Tiles needed to cover `geometry` across `zooms`.
///
/// Polygon geometry is used when the ring is usable; a degenerate ring falls
/// back to the polygon's bounding region. Within one zoom level the result is
/// free of duplicates, ordered z-major then x then y.
pub fn needed_tiles(geometry: &Geometry, zooms: RangeInclusive<u8>) -> Vec<TileCoord> {
    match geometry {
        Geometry::Region(region) => region_tiles(region, zooms),
        Geometry::Polygon(polygon) => match polygon_tiles(polygon, zooms.clone()) {
            Some(tiles) => tiles,
            None => polygon
                .bounding_region()
                .map(|region| region_tiles(&region, zooms))
                .unwrap_or_default(),
        },
    }
}

/// Full tile rectangle between the region's NW and SE corners, per zoom.
/// Over-covers the region by design.
pub fn region_tiles(region: &GeoRegion, zooms: RangeInclusive<u8>) -> Vec<TileCoord> {
    let mut tiles = Vec::new();
    for z in zooms {
        let top_left = TileCoord::from_lat_lng(&region.north_west(), z);
        let bottom_right = TileCoord::from_lat_lng(&region.south_east(), z);
        for x in top_left.x..=bottom_right.x {
            for y in top_left.y..=bottom_right.y {
                tiles.push(TileCoord::new(x, y, z));
            }
        }
    }
    tiles
}

/// Tiles whose footprint overlaps the polygon, or `None` for a degenerate
/// ring.
///
/// Candidates come from the bounding-box tile rectangle; each is kept when any
/// polygon vertex falls inside the tile, the polygon contains the tile's NW
/// corner, or any tile edge intersects any polygon edge. Cost is
/// O(tiles × polygon edges) per zoom level.
pub fn polygon_tiles(polygon: &GeoPolygon, zooms: RangeInclusive<u8>) -> Option<Vec<TileCoord>> {
    if !polygon.is_usable() {
        return None;
    }
    let bbox = polygon.bounding_region()?;
    let polygon_edges: Vec<(LatLng, LatLng)> = polygon.segments().collect();

    let mut tiles = Vec::new();
    for z in zooms {
        let top_left = TileCoord::from_lat_lng(&bbox.north_west(), z);
        let bottom_right = TileCoord::from_lat_lng(&bbox.south_east(), z);
        for x in top_left.x..=bottom_right.x {
            for y in top_left.y..=bottom_right.y {
                let tile = TileCoord::new(x, y, z);
                if tile_overlaps_polygon(&tile, polygon, &polygon_edges) {
                    tiles.push(tile);
                }
            }
        }
    }
    Some(tiles)
}

/// Analytic tile count for the geometry's bounding rectangle, without running
/// the per-tile membership tests. Used for pre-download size estimation.
pub fn estimate_tile_count(geometry: &Geometry, zooms: RangeInclusive<u8>) -> u64 {
    let region = match geometry.bounding_region() {
        Some(region) => region,
        None => return 0,
    };
    let mut count = 0u64;
    for z in zooms {
        // corners arrive swapped for a negative-span region
        let a = TileCoord::from_lat_lng(&region.north_west(), z);
        let b = TileCoord::from_lat_lng(&region.south_east(), z);
        let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
        let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
        count += (x1 - x0 + 1) as u64 * (y1 - y0 + 1) as u64;
    }
    count
}

/// Closed corner ring of a tile: NW, NE, SE, SW, NW.
fn tile_ring(tile: &TileCoord) -> [LatLng; 5] {
    let nw = tile.nw_corner();
    let ne = TileCoord::new(tile.x + 1, tile.y, tile.z).nw_corner();
    let se = TileCoord::new(tile.x + 1, tile.y + 1, tile.z).nw_corner();
    let sw = TileCoord::new(tile.x, tile.y + 1, tile.z).nw_corner();
    [nw, ne, se, sw, nw]
}

fn tile_overlaps_polygon(
    tile: &TileCoord,
    polygon: &GeoPolygon,
    polygon_edges: &[(LatLng, LatLng)],
) -> bool {
    let ring = tile_ring(tile);

    // tile containing a polygon vertex
    if polygon.ring().iter().any(|vertex| ring_contains(&ring, vertex)) {
        return true;
    }

    // polygon containing the tile corner
    if polygon.contains(&ring[0]) {
        return true;
    }

    // boundary intersection (expensive!)
    for tile_edge in ring.windows(2) {
        for (edge_start, edge_end) in polygon_edges {
            if segment_intersection(&tile_edge[0], &tile_edge[1], edge_start, edge_end).is_some() {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn boundary_triangle(east_lng: f64) -> GeoPolygon {
        GeoPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.00001, 0.00002),
            LatLng::new(0.0, east_lng),
            LatLng::new(0.0, 0.0),
        ])
    }

    /// Two tiles straddle the equator boundary at every zoom level.
    fn expected_boundary_pair(zooms: RangeInclusive<u8>) -> Vec<TileCoord> {
        let mut expected = Vec::new();
        for z in zooms {
            let mid = 2u32.pow(z as u32) / 2;
            expected.push(TileCoord::new(mid, mid - 1, z));
            expected.push(TileCoord::new(mid, mid, z));
        }
        expected
    }

    #[test]
    fn test_region_tiles_full_rectangle() {
        let region = GeoRegion::new(LatLng::new(0.0, 0.0), 20.0, 20.0);
        let z = 4u8;
        let tiles = region_tiles(&region, z..=z);

        let top_left = TileCoord::from_lat_lng(&region.north_west(), z);
        let bottom_right = TileCoord::from_lat_lng(&region.south_east(), z);
        let expected_count = (bottom_right.x - top_left.x + 1) as usize
            * (bottom_right.y - top_left.y + 1) as usize;

        assert_eq!(tiles.len(), expected_count);
        assert!(expected_count >= 4);

        let unique: HashSet<_> = tiles.iter().collect();
        assert_eq!(unique.len(), tiles.len());
    }

    #[test]
    fn test_region_tiles_no_duplicates_across_zooms() {
        let region = GeoRegion::new(LatLng::new(40.0, -74.0), 1.0, 1.0);
        let tiles = region_tiles(&region, 3..=8);
        let unique: HashSet<_> = tiles.iter().collect();
        assert_eq!(unique.len(), tiles.len());
    }

    #[test]
    fn test_polygon_tiles_boundary_triangle() {
        let tiles = polygon_tiles(&boundary_triangle(0.0001), default_zoom_range()).unwrap();
        assert_eq!(tiles, expected_boundary_pair(3..=17));
    }

    #[test]
    fn test_polygon_tiles_narrowed_zoom_range() {
        // same triangle as the full-range test, restricted to three zooms
        let tiles = polygon_tiles(&boundary_triangle(0.0001), 10..=12).unwrap();
        assert_eq!(tiles, expected_boundary_pair(10..=12));
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let line = GeoPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(0.0, 0.0),
        ]);
        assert!(polygon_tiles(&line, 3..=5).is_none());
    }

    #[test]
    fn test_needed_tiles_falls_back_to_region_for_bad_ring() {
        // open ring, still has a bounding box
        let open = GeoPolygon::new(vec![
            LatLng::new(10.0, 10.0),
            LatLng::new(11.0, 11.0),
            LatLng::new(10.0, 12.0),
        ]);
        let from_polygon = needed_tiles(&Geometry::Polygon(open.clone()), 5..=5);
        let from_region = region_tiles(&open.bounding_region().unwrap(), 5..=5);
        assert_eq!(from_polygon, from_region);
        assert!(!from_polygon.is_empty());
    }

    #[test]
    fn test_polygon_interior_tiles_included() {
        // large triangle over several z6 tiles; every enumerated tile must
        // actually overlap, and the set must cover the bbox center
        let polygon = GeoPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(20.0, 10.0),
            LatLng::new(0.0, 20.0),
            LatLng::new(0.0, 0.0),
        ]);
        let tiles = polygon_tiles(&polygon, 6..=6).unwrap();
        let centroid_tile = TileCoord::from_lat_lng(&LatLng::new(6.0, 10.0), 6);
        assert!(tiles.contains(&centroid_tile));

        // bounding box over-covers the triangle
        let bbox_tiles = region_tiles(&polygon.bounding_region().unwrap(), 6..=6);
        assert!(tiles.len() < bbox_tiles.len());
        for tile in &tiles {
            assert!(bbox_tiles.contains(tile));
        }
    }

    #[test]
    fn test_estimate_matches_region_enumeration() {
        let region = GeoRegion::new(LatLng::new(30.0, 10.0), 5.0, 5.0);
        let estimated = estimate_tile_count(&Geometry::Region(region), 3..=10);
        let enumerated = region_tiles(&region, 3..=10).len() as u64;
        assert_eq!(estimated, enumerated);
    }

    #[test]
    fn test_estimate_tolerates_inverted_region() {
        let region = GeoRegion::new(LatLng::new(10.0, 10.0), -40.0, 2.0);
        let estimated = estimate_tile_count(&Geometry::Region(region), 5..=5);
        assert!(estimated >= 1);
    }

    #[test]
    fn test_estimate_polygon_uses_bounding_box() {
        let polygon = boundary_triangle(0.0001);
        let estimated = estimate_tile_count(&Geometry::Polygon(polygon.clone()), 3..=17);
        let bbox_tiles = region_tiles(&polygon.bounding_region().unwrap(), 3..=17);
        assert_eq!(estimated, bbox_tiles.len() as u64);
    }
}
