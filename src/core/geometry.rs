use crate::core::geo::{GeoRegion, LatLng};
use serde::{Deserialize, Serialize};

/// Geometry of a download area: either an axis-aligned region or an arbitrary
/// polygon. Tile enumeration dispatches over this tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Region(GeoRegion),
    Polygon(GeoPolygon),
}

impl Geometry {
    /// The bounding region enclosing this geometry, if one can be derived.
    pub fn bounding_region(&self) -> Option<GeoRegion> {
        match self {
            Geometry::Region(region) => Some(*region),
            Geometry::Polygon(polygon) => polygon.bounding_region(),
        }
    }
}

/// An ordered closed ring of geographic vertices, first == last.
///
/// A usable ring has at least 4 points (3 distinct plus the closing point);
/// anything less is degenerate and callers fall back to region-based tile
/// enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPolygon {
    ring: Vec<LatLng>,
}

impl GeoPolygon {
    pub fn new(ring: Vec<LatLng>) -> Self {
        Self { ring }
    }

    pub fn ring(&self) -> &[LatLng] {
        &self.ring
    }

    pub fn is_closed(&self) -> bool {
        match (self.ring.first(), self.ring.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }

    /// Whether the ring is well-formed enough for boundary membership tests.
    pub fn is_usable(&self) -> bool {
        self.ring.len() >= 4 && self.is_closed() && self.distinct_vertex_count() >= 3
    }

    fn distinct_vertex_count(&self) -> usize {
        let mut distinct: Vec<&LatLng> = Vec::new();
        for vertex in &self.ring {
            if !distinct.contains(&vertex) {
                distinct.push(vertex);
            }
        }
        distinct.len()
    }

    /// Smallest axis-aligned region enclosing the ring, or `None` for an
    /// empty ring.
    pub fn bounding_region(&self) -> Option<GeoRegion> {
        let first = self.ring.first()?;
        let (mut south, mut north) = (first.lat, first.lat);
        let (mut west, mut east) = (first.lng, first.lng);
        for vertex in &self.ring[1..] {
            south = south.min(vertex.lat);
            north = north.max(vertex.lat);
            west = west.min(vertex.lng);
            east = east.max(vertex.lng);
        }
        Some(GeoRegion::new(
            LatLng::new((south + north) / 2.0, (west + east) / 2.0),
            north - south,
            east - west,
        ))
    }

    /// Edge segments between consecutive ring vertices.
    pub fn segments(&self) -> impl Iterator<Item = (LatLng, LatLng)> + '_ {
        self.ring.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Point-in-polygon test of the ring by ray casting.
    pub fn contains(&self, point: &LatLng) -> bool {
        ring_contains(&self.ring, point)
    }
}

/// Ray-casting membership test against a closed ring (first == last).
pub fn ring_contains(ring: &[LatLng], point: &LatLng) -> bool {
    let mut inside = false;
    for pair in ring.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let t = (point.lat - a.lat) / (b.lat - a.lat);
            let crossing_lng = a.lng + t * (b.lng - a.lng);
            if point.lng < crossing_lng {
                inside = !inside;
            }
        }
    }
    inside
}

/// 2D line-segment intersection in lat/lng space.
///
/// Parameter bounds are inclusive at both ends, so a segment that only touches
/// the other at an endpoint still intersects. Parallel (including collinear)
/// segments report no intersection.
pub fn segment_intersection(
    a_start: &LatLng,
    a_end: &LatLng,
    b_start: &LatLng,
    b_end: &LatLng,
) -> Option<LatLng> {
    let d1_lng = a_end.lng - a_start.lng;
    let d1_lat = a_end.lat - a_start.lat;
    let d2_lng = b_end.lng - b_start.lng;
    let d2_lat = b_end.lat - b_start.lat;

    let denom = d1_lng * d2_lat - d1_lat * d2_lng;
    if denom == 0.0 {
        return None;
    }

    let offset_lng = b_start.lng - a_start.lng;
    let offset_lat = b_start.lat - a_start.lat;
    let t = (offset_lng * d2_lat - offset_lat * d2_lng) / denom;
    let u = (offset_lng * d1_lat - offset_lat * d1_lng) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(LatLng::new(
            a_start.lat + t * d1_lat,
            a_start.lng + t * d1_lng,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> GeoPolygon {
        GeoPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(2.0, 1.0),
            LatLng::new(0.0, 2.0),
            LatLng::new(0.0, 0.0),
        ])
    }

    #[test]
    fn test_usability() {
        assert!(triangle().is_usable());

        // open ring
        let open = GeoPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(0.0, 2.0),
        ]);
        assert!(!open.is_usable());

        // closed but only two distinct vertices
        let degenerate = GeoPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(0.0, 0.0),
        ]);
        assert!(!degenerate.is_usable());

        assert!(!GeoPolygon::new(vec![]).is_usable());
    }

    #[test]
    fn test_contains() {
        let polygon = triangle();
        assert!(polygon.contains(&LatLng::new(0.5, 1.0)));
        assert!(!polygon.contains(&LatLng::new(1.5, 0.1)));
        assert!(!polygon.contains(&LatLng::new(-0.5, 1.0)));
    }

    #[test]
    fn test_bounding_region() {
        let bbox = triangle().bounding_region().unwrap();
        assert_eq!(bbox.north_west(), LatLng::new(2.0, 0.0));
        assert_eq!(bbox.south_east(), LatLng::new(0.0, 2.0));
    }

    #[test]
    fn test_segment_intersection_crossing() {
        let hit = segment_intersection(
            &LatLng::new(0.0, 0.0),
            &LatLng::new(2.0, 2.0),
            &LatLng::new(2.0, 0.0),
            &LatLng::new(0.0, 2.0),
        )
        .unwrap();
        assert!((hit.lat - 1.0).abs() < 1e-12);
        assert!((hit.lng - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_intersection_endpoint_touch() {
        // one segment ends exactly on the other
        assert!(segment_intersection(
            &LatLng::new(0.0, 0.0),
            &LatLng::new(0.0, 10.0),
            &LatLng::new(0.0, 5.0),
            &LatLng::new(3.0, 5.0),
        )
        .is_some());
    }

    #[test]
    fn test_segment_intersection_parallel_and_disjoint() {
        assert!(segment_intersection(
            &LatLng::new(0.0, 0.0),
            &LatLng::new(0.0, 10.0),
            &LatLng::new(1.0, 0.0),
            &LatLng::new(1.0, 10.0),
        )
        .is_none());

        assert!(segment_intersection(
            &LatLng::new(0.0, 0.0),
            &LatLng::new(1.0, 1.0),
            &LatLng::new(5.0, 5.0),
            &LatLng::new(6.0, 5.0),
        )
        .is_none());
    }

    #[test]
    fn test_geometry_serde_round_trip() {
        let geometry = Geometry::Polygon(triangle());
        let json = serde_json::to_string(&geometry).unwrap();
        let back: Geometry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, geometry);
    }
}
