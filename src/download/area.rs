use crate::core::geometry::Geometry;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// A user-declared geographic extent cached for offline use.
///
/// Owned exclusively by the [`AreaManager`](crate::AreaManager); the scheduler
/// mutates `size_bytes` and `completed_at` only through the manager's
/// completion callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadArea {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub geometry: Geometry,
    /// Time of the last completed download, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<SystemTime>,
    /// Total on-disk size of the area's tiles as of the last completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl DownloadArea {
    pub fn new(geometry: Geometry, name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            geometry,
            completed_at: None,
            size_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::{GeoRegion, LatLng};
    use crate::core::geometry::GeoPolygon;

    #[test]
    fn test_serde_round_trip_region() {
        let area = DownloadArea::new(
            Geometry::Region(GeoRegion::new(LatLng::new(41.0, -71.0), 0.5, 0.5)),
            Some("Narragansett Bay".to_string()),
        );
        let json = serde_json::to_string(&area).unwrap();
        let back: DownloadArea = serde_json::from_str(&json).unwrap();
        assert_eq!(back, area);
    }

    #[test]
    fn test_serde_round_trip_polygon_with_metadata() {
        let mut area = DownloadArea::new(
            Geometry::Polygon(GeoPolygon::new(vec![
                LatLng::new(0.0, 0.0),
                LatLng::new(1.0, 0.5),
                LatLng::new(0.0, 1.0),
                LatLng::new(0.0, 0.0),
            ])),
            None,
        );
        area.completed_at = Some(SystemTime::now());
        area.size_bytes = Some(123_456);

        let json = serde_json::to_string(&area).unwrap();
        let back: DownloadArea = serde_json::from_str(&json).unwrap();
        assert_eq!(back, area);
    }

    #[test]
    fn test_optional_fields_absent_from_json() {
        let area = DownloadArea::new(
            Geometry::Region(GeoRegion::new(LatLng::new(0.0, 0.0), 1.0, 1.0)),
            None,
        );
        let json = serde_json::to_string(&area).unwrap();
        assert!(!json.contains("completed_at"));
        assert!(!json.contains("size_bytes"));
        assert!(!json.contains("name"));
    }
}
