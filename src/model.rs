//! Data contracts consumed from the processing backend
//!
//! The viewer never constructs these itself: single results and batches
//! arrive fully formed as JSON and are read-only for the session.

use serde::{Deserialize, Serialize};

/// Stable identifier of one processed file.
pub type ResultId = String;

/// Processing outcome for one uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Error,
}

/// Validation figures reported by the backend parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_points: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Counters for the geometry corrections applied upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionSummary {
    #[serde(default)]
    pub artifacts_removed: u32,
    #[serde(default)]
    pub duplicate_vertices_removed: u32,
    #[serde(default)]
    pub spikes_removed: u32,
    #[serde(default)]
    pub self_intersections_fixed: u32,
    #[serde(default)]
    pub invalid_geometries_fixed: u32,
    #[serde(default)]
    pub details: Vec<String>,
}

impl CorrectionSummary {
    /// Total number of corrections across all categories.
    pub fn total(&self) -> u32 {
        self.artifacts_removed
            + self.duplicate_vertices_removed
            + self.spikes_removed
            + self.self_intersections_fixed
            + self.invalid_geometries_fixed
    }
}

/// Computed surface figures for the corrected polygon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaSummary {
    pub area_hectares: f64,
    pub area_sq_meters: f64,
    pub area_sq_km: f64,
    pub perimeter_meters: f64,
    pub projection_used: String,
}

/// One processed file with its optional geometry collections.
///
/// Results with `status = "error"` carry no geometry at all; every geometry
/// field is independently optional and absence means "nothing to draw".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub id: ResultId,
    pub filename: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub validation: Option<ValidationSummary>,
    #[serde(default)]
    pub corrections: Option<CorrectionSummary>,
    #[serde(default)]
    pub area: Option<AreaSummary>,
    #[serde(default)]
    pub original_geojson: Option<FeatureCollection>,
    #[serde(default)]
    pub corrected_geojson: Option<FeatureCollection>,
    #[serde(default)]
    pub line_geojson: Option<FeatureCollection>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ProcessingResult {
    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    /// Total corrections applied, 0 when the backend reported none.
    pub fn total_corrections(&self) -> u32 {
        self.corrections.as_ref().map(CorrectionSummary::total).unwrap_or(0)
    }

    /// The three named geometry collections of this result.
    pub fn geometries(&self) -> GeometrySet<'_> {
        GeometrySet {
            points: self.original_geojson.as_ref(),
            track: self.line_geojson.as_ref(),
            corrected: self.corrected_geojson.as_ref(),
        }
    }
}

/// Borrowed view of a result's renderable collections.
#[derive(Debug, Clone, Copy)]
pub struct GeometrySet<'a> {
    /// Original GPS fixes (point features).
    pub points: Option<&'a FeatureCollection>,
    /// Raw traversal line.
    pub track: Option<&'a FeatureCollection>,
    /// Closed polygon after correction.
    pub corrected: Option<&'a FeatureCollection>,
}

impl GeometrySet<'_> {
    pub fn is_empty(&self) -> bool {
        self.points.is_none() && self.track.is_none() && self.corrected.is_none()
    }
}

/// Aggregate figures for a batch upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: u32,
    pub processed: u32,
    pub errors: u32,
    pub skipped: u32,
    #[serde(default)]
    pub total_area_hectares: f64,
    #[serde(default)]
    pub total_corrections: u32,
}

/// A file the backend refused to process at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Outcome of a multi-file upload.
///
/// `merged_geojson` holds one polygon feature per completed result, each
/// tagged with `id`, `filename` and `area_hectares` properties; it is the
/// only geometry drawn in merged mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub batch_summary: BatchSummary,
    pub results: Vec<ProcessingResult>,
    #[serde(default)]
    pub skipped_files: Vec<SkippedFile>,
    pub merged_geojson: FeatureCollection,
}

impl BatchResult {
    /// Look up a result by id.
    pub fn result(&self, id: &str) -> Option<&ProcessingResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.result(id).is_some()
    }
}

/// Either a single result or a batch, as delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultSet {
    Batch(BatchResult),
    Single(ProcessingResult),
}

impl ResultSet {
    /// Parse a result-set document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a result by id in either variant.
    pub fn result(&self, id: &str) -> Option<&ProcessingResult> {
        match self {
            ResultSet::Batch(b) => b.result(id),
            ResultSet::Single(r) => (r.id == id).then_some(r),
        }
    }
}

// --- GeoJSON ---
//
// The backend speaks plain GeoJSON. Only the structure is modeled here;
// `coordinates` stays raw JSON until a layer is actually built, so a
// malformed geometry surfaces as a per-layer build error instead of
// failing the whole document.

/// GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

fn collection_type() -> String {
    "FeatureCollection".to_string()
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self { kind: collection_type(), features: Vec::new() }
    }
}

impl FeatureCollection {
    /// Wrap a single feature in its own collection.
    pub fn single(feature: Feature) -> Self {
        Self { kind: collection_type(), features: vec![feature] }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl Feature {
    /// String property accessor (`id`, `filename`, ...).
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// Numeric property accessor (`area_hectares`, ...).
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(|v| v.as_f64())
    }
}

/// GeoJSON geometry with coordinates left unparsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_result() {
        let json = r#"{
            "id": "abc-123",
            "filename": "parcelle_nord.gpx",
            "status": "completed",
            "validation": {"total_points": 248, "errors": [], "warnings": ["low accuracy segment"]},
            "corrections": {"artifacts_removed": 3, "duplicate_vertices_removed": 2,
                            "spikes_removed": 1, "self_intersections_fixed": 0,
                            "invalid_geometries_fixed": 0, "details": ["removed 3 artifacts"]},
            "area": {"area_hectares": 12.4, "area_sq_meters": 124000.0, "area_sq_km": 0.124,
                     "perimeter_meters": 1430.0, "projection_used": "EPSG:32630"},
            "original_geojson": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-5.5, 7.5]}, "properties": {}}
            ]}
        }"#;

        let set = ResultSet::from_json(json).unwrap();
        let ResultSet::Single(r) = set else { panic!("expected single result") };
        assert!(r.is_completed());
        assert_eq!(r.total_corrections(), 6);
        assert!(r.geometries().points.is_some());
        assert!(r.geometries().track.is_none());
        assert!(r.geometries().corrected.is_none());
    }

    #[test]
    fn test_parse_error_result_without_geometry() {
        let json = r#"{
            "id": "bad-1",
            "filename": "broken.gpx",
            "status": "error",
            "error_message": "no track points found"
        }"#;

        let set = ResultSet::from_json(json).unwrap();
        let ResultSet::Single(r) = set else { panic!("expected single result") };
        assert_eq!(r.status, ResultStatus::Error);
        assert!(r.geometries().is_empty());
        assert_eq!(r.total_corrections(), 0);
    }

    #[test]
    fn test_parse_batch() {
        let json = r#"{
            "batch_id": "batch-9",
            "batch_summary": {"total_files": 2, "processed": 1, "errors": 1, "skipped": 0,
                              "total_area_hectares": 12.4, "total_corrections": 6},
            "results": [
                {"id": "a", "filename": "a.gpx", "status": "completed"},
                {"id": "b", "filename": "b.gpx", "status": "error", "error_message": "empty file"}
            ],
            "skipped_files": [],
            "merged_geojson": {"type": "FeatureCollection", "features": [
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[[-5.5, 7.5], [-5.4, 7.5], [-5.4, 7.6], [-5.5, 7.5]]]},
                 "properties": {"id": "a", "filename": "a.gpx", "area_hectares": 12.4}}
            ]}
        }"#;

        let set = ResultSet::from_json(json).unwrap();
        let ResultSet::Batch(b) = set else { panic!("expected batch") };
        assert_eq!(b.batch_summary.errors, 1);
        assert!(b.contains("a"));
        assert!(b.contains("b"));
        assert!(!b.contains("z"));
        let feature = &b.merged_geojson.features[0];
        assert_eq!(feature.property_str("filename"), Some("a.gpx"));
        assert_eq!(feature.property_f64("area_hectares"), Some(12.4));
    }
}
