//! Overlay layer construction and synchronization
//!
//! The desired overlay set is rebuilt from scratch on every data change:
//! everything except the base tile layer is removed, then each spec is added
//! back in order. Layer identity is not tracked across result sets and
//! redraws only happen on user-driven state transitions, so no incremental
//! diffing is needed. One bad geometry never takes the other layers down
//! with it; the layer is skipped with a warning.

use thiserror::Error;
use tracing::{debug, warn};

use crate::map::bounds::GeoBounds;
use crate::map::colors::Color;
use crate::map::engine::MapEngine;
use crate::model::{FeatureCollection, Geometry, ResultId};

/// A `[lon, lat]` position in degrees.
pub type LonLat = [f64; 2];

/// Stroke/fill styling for one overlay layer.
///
/// Weights and radii are in pixels, opacities in 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
    pub color: Color,
    pub weight: f32,
    pub opacity: f32,
    pub fill_color: Option<Color>,
    pub fill_opacity: f32,
    /// Dash/gap lengths for dashed strokes.
    pub dash: Option<(f32, f32)>,
    /// Marker radius for point layers.
    pub radius: f32,
}

impl LayerStyle {
    /// Original GPS fixes: small blue circle markers.
    pub fn gps_points() -> Self {
        Self {
            color: Color::rgb(0x1d, 0x4e, 0xd8),
            weight: 1.0,
            opacity: 0.8,
            fill_color: Some(Color::rgb(0x3b, 0x82, 0xf6)),
            fill_opacity: 0.6,
            dash: None,
            radius: 4.0,
        }
    }

    /// Raw traversal line: dashed purple.
    pub fn track_line() -> Self {
        Self {
            color: Color::rgb(0x8b, 0x5c, 0xf6),
            weight: 2.0,
            opacity: 0.6,
            fill_color: None,
            fill_opacity: 0.0,
            dash: Some((6.0, 4.0)),
            radius: 0.0,
        }
    }

    /// Corrected parcel polygon: green outline with a light fill.
    pub fn corrected_polygon() -> Self {
        Self {
            color: Color::rgb(0x16, 0xa3, 0x4a),
            weight: 3.0,
            opacity: 0.9,
            fill_color: Some(Color::rgb(0x22, 0xc5, 0x5e)),
            fill_opacity: 0.2,
            dash: None,
            radius: 0.0,
        }
    }

    /// Merged-view parcel with no highlight active.
    pub fn merged_neutral(color: Color) -> Self {
        Self {
            color,
            weight: 2.0,
            opacity: 0.8,
            fill_color: Some(color),
            fill_opacity: 0.25,
            dash: None,
            radius: 0.0,
        }
    }

    /// The highlighted parcel in merged view.
    pub fn merged_emphasized(color: Color) -> Self {
        Self {
            weight: 4.0,
            opacity: 1.0,
            fill_opacity: 0.45,
            ..Self::merged_neutral(color)
        }
    }

    /// Every non-highlighted parcel while a highlight is active. Dimmed but
    /// still drawn and clickable.
    pub fn merged_dimmed(color: Color) -> Self {
        Self {
            weight: 1.0,
            opacity: 0.3,
            fill_opacity: 0.08,
            ..Self::merged_neutral(color)
        }
    }
}

/// A drawable unit parsed out of GeoJSON.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Circle markers.
    Points(Vec<LonLat>),
    /// Open polyline.
    Line(Vec<LonLat>),
    /// Closed exterior ring.
    Polygon(Vec<LonLat>),
}

impl Shape {
    /// Ray-casting containment test. Only polygons are hit-testable.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let Shape::Polygon(ring) = self else {
            return false;
        };
        if ring.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let [xi, yi] = ring[i];
            let [xj, yj] = ring[j];
            if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Everything needed to draw one overlay layer.
#[derive(Debug, Clone)]
pub struct LayerSpec<'a> {
    pub geometry: &'a FeatureCollection,
    pub style: LayerStyle,
    /// Result to select when the layer is clicked.
    pub select_id: Option<ResultId>,
    /// Whether this layer's extent participates in viewport fitting.
    pub fit: bool,
}

/// A built overlay: projected shapes plus styling, pick id and extent.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub shapes: Vec<Shape>,
    pub style: LayerStyle,
    pub select_id: Option<ResultId>,
    pub bounds: GeoBounds,
    pub fit: bool,
}

impl Overlay {
    /// True if the position falls inside any of this overlay's polygons.
    pub fn hit(&self, lon: f64, lat: f64) -> bool {
        self.shapes.iter().any(|s| s.contains(lon, lat))
    }
}

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("unsupported geometry type `{0}`")]
    UnsupportedGeometry(String),
    #[error("malformed coordinates for `{0}` geometry")]
    MalformedCoordinates(String),
}

/// Replace every overlay on the surface with the given specs, in order.
///
/// Each layer is attempted independently; a construction failure drops that
/// layer only. Returns the number of layers actually drawn. Without a live
/// surface this is a no-op.
pub fn replace_overlays(engine: &mut MapEngine, specs: &[LayerSpec<'_>]) -> usize {
    let Some(surface) = engine.surface_mut() else {
        debug!("overlay sync without a live surface, ignoring");
        return 0;
    };

    surface.overlays.clear();
    for (index, spec) in specs.iter().enumerate() {
        match build_overlay(spec) {
            Ok(overlay) => surface.overlays.push(overlay),
            Err(err) => warn!(layer = index, error = %err, "skipping overlay layer"),
        }
    }
    debug!(drawn = surface.overlays.len(), requested = specs.len(), "overlays replaced");
    surface.overlays.len()
}

/// Parse one spec's feature collection into drawable shapes.
///
/// An empty collection builds an empty overlay with invalid bounds, which
/// later extends the fit accumulator as a no-op.
pub fn build_overlay(spec: &LayerSpec<'_>) -> Result<Overlay, LayerError> {
    let mut shapes = Vec::new();
    let mut point_buf = Vec::new();
    let mut bounds = GeoBounds::empty();

    for feature in &spec.geometry.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        collect_shapes(geometry, &mut point_buf, &mut shapes, &mut bounds)?;
    }
    if !point_buf.is_empty() {
        shapes.push(Shape::Points(point_buf));
    }

    Ok(Overlay {
        shapes,
        style: spec.style,
        select_id: spec.select_id.clone(),
        bounds,
        fit: spec.fit,
    })
}

fn collect_shapes(
    geometry: &Geometry,
    point_buf: &mut Vec<LonLat>,
    shapes: &mut Vec<Shape>,
    bounds: &mut GeoBounds,
) -> Result<(), LayerError> {
    let kind = geometry.kind.as_str();
    let coords = &geometry.coordinates;
    let malformed = || LayerError::MalformedCoordinates(kind.to_string());

    match kind {
        "Point" => {
            let p = position(coords).ok_or_else(malformed)?;
            bounds.extend_point(p[0], p[1]);
            point_buf.push(p);
        }
        "MultiPoint" => {
            for p in positions(coords).ok_or_else(malformed)? {
                bounds.extend_point(p[0], p[1]);
                point_buf.push(p);
            }
        }
        "LineString" => {
            let line = positions(coords).ok_or_else(malformed)?;
            for p in &line {
                bounds.extend_point(p[0], p[1]);
            }
            shapes.push(Shape::Line(line));
        }
        "MultiLineString" => {
            for line in position_lists(coords).ok_or_else(malformed)? {
                for p in &line {
                    bounds.extend_point(p[0], p[1]);
                }
                shapes.push(Shape::Line(line));
            }
        }
        "Polygon" => {
            // Interior rings are not drawn; corrected parcels are simple rings
            if let Some(exterior) = position_lists(coords).ok_or_else(malformed)?.into_iter().next() {
                for p in &exterior {
                    bounds.extend_point(p[0], p[1]);
                }
                shapes.push(Shape::Polygon(exterior));
            }
        }
        "MultiPolygon" => {
            let polygons = coords
                .as_array()
                .ok_or_else(malformed)?
                .iter()
                .map(position_lists)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(malformed)?;
            for rings in polygons {
                if let Some(exterior) = rings.into_iter().next() {
                    for p in &exterior {
                        bounds.extend_point(p[0], p[1]);
                    }
                    shapes.push(Shape::Polygon(exterior));
                }
            }
        }
        other => return Err(LayerError::UnsupportedGeometry(other.to_string())),
    }
    Ok(())
}

fn position(value: &serde_json::Value) -> Option<LonLat> {
    let arr = value.as_array()?;
    let lon = arr.first()?.as_f64()?;
    let lat = arr.get(1)?.as_f64()?;
    Some([lon, lat])
}

fn positions(value: &serde_json::Value) -> Option<Vec<LonLat>> {
    value.as_array()?.iter().map(position).collect()
}

fn position_lists(value: &serde_json::Value) -> Option<Vec<Vec<LonLat>>> {
    value.as_array()?.iter().map(positions).collect()
}
