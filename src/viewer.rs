//! Viewer coordinator
//!
//! Owns the map engine, the view state and the current result set, and keeps
//! them consistent: every gesture runs its full state transition plus redraw
//! synchronously before the next one is processed. Rendering is a pure
//! function of (data, state); nothing else decides what the map shows.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::map::bounds::GeoBounds;
use crate::map::colors::{self, Color, PALETTE};
use crate::map::engine::MapEngine;
use crate::map::layers::{self, LayerSpec, LayerStyle};
use crate::model::{FeatureCollection, ProcessingResult, ResultId, ResultSet};
use crate::view::{Gesture, ViewState};

pub struct Viewer {
    config: ViewerConfig,
    engine: MapEngine,
    state: ViewState,
    data: Option<ResultSet>,
    colors: HashMap<String, Color>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let engine = MapEngine::new(config.map.clone());
        Self {
            config,
            engine,
            state: ViewState::default(),
            data: None,
            colors: HashMap::new(),
        }
    }

    /// Bind the map surface and draw whatever data is already present.
    pub fn mount(&mut self, host: &str) {
        self.engine.initialize(host);
        self.render();
    }

    /// Release the map surface. Further render/gesture calls are ignored
    /// until the next mount.
    pub fn unmount(&mut self) {
        self.engine.dispose();
    }

    pub fn is_mounted(&self) -> bool {
        self.engine.is_initialized()
    }

    pub fn engine(&self) -> &MapEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut MapEngine {
        &mut self.engine
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn data(&self) -> Option<&ResultSet> {
        self.data.as_ref()
    }

    /// Merged-view color for a source file.
    pub fn color_for(&self, filename: &str) -> Option<Color> {
        self.colors.get(filename).copied()
    }

    /// The result whose details the side panel currently shows.
    pub fn selected_result(&self) -> Option<&ProcessingResult> {
        let id = self.state.selected()?;
        self.data.as_ref()?.result(id)
    }

    /// Install a new result set, reset the view state and redraw.
    ///
    /// The color table is rebuilt here because first-seen filename order is
    /// only stable for one merged feature sequence.
    pub fn set_results(&mut self, set: ResultSet) {
        match &set {
            ResultSet::Single(r) => {
                info!(id = %r.id, filename = %r.filename, "loading single result");
                self.state = ViewState::Single { selected: r.id.clone() };
                self.colors = HashMap::new();
            }
            ResultSet::Batch(b) => {
                info!(
                    batch = %b.batch_id,
                    files = b.batch_summary.total_files,
                    "loading batch result"
                );
                self.state = ViewState::default();
                self.colors = colors::assign(
                    b.merged_geojson
                        .features
                        .iter()
                        .filter_map(|f| f.property_str("filename")),
                    &PALETTE,
                );
            }
        }
        self.data = Some(set);
        self.render();
    }

    /// Apply a gesture and redraw in the same call.
    ///
    /// Gestures naming a result id that is not in the current set are
    /// no-ops, as is anything arriving after unmount.
    pub fn handle_gesture(&mut self, gesture: Gesture) -> &ViewState {
        if !self.engine.is_initialized() {
            warn!("gesture on an unmounted viewer, ignoring");
            return &self.state;
        }
        if let Gesture::Inspect(id) = &gesture {
            let known = self.data.as_ref().is_some_and(|d| d.result(id).is_some());
            if !known {
                warn!(id = %id, "gesture references an unknown result, ignoring");
                return &self.state;
            }
        }

        let next = self.state.next(&gesture);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "view state transition");
            self.state = next;
            self.render();
        }
        &self.state
    }

    /// Topmost result polygon under a map position, for click selection.
    pub fn pick(&self, lon: f64, lat: f64) -> Option<ResultId> {
        let surface = self.engine.surface()?;
        surface
            .overlays
            .iter()
            .rev()
            .find(|o| o.select_id.is_some() && o.hit(lon, lat))
            .and_then(|o| o.select_id.clone())
    }

    /// Rebuild the overlay set and refit the viewport from (data, state).
    pub fn render(&mut self) {
        if !self.engine.is_initialized() {
            debug!("render on an unmounted viewer, skipping");
            return;
        }
        let padding = self.config.map.fit_padding;

        // Merged mode wraps each feature in its own single-feature
        // collection so every parcel is an independently styled layer.
        let mut owned: Vec<(FeatureCollection, LayerStyle, Option<ResultId>)> = Vec::new();
        let mut specs: Vec<LayerSpec<'_>> = Vec::new();

        match (&self.data, &self.state) {
            (None, _) => {}
            (Some(ResultSet::Single(result)), _) => {
                push_detail_specs(result, &mut specs);
            }
            (Some(ResultSet::Batch(batch)), ViewState::Single { selected }) => {
                match batch.result(selected) {
                    Some(result) => push_detail_specs(result, &mut specs),
                    None => warn!(id = %selected, "selected result vanished from batch"),
                }
            }
            (Some(ResultSet::Batch(batch)), ViewState::Merged { highlight }) => {
                for feature in &batch.merged_geojson.features {
                    let id = feature.property_str("id").map(str::to_string);
                    let filename = feature.property_str("filename").unwrap_or_default();
                    let color = self.colors.get(filename).copied().unwrap_or(PALETTE[0]);
                    let style = match (highlight.as_deref(), id.as_deref()) {
                        (None, _) => LayerStyle::merged_neutral(color),
                        (Some(h), Some(fid)) if h == fid => LayerStyle::merged_emphasized(color),
                        (Some(_), _) => LayerStyle::merged_dimmed(color),
                    };
                    owned.push((FeatureCollection::single(feature.clone()), style, id));
                }
            }
        }
        for (geometry, style, select_id) in &owned {
            specs.push(LayerSpec {
                geometry,
                style: *style,
                select_id: select_id.clone(),
                fit: true,
            });
        }

        layers::replace_overlays(&mut self.engine, &specs);
        drop(specs);

        let mut bounds = GeoBounds::empty();
        if let Some(surface) = self.engine.surface() {
            for overlay in &surface.overlays {
                if overlay.fit {
                    bounds.extend(&overlay.bounds);
                }
            }
        }
        self.engine.fit_bounds(&bounds, padding);
    }
}

/// Detail layers for one result: points, track line, corrected polygon.
///
/// The track never participates in viewport fitting; only the point cloud
/// and the corrected polygon do.
fn push_detail_specs<'a>(result: &'a ProcessingResult, specs: &mut Vec<LayerSpec<'a>>) {
    let set = result.geometries();
    if let Some(points) = set.points {
        specs.push(LayerSpec {
            geometry: points,
            style: LayerStyle::gps_points(),
            select_id: None,
            fit: true,
        });
    }
    if let Some(track) = set.track {
        specs.push(LayerSpec {
            geometry: track,
            style: LayerStyle::track_line(),
            select_id: None,
            fit: false,
        });
    }
    if let Some(polygon) = set.corrected {
        specs.push(LayerSpec {
            geometry: polygon,
            style: LayerStyle::corrected_polygon(),
            select_id: None,
            fit: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn viewer() -> Viewer {
        Viewer::new(ViewerConfig::default())
    }

    fn batch_json() -> serde_json::Value {
        json!({
            "batch_id": "batch-1",
            "batch_summary": {"total_files": 3, "processed": 2, "errors": 1, "skipped": 0,
                              "total_area_hectares": 20.0, "total_corrections": 4},
            "results": [
                {"id": "a", "filename": "a.gpx", "status": "completed",
                 "original_geojson": {"type": "FeatureCollection", "features": [
                    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-5.5, 7.5]}, "properties": {}}
                 ]},
                 "corrected_geojson": {"type": "FeatureCollection", "features": [
                    {"type": "Feature",
                     "geometry": {"type": "Polygon",
                                  "coordinates": [[[-5.6, 7.4], [-5.4, 7.4], [-5.4, 7.6], [-5.6, 7.6], [-5.6, 7.4]]]},
                     "properties": {}}
                 ]}},
                {"id": "b", "filename": "b.gpx", "status": "completed"},
                {"id": "c", "filename": "c.gpx", "status": "error", "error_message": "unreadable"}
            ],
            "skipped_files": [],
            "merged_geojson": {"type": "FeatureCollection", "features": [
                {"type": "Feature",
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[-5.6, 7.4], [-5.4, 7.4], [-5.4, 7.6], [-5.6, 7.6], [-5.6, 7.4]]]},
                 "properties": {"id": "a", "filename": "a.gpx", "area_hectares": 12.0}},
                {"type": "Feature",
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[-5.3, 7.2], [-5.2, 7.2], [-5.2, 7.3], [-5.3, 7.3], [-5.3, 7.2]]]},
                 "properties": {"id": "b", "filename": "b.gpx", "area_hectares": 8.0}}
            ]}
        })
    }

    fn batch() -> ResultSet {
        serde_json::from_value(batch_json()).unwrap()
    }

    fn overlay_count(viewer: &Viewer) -> usize {
        viewer.engine().surface().map(|s| s.overlays.len()).unwrap_or(0)
    }

    #[test]
    fn test_merged_render_skips_errored_results() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());

        // Two completed polygons drawn; the errored result contributes nothing
        assert_eq!(overlay_count(&viewer), 2);
        let ResultSet::Batch(b) = viewer.data().unwrap() else { panic!() };
        assert_eq!(b.batch_summary.errors, 1);
    }

    #[test]
    fn test_highlight_styles_one_and_dims_the_rest() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());
        viewer.handle_gesture(Gesture::Inspect("a".to_string()));

        assert_eq!(viewer.state(), &ViewState::Merged { highlight: Some("a".to_string()) });
        let surface = viewer.engine().surface().unwrap();
        assert_eq!(surface.overlays.len(), 2);
        let color_a = viewer.color_for("a.gpx").unwrap();
        let color_b = viewer.color_for("b.gpx").unwrap();
        for overlay in &surface.overlays {
            match overlay.select_id.as_deref() {
                Some("a") => assert_eq!(overlay.style, LayerStyle::merged_emphasized(color_a)),
                Some("b") => assert_eq!(overlay.style, LayerStyle::merged_dimmed(color_b)),
                other => panic!("unexpected overlay id {other:?}"),
            }
        }
    }

    #[test]
    fn test_gesture_cycle_switches_render_modes() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());

        viewer.handle_gesture(Gesture::Inspect("a".to_string()));
        assert_eq!(overlay_count(&viewer), 2); // merged with highlight

        viewer.handle_gesture(Gesture::Inspect("a".to_string()));
        assert!(viewer.state().is_single());
        assert_eq!(overlay_count(&viewer), 2); // a's points + corrected polygon

        viewer.handle_gesture(Gesture::Inspect("a".to_string()));
        assert_eq!(viewer.state(), &ViewState::Merged { highlight: None });
        assert_eq!(overlay_count(&viewer), 2); // back to plain merged view
    }

    #[test]
    fn test_unknown_result_gesture_is_noop() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());
        let before = viewer.state().clone();
        viewer.handle_gesture(Gesture::Inspect("nope".to_string()));
        assert_eq!(viewer.state(), &before);
    }

    #[test]
    fn test_gesture_after_unmount_is_ignored() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());
        viewer.unmount();

        let before = viewer.state().clone();
        viewer.handle_gesture(Gesture::Inspect("a".to_string()));
        assert_eq!(viewer.state(), &before);
        assert!(!viewer.is_mounted());
    }

    #[test]
    fn test_remount_recreates_a_fresh_surface() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());
        assert_eq!(overlay_count(&viewer), 2);

        viewer.unmount();
        assert_eq!(overlay_count(&viewer), 0);

        viewer.mount("map_panel");
        // Redrawn from the retained data, not duplicated
        assert_eq!(overlay_count(&viewer), 2);
    }

    #[test]
    fn test_single_result_fits_to_point_cloud_only() {
        // Track line far away from the fixes must not influence the fit
        let json = json!({
            "id": "solo",
            "filename": "solo.gpx",
            "status": "completed",
            "original_geojson": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-5.5, 7.5]}, "properties": {}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-5.49, 7.51]}, "properties": {}}
            ]},
            "line_geojson": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "LineString",
                                                 "coordinates": [[10.0, 50.0], [11.0, 51.0]]}, "properties": {}}
            ]}
        });
        let set: ResultSet = serde_json::from_value(json).unwrap();

        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(set);

        assert_eq!(overlay_count(&viewer), 2);
        let viewport = viewer.engine().surface().unwrap().viewport;
        assert!((viewport.center_lon - -5.495).abs() < 1e-6);
        assert!((viewport.center_lat - 7.505).abs() < 0.01);
    }

    #[test]
    fn test_zoom_detail_from_highlight() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());

        viewer.handle_gesture(Gesture::Inspect("a".to_string()));
        viewer.handle_gesture(Gesture::ZoomDetail);
        assert_eq!(viewer.state(), &ViewState::Single { selected: "a".to_string() });
        assert_eq!(viewer.selected_result().unwrap().filename, "a.gpx");
    }

    #[test]
    fn test_pick_resolves_topmost_polygon() {
        let mut viewer = viewer();
        viewer.mount("map_panel");
        viewer.set_results(batch());

        assert_eq!(viewer.pick(-5.5, 7.5).as_deref(), Some("a"));
        assert_eq!(viewer.pick(-5.25, 7.25).as_deref(), Some("b"));
        assert_eq!(viewer.pick(0.0, 0.0), None);
    }
}
