//! Native GUI viewer using egui
//!
//! The map canvas is an egui_plot surface in web-mercator fractions, with
//! north up (plot Y is the negated mercator Y). Base tiles and vector
//! overlays share that coordinate system, so they stay aligned at any zoom.

use eframe::egui;
use egui_plot::{
    Line, LineStyle, MarkerShape, Plot, PlotBounds, PlotImage, PlotPoint, PlotPoints, Points,
    Polygon,
};
use tracing::warn;

use crate::config::ViewerConfig;
use crate::map::colors::Color;
use crate::map::engine::{Viewport, TILE_SIZE};
use crate::map::layers::{LonLat, Overlay, Shape};
use crate::map::{lat_of_y, lon_of_x, mercator_x, mercator_y};
use crate::model::{
    AreaSummary, BatchResult, CorrectionSummary, ProcessingResult, ResultSet, ResultStatus,
};
use crate::tiles::{tiles_in_rect, TileCache};
use crate::view::{Gesture, ViewState};
use crate::viewer::Viewer;

/// Run the native viewer window for a loaded result set.
pub fn run_viewer(config: ViewerConfig, set: ResultSet) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_title("Parcel Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "Parcel Viewer",
        options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, config, set)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

struct ViewerApp {
    viewer: Viewer,
    tiles: Option<TileCache>,
    attribution: String,
    max_zoom: u8,
    /// Last engine viewport pushed into the plot, so user panning is only
    /// overridden when a fit actually moved the camera.
    applied_viewport: Option<Viewport>,
}

impl ViewerApp {
    fn new(cc: &eframe::CreationContext<'_>, config: ViewerConfig, set: ResultSet) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let tiles = match TileCache::new(config.map.tile_url.clone(), config.tile_cache_dir.clone())
        {
            Ok(cache) => Some(cache),
            Err(err) => {
                warn!("tile cache unavailable, drawing without base layer: {}", err);
                None
            }
        };
        let attribution = config.map.attribution.clone();
        let max_zoom = config.map.max_zoom;

        let mut viewer = Viewer::new(config);
        viewer.mount("map_panel");
        viewer.set_results(set);

        Self { viewer, tiles, attribution, max_zoom, applied_viewport: None }
    }

    fn map_title(&self) -> String {
        let filename = self
            .viewer
            .selected_result()
            .map(|r| r.filename.clone())
            .unwrap_or_default();
        match (self.viewer.data(), self.viewer.state()) {
            (Some(ResultSet::Batch(_)), ViewState::Merged { highlight: None }) => {
                "Overview — all parcels".to_string()
            }
            (Some(ResultSet::Batch(_)), ViewState::Merged { highlight: Some(_) }) => {
                format!("Overview — {filename} highlighted")
            }
            (_, ViewState::Single { .. }) => format!("Detail — {filename}"),
            _ => String::new(),
        }
    }

    fn header_ui(&self, ui: &mut egui::Ui, gestures: &mut Vec<Gesture>) {
        ui.horizontal(|ui| {
            ui.heading("Parcel Viewer");
            ui.separator();
            ui.label(self.map_title());

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if !matches!(self.viewer.data(), Some(ResultSet::Batch(_))) {
                    return;
                }
                match self.viewer.state() {
                    ViewState::Merged { highlight: Some(_) } => {
                        if ui.button("Zoom to parcel").clicked() {
                            gestures.push(Gesture::ZoomDetail);
                        }
                        if ui.button("Show all").clicked() {
                            gestures.push(Gesture::ShowAll);
                        }
                    }
                    ViewState::Single { .. } => {
                        if ui.button("Show all").clicked() {
                            gestures.push(Gesture::ShowAll);
                        }
                    }
                    ViewState::Merged { highlight: None } => {}
                }
            });
        });
    }

    fn results_ui(&self, ui: &mut egui::Ui, gestures: &mut Vec<Gesture>) {
        match self.viewer.data() {
            None => {
                ui.label("No results loaded");
            }
            Some(ResultSet::Single(result)) => {
                single_result_ui(ui, result);
            }
            Some(ResultSet::Batch(batch)) => {
                self.batch_ui(ui, batch, gestures);
            }
        }
    }

    fn batch_ui(&self, ui: &mut egui::Ui, batch: &BatchResult, gestures: &mut Vec<Gesture>) {
        let summary = &batch.batch_summary;
        ui.horizontal(|ui| {
            stat(ui, summary.total_files.to_string(), "Files");
            stat(ui, summary.processed.to_string(), "Processed");
            stat(ui, summary.errors.to_string(), "Errors");
            stat(ui, format!("{:.2}", summary.total_area_hectares), "Hectares");
            stat(ui, summary.total_corrections.to_string(), "Corrections");
        });
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("results_table")
                .striped(true)
                .num_columns(7)
                .min_col_width(24.0)
                .show(ui, |ui| {
                    for header in ["#", "File", "Status", "Points", "ha", "Corr.", ""] {
                        ui.label(egui::RichText::new(header).small().strong());
                    }
                    ui.end_row();

                    for (index, result) in batch.results.iter().enumerate() {
                        let active =
                            self.viewer.state().selected().is_some_and(|id| id == &result.id);
                        ui.label(format!("{}", index + 1));

                        ui.horizontal(|ui| {
                            if let Some(color) = self.viewer.color_for(&result.filename) {
                                ui.colored_label(color32(color, 1.0), "●");
                            }
                            ui.vertical(|ui| {
                                ui.label(egui::RichText::new(&result.filename).strong());
                                ui.label(egui::RichText::new(&result.id).small().weak());
                            });
                        });

                        status_badge(ui, result.status);
                        ui.label(
                            result
                                .validation
                                .as_ref()
                                .map(|v| v.total_points.to_string())
                                .unwrap_or_else(|| "—".to_string()),
                        );
                        ui.label(
                            result
                                .area
                                .as_ref()
                                .map(|a| format!("{:.2}", a.area_hectares))
                                .unwrap_or_else(|| "—".to_string()),
                        );
                        ui.label(result.total_corrections().to_string());

                        if result.is_completed() {
                            let mut button = egui::Button::new("👁");
                            if active {
                                button = button.fill(ui.visuals().selection.bg_fill);
                            }
                            if ui.add(button).on_hover_text("Show on map").clicked() {
                                gestures.push(Gesture::Inspect(result.id.clone()));
                            }
                        } else {
                            ui.label("");
                        }
                        ui.end_row();
                    }
                });

            if !batch.skipped_files.is_empty() {
                ui.add_space(8.0);
                ui.collapsing(format!("Skipped files ({})", batch.skipped_files.len()), |ui| {
                    for skipped in &batch.skipped_files {
                        ui.label(format!("⚠ {} — {}", skipped.filename, skipped.reason));
                    }
                });
            }

            if let Some(result) = self.viewer.selected_result() {
                if result.is_completed() {
                    ui.add_space(8.0);
                    ui.separator();
                    if let Some(corrections) = &result.corrections {
                        ui.collapsing(format!("Corrections — {}", result.filename), |ui| {
                            corrections_ui(ui, corrections);
                        });
                    }
                    if let Some(area) = &result.area {
                        ui.collapsing(format!("Area — {}", result.filename), |ui| {
                            area_ui(ui, area);
                        });
                    }
                }
            }
        });
    }

    fn legend_ui(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match (self.viewer.data(), self.viewer.state()) {
                (Some(ResultSet::Batch(batch)), ViewState::Merged { .. }) => {
                    let mut seen: Vec<&str> = Vec::new();
                    for feature in &batch.merged_geojson.features {
                        if let Some(name) = feature.property_str("filename") {
                            if !seen.contains(&name) {
                                seen.push(name);
                            }
                        }
                    }
                    for name in seen.iter().take(8) {
                        if let Some(color) = self.viewer.color_for(name) {
                            ui.colored_label(color32(color, 1.0), "●");
                            ui.label(*name);
                        }
                    }
                    if seen.len() > 8 {
                        ui.label(format!("+{} more", seen.len() - 8));
                    }
                }
                _ => {
                    legend_dot(ui, Color::rgb(0x3b, 0x82, 0xf6), "Original GPS points");
                    legend_dot(ui, Color::rgb(0x8b, 0x5c, 0xf6), "Track line");
                    legend_dot(ui, Color::rgb(0x22, 0xc5, 0x5e), "Corrected polygon");
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(egui::RichText::new(&self.attribution).small().weak());
            });
        });
    }

    fn map_ui(&mut self, ui: &mut egui::Ui, gestures: &mut Vec<Gesture>) {
        let size = ui.available_size();
        self.viewer.engine_mut().set_surface_size(size.x, size.y);

        let Some(viewport) = self.viewer.engine().surface().map(|s| s.viewport) else {
            ui.label("Map surface is not mounted");
            return;
        };

        let panel_width = size.x.max(1.0) as f64;
        let panel_height = size.y.max(1.0) as f64;
        let apply = self.applied_viewport.map_or(true, |v| v != viewport);
        let max_zoom = self.max_zoom;
        let mut clicked: Option<PlotPoint> = None;

        let plot = Plot::new("map_plot")
            .data_aspect(1.0)
            .show_axes(false)
            .show_grid(false)
            .show_x(false)
            .show_y(false)
            .allow_boxed_zoom(false);

        plot.show(ui, |plot_ui| {
            if apply {
                // World units per pixel at the engine's zoom level
                let upp = 1.0 / (TILE_SIZE * 2f64.powf(viewport.zoom));
                let half_w = panel_width / 2.0 * upp;
                let half_h = panel_height / 2.0 * upp;
                let cx = mercator_x(viewport.center_lon);
                let cy = mercator_y(viewport.center_lat);
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [cx - half_w, -cy - half_h],
                    [cx + half_w, -cy + half_h],
                ));
            }

            let bounds = plot_ui.plot_bounds();

            // Base tile layer first, underneath every overlay
            if let Some(tiles) = &mut self.tiles {
                let zoom = ((panel_width / bounds.width().max(1e-12)) / TILE_SIZE)
                    .log2()
                    .ceil()
                    .clamp(0.0, max_zoom as f64) as u8;
                let (mx0, mx1) = (bounds.min()[0], bounds.max()[0]);
                let (my0, my1) = (-bounds.max()[1], -bounds.min()[1]);
                for id in tiles_in_rect(mx0, mx1, my0, my1, zoom, 64) {
                    if let Some(texture) = tiles.get(id) {
                        let (x0, y0, x1, y1) = id.mercator_rect();
                        let center = PlotPoint::new((x0 + x1) / 2.0, -(y0 + y1) / 2.0);
                        let side = (x1 - x0) as f32;
                        plot_ui.image(PlotImage::new(texture, center, egui::Vec2::splat(side)));
                    }
                }
            }

            // Overlay layers in synchronizer order
            if let Some(surface) = self.viewer.engine().surface() {
                for overlay in &surface.overlays {
                    paint_overlay(plot_ui, overlay);
                }
            }

            if plot_ui.response().clicked() {
                clicked = plot_ui.pointer_coordinate();
            }
        });

        if apply {
            self.applied_viewport = Some(viewport);
        }

        if let Some(point) = clicked {
            let lon = lon_of_x(point.x);
            let lat = lat_of_y(-point.y);
            if let Some(id) = self.viewer.pick(lon, lat) {
                gestures.push(Gesture::Inspect(id));
            }
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(tiles) = &mut self.tiles {
            tiles.poll(ctx);
            if tiles.has_pending() {
                ctx.request_repaint_after(std::time::Duration::from_millis(100));
            }
        }

        let mut gestures: Vec<Gesture> = Vec::new();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            gestures.push(Gesture::ShowAll);
        }

        egui::TopBottomPanel::top("header_panel").show(ctx, |ui| {
            self.header_ui(ui, &mut gestures);
        });
        egui::TopBottomPanel::bottom("legend_panel").show(ctx, |ui| {
            self.legend_ui(ui);
        });
        egui::SidePanel::left("results_panel").min_width(380.0).show(ctx, |ui| {
            self.results_ui(ui, &mut gestures);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.map_ui(ui, &mut gestures);
        });

        // Each gesture runs its full transition + redraw before the next
        for gesture in gestures {
            self.viewer.handle_gesture(gesture);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.viewer.unmount();
    }
}

fn paint_overlay(plot_ui: &mut egui_plot::PlotUi, overlay: &Overlay) {
    let style = overlay.style;
    let stroke_color = color32(style.color, style.opacity);

    for shape in &overlay.shapes {
        match shape {
            Shape::Points(points) => {
                let fill = style
                    .fill_color
                    .map(|c| color32(c, style.fill_opacity))
                    .unwrap_or(stroke_color);
                let coords: Vec<[f64; 2]> = points.iter().map(world).collect();
                plot_ui.points(
                    Points::new(PlotPoints::from(coords))
                        .shape(MarkerShape::Circle)
                        .radius(style.radius)
                        .color(fill),
                );
            }
            Shape::Line(line) => {
                let coords: Vec<[f64; 2]> = line.iter().map(world).collect();
                let mut drawn = Line::new(PlotPoints::from(coords))
                    .color(stroke_color)
                    .width(style.weight);
                if let Some(dash) = style.dash {
                    drawn = drawn.style(LineStyle::Dashed { length: dash.0 });
                }
                plot_ui.line(drawn);
            }
            Shape::Polygon(ring) => {
                let coords: Vec<[f64; 2]> = ring.iter().map(world).collect();
                let fill = style
                    .fill_color
                    .map(|c| color32(c, style.fill_opacity))
                    .unwrap_or(egui::Color32::TRANSPARENT);
                plot_ui.polygon(
                    Polygon::new(PlotPoints::from(coords))
                        .fill_color(fill)
                        .stroke(egui::Stroke::new(style.weight, stroke_color)),
                );
            }
        }
    }
}

/// Plot coordinates for a lon/lat position (mercator, north up).
fn world(p: &LonLat) -> [f64; 2] {
    [mercator_x(p[0]), -mercator_y(p[1])]
}

fn color32(c: Color, alpha: f32) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, (alpha.clamp(0.0, 1.0) * 255.0) as u8)
}

fn stat(ui: &mut egui::Ui, value: String, label: &str) {
    ui.vertical(|ui| {
        ui.label(egui::RichText::new(value).size(18.0).strong());
        ui.label(egui::RichText::new(label).small().weak());
    });
    ui.add_space(10.0);
}

fn status_badge(ui: &mut egui::Ui, status: ResultStatus) {
    match status {
        ResultStatus::Completed => {
            ui.colored_label(egui::Color32::from_rgb(0x16, 0xa3, 0x4a), "✓ OK")
        }
        ResultStatus::Error => ui.colored_label(egui::Color32::from_rgb(0xdc, 0x26, 0x26), "✗ Error"),
    };
}

fn legend_dot(ui: &mut egui::Ui, color: Color, label: &str) {
    ui.colored_label(color32(color, 1.0), "●");
    ui.label(label);
}

fn single_result_ui(ui: &mut egui::Ui, result: &ProcessingResult) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(&result.filename).strong());
        status_badge(ui, result.status);
    });
    ui.label(egui::RichText::new(&result.id).small().weak());
    ui.separator();

    if let Some(message) = &result.error_message {
        ui.colored_label(egui::Color32::from_rgb(0xdc, 0x26, 0x26), message);
        return;
    }

    if let Some(validation) = &result.validation {
        ui.horizontal(|ui| {
            stat(ui, validation.total_points.to_string(), "GPS points");
            stat(ui, validation.errors.len().to_string(), "Errors");
            stat(ui, validation.warnings.len().to_string(), "Warnings");
        });
        if !validation.warnings.is_empty() {
            ui.collapsing("Warnings", |ui| {
                for warning in &validation.warnings {
                    ui.label(format!("⚠ {warning}"));
                }
            });
        }
        ui.separator();
    }

    if let Some(corrections) = &result.corrections {
        ui.label(egui::RichText::new("Corrections").strong());
        corrections_ui(ui, corrections);
        ui.separator();
    }

    if let Some(area) = &result.area {
        ui.label(egui::RichText::new("Area").strong());
        area_ui(ui, area);
    }
}

fn corrections_ui(ui: &mut egui::Ui, corrections: &CorrectionSummary) {
    egui::Grid::new("corrections_grid").num_columns(2).show(ui, |ui| {
        for (label, value) in [
            ("Artifacts removed", corrections.artifacts_removed),
            ("Duplicate vertices", corrections.duplicate_vertices_removed),
            ("Spikes removed", corrections.spikes_removed),
            ("Self-intersections fixed", corrections.self_intersections_fixed),
            ("Geometries repaired", corrections.invalid_geometries_fixed),
        ] {
            ui.label(label);
            ui.label(value.to_string());
            ui.end_row();
        }
    });
    for detail in &corrections.details {
        ui.label(egui::RichText::new(detail).small().weak());
    }
}

fn area_ui(ui: &mut egui::Ui, area: &AreaSummary) {
    ui.horizontal(|ui| {
        stat(ui, format!("{:.2}", area.area_hectares), "Hectares");
        stat(ui, format!("{:.0}", area.area_sq_meters), "m²");
        stat(ui, format!("{:.0}", area.perimeter_meters), "Perimeter (m)");
    });
    ui.label(egui::RichText::new(format!("Projection: {}", area.projection_used)).small().weak());
}
