//! Map surface lifecycle and viewport control
//!
//! One surface per viewer instance: created once on mount, released once on
//! unmount. Both directions are idempotent, so re-entrant UI code cannot end
//! up with duplicate surfaces or dangling overlays. Every operation on a
//! released surface degrades to a logged no-op.

use tracing::{debug, info};

use crate::config::MapConfig;
use crate::map::bounds::GeoBounds;
use crate::map::layers::Overlay;
use crate::map::{lat_of_y, lon_of_x, mercator_x, mercator_y};

/// Tile edge length in pixels, the slippy-map standard.
pub const TILE_SIZE: f64 = 256.0;

/// Base tile layer registered at initialization.
///
/// Overlay synchronization never touches it; it lives and dies with the
/// surface itself.
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

/// Camera over the mercator plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
}

/// One live map surface: base tiles, overlay stack and viewport.
pub struct MapSurface {
    host: String,
    pub tile_layer: TileLayer,
    pub overlays: Vec<Overlay>,
    pub viewport: Viewport,
    /// Drawable panel size in pixels, kept current by the embedding UI.
    pub size: (f32, f32),
}

impl MapSurface {
    /// Identifier of the UI element this surface is bound to.
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Owner of the surface lifecycle.
pub struct MapEngine {
    defaults: MapConfig,
    surface: Option<MapSurface>,
}

impl MapEngine {
    pub fn new(defaults: MapConfig) -> Self {
        Self { defaults, surface: None }
    }

    /// Create the surface bound to `host`. A second call while a surface is
    /// live is a no-op, whatever host it names.
    pub fn initialize(&mut self, host: &str) {
        if let Some(surface) = &self.surface {
            debug!(host = surface.host(), "map surface already initialized, ignoring");
            return;
        }

        info!(host, "creating map surface");
        self.surface = Some(MapSurface {
            host: host.to_string(),
            tile_layer: TileLayer {
                url_template: self.defaults.tile_url.clone(),
                attribution: self.defaults.attribution.clone(),
                max_zoom: self.defaults.max_zoom,
            },
            overlays: Vec::new(),
            viewport: Viewport {
                center_lat: self.defaults.center_lat,
                center_lon: self.defaults.center_lon,
                zoom: self.defaults.zoom,
            },
            size: (800.0, 600.0),
        });
    }

    /// Release the surface and everything drawn on it. Safe to call again.
    pub fn dispose(&mut self) {
        match self.surface.take() {
            Some(surface) => info!(host = surface.host(), "map surface released"),
            None => debug!("dispose called with no live surface"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&MapSurface> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut MapSurface> {
        self.surface.as_mut()
    }

    /// Record the drawable panel size used for bounds fitting.
    pub fn set_surface_size(&mut self, width: f32, height: f32) {
        if let Some(surface) = self.surface.as_mut() {
            surface.size = (width.max(1.0), height.max(1.0));
        }
    }

    /// Move the viewport so `bounds` fits with `padding` pixels per side.
    ///
    /// Invalid bounds keep the current viewport untouched, as does a call on
    /// a released surface.
    pub fn fit_bounds(&mut self, bounds: &GeoBounds, padding: f32) {
        let max_zoom = self.defaults.max_zoom as f64;
        let Some(surface) = self.surface.as_mut() else {
            debug!("fit_bounds on released surface, ignoring");
            return;
        };
        if !bounds.is_valid() {
            debug!("no valid bounds accumulated, keeping viewport");
            return;
        }

        let (width, height) = surface.size;
        let avail_w = (width - 2.0 * padding).max(32.0) as f64;
        let avail_h = (height - 2.0 * padding).max(32.0) as f64;

        let x0 = mercator_x(bounds.min_lon());
        let x1 = mercator_x(bounds.max_lon());
        let y0 = mercator_y(bounds.max_lat());
        let y1 = mercator_y(bounds.min_lat());
        let span_x = (x1 - x0).max(1e-12);
        let span_y = (y1 - y0).max(1e-12);

        // Largest zoom where the padded span still fits the panel
        let zoom_x = (avail_w / (TILE_SIZE * span_x)).log2();
        let zoom_y = (avail_h / (TILE_SIZE * span_y)).log2();
        let zoom = zoom_x.min(zoom_y).clamp(0.0, max_zoom);

        surface.viewport = Viewport {
            center_lon: lon_of_x((x0 + x1) / 2.0),
            center_lat: lat_of_y((y0 + y1) / 2.0),
            zoom,
        };
        debug!(zoom, "viewport fitted to bounds");
    }
}
