//! Base tile layer fetching and caching
//!
//! Tiles are fetched on a small background tokio runtime and handed to the
//! UI thread over a channel, so the gesture/render path never waits on the
//! network. Fetched tiles are kept on disk under `{cache}/{z}/{x}/{y}.png`
//! and as GPU textures for the session. A tile that failed once is not
//! requested again until restart.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};

use anyhow::Result;
use tracing::{debug, warn};

/// Identity of one slippy-map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Mercator-fraction rectangle covered by this tile: (x0, y0, x1, y1).
    pub fn mercator_rect(&self) -> (f64, f64, f64, f64) {
        let n = (1u64 << self.z) as f64;
        (
            self.x as f64 / n,
            self.y as f64 / n,
            (self.x + 1) as f64 / n,
            (self.y + 1) as f64 / n,
        )
    }

    /// Fill a {z}/{x}/{y} URL template.
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }

    fn cache_path(&self, root: &Path) -> PathBuf {
        root.join(self.z.to_string())
            .join(self.x.to_string())
            .join(format!("{}.png", self.y))
    }
}

/// Tiles covering a mercator-fraction rectangle at zoom `z`.
///
/// The enumeration is capped; panning at high zoom can momentarily request
/// a huge range and the cap keeps that bounded.
pub fn tiles_in_rect(x0: f64, x1: f64, y0: f64, y1: f64, z: u8, cap: usize) -> Vec<TileId> {
    let n = 1u64 << z.min(30);
    let clamp = |v: f64| v.clamp(0.0, 1.0 - 1e-12);
    let tx0 = (clamp(x0.min(x1)) * n as f64).floor() as u64;
    let tx1 = (clamp(x0.max(x1)) * n as f64).floor() as u64;
    let ty0 = (clamp(y0.min(y1)) * n as f64).floor() as u64;
    let ty1 = (clamp(y0.max(y1)) * n as f64).floor() as u64;

    let mut tiles = Vec::new();
    'outer: for y in ty0..=ty1 {
        for x in tx0..=tx1 {
            if tiles.len() >= cap {
                break 'outer;
            }
            tiles.push(TileId { z, x: x as u32, y: y as u32 });
        }
    }
    tiles
}

type FetchMessage = (TileId, Option<image::RgbaImage>);

/// In-memory texture store backed by async fetches and a disk cache.
pub struct TileCache {
    url_template: String,
    cache_dir: PathBuf,
    textures: HashMap<TileId, egui::TextureHandle>,
    pending: HashSet<TileId>,
    failed: HashSet<TileId>,
    tx: Sender<FetchMessage>,
    rx: Receiver<FetchMessage>,
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
}

impl TileCache {
    pub fn new(url_template: String, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let client = reqwest::Client::builder()
            .user_agent("parcel_viewer/0.1 (github.com/parcel-viewer)")
            .build()?;
        let (tx, rx) = channel();

        Ok(Self {
            url_template,
            cache_dir: cache_dir.into(),
            textures: HashMap::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
            tx,
            rx,
            runtime,
            client,
        })
    }

    /// True while fetches are in flight (the UI keeps repainting then).
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain finished fetches into textures. Call once per frame.
    pub fn poll(&mut self, ctx: &egui::Context) {
        while let Ok((id, result)) = self.rx.try_recv() {
            self.pending.remove(&id);
            match result {
                Some(img) => {
                    let size = [img.width() as usize, img.height() as usize];
                    let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                    let name = format!("tile-{}-{}-{}", id.z, id.x, id.y);
                    let handle = ctx.load_texture(name, color, egui::TextureOptions::LINEAR);
                    self.textures.insert(id, handle);
                }
                None => {
                    self.failed.insert(id);
                }
            }
        }
    }

    /// Texture for a tile, kicking off a background fetch on miss.
    pub fn get(&mut self, id: TileId) -> Option<&egui::TextureHandle> {
        if self.failed.contains(&id) {
            return None;
        }
        if !self.textures.contains_key(&id) && self.pending.insert(id) {
            debug!(z = id.z, x = id.x, y = id.y, "requesting tile");
            let url = id.url(&self.url_template);
            let path = id.cache_path(&self.cache_dir);
            let tx = self.tx.clone();
            let client = self.client.clone();
            self.runtime.spawn(async move {
                let img = match fetch_tile(&client, &url, &path).await {
                    Ok(img) => Some(img),
                    Err(err) => {
                        warn!(%url, error = %err, "tile fetch failed");
                        None
                    }
                };
                // The receiver may be gone if the viewer shut down; that
                // just drops the tile.
                let _ = tx.send((id, img));
            });
        }
        self.textures.get(&id)
    }
}

/// Disk-cache hit or HTTP fetch, then PNG decode.
async fn fetch_tile(client: &reqwest::Client, url: &str, path: &Path) -> Result<image::RgbaImage> {
    let bytes = if path.exists() {
        tokio::fs::read(path).await?
    } else {
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("tile server returned {}", response.status());
        }
        let bytes = response.bytes().await?.to_vec();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        bytes
    };

    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_template() {
        let id = TileId { z: 10, x: 496, y: 490 };
        assert_eq!(
            id.url("https://tile.openstreetmap.org/{z}/{x}/{y}.png"),
            "https://tile.openstreetmap.org/10/496/490.png"
        );
    }

    #[test]
    fn test_mercator_rect_partitions_world() {
        let (x0, y0, _, _) = TileId { z: 1, x: 0, y: 0 }.mercator_rect();
        assert_eq!((x0, y0), (0.0, 0.0));
        let (x0, y0, x1, y1) = TileId { z: 1, x: 1, y: 1 }.mercator_rect();
        assert_eq!((x0, y0, x1, y1), (0.5, 0.5, 1.0, 1.0));
    }

    #[test]
    fn test_tiles_in_rect_single_tile_world() {
        let tiles = tiles_in_rect(0.0, 1.0, 0.0, 1.0, 0, 64);
        assert_eq!(tiles, vec![TileId { z: 0, x: 0, y: 0 }]);
    }

    #[test]
    fn test_tiles_in_rect_covers_range() {
        let tiles = tiles_in_rect(0.24, 0.51, 0.26, 0.49, 2, 64);
        // x tiles 0..=2, y tile 1 only
        assert_eq!(tiles.len(), 3);
        assert!(tiles.iter().all(|t| t.y == 1));
    }

    #[test]
    fn test_tiles_in_rect_respects_cap() {
        let tiles = tiles_in_rect(0.0, 1.0, 0.0, 1.0, 10, 16);
        assert_eq!(tiles.len(), 16);
    }

    #[test]
    fn test_tile_for_known_position() {
        // Center of Côte d'Ivoire at z=10 lands in column 496
        let x = (crate::map::mercator_x(-5.5) * 1024.0).floor() as u32;
        assert_eq!(x, 496);
    }
}
