use crate::foundation::core::{ArtifactId, Point, Rect, RegionId, pixel_bounds};
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::surface::Surface;
use anyhow::Context as _;
use image::{Rgba, RgbaImage, imageops};
use std::path::Path;

/// Geometry of an artifact, in coordinates normalized to its region (`0..1` on both axes,
/// y pointing down).
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Filled rectangle.
    Rect(Rect),
    /// One-pixel polyline through the points. A single point plots a dot.
    Polyline(Vec<Point>),
}

/// Pixels captured from a region, with the position they came from.
#[derive(Clone, Debug)]
pub struct RegionSnapshot {
    x: u32,
    y: u32,
    image: RgbaImage,
}

impl RegionSnapshot {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

struct Region {
    id: RegionId,
    /// Figure-normalized placement.
    bounds: Rect,
    fill: Rgba<u8>,
}

struct Artifact {
    id: ArtifactId,
    region: RegionId,
    shape: Shape,
    color: Rgba<u8>,
    visible: bool,
}

/// In-memory RGBA8 surface.
///
/// Regions are placed in figure-normalized coordinates, so a resize rescales the layout
/// instead of cropping it.
pub struct RasterSurface {
    pixels: RgbaImage,
    background: Rgba<u8>,
    regions: Vec<Region>,
    artifacts: Vec<Artifact>,
    redraw_pending: bool,
    full_redraws: u64,
    flushes: u64,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> CadenzaResult<Self> {
        validate_size(width, height)?;
        let background = Rgba(background);
        Ok(Self {
            pixels: RgbaImage::from_pixel(width, height, background),
            background,
            regions: Vec::new(),
            artifacts: Vec::new(),
            redraw_pending: false,
            full_redraws: 0,
            flushes: 0,
        })
    }

    pub fn add_region(&mut self, bounds: Rect, fill: [u8; 4]) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(Region {
            id,
            bounds,
            fill: Rgba(fill),
        });
        id
    }

    pub fn add_artifact(
        &mut self,
        region: RegionId,
        shape: Shape,
        color: [u8; 4],
    ) -> CadenzaResult<ArtifactId> {
        if !self.regions.iter().any(|r| r.id == region) {
            return Err(CadenzaError::render(format!("unknown region {region:?}")));
        }
        let id = ArtifactId(self.artifacts.len() as u32);
        self.artifacts.push(Artifact {
            id,
            region,
            shape,
            color: Rgba(color),
            visible: true,
        });
        Ok(id)
    }

    pub fn set_shape(&mut self, artifact: ArtifactId, shape: Shape) -> CadenzaResult<()> {
        self.artifact_mut(artifact)?.shape = shape;
        Ok(())
    }

    pub fn shape(&self, artifact: ArtifactId) -> Option<&Shape> {
        self.artifact(artifact).map(|a| &a.shape)
    }

    pub fn is_visible(&self, artifact: ArtifactId) -> Option<bool> {
        self.artifact(artifact).map(|a| a.visible)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    pub fn full_redraws(&self) -> u64 {
        self.full_redraws
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    fn artifact(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    fn artifact_mut(&mut self, id: ArtifactId) -> CadenzaResult<&mut Artifact> {
        self.artifacts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CadenzaError::render(format!("unknown artifact {id:?}")))
    }

    fn region_px(&self, region: RegionId) -> Option<Rect> {
        let (w, h) = self.pixels.dimensions();
        let (w, h) = (f64::from(w), f64::from(h));
        self.regions
            .iter()
            .find(|r| r.id == region)
            .map(|r| Rect::new(r.bounds.x0 * w, r.bounds.y0 * h, r.bounds.x1 * w, r.bounds.y1 * h))
    }

    fn paint(&mut self, artifact: ArtifactId) -> CadenzaResult<()> {
        let art = self
            .artifact(artifact)
            .ok_or_else(|| CadenzaError::render(format!("unknown artifact {artifact:?}")))?;
        if !art.visible {
            return Ok(());
        }
        let area = self
            .region_px(art.region)
            .ok_or_else(|| CadenzaError::render(format!("unknown region {:?}", art.region)))?;
        let (shape, color) = (art.shape.clone(), art.color);
        paint_shape(&mut self.pixels, area, &shape, color);
        Ok(())
    }
}

impl Surface for RasterSurface {
    type Snapshot = RegionSnapshot;

    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn request_idle_redraw(&mut self) {
        self.redraw_pending = true;
    }

    fn redraw_pending(&self) -> bool {
        self.redraw_pending
    }

    fn redraw(&mut self) -> CadenzaResult<()> {
        let (w, h) = self.pixels.dimensions();
        fill_rect(
            &mut self.pixels,
            Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
            self.background,
        );
        let regions: Vec<(RegionId, Rgba<u8>)> =
            self.regions.iter().map(|r| (r.id, r.fill)).collect();
        for (id, fill) in regions {
            if let Some(area) = self.region_px(id) {
                fill_rect(&mut self.pixels, area, fill);
            }
        }
        let ids: Vec<ArtifactId> = self.artifacts.iter().map(|a| a.id).collect();
        for id in ids {
            self.paint(id)?;
        }
        self.redraw_pending = false;
        self.full_redraws += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> CadenzaResult<()> {
        validate_size(width, height)?;
        self.pixels = RgbaImage::from_pixel(width, height, self.background);
        self.redraw_pending = true;
        Ok(())
    }

    fn set_visible(&mut self, artifact: ArtifactId, visible: bool) -> CadenzaResult<()> {
        self.artifact_mut(artifact)?.visible = visible;
        Ok(())
    }

    fn region_of(&self, artifact: ArtifactId) -> Option<RegionId> {
        self.artifact(artifact).map(|a| a.region)
    }

    fn region_bbox(&self, region: RegionId) -> Option<Rect> {
        self.region_px(region)
    }

    fn draw_artifact(&mut self, artifact: ArtifactId) -> CadenzaResult<()> {
        self.paint(artifact)
    }

    fn capture_region(&mut self, bbox: Rect) -> RegionSnapshot {
        let (w, h) = self.pixels.dimensions();
        match pixel_bounds(bbox, w, h) {
            Some((x0, y0, x1, y1)) => RegionSnapshot {
                x: x0,
                y: y0,
                image: imageops::crop_imm(&self.pixels, x0, y0, x1 - x0, y1 - y0).to_image(),
            },
            None => RegionSnapshot {
                x: 0,
                y: 0,
                image: RgbaImage::new(0, 0),
            },
        }
    }

    fn restore_region(&mut self, _bbox: Rect, snapshot: &RegionSnapshot) {
        imageops::replace(
            &mut self.pixels,
            &snapshot.image,
            i64::from(snapshot.x),
            i64::from(snapshot.y),
        );
    }

    fn flush_region(&mut self, _bbox: Rect) {
        self.flushes += 1;
    }

    fn save_to_file(&mut self, path: &Path) -> CadenzaResult<()> {
        if self.redraw_pending {
            self.redraw()?;
        }
        self.pixels
            .save(path)
            .with_context(|| format!("write frame image '{}'", path.display()))?;
        Ok(())
    }
}

fn validate_size(width: u32, height: u32) -> CadenzaResult<()> {
    if width == 0 || height == 0 {
        return Err(CadenzaError::validation("surface width/height must be non-zero"));
    }
    Ok(())
}

fn fill_rect(pixels: &mut RgbaImage, area: Rect, color: Rgba<u8>) {
    let (w, h) = pixels.dimensions();
    let Some((x0, y0, x1, y1)) = pixel_bounds(area, w, h) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            pixels.put_pixel(x, y, color);
        }
    }
}

fn paint_shape(pixels: &mut RgbaImage, area: Rect, shape: &Shape, color: Rgba<u8>) {
    let to_px = |p: Point| Point::new(area.x0 + p.x * area.width(), area.y0 + p.y * area.height());
    match shape {
        Shape::Rect(r) => {
            let px = Rect::from_points(to_px(r.origin()), to_px(Point::new(r.x1, r.y1)));
            fill_rect(pixels, px.intersect(area), color);
        }
        Shape::Polyline(points) => {
            let (w, h) = pixels.dimensions();
            let Some(clip) = pixel_bounds(area, w, h) else {
                return;
            };
            let mut plot = |p: Point| {
                let (x, y) = (p.x.floor(), p.y.floor());
                if x >= f64::from(clip.0)
                    && x < f64::from(clip.2)
                    && y >= f64::from(clip.1)
                    && y < f64::from(clip.3)
                {
                    pixels.put_pixel(x as u32, y as u32, color);
                }
            };
            match points.as_slice() {
                [] => {}
                [only] => plot(to_px(*only)),
                _ => {
                    for seg in points.windows(2) {
                        let (a, b) = (to_px(seg[0]), to_px(seg[1]));
                        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0);
                        for i in 0..=(steps as u32) {
                            plot(a.lerp(b, f64::from(i) / steps));
                        }
                    }
                }
            }
        }
    }
}
