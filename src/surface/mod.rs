//! The drawing surface an animation renders into.

/// Headless RGBA raster surface.
pub mod raster;

use crate::foundation::core::{ArtifactId, Rect, RegionId};
use crate::foundation::error::CadenzaResult;
use crate::timer::backend::TimerBackend;
use std::path::Path;

/// A host rendering surface: pixel storage plus the drawable artifacts placed on it.
///
/// Regions are the unit of partial redraw; every artifact belongs to exactly one region.
/// Lifecycle notifications are not part of this trait; the [`crate::Figure`] wrapping a
/// surface raises them.
pub trait Surface: 'static {
    /// Captured pixels of one region.
    type Snapshot;

    fn size(&self) -> (u32, u32);

    /// Ask for a full repaint at the host's convenience. Requests coalesce.
    fn request_idle_redraw(&mut self);

    fn redraw_pending(&self) -> bool;

    /// Full repaint: background, regions, then every visible artifact.
    fn redraw(&mut self) -> CadenzaResult<()>;

    fn resize(&mut self, width: u32, height: u32) -> CadenzaResult<()>;

    fn set_visible(&mut self, artifact: ArtifactId, visible: bool) -> CadenzaResult<()>;

    fn region_of(&self, artifact: ArtifactId) -> Option<RegionId>;

    /// Current pixel bounds of `region`.
    fn region_bbox(&self, region: RegionId) -> Option<Rect>;

    /// Paint one artifact over the current pixels, without touching anything else.
    fn draw_artifact(&mut self, artifact: ArtifactId) -> CadenzaResult<()>;

    fn capture_region(&mut self, bbox: Rect) -> Self::Snapshot;

    fn restore_region(&mut self, bbox: Rect, snapshot: &Self::Snapshot);

    /// Present the pixels inside `bbox`.
    fn flush_region(&mut self, bbox: Rect);

    /// Write the fully rendered current state as an image.
    fn save_to_file(&mut self, path: &Path) -> CadenzaResult<()>;

    /// A timer integrated with the surface's own event loop, if it has one.
    fn native_timer(&mut self) -> Option<Box<dyn TimerBackend>> {
        None
    }
}
