pub use kurbo::{Point, Rect};

/// Identity of a drawable element owned by a surface.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ArtifactId(pub u32);

/// Identity of a sub-surface region (an "axes"): the unit of blit capture and flush.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RegionId(pub u32);

/// Integer pixel bounds `[x0, x1) x [y0, y1)` of `rect`, clamped to a `width` x `height` target.
///
/// Returns `None` when the clamped area is empty.
pub fn pixel_bounds(rect: Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let r = rect.round();
    let x0 = r.x0.max(0.0).min(f64::from(width)) as u32;
    let y0 = r.y0.max(0.0).min(f64::from(height)) as u32;
    let x1 = r.x1.max(0.0).min(f64::from(width)) as u32;
    let y1 = r.y1.max(0.0).min(f64::from(height)) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1, y1))
}
